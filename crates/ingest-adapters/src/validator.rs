//! Validator (C11): magic-byte format sniffing plus per-format size caps.
//!
//! No corpus crate does byte-sniffing for this pipeline's format set, so
//! this is hand-rolled against the handful of signatures below rather than
//! pulled from an ecosystem crate (see DESIGN.md). The extension on
//! `source_name` is only a fallback when the leading bytes are ambiguous
//! (e.g. a plain-text file has no magic number at all).

use async_trait::async_trait;
use ingest_core::errors::IngestError;
use ingest_core::ports::{ValidationOutcome, Validator};
use ingest_domain::DocumentFormat;

pub struct MagicByteValidator;

impl MagicByteValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MagicByteValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn sniff(bytes: &[u8]) -> Option<DocumentFormat> {
    const PDF: &[u8] = b"%PDF-";
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    const GIF: &[u8] = b"GIF8";
    const ZIP: &[u8] = &[0x50, 0x4B, 0x03, 0x04]; // docx/xlsx/pptx are zip containers
    const MP4_FTYP_OFFSET: usize = 4;

    if bytes.starts_with(PDF) {
        return Some(DocumentFormat::Pdf);
    }
    if bytes.starts_with(PNG) || bytes.starts_with(JPEG) || bytes.starts_with(GIF) {
        return Some(DocumentFormat::Image);
    }
    if bytes.len() > MP4_FTYP_OFFSET + 4 && &bytes[MP4_FTYP_OFFSET..MP4_FTYP_OFFSET + 4] == b"ftyp" {
        return Some(DocumentFormat::Av);
    }
    if bytes.starts_with(ZIP) {
        return None; // ZIP container: office format, disambiguate by extension below.
    }
    None
}

fn by_extension(source_name: &str) -> Option<DocumentFormat> {
    let ext = source_name.rsplit('.').next()?.to_lowercase();
    Some(match ext.as_str() {
        "pdf" => DocumentFormat::Pdf,
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tiff" | "webp" => DocumentFormat::Image,
        "txt" | "md" | "csv" => DocumentFormat::Text,
        "doc" | "docx" | "odt" | "rtf" => DocumentFormat::DocLike,
        "xls" | "xlsx" | "ods" => DocumentFormat::Spreadsheet,
        "ppt" | "pptx" | "odp" => DocumentFormat::Presentation,
        "mp4" | "mov" | "avi" | "mkv" | "mp3" | "wav" => DocumentFormat::Av,
        _ => return None,
    })
}

#[async_trait]
impl Validator for MagicByteValidator {
    async fn validate(
        &self,
        source_name: &str,
        bytes: &[u8],
        size: u64,
    ) -> Result<ValidationOutcome, IngestError> {
        let format = sniff(bytes)
            .or_else(|| by_extension(source_name))
            .ok_or_else(|| IngestError::Validation(format!("unrecognized format for {source_name}")))?;

        if size > format.size_cap_bytes() {
            return Err(IngestError::Validation(format!(
                "{source_name} is {size} bytes, exceeding the {:?} cap of {} bytes",
                format,
                format.size_cap_bytes()
            )));
        }

        Ok(ValidationOutcome { format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_pdf_by_magic_bytes() {
        let v = MagicByteValidator::new();
        let bytes = b"%PDF-1.7 rest of file".to_vec();
        let outcome = v.validate("report", &bytes, bytes.len() as u64).await.unwrap();
        assert_eq!(outcome.format, DocumentFormat::Pdf);
    }

    #[tokio::test]
    async fn falls_back_to_extension_for_plain_text() {
        let v = MagicByteValidator::new();
        let bytes = b"just some text, no magic number here".to_vec();
        let outcome = v.validate("notes.txt", &bytes, bytes.len() as u64).await.unwrap();
        assert_eq!(outcome.format, DocumentFormat::Text);
    }

    #[tokio::test]
    async fn rejects_oversized_documents() {
        let v = MagicByteValidator::new();
        let bytes = b"%PDF-1.7".to_vec();
        let oversized = DocumentFormat::Pdf.size_cap_bytes() + 1;
        assert!(v.validate("report.pdf", &bytes, oversized).await.is_err());
    }

    #[tokio::test]
    async fn rejects_unrecognized_formats() {
        let v = MagicByteValidator::new();
        let bytes = vec![0u8, 1, 2, 3];
        assert!(v.validate("mystery.bin", &bytes, 4).await.is_err());
    }
}
