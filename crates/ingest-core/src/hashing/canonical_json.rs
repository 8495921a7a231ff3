//! Canonical JSON serialization: object keys sorted, no redundant
//! whitespace. Array order is preserved (arrays are already ordered data).

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = tree
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(&k).unwrap(), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_sorted() {
        let val = json!({ "b": 2, "a": 1 });
        assert_eq!(to_canonical_json(&val), "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn nested_structures() {
        let val = json!({ "z": [ { "y": "yes" }, null ], "a": { "x": 10 } });
        assert_eq!(
            to_canonical_json(&val),
            "{\"a\":{\"x\":10},\"z\":[{\"y\":\"yes\"},null]}"
        );
    }
}
