//! Canonical JSON: the exact byte string that gets signed.
//!
//! Object keys are sorted lexicographically at every depth and the output is
//! compact (no insignificant whitespace). Field declaration order, map
//! insertion order and pretty-printing of the file on disk therefore never
//! affect the signature.

use crate::LicenseError;
use serde::Serialize;
use serde_json::Value;

/// Serialize `value` to canonical JSON bytes.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, LicenseError> {
    let tree = serde_json::to_value(value)
        .map_err(|e| LicenseError::Malformed(format!("Failed to canonicalize: {}", e)))?;
    let mut out = String::new();
    write_sorted(&tree, &mut out)?;
    Ok(out.into_bytes())
}

fn write_sorted(value: &Value, out: &mut String) -> Result<(), LicenseError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String(key.clone()), out)?;
                out.push(':');
                write_sorted(item, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted(item, out)?;
            }
            out.push(']');
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

fn write_scalar(value: &Value, out: &mut String) -> Result<(), LicenseError> {
    let s = serde_json::to_string(value)
        .map_err(|e| LicenseError::Malformed(format!("Failed to canonicalize: {}", e)))?;
    out.push_str(&s);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(v: &Value) -> String {
        String::from_utf8(canonical_json(v).unwrap()).unwrap()
    }

    #[test]
    fn test_keys_sorted() {
        assert_eq!(canon(&json!({"b": 1, "a": 2, "c": 3})), r#"{"a":2,"b":1,"c":3}"#);
    }

    #[test]
    fn test_nested_keys_sorted() {
        let v = json!({"z": {"y": true, "x": null}, "a": [{"d": 1, "c": 2}]});
        assert_eq!(canon(&v), r#"{"a":[{"c":2,"d":1}],"z":{"x":null,"y":true}}"#);
    }

    #[test]
    fn test_array_order_preserved() {
        assert_eq!(canon(&json!(["b", "a"])), r#"["b","a"]"#);
    }

    #[test]
    fn test_strings_escaped() {
        assert_eq!(canon(&json!({"q": "say \"hi\"\n"})), r#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn test_uppercase_sorts_before_lowercase() {
        // Byte-wise ordering, as in every mainstream JSON canonicalizer.
        assert_eq!(canon(&json!({"b": 1, "B": 2})), r#"{"B":2,"b":1}"#);
    }

    #[derive(Serialize)]
    struct Declared {
        zeta: u8,
        alpha: u8,
    }

    #[test]
    fn test_struct_field_order_irrelevant() {
        let bytes = canonical_json(&Declared { zeta: 1, alpha: 2 }).unwrap();
        assert_eq!(bytes, br#"{"alpha":2,"zeta":1}"#);
    }
}
