//! Tolerant accessors over free-form project data.
//!
//! Absent or mistyped keys fall back to empty collections, zero or a
//! caller-supplied default; nothing here can fail.

use serde_json::Value;

static NULL: Value = Value::Null;

/// The array under `key`, or an empty slice.
pub fn items<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// The value under `key`, or `null` (which every accessor treats as empty).
pub fn field<'a>(data: &'a Value, key: &str) -> &'a Value {
    data.get(key).unwrap_or(&NULL)
}

/// A numeric field, or `0.0`.
pub fn number(item: &Value, key: &str) -> f64 {
    number_or(item, key, 0.0)
}

pub fn number_or(item: &Value, key: &str, default: f64) -> f64 {
    item.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// A string field, or `default`.
pub fn text<'a>(item: &'a Value, key: &str, default: &'a str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// A boolean field, or `default`.
pub fn flag(item: &Value, key: &str, default: bool) -> bool {
    item.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// The item's `id` as a string, or `"unknown"`.
pub fn id(item: &Value) -> String {
    match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "unknown".to_string(),
    }
}

/// Format a measurement without a trailing `.0` for whole numbers.
pub fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_keys_default() {
        let data = json!({"walls": "oops"});
        assert!(items(&data, "walls").is_empty());
        assert!(items(&data, "rooms").is_empty());
        assert!(field(&data, "building").is_null());
        assert_eq!(number(field(&data, "zoning"), "lot_area_sqm"), 0.0);
        assert_eq!(number(&data, "thickness_mm"), 0.0);
        assert_eq!(text(&data, "material", "unknown"), "unknown");
        assert!(flag(&data, "legible", true));
    }

    #[test]
    fn test_id_accepts_numbers() {
        assert_eq!(id(&json!({"id": 7})), "7");
        assert_eq!(id(&json!({"id": "w1"})), "w1");
        assert_eq!(id(&json!({})), "unknown");
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(100.0), "100");
        assert_eq!(fmt_num(2.5), "2.5");
    }
}
