//! Field matching for UpdateMatching.
//!
//! The match target always arrives as a string (a URL path segment), while the
//! stored field can be any JSON variant. The rule, per variant of the field:
//!
//! | field  | matches when                                                    |
//! |--------|-----------------------------------------------------------------|
//! | string | byte-for-byte equal to the target                               |
//! | number | target parses as a JSON number and is numerically equal         |
//! | bool   | target is exactly `true` / `false` and equal                    |
//! | null   | target is exactly `null`                                        |
//! | array  | never                                                           |
//! | object | never                                                           |
//!
//! Integers are compared exactly (i64/u64); anything involving a float falls
//! back to f64 equality, so `5.0` matches `"5"`.

use serde_json::{Number, Value};

/// Does the stored field value match the path-string target?
pub fn field_matches(field: &Value, target: &str) -> bool {
    match field {
        Value::String(s) => s == target,
        Value::Number(n) => number_matches(n, target),
        Value::Bool(b) => match target {
            "true" => *b,
            "false" => !*b,
            _ => false,
        },
        Value::Null => target == "null",
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Is `entry` an object whose `field` matches `target`?
/// Non-objects and objects without the field never match.
pub fn entry_matches(entry: &Value, field: &str, target: &str) -> bool {
    match entry {
        Value::Object(map) => map
            .get(field)
            .map(|v| field_matches(v, target))
            .unwrap_or(false),
        _ => false,
    }
}

fn number_matches(n: &Number, target: &str) -> bool {
    // serde_json терпит пробелы вокруг числа, literal — нет
    if target.trim() != target {
        return false;
    }
    let t: Number = match serde_json::from_str(target) {
        Ok(t) => t,
        Err(_) => return false,
    };
    if let (Some(a), Some(b)) = (n.as_i64(), t.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (n.as_u64(), t.as_u64()) {
        return a == b;
    }
    match (n.as_f64(), t.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_compare_exactly() {
        assert!(field_matches(&json!("5"), "5"));
        assert!(field_matches(&json!("bob"), "bob"));
        assert!(!field_matches(&json!("Bob"), "bob"));
        assert!(!field_matches(&json!(" 5"), "5"));
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(field_matches(&json!(5), "5"));
        assert!(field_matches(&json!(5.0), "5"));
        assert!(field_matches(&json!(-3), "-3"));
        assert!(field_matches(&json!(1000), "1e3"));
        assert!(field_matches(&json!(u64::MAX), &u64::MAX.to_string()));
        assert!(!field_matches(&json!(5), "5.5"));
        assert!(!field_matches(&json!(5), "05"));
        assert!(!field_matches(&json!(5), "five"));
        assert!(!field_matches(&json!(5), ""));
        assert!(!field_matches(&json!(5), " 5"));
        assert!(!field_matches(&json!(5), "5 "));
        assert!(!field_matches(&json!(5), "\t5\n"));
    }

    #[test]
    fn bools_and_null_need_exact_literals() {
        assert!(field_matches(&json!(true), "true"));
        assert!(field_matches(&json!(false), "false"));
        assert!(!field_matches(&json!(true), "True"));
        assert!(!field_matches(&json!(true), "1"));
        assert!(field_matches(&Value::Null, "null"));
        assert!(!field_matches(&Value::Null, ""));
    }

    #[test]
    fn containers_never_match() {
        assert!(!field_matches(&json!([5]), "[5]"));
        assert!(!field_matches(&json!({"a": 1}), r#"{"a":1}"#));
    }

    #[test]
    fn entry_level_skips_non_objects() {
        assert!(entry_matches(&json!({"id": 5, "n": "a"}), "id", "5"));
        assert!(entry_matches(&json!({"id": "5"}), "id", "5"));
        assert!(!entry_matches(&json!({"other": 5}), "id", "5"));
        assert!(!entry_matches(&json!([{"id": 5}]), "id", "5"));
        assert!(!entry_matches(&json!("id"), "id", "5"));
        assert!(!entry_matches(&json!(5), "id", "5"));
    }
}
