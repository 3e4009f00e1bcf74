//! Order-independent JSON deep-equality for change detection (spec.md §9
//! "Reflective deep-equality"): object key order must never influence the
//! comparison; array order still matters.

use serde_json::Value;

/// `true` iff `a` and `b` are deep-equal, ignoring object key order.
///
/// `serde_json::Value`'s default `Map` is `BTreeMap`-backed, so `PartialEq`
/// on objects is already order-independent; this function exists as the one
/// named, documented entry point the Change Log Writer calls, rather than
/// leaving that guarantee implicit in a derived `PartialEq`.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(lhs), Value::Object(rhs)) => {
            lhs.len() == rhs.len() && lhs.iter().all(|(k, v)| rhs.get(k).is_some_and(|rv| json_eq(v, rv)))
        }
        (Value::Array(lhs), Value::Array(rhs)) => lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(l, r)| json_eq(l, r)),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_key_order_does_not_affect_equality() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert!(json_eq(&a, &b));
    }

    #[test]
    fn array_order_matters() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert!(!json_eq(&a, &b));
    }

    #[test]
    fn nested_objects_compare_recursively() {
        let a = json!({"outer": {"x": 1, "y": 2}});
        let b = json!({"outer": {"y": 2, "x": 1}});
        assert!(json_eq(&a, &b));
    }

    #[test]
    fn differing_values_are_unequal() {
        assert!(!json_eq(&json!({"a": 1}), &json!({"a": 2})));
    }
}
