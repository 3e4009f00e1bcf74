//! Evaluate a parsed [`Filter`] against a projected JSON object.

use serde_json::Value as Json;

use crate::ast::{Filter, Operator, Path, PathSegment, Term, Value};
use crate::error::FilterError;

/// A filter matches iff every term matches (conjunction only, spec.md §6).
///
/// A `FilterError` on any single term is treated as that term failing to
/// match, per spec.md §9 ("never a transport error to the subscriber") —
/// callers should log it, not propagate it to the HTTP layer.
pub fn matches(filter: &Filter, object: &Json) -> Result<bool, FilterError> {
    for term in &filter.terms {
        if !term_matches(term, object)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn term_matches(term: &Term, object: &Json) -> Result<bool, FilterError> {
    let found = resolve(&term.path, object);
    let path_display = display_path(&term.path);

    match term.operator {
        Operator::Cont | Operator::NCont => {
            let is_cont = matches!(term.operator, Operator::Cont);
            let Some(found) = found else { return Ok(!is_cont) };
            let Json::String(haystack) = found else { return Err(FilterError::ContOnNonString(path_display)) };
            let needle = term.values.first().and_then(value_as_str).unwrap_or_default();
            Ok(haystack.contains(needle) == is_cont)
        }
        Operator::Eq | Operator::NEq => {
            let is_eq = matches!(term.operator, Operator::Eq);
            let target = term.values.first();
            let equal = match (found, target) {
                (Some(found), Some(target)) => json_equals_value(found, target),
                (None, None) => true,
                _ => false,
            };
            Ok(equal == is_eq)
        }
        Operator::In | Operator::NIn => {
            let is_in = matches!(term.operator, Operator::In);
            let Some(found) = found else { return Ok(!is_in) };
            let contained = term.values.iter().any(|v| json_equals_value(found, v));
            Ok(contained == is_in)
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let Some(found) = found else { return Ok(false) };
            let Some(lhs) = json_as_f64(found) else { return Ok(false) };
            let Some(rhs) = term.values.first().and_then(value_as_f64) else { return Ok(false) };
            Ok(match term.operator {
                Operator::Gt => lhs > rhs,
                Operator::Gte => lhs >= rhs,
                Operator::Lt => lhs < rhs,
                Operator::Lte => lhs <= rhs,
                _ => unreachable!(),
            })
        }
    }
}

fn resolve<'a>(path: &Path, object: &'a Json) -> Option<&'a Json> {
    let mut current = object;
    for segment in &path.segments {
        let key = match segment {
            PathSegment::Field(name) | PathSegment::Key(name) => name,
        };
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

fn display_path(path: &Path) -> String {
    path.segments
        .iter()
        .map(|s| match s {
            PathSegment::Field(name) => name.clone(),
            PathSegment::Key(name) => format!("@{name}"),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn json_equals_value(json: &Json, value: &Value) -> bool {
    match (json, value) {
        (Json::String(a), Value::String(b)) => a == b,
        (Json::Number(a), Value::Number(b)) => a.as_f64() == Some(*b),
        (Json::Bool(a), Value::Bool(b)) => a == b,
        (Json::Null, Value::Null) => true,
        _ => false,
    }
}

fn value_as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn json_as_f64(json: &Json) -> Option<f64> { json.as_f64() }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    #[test]
    fn eq_matches_equal_string() {
        let filter = parse("(eq,name,'c1')").unwrap();
        assert!(matches(&filter, &json!({"name": "c1"})).unwrap());
        assert!(!matches(&filter, &json!({"name": "c2"})).unwrap());
    }

    #[test]
    fn conjunction_requires_all_terms() {
        let filter = parse("(eq,name,'c1');(gt,count,3)").unwrap();
        assert!(matches(&filter, &json!({"name": "c1", "count": 4})).unwrap());
        assert!(!matches(&filter, &json!({"name": "c1", "count": 2})).unwrap());
    }

    #[test]
    fn cont_on_non_string_is_filter_error() {
        let filter = parse("(cont,name,'c')").unwrap();
        let err = matches(&filter, &json!({"name": 5})).unwrap_err();
        assert_eq!(err, FilterError::ContOnNonString("name".into()));
    }

    #[test]
    fn missing_path_treated_as_absent() {
        let filter = parse("(eq,missing,'x')").unwrap();
        assert!(!matches(&filter, &json!({"name": "c1"})).unwrap());
    }

    #[test]
    fn in_matches_any_listed_value() {
        let filter = parse("(in,status,'up','down')").unwrap();
        assert!(matches(&filter, &json!({"status": "down"})).unwrap());
        assert!(!matches(&filter, &json!({"status": "unknown"})).unwrap());
    }

    #[test]
    fn map_key_segment_resolves_into_nested_object() {
        let filter = parse("(eq,labels/@region,'us-east')").unwrap();
        assert!(matches(&filter, &json!({"labels": {"region": "us-east"}})).unwrap());
    }
}
