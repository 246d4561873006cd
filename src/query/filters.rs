//! Document filtering for queries
//!
//! A document whose field is missing, or whose field has a type the
//! operator cannot compare, is excluded. Nothing here fails.

use serde_json::{Number, Value};

use super::types::{Operator, Query};

/// Evaluates a query against documents
pub struct QueryFilter;

impl QueryFilter {
    /// Checks if a document matches the query
    pub fn matches(document: &Value, query: &Query) -> bool {
        let field_value = match Self::field(document, &query.fieldname) {
            Some(v) => v,
            None => return false,
        };

        match query.operator {
            Operator::Equals => values_equal(field_value, &query.value),
            Operator::StartsWith => Self::starts_with(field_value, &query.value),
            Operator::Contains => Self::contains(field_value, &query.value),
        }
    }

    /// Looks up a field: top-level key first, then JSON pointer for `/a/b`
    pub fn field<'v>(document: &'v Value, fieldname: &str) -> Option<&'v Value> {
        if let Some(v) = document.get(fieldname) {
            return Some(v);
        }
        if fieldname.starts_with('/') {
            return document.pointer(fieldname);
        }
        None
    }

    fn starts_with(actual: &Value, prefix: &Value) -> bool {
        match (actual, prefix) {
            (Value::String(a), Value::String(p)) => a.starts_with(p.as_str()),
            _ => false,
        }
    }

    fn contains(actual: &Value, needle: &Value) -> bool {
        match (actual, needle) {
            (Value::String(a), Value::String(n)) => a.contains(n.as_str()),
            (Value::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        }
    }
}

/// Typed equality. Numbers compare by value regardless of how they were
/// written (`1` equals `1.0`); everything else compares structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addresses() -> Vec<Value> {
        vec![
            json!({"street": "Place Victor Hugo", "city": "Paris", "zip": 75016}),
            json!({"street": "Rue de la Paix", "city": "Paris", "zip": 75002}),
            json!({"street": "Place Bellecour", "city": "Lyon", "tags": ["square", "center"]}),
        ]
    }

    fn run(query: &Query) -> Vec<Value> {
        addresses()
            .into_iter()
            .filter(|d| QueryFilter::matches(d, query))
            .collect()
    }

    #[test]
    fn test_equals() {
        let found = run(&Query::equals("street", "Place Victor Hugo"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["zip"], 75016);
    }

    #[test]
    fn test_equals_no_match() {
        assert!(run(&Query::equals("street", "Champs-Elysees")).is_empty());
    }

    #[test]
    fn test_equals_is_typed() {
        assert!(run(&Query::equals("zip", "75016")).is_empty());
        assert_eq!(run(&Query::equals("zip", 75016)).len(), 1);
    }

    #[test]
    fn test_equals_integer_and_float() {
        let doc = json!({"n": 1});
        assert!(QueryFilter::matches(&doc, &Query::equals("n", 1.0)));
        assert!(!QueryFilter::matches(&doc, &Query::equals("n", 1.5)));
    }

    #[test]
    fn test_equals_null() {
        let doc = json!({"n": null});
        assert!(QueryFilter::matches(&doc, &Query::equals("n", Value::Null)));
    }

    #[test]
    fn test_starts_with() {
        let found = run(&Query::starts_with("street", "Place"));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["street"], "Place Victor Hugo");
        assert_eq!(found[1]["street"], "Place Bellecour");
    }

    #[test]
    fn test_starts_with_non_string_field_excluded() {
        assert!(run(&Query::starts_with("zip", "75")).is_empty());
    }

    #[test]
    fn test_contains_substring() {
        let found = run(&Query::contains("street", "de la"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["street"], "Rue de la Paix");
    }

    #[test]
    fn test_contains_array_membership() {
        let found = run(&Query::contains("tags", "center"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["city"], "Lyon");
    }

    #[test]
    fn test_contains_number_field_excluded() {
        assert!(run(&Query::contains("zip", 75)).is_empty());
    }

    #[test]
    fn test_missing_field_excluded() {
        assert!(run(&Query::equals("country", "France")).is_empty());
        assert_eq!(run(&Query::contains("tags", "square")).len(), 1);
    }

    #[test]
    fn test_non_object_document_excluded() {
        assert!(!QueryFilter::matches(&json!("Paris"), &Query::equals("city", "Paris")));
        assert!(!QueryFilter::matches(&json!([1, 2]), &Query::equals("0", 1)));
    }

    #[test]
    fn test_pointer_field() {
        let doc = json!({"address": {"city": "Paris"}});
        assert!(QueryFilter::matches(&doc, &Query::equals("/address/city", "Paris")));
        assert!(!QueryFilter::matches(&doc, &Query::equals("address.city", "Paris")));
    }

    #[test]
    fn test_structural_equality() {
        let doc = json!({"pos": {"x": 1, "y": 2.0}});
        assert!(QueryFilter::matches(
            &doc,
            &Query::equals("pos", json!({"y": 2, "x": 1}))
        ));
    }
}
