//! Query value types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filters::QueryFilter;

/// Comparison applied between a document field and the query value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    /// Typed equality
    #[default]
    Equals,
    /// String prefix match
    StartsWith,
    /// Substring match on strings, membership on arrays
    Contains,
}

impl Operator {
    /// Parses an operator name.
    ///
    /// Names are matched case-insensitively. Anything unrecognised falls
    /// back to `Equals`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "startswith" | "starts_with" => Operator::StartsWith,
            "contains" => Operator::Contains,
            _ => Operator::Equals,
        }
    }

    /// Returns the canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::StartsWith => "startsWith",
            Operator::Contains => "contains",
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        Operator::parse(&name)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-field query
///
/// `fieldname` is a top-level key. A name starting with `/` is read as a
/// JSON pointer into nested objects when no top-level key of that name
/// exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub fieldname: String,
    pub value: Value,
    #[serde(default)]
    pub operator: Operator,
}

impl Query {
    pub fn new(fieldname: impl Into<String>, value: impl Into<Value>, operator: Operator) -> Self {
        Self {
            fieldname: fieldname.into(),
            value: value.into(),
            operator,
        }
    }

    pub fn equals(fieldname: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(fieldname, value, Operator::Equals)
    }

    pub fn starts_with(fieldname: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::new(fieldname, Value::String(prefix.into()), Operator::StartsWith)
    }

    pub fn contains(fieldname: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(fieldname, value, Operator::Contains)
    }

    /// Checks a document against this query
    pub fn matches(&self, document: &Value) -> bool {
        QueryFilter::matches(document, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("equals"), Operator::Equals);
        assert_eq!(Operator::parse("startsWith"), Operator::StartsWith);
        assert_eq!(Operator::parse("starts_with"), Operator::StartsWith);
        assert_eq!(Operator::parse("CONTAINS"), Operator::Contains);
    }

    #[test]
    fn test_unknown_operator_is_equals() {
        assert_eq!(Operator::parse("greaterThan"), Operator::Equals);
        assert_eq!(Operator::parse(""), Operator::Equals);
    }

    #[test]
    fn test_query_deserialize_defaults_operator() {
        let q: Query = serde_json::from_value(json!({
            "fieldname": "city",
            "value": "Paris"
        }))
        .unwrap();
        assert_eq!(q.operator, Operator::Equals);

        let q: Query = serde_json::from_value(json!({
            "fieldname": "street",
            "value": "Rue",
            "operator": "startsWith"
        }))
        .unwrap();
        assert_eq!(q.operator, Operator::StartsWith);
    }

    #[test]
    fn test_query_serialize_uses_canonical_operator_name() {
        let q = Query::starts_with("street", "Rue");
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["operator"], "startsWith");
    }
}
