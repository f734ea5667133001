//! Turn a user-supplied query into a search request body.

use std::str::FromStr;

use serde_json::json;

/// Default boolean operator for query_string queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(format!("unknown operator '{s}', expected AND or OR")),
        }
    }
}

/// Wire-ready request body for `raw`.
///
/// - blank input matches all documents
/// - a JSON object is passed through untouched
/// - anything else becomes a `query_string` query using `op`
pub fn normalize_query(raw: &str, op: Operator) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return json!({"query": {"match_all": {}}}).to_string();
    }
    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(_)) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return trimmed.to_string();
        }
    }
    json!({
        "query": {
            "query_string": {
                "query": trimmed,
                "default_operator": op.as_str(),
            }
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> serde_json::Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn blank_matches_all() {
        assert_eq!(normalize_query("  ", Operator::And), r#"{"query":{"match_all":{}}}"#);
    }

    #[test]
    fn json_object_passthrough() {
        let q = r#"{"query": {"term": {"year": 2020}}}"#;
        assert_eq!(normalize_query(q, Operator::Or), q);
    }

    #[test]
    fn lucene_wrapped() {
        let body = parse(&normalize_query(r#"affiliation:"alberta""#, Operator::Or));
        assert_eq!(body["query"]["query_string"]["query"], r#"affiliation:"alberta""#);
        assert_eq!(body["query"]["query_string"]["default_operator"], "OR");
    }

    #[test]
    fn operator_parse_ignores_case() {
        assert_eq!("and".parse::<Operator>(), Ok(Operator::And));
        assert_eq!("Or".parse::<Operator>(), Ok(Operator::Or));
        assert!("xor".parse::<Operator>().is_err());
    }

    #[test]
    fn broken_json_treated_as_query_string() {
        let body = parse(&normalize_query("{not json", Operator::And));
        assert_eq!(body["query"]["query_string"]["query"], "{not json");
        assert_eq!(body["query"]["query_string"]["default_operator"], "AND");
    }
}
