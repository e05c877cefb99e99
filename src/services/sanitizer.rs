use serde_json::{Map, Value};

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("reply is empty")]
    Empty,

    #[error("reply is not a valid JSON literal: {0}")]
    InvalidLiteral(#[from] serde_json::Error),

    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Removes a surrounding Markdown code fence, if any
///
/// Models fence structured output more often than not, with or without a
/// language tag. Any line starting with a fence marker is dropped, which covers tagged
/// openers (```` ```json ````) and a missing closer alike. Unfenced text is
/// only trimmed.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn parse_literal(raw: &str) -> Result<Value, ParseError> {
    let cleaned = strip_code_fence(raw);
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(&cleaned)?)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses a reply that must be a single JSON object
pub fn parse_mapping(raw: &str) -> Result<Map<String, Value>, ParseError> {
    match parse_literal(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::UnexpectedShape {
            expected: "an object",
            found: kind_of(&other),
        }),
    }
}

/// Parses a reply that must be a JSON array of objects
pub fn parse_list_of_mappings(raw: &str) -> Result<Vec<Map<String, Value>>, ParseError> {
    let items = match parse_literal(raw)? {
        Value::Array(items) => items,
        other => {
            return Err(ParseError::UnexpectedShape {
                expected: "an array of objects",
                found: kind_of(&other),
            })
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(ParseError::UnexpectedShape {
                expected: "an array of objects",
                found: kind_of(&other),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const QUERY: &str = r#"{"genres": {"$in": ["Comedy"]}, "startYear": {"$gte": 1990}}"#;

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence(QUERY), QUERY);
        assert_eq!(strip_code_fence(&format!("  {}\n", QUERY)), QUERY);
        assert_eq!(strip_code_fence(&format!("```\n{}\n```", QUERY)), QUERY);
        assert_eq!(strip_code_fence(&format!("```json\n{}\n```", QUERY)), QUERY);
        assert_eq!(strip_code_fence(&format!("```python\n{}\n```\n", QUERY)), QUERY);
        // unterminated fence
        assert_eq!(strip_code_fence(&format!("```json\n{}", QUERY)), QUERY);
    }

    #[test]
    fn test_fenced_and_unfenced_parse_equal() {
        let plain = assert_ok!(parse_mapping(QUERY));
        let fenced = assert_ok!(parse_mapping(&format!("```json\n{}\n```", QUERY)));
        assert_eq!(plain, fenced);
        assert_eq!(plain["genres"], json!({"$in": ["Comedy"]}));
    }

    #[test]
    fn test_parse_mapping_rejects_invalid_literal() {
        assert!(matches!(
            parse_mapping("{'genres': 'Comedy'}"),
            Err(ParseError::InvalidLiteral(_))
        ));
        assert!(matches!(
            parse_mapping("Sure! Here is your query: {}"),
            Err(ParseError::InvalidLiteral(_))
        ));
    }

    #[test]
    fn test_parse_mapping_rejects_wrong_shape() {
        assert!(matches!(
            parse_mapping("[1, 2]"),
            Err(ParseError::UnexpectedShape {
                found: "an array",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_reply() {
        assert!(matches!(parse_mapping("   "), Err(ParseError::Empty)));
        assert!(matches!(parse_mapping("```\n```"), Err(ParseError::Empty)));
    }

    #[test]
    fn test_parse_list_of_mappings() {
        let raw = "```json\n[{\"primaryTitle\": \"Heat\", \"reason\": \"You will love it.\"}]\n```";
        let items = parse_list_of_mappings(raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["primaryTitle"], "Heat");

        assert!(assert_ok!(parse_list_of_mappings("[]")).is_empty());
        assert_err!(parse_list_of_mappings("[{]"));
    }

    #[test]
    fn test_parse_list_of_mappings_rejects_scalars() {
        assert!(matches!(
            parse_list_of_mappings(r#"[{"primaryTitle": "Heat"}, "Alien"]"#),
            Err(ParseError::UnexpectedShape {
                found: "a string",
                ..
            })
        ));
        assert!(matches!(
            parse_list_of_mappings(r#"{"primaryTitle": "Heat"}"#),
            Err(ParseError::UnexpectedShape { .. })
        ));
    }
}
