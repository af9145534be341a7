//! Best-effort JSON recovery from free-form model output.
//!
//! Fallback order:
//! 1. strip ```` ```json ```` / ```` ``` ```` markers and `<think>` blocks
//! 2. parse the span from the first `{` to the last `}`
//! 3. otherwise parse the whole trimmed text
//!
//! Nothing here returns an error; callers decide how to isolate a failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());
static THINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtraction {
    Parsed(Value),
    Failed { reason: String },
}

impl JsonExtraction {
    /// Narrow to a JSON object, the only shape the stages accept.
    pub fn into_object(self) -> Result<Map<String, Value>, String> {
        match self {
            JsonExtraction::Parsed(Value::Object(map)) => Ok(map),
            JsonExtraction::Parsed(other) => Err(format!("expected a JSON object, got {}", kind(&other))),
            JsonExtraction::Failed { reason } => Err(reason),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, JsonExtraction::Parsed(_))
    }
}

pub fn strip_fences(text: &str) -> String {
    let without_think = THINK_RE.replace_all(text, "");
    FENCE_RE.replace_all(&without_think, "").trim().to_string()
}

/// First `{` through last `}`, if such a span exists.
fn brace_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn parse_model_json(text: &str) -> JsonExtraction {
    let cleaned = strip_fences(text);
    let candidate = brace_block(&cleaned).unwrap_or(&cleaned);

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => JsonExtraction::Parsed(value),
        Err(e) => JsonExtraction::Failed {
            reason: format!("invalid JSON: {e}"),
        },
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_response_matches_bare() {
        let fenced = "```json\n{\"description\": \"a detective\", \"role\": \"detective\"}\n```";
        let bare = r#"{"description": "a detective", "role": "detective"}"#;

        assert_eq!(parse_model_json(fenced), parse_model_json(bare));
        assert!(parse_model_json(fenced).is_parsed());
    }

    #[test]
    fn test_plain_fence_without_language() {
        let fenced = "```\n{\"role\": \"victim\"}\n```";
        assert_eq!(
            parse_model_json(fenced),
            JsonExtraction::Parsed(json!({"role": "victim"}))
        );
    }

    #[test]
    fn test_brace_block_inside_chatter() {
        let response = "Sure! Here is the analysis:\n{\"reasoning\": \"none\",\n \"relationships\": []}\nHope that helps.";
        let map = parse_model_json(response).into_object().unwrap();

        assert_eq!(map["reasoning"], "none");
    }

    #[test]
    fn test_think_block_removed() {
        let response = "<think>maybe {not json}</think>{\"role\": \"witness\"}";
        let map = parse_model_json(response).into_object().unwrap();

        assert_eq!(map["role"], "witness");
    }

    #[test]
    fn test_whole_text_fallback() {
        assert_eq!(parse_model_json("  [1, 2]  "), JsonExtraction::Parsed(json!([1, 2])));
        assert!(parse_model_json("[1, 2]").into_object().is_err());
    }

    #[test]
    fn test_garbage_is_failure() {
        let result = parse_model_json("I cannot answer that.");
        assert!(matches!(result, JsonExtraction::Failed { .. }));

        let truncated = parse_model_json("{\"description\": \"cut off");
        assert!(truncated.into_object().is_err());
    }
}
