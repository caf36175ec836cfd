use anyhow::{anyhow, Result};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse a JSON value out of raw model output. Tolerates markdown fences and
/// prose around the payload: if a direct parse fails, retries on the outermost
/// `{...}` or `[...]` slice.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let stripped = strip_code_blocks(raw);
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let candidate = outermost_json_slice(stripped)
                .ok_or_else(|| anyhow!("no JSON payload in response: {first_err}"))?;
            serde_json::from_str(candidate)
                .map_err(|e| anyhow!("failed to parse JSON payload: {e}"))
        }
    }
}

/// JSON schema for `T`, pretty-printed for embedding in prompts.
pub fn schema_json<T: JsonSchema>() -> String {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

fn outermost_json_slice(s: &str) -> Option<&str> {
    let open = s.find(['{', '['])?;
    let close_char = if s.as_bytes()[open] == b'{' { '}' } else { ']' };
    let close = s.rfind(close_char)?;
    if close <= open {
        return None;
    }
    Some(&s[open..=close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: i32,
    }

    #[test]
    fn test_truncate_to_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_within_bounds() {
        let text = "Hello";
        assert_eq!(truncate_to_char_boundary(text, 100), "Hello");
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn parses_bare_json() {
        let payload: Payload = parse_json_response(r#"{"value": 3}"#).unwrap();
        assert_eq!(payload, Payload { value: 3 });
    }

    #[test]
    fn parses_fenced_json() {
        let payload: Payload = parse_json_response("```json\n{\"value\": 7}\n```").unwrap();
        assert_eq!(payload, Payload { value: 7 });
    }

    #[test]
    fn parses_json_with_surrounding_prose() {
        let raw = "Here is the result you asked for:\n{\"value\": 9}\nLet me know!";
        let payload: Payload = parse_json_response(raw).unwrap();
        assert_eq!(payload, Payload { value: 9 });
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_json_response::<Payload>("no json here").is_err());
    }
}
