use crate::{AgentStatusEvent, RelayError};
use serde_json::Value;

/// Literal substrings that mark a status line as a task-completion signal.
pub const COMPLETION_TOKENS: [&str; 3] = ["completed", "finished", "done"];

/// Decode one inbound `/api/currentaction` body into a normalized event.
///
/// Two historical shapes are accepted:
/// - legacy: a bare trimmed string (anything that is not a JSON object,
///   including text that does not parse as JSON at all);
/// - current: a JSON object carrying at least a non-empty `message` field,
///   with `original` as the verbose text and `mode` advisory (decoded and
///   ignored, reserved for routing).
pub fn decode_action(body: &str) -> Result<AgentStatusEvent, RelayError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(RelayError::EmptyInput);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(text)) => legacy_event(&text),
        Ok(Value::Object(map)) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .ok_or(RelayError::MalformedPayload("missing message field"))?;
            let detail = map
                .get("original")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|original| !original.is_empty())
                .unwrap_or(message);
            Ok(AgentStatusEvent::agent(message, detail))
        }
        Ok(_) => Err(RelayError::MalformedPayload("unsupported payload shape")),
        // Not JSON at all: the legacy path accepts any raw text.
        Err(_) => legacy_event(trimmed),
    }
}

fn legacy_event(text: &str) -> Result<AgentStatusEvent, RelayError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RelayError::EmptyInput);
    }
    Ok(AgentStatusEvent::agent(trimmed, trimmed))
}

/// Case-insensitive completion-token match on the short status line.
pub fn is_completion(display_message: &str) -> bool {
    let lowered = display_message.to_lowercase();
    COMPLETION_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_string_sets_detail_to_display() {
        let event = decode_action("Agent is thinking...").expect("legacy accepted");
        assert_eq!(event.display_message, "Agent is thinking...");
        assert_eq!(event.detail, "Agent is thinking...");
    }

    #[test]
    fn json_string_takes_legacy_path() {
        let event = decode_action(r#""Agent is thinking...""#).expect("json string accepted");
        assert_eq!(event.display_message, "Agent is thinking...");
        assert_eq!(event.detail, "Agent is thinking...");
    }

    #[test]
    fn structured_and_legacy_agree_on_display_message() {
        let legacy = decode_action("Agent is thinking...").unwrap();
        let structured =
            decode_action(r#"{"original":"x","mode":"text","message":"Agent is thinking..."}"#)
                .unwrap();
        assert_eq!(legacy.display_message, structured.display_message);
        assert_eq!(structured.detail, "x");
    }

    #[test]
    fn structured_without_original_falls_back_to_message() {
        let event = decode_action(r#"{"message":"Clicking the dock"}"#).unwrap();
        assert_eq!(event.detail, "Clicking the dock");
    }

    #[test]
    fn object_without_message_is_rejected() {
        assert_eq!(
            decode_action("{}"),
            Err(RelayError::MalformedPayload("missing message field"))
        );
        assert!(decode_action(r#"{"message":"   "}"#).is_err());
        assert!(decode_action(r#"{"message":42}"#).is_err());
    }

    #[test]
    fn non_object_json_shapes_are_rejected() {
        assert!(decode_action("[1, 2, 3]").is_err());
        assert!(decode_action("42").is_err());
        assert!(decode_action("true").is_err());
    }

    #[test]
    fn whitespace_body_is_rejected_as_empty_input() {
        assert_eq!(decode_action(""), Err(RelayError::EmptyInput));
        assert_eq!(decode_action("   \n\t"), Err(RelayError::EmptyInput));
        assert_eq!(decode_action(r#""  ""#), Err(RelayError::EmptyInput));
    }

    #[test]
    fn raw_text_that_is_not_json_is_accepted() {
        let event = decode_action("not-json-and-not-trimmed-string-is-fine").unwrap();
        assert_eq!(
            event.display_message,
            "not-json-and-not-trimmed-string-is-fine"
        );
    }

    #[test]
    fn completion_tokens_match_case_insensitively() {
        assert!(is_completion("Task completed successfully"));
        assert!(is_completion("FINISHED the run"));
        assert!(is_completion("All done."));
        assert!(!is_completion("Agent is thinking..."));
    }
}
