//! Webhook envelope handling: URL challenge, token verification, and
//! event normalization across the two envelope shapes (fields nested under
//! `header`, or flat at the top level).

use serde_json::Value;

/// The challenge string, when the envelope is a URL-verification probe.
pub fn url_challenge(envelope: &Value) -> Option<&str> {
    if envelope.get("type").and_then(Value::as_str) == Some("url_verification") {
        return envelope.get("challenge").and_then(Value::as_str);
    }
    None
}

/// Compare the envelope's verification token against the configured value.
pub fn verify_token(envelope: &Value, expected: &str) -> bool {
    let token = envelope
        .pointer("/header/token")
        .and_then(Value::as_str)
        .or_else(|| envelope.get("token").and_then(Value::as_str))
        .unwrap_or("");
    constant_time_eq(token.as_bytes(), expected.as_bytes())
}

/// Byte compare without early exit, so the comparison time leaks nothing
/// about the first mismatching position.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `(event_type, event_id, payload)` from either envelope shape.
pub fn parse_event(envelope: &Value) -> (String, String, Value) {
    let event_type = envelope
        .pointer("/header/event_type")
        .and_then(Value::as_str)
        .or_else(|| envelope.get("type").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();
    let event_id = envelope
        .pointer("/header/event_id")
        .and_then(Value::as_str)
        .or_else(|| envelope.get("event_id").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();
    let payload = envelope.get("event").cloned().unwrap_or(Value::Null);
    (event_type, event_id, payload)
}

pub const EVENT_TYPE_MESSAGE: &str = "im.message.receive_v1";

/// Member-join events: any `im.chat.member.*` type mentioning an addition.
pub fn is_member_join(event_type: &str) -> bool {
    event_type.starts_with("im.chat.member")
        && (event_type.contains("add") || event_type.contains("user_added"))
}

/// `(chat_id, member_name)` from a member-join payload. The first listed
/// member is welcomed; a missing name falls back to a generic one.
pub fn extract_member_join(payload: &Value) -> Option<(String, String)> {
    let chat_id = payload
        .get("chat_id")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/chat/chat_id").and_then(Value::as_str))
        .unwrap_or("");
    if chat_id.is_empty() {
        return None;
    }
    let members = payload
        .get("users")
        .or_else(|| payload.get("members"))
        .and_then(Value::as_array)?;
    let first = members.first()?;
    let name = first
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or("新同学");
    Some((chat_id.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn challenge_is_echoed_only_for_url_verification() {
        let probe = json!({"type": "url_verification", "challenge": "abc123"});
        assert_eq!(url_challenge(&probe), Some("abc123"));

        let message = json!({"type": "im.message.receive_v1", "challenge": "abc123"});
        assert_eq!(url_challenge(&message), None);
    }

    #[test]
    fn token_is_read_from_either_shape() {
        let nested = json!({"header": {"token": "secret"}});
        assert!(verify_token(&nested, "secret"));
        assert!(!verify_token(&nested, "other"));

        let flat = json!({"token": "secret"});
        assert!(verify_token(&flat, "secret"));

        let none = json!({});
        assert!(!verify_token(&none, "secret"));
    }

    #[test]
    fn parse_event_handles_nested_and_flat() {
        let nested = json!({
            "header": {"event_type": "im.message.receive_v1", "event_id": "E1"},
            "event": {"message": {}},
        });
        let (t, id, payload) = parse_event(&nested);
        assert_eq!(t, "im.message.receive_v1");
        assert_eq!(id, "E1");
        assert!(payload.is_object());

        let flat = json!({"type": "im.chat.member.user.added_v1", "event_id": "E2", "event": {}});
        let (t, id, _) = parse_event(&flat);
        assert_eq!(t, "im.chat.member.user.added_v1");
        assert_eq!(id, "E2");
    }

    #[test]
    fn member_join_detection() {
        assert!(is_member_join("im.chat.member.user.added_v1"));
        assert!(is_member_join("im.chat.member.bot.added_v1"));
        assert!(!is_member_join("im.chat.member.user.deleted_v1"));
        assert!(!is_member_join("im.message.receive_v1"));
    }

    #[test]
    fn member_join_extracts_first_user() {
        let payload = json!({
            "chat_id": "oc_1",
            "users": [{"name": "张三"}, {"name": "李四"}],
        });
        assert_eq!(
            extract_member_join(&payload),
            Some(("oc_1".to_string(), "张三".to_string()))
        );
    }

    #[test]
    fn member_join_falls_back_on_name_and_nested_chat_id() {
        let payload = json!({
            "chat": {"chat_id": "oc_2"},
            "members": [{}],
        });
        assert_eq!(
            extract_member_join(&payload),
            Some(("oc_2".to_string(), "新同学".to_string()))
        );
    }

    #[test]
    fn member_join_requires_chat_and_members() {
        assert_eq!(extract_member_join(&json!({"users": [{"name": "x"}]})), None);
        assert_eq!(extract_member_join(&json!({"chat_id": "oc_1"})), None);
    }
}
