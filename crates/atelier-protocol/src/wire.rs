//! Wire messages for the real-time sync connection.
//!
//! Every frame is a UTF-8 JSON object with a mandatory `"type"` discriminator
//! and camelCase payload fields. Anything that does not match a known tag is
//! answered with an `ERROR` frame at the connection layer.

use crate::ids::SessionId;
use serde::{Deserialize, Serialize};

/// Normal closure, sent after `CALL_FINISHED`.
pub const CLOSE_NORMAL: u16 = 1000;
/// Policy violation, sent when the `sessionId` query parameter is missing.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

pub const REASON_CALL_FINISHED: &str = "Call finished";
pub const REASON_MISSING_SESSION_ID: &str = "Missing sessionId parameter";

/// The fixed list re-offered when the client rejects the to-do preview.
/// Interface-compatibility tests depend on these exact strings.
pub const FALLBACK_TODO_ITEMS: [&str; 5] = [
    "review style",
    "confirm palette",
    "schedule call",
    "review timeline",
    "prepare photos",
];

/// Messages the client UI sends over the sync connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    UiResponse {
        prompt_id: String,
        selected_option_id: String,
    },
    TodoConfirm {
        ok: bool,
    },
    AgentNote {
        message: String,
    },
    Ping {
        ts: i64,
    },
}

/// One selectable option inside a `UI_PROMPT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOption {
    pub id: String,
    pub label: String,
    pub image: Option<String>,
}

/// A structured prompt the agent pushes to the client UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPrompt {
    pub prompt_id: String,
    pub title: String,
    pub options: Vec<PromptOption>,
}

/// Messages the server sends over the sync connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    UiPrompt {
        prompt_id: String,
        title: String,
        options: Vec<PromptOption>,
    },
    TodoPreview {
        items: Vec<String>,
    },
    CallFinished {
        session_id: SessionId,
    },
    Pong {
        ts: i64,
    },
    Error {
        error: String,
    },
}

impl From<UiPrompt> for ServerMessage {
    fn from(prompt: UiPrompt) -> Self {
        Self::UiPrompt {
            prompt_id: prompt.prompt_id,
            title: prompt.title,
            options: prompt.options,
        }
    }
}

/// The `TODO_PREVIEW` carrying [`FALLBACK_TODO_ITEMS`].
pub fn fallback_todo_preview() -> ServerMessage {
    ServerMessage::TodoPreview {
        items: FALLBACK_TODO_ITEMS.iter().map(|s| (*s).to_owned()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_message_tags_match_the_wire() {
        let raw = r#"{"type":"UI_RESPONSE","promptId":"style_modern","selectedOptionId":"bold"}"#;
        let message: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            message,
            ClientMessage::UiResponse {
                prompt_id: "style_modern".to_owned(),
                selected_option_id: "bold".to_owned(),
            }
        );

        let confirm: ClientMessage =
            serde_json::from_str(r#"{"type":"TODO_CONFIRM","ok":false}"#).unwrap();
        assert_eq!(confirm, ClientMessage::TodoConfirm { ok: false });

        let ping: ClientMessage = serde_json::from_str(r#"{"type":"PING","ts":12345}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping { ts: 12345 });
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"SELF_DESTRUCT"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_message_serializes_with_screaming_tags() {
        let finished = ServerMessage::CallFinished {
            session_id: SessionId::from_string("abc123"),
        };
        assert_eq!(
            serde_json::to_value(&finished).unwrap(),
            json!({"type": "CALL_FINISHED", "sessionId": "abc123"})
        );

        let pong = ServerMessage::Pong { ts: 12345 };
        assert_eq!(
            serde_json::to_value(&pong).unwrap(),
            json!({"type": "PONG", "ts": 12345})
        );
    }

    #[test]
    fn ui_prompt_roundtrips_through_server_message() {
        let prompt = UiPrompt {
            prompt_id: "palette_warm".to_owned(),
            title: "Pick a palette".to_owned(),
            options: vec![PromptOption {
                id: "sunset".to_owned(),
                label: "Sunset".to_owned(),
                image: Some("https://img.example/sunset.png".to_owned()),
            }],
        };

        let message: ServerMessage = prompt.into();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "UI_PROMPT");
        assert_eq!(json["promptId"], "palette_warm");
        assert_eq!(json["options"][0]["label"], "Sunset");
    }

    #[test]
    fn fallback_preview_has_the_five_fixed_items() {
        let ServerMessage::TodoPreview { items } = fallback_todo_preview() else {
            panic!("expected TODO_PREVIEW");
        };
        assert_eq!(
            items,
            vec![
                "review style",
                "confirm palette",
                "schedule call",
                "review timeline",
                "prepare photos",
            ]
        );
    }
}
