//! Wire types for the assistants thread/run protocol.
//!
//! Only the fields the client actually reads are modelled; the service
//! returns far larger payloads and serde ignores the rest.

use serde::{Deserialize, Serialize};

/// Body for creating a user message on a thread.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub role: String,
    pub content: String,
}

/// Body for starting a run of an assistant over a thread.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
}

/// A newly created thread.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadResponse {
    pub id: String,
}

/// Run state as returned by create and retrieve.
#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub id: String,
    pub status: String,
}

impl RunResponse {
    /// Whether the run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "completed" | "failed" | "cancelled" | "expired" | "requires_action"
        )
    }
}

/// Page of thread messages, newest first when requested with `order=desc`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageListResponse {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Concatenate the text blocks of this message, or `None` when it has no
    /// non-empty text content.
    pub fn joined_text(&self) -> Option<String> {
        let chunks: Vec<&str> = self
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_ref())
            .map(|text| text.value.as_str())
            .filter(|value| !value.is_empty())
            .collect();
        if chunks.is_empty() {
            None
        } else {
            Some(chunks.join("\n\n").trim().to_string())
        }
    }
}

/// A content block of a thread message; only `text` blocks carry a payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_terminal_states() {
        for status in ["completed", "failed", "cancelled", "expired", "requires_action"] {
            let run = RunResponse {
                id: "run_1".into(),
                status: status.into(),
            };
            assert!(run.is_terminal(), "{status} should be terminal");
        }
        for status in ["queued", "in_progress", "cancelling"] {
            let run = RunResponse {
                id: "run_1".into(),
                status: status.into(),
            };
            assert!(!run.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn message_list_deserializes_api_shape() {
        let json = r#"{
            "data": [
                {
                    "role": "assistant",
                    "content": [
                        {"type": "text", "text": {"value": "Первый блок"}},
                        {"type": "image_file", "text": null},
                        {"type": "text", "text": {"value": "Второй блок"}}
                    ]
                },
                {"role": "user", "content": [{"type": "text", "text": {"value": "вопрос"}}]}
            ]
        }"#;
        let page: MessageListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(
            page.data[0].joined_text().unwrap(),
            "Первый блок\n\nВторой блок"
        );
    }

    #[test]
    fn joined_text_skips_empty_blocks() {
        let message = ThreadMessage {
            role: "assistant".into(),
            content: vec![MessageContent {
                content_type: "text".into(),
                text: Some(MessageText { value: String::new() }),
            }],
        };
        assert_eq!(message.joined_text(), None);
    }

    #[test]
    fn create_run_request_serializes_assistant_id() {
        let req = CreateRunRequest {
            assistant_id: "asst_writer".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"assistant_id":"asst_writer"}"#);
    }
}
