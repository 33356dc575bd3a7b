//! Chat request types and Gemini wire types

use serde::{Deserialize, Serialize};

// === Chat request ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of the conversation as sent by the chat UI
///
/// Extra fields (`id`, `parts`, `createdAt`) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

// === Completion output ===

/// Why generation stopped, in the client's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other,
    Unknown,
}

impl FinishReason {
    /// Map a Gemini `finishReason`
    pub fn from_gemini(reason: &str) -> Self {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                FinishReason::ContentFilter
            }
            "FINISH_REASON_UNSPECIFIED" => FinishReason::Unknown,
            _ => FinishReason::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One item of a completion stream
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    Text(String),
    Finish { reason: FinishReason, usage: Usage },
}

// === Gemini wire types ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

impl GenerateContentRequest {
    /// System messages become the system instruction, the rest are turns
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        let system: Vec<Part> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part::text(&m.content))
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part::text(&m.content)],
            })
            .collect();

        Self {
            contents,
            system_instruction: (!system.is_empty()).then_some(Content {
                role: None,
                parts: system,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

/// One SSE `data:` payload of `streamGenerateContent`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
    pub error: Option<GeminiError>,
}

impl GenerateContentChunk {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

impl From<&UsageMetadata> for Usage {
    fn from(meta: &UsageMetadata) -> Self {
        Usage {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeminiError {
    #[serde(default)]
    pub message: String,
}
