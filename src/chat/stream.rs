//! Data stream protocol encoding
//!
//! Converts a completion stream into the line protocol the chat UI reads:
//! `<type>:<json>\n` per part.

use std::convert::Infallible;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use serde_json::json;

use super::provider::CompletionStream;
use super::types::{CompletionChunk, FinishReason, Usage};

/// Header announcing the protocol version to the client
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";

/// One protocol part
#[derive(Debug, Clone, PartialEq)]
pub enum DataStreamPart {
    /// `f:` start of a message step
    Start { message_id: String },
    /// `0:` text delta
    Text(String),
    /// `3:` error message
    Error(String),
    /// `e:` end of a step
    FinishStep { reason: FinishReason, usage: Usage },
    /// `d:` end of the message
    FinishMessage { reason: FinishReason, usage: Usage },
}

impl DataStreamPart {
    pub fn encode(&self) -> String {
        let (code, value) = match self {
            DataStreamPart::Start { message_id } => ('f', json!({ "messageId": message_id })),
            DataStreamPart::Text(text) => ('0', json!(text)),
            DataStreamPart::Error(message) => ('3', json!(message)),
            DataStreamPart::FinishStep { reason, usage } => (
                'e',
                json!({ "finishReason": reason, "usage": usage, "isContinued": false }),
            ),
            DataStreamPart::FinishMessage { reason, usage } => {
                ('d', json!({ "finishReason": reason, "usage": usage }))
            }
        };
        format!("{}:{}\n", code, value)
    }
}

/// Part sequencing for one message
///
/// Keeps the stream well formed:
/// 1. the start part is sent exactly once, before anything else
/// 2. text parts only appear between start and finish
/// 3. the finish parts (or one error part) end the message, exactly once
#[derive(Debug)]
pub struct DataStreamEncoder {
    message_id: String,
    started: bool,
    ended: bool,
}

impl DataStreamEncoder {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            started: false,
            ended: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn ensure_started(&mut self, parts: &mut Vec<DataStreamPart>) {
        if !self.started {
            self.started = true;
            parts.push(DataStreamPart::Start {
                message_id: self.message_id.clone(),
            });
        }
    }

    pub fn text(&mut self, text: String) -> Vec<DataStreamPart> {
        let mut parts = Vec::new();
        if self.ended || text.is_empty() {
            return parts;
        }
        self.ensure_started(&mut parts);
        parts.push(DataStreamPart::Text(text));
        parts
    }

    pub fn finish(&mut self, reason: FinishReason, usage: Usage) -> Vec<DataStreamPart> {
        let mut parts = Vec::new();
        if self.ended {
            tracing::debug!("Skipping duplicate finish");
            return parts;
        }
        self.ensure_started(&mut parts);
        self.ended = true;
        parts.push(DataStreamPart::FinishStep { reason, usage });
        parts.push(DataStreamPart::FinishMessage { reason, usage });
        parts
    }

    pub fn error(&mut self, message: String) -> Vec<DataStreamPart> {
        let mut parts = Vec::new();
        if self.ended {
            return parts;
        }
        self.ensure_started(&mut parts);
        self.ended = true;
        parts.push(DataStreamPart::Error(message));
        parts
    }
}

fn encode_parts(parts: Vec<DataStreamPart>) -> Bytes {
    Bytes::from(parts.iter().map(DataStreamPart::encode).collect::<String>())
}

/// Encode a completion stream as a data stream response body
///
/// A stream that ends without a finish chunk is closed with reason
/// `unknown`; a failing stream is closed with one error part.
pub fn create_data_stream(
    message_id: String,
    chunks: CompletionStream,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let encoder = DataStreamEncoder::new(message_id);

    stream::unfold((chunks, encoder), |(mut chunks, mut encoder)| async move {
        loop {
            if encoder.is_ended() {
                return None;
            }

            let parts = match chunks.next().await {
                Some(Ok(CompletionChunk::Text(text))) => encoder.text(text),
                Some(Ok(CompletionChunk::Finish { reason, usage })) => encoder.finish(reason, usage),
                Some(Err(e)) => {
                    tracing::error!("Completion stream failed: {}", e);
                    encoder.error(e.to_string())
                }
                None => encoder.finish(FinishReason::Unknown, Usage::default()),
            };

            if !parts.is_empty() {
                return Some((Ok(encode_parts(parts)), (chunks, encoder)));
            }
        }
    })
}
