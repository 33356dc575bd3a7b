//! Completion providers
//!
//! `GeminiProvider` calls `streamGenerateContent` with `alt=sse` and turns
//! the SSE frames into text chunks followed by one finish chunk.

use std::collections::VecDeque;
use std::pin::Pin;

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::Client;

use super::sse::SseDecoder;
use super::types::{
    ChatMessage, CompletionChunk, FinishReason, GenerateContentChunk, GenerateContentRequest, Usage,
};

pub type CompletionStream = Pin<Box<dyn Stream<Item = anyhow::Result<CompletionChunk>> + Send>>;

/// LLM backend producing a streamed completion
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a completion stream; errors here mean nothing was streamed
    async fn stream_completion(&self, messages: &[ChatMessage]) -> anyhow::Result<CompletionStream>;
}

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Streaming endpoint; accepts both `gemini-x` and `models/gemini-x`
    fn stream_url(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn stream_completion(&self, messages: &[ChatMessage]) -> anyhow::Result<CompletionStream> {
        let request = GenerateContentRequest::from_messages(messages);

        tracing::debug!(
            model = %self.model,
            message_count = messages.len(),
            "Opening completion stream"
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini request failed: {} {}", status, body);
        }

        Ok(decode_gemini_stream(response.bytes_stream()))
    }
}

/// Decoding state carried between polls
struct GeminiStream<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<anyhow::Result<CompletionChunk>>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
    done: bool,
}

impl<S> GeminiStream<S> {
    fn absorb(&mut self, data: &str) {
        let chunk: GenerateContentChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.fail(anyhow::anyhow!("Malformed Gemini chunk: {}", e));
                return;
            }
        };

        if let Some(error) = &chunk.error {
            self.fail(anyhow::anyhow!("Gemini error: {}", error.message));
            return;
        }

        let text = chunk.text();
        if !text.is_empty() {
            self.pending.push_back(Ok(CompletionChunk::Text(text)));
        }
        if let Some(reason) = chunk.finish_reason() {
            self.finish_reason = Some(FinishReason::from_gemini(reason));
        }
        if let Some(meta) = &chunk.usage_metadata {
            self.usage = Usage::from(meta);
        }
    }

    fn fail(&mut self, error: anyhow::Error) {
        self.pending.push_back(Err(error));
        self.done = true;
    }

    fn drain_decoder(&mut self) {
        let decoded: Vec<_> = self.decoder.decode_iter().collect();
        for item in decoded {
            if self.done {
                break;
            }
            match item {
                Ok(event) => self.absorb(&event.data),
                Err(e) => self.fail(e.into()),
            }
        }
    }

    fn close(&mut self) {
        match self.decoder.finish() {
            Ok(Some(event)) => self.absorb(&event.data),
            Ok(None) => {}
            Err(e) => self.fail(e.into()),
        }
        if !self.done {
            self.done = true;
            self.pending.push_back(Ok(CompletionChunk::Finish {
                reason: self.finish_reason.unwrap_or(FinishReason::Unknown),
                usage: self.usage,
            }));
        }
    }
}

/// Turn a raw SSE byte stream into completion chunks
pub fn decode_gemini_stream<S, E>(body: S) -> CompletionStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let state = GeminiStream {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finish_reason: None,
        usage: Usage::default(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => match state.decoder.feed(&bytes) {
                    Ok(()) => state.drain_decoder(),
                    Err(e) => state.fail(e.into()),
                },
                Some(Err(e)) => state.fail(e.into()),
                None => state.close(),
            }
        }
    }))
}
