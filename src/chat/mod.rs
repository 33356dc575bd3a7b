//! AI Chat Module
//!
//! Streams assistant replies from the LLM backend to the chat UI using the
//! data stream line protocol

mod provider;
mod router;
mod sse;
mod stream;
pub mod types;

pub use provider::GeminiProvider;
pub use router::{ChatState, create_chat_router};
