//! Relay to the hosted generative-language service.
//!
//! No conversation state is kept between calls: every request starts from the
//! history it is given, which for plain chat is empty.

mod gemini;
mod sentiment;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gemini::GeminiClient;
pub use sentiment::{analyze_sentiment, parse_report, SentimentReport};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("No API key configured for the language service")]
    NotConfigured,

    #[error("Request to language service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Language service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Language service returned no text")]
    EmptyReply,

    #[error("Could not interpret language service reply: {0}")]
    Unparseable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A hosted model that continues a conversation by one reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, history: &[ChatTurn], message: &str) -> Result<String, UpstreamError>;
}

/// Single-turn exchange on a fresh, empty history.
pub async fn chat_once(backend: &dyn ChatBackend, text: &str) -> Result<String, UpstreamError> {
    backend.send(&[], text).await
}
