//! Generation request types.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::provider::Capability;

/// Default total wall-clock budget for a request.
const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// What the caller wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// Text generation from a prompt.
    Chat,
    /// Speech-to-text from an audio payload.
    Transcribe,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Transcribe => write!(f, "transcribe"),
        }
    }
}

/// Request payload: a text prompt or raw audio bytes with a declared MIME.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    Text(String),
    Audio { data: Bytes, mime: String },
}

/// Caller-supplied generation options. The preferred provider is advisory
/// only; the registry promotes it when eligible but eligibility and fallback
/// order are otherwise the gateway's decision.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Target language for transcription.
    pub language: Option<String>,
    pub preferred_provider: Option<String>,
    /// Model override; adapters fall back to their configured model.
    pub model: Option<String>,
}

/// One generation or transcription request. Immutable once submitted; the
/// id is assigned at construction and is unrelated to any caller identity.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: String,
    pub kind: RequestKind,
    pub payload: RequestPayload,
    pub options: RequestOptions,
    /// Total wall-clock budget shared by all attempts.
    pub deadline: Duration,
}

impl GenerationRequest {
    /// Build a chat request from a text prompt.
    pub fn chat(prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RequestKind::Chat,
            payload: RequestPayload::Text(prompt.into()),
            options: RequestOptions::default(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Build a transcription request from raw audio bytes and a declared MIME.
    pub fn transcribe(data: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RequestKind::Transcribe,
            payload: RequestPayload::Audio {
                data: data.into(),
                mime: mime.into(),
            },
            options: RequestOptions::default(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// The capability a provider must declare to serve this request.
    pub fn required_capability(&self) -> Capability {
        match self.kind {
            RequestKind::Chat => Capability::TextGeneration,
            RequestKind::Transcribe => Capability::AudioTranscription,
        }
    }

    /// The text prompt, when this is a chat request.
    pub fn prompt(&self) -> Option<&str> {
        match &self.payload {
            RequestPayload::Text(text) => Some(text),
            RequestPayload::Audio { .. } => None,
        }
    }

    /// The audio payload, when this is a transcription request.
    pub fn audio(&self) -> Option<(&Bytes, &str)> {
        match &self.payload {
            RequestPayload::Audio { data, mime } => Some((data, mime)),
            RequestPayload::Text(_) => None,
        }
    }
}
