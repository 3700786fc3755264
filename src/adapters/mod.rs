//! Provider adapters: translation shims from one backend's wire protocol to
//! the canonical chunk model.
//!
//! An adapter performs exactly one upstream call per invocation and exposes
//! raw provider events; it never retries and never falls back, that is the
//! orchestrator's job. Transport errors (connect failure, non-2xx, malformed
//! sync body) surface as typed failures rather than being swallowed.

mod ollama;
mod openai;
mod whisper_cli;

pub use ollama::{OllamaChatAdapter, OllamaFragmentDecoder};
pub use openai::{OpenAiChatAdapter, OpenAiSseDecoder, OpenAiTranscribeAdapter};
pub use whisper_cli::WhisperCliAdapter;

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::GenerationRequest;
use crate::usage::UsageMapping;

/// Raw output of one adapter invocation, before normalization.
#[derive(Debug)]
pub enum RawProviderEvent {
    /// The entire answer of a sync-json backend, already translated.
    Complete {
        content: String,
        /// Raw usage object in the provider's own field names.
        usage: Option<Value>,
    },
    /// One read's worth of bytes from a chunked backend, still in the
    /// provider's framing. Frames are not guaranteed to align with parse
    /// boundaries; the normalizer buffers them.
    Frame(Bytes),
}

/// Lazy sequence of raw provider events.
pub type RawEventStream =
    Pin<Box<dyn Stream<Item = Result<RawProviderEvent, GatewayError>> + Send>>;

/// Per-attempt context handed to an adapter. The scratch path is present
/// only when the adapter declared `needs_scratch_file` and the resource
/// manager materialized the payload for this attempt.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub request_id: String,
    pub scratch_path: Option<PathBuf>,
}

/// One decoded provider-native frame.
#[derive(Debug, Clone, Default)]
pub struct DecodedFragment {
    /// Partial text carried by this frame, if any.
    pub text: Option<String>,
    /// Whether this frame marks upstream completion.
    pub done: bool,
    /// Raw usage object carried by this frame, in provider field names.
    pub usage: Option<Value>,
}

/// Parses one complete framed unit (an NDJSON line or an SSE data payload)
/// into a decoded fragment. Returns `None` for units it cannot parse; the
/// normalizer skips those rather than aborting the stream.
pub trait FragmentDecoder: Send + Sync {
    fn decode(&self, unit: &str) -> Option<DecodedFragment>;
}

/// A provider adapter. Object-safe; the registry holds one instance per
/// configured provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Field names under which this provider reports usage.
    fn usage_mapping(&self) -> UsageMapping;

    /// Decoder for this provider's chunk framing. Sync-json adapters have
    /// none.
    fn decoder(&self) -> Option<Arc<dyn FragmentDecoder>> {
        None
    }

    /// Whether this backend requires the audio payload materialized to a
    /// filesystem path rather than an in-memory buffer.
    fn needs_scratch_file(&self) -> bool {
        false
    }

    /// Perform the upstream call and return the raw event sequence.
    async fn invoke(
        &self,
        request: &GenerationRequest,
        ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError>;
}

/// Map a non-2xx response into a transport failure carrying a body snippet.
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(GatewayError::transport(
        provider,
        format!("upstream returned {status}: {snippet}"),
    ))
}

/// Wrap a reqwest byte stream as raw frames, mapping read errors to
/// transport failures for the given provider.
pub(crate) fn frame_stream(provider: String, response: reqwest::Response) -> RawEventStream {
    use futures_util::StreamExt;
    let stream = response.bytes_stream().map(move |item| match item {
        Ok(bytes) => Ok(RawProviderEvent::Frame(bytes)),
        Err(e) => Err(GatewayError::transport(provider.clone(), e.to_string())),
    });
    Box::pin(stream)
}

/// A one-event stream for sync-json adapters.
pub(crate) fn complete_stream(content: String, usage: Option<Value>) -> RawEventStream {
    Box::pin(futures_util::stream::iter(vec![Ok(
        RawProviderEvent::Complete { content, usage },
    )]))
}
