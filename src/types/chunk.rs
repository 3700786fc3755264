//! Canonical chunk types: the provider-agnostic unit of streamed output.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::usage::UsageRecord;
use crate::error::GatewayError;
use crate::util::cancel::CancelHandle;

/// One ordered unit of normalized output. Sequence numbers are strictly
/// increasing from 0 within one logical request's visible stream; a fallback
/// discards prior partial output and restarts at 0. Every stream terminates
/// with exactly one zero-or-more-content `is_final = true` chunk (or one
/// terminal error item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalChunk {
    pub sequence: u64,
    pub content: String,
    pub is_final: bool,
    pub provider: String,
    /// Usage rides on the final chunk when the provider reported it.
    pub usage: Option<UsageRecord>,
}

impl CanonicalChunk {
    /// A content-bearing, non-final chunk.
    pub fn delta(sequence: u64, content: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            sequence,
            content: content.into(),
            is_final: false,
            provider: provider.into(),
            usage: None,
        }
    }

    /// The terminal marker chunk. Carries no content.
    pub fn final_marker(
        sequence: u64,
        provider: impl Into<String>,
        usage: Option<UsageRecord>,
    ) -> Self {
        Self {
            sequence,
            content: String::new(),
            is_final: true,
            provider: provider.into(),
            usage,
        }
    }
}

/// The caller-facing chunk stream. Pull-based: the upstream read is paused
/// while the caller is not polling, so a slow consumer never causes
/// unbounded buffering.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<CanonicalChunk, GatewayError>> + Send>>;

/// A chunk stream paired with a first-class cancellation handle. Cancelling
/// (or dropping the stream) closes the upstream connection without draining
/// it and releases the active attempt's scratch resources.
pub struct ChunkStreamHandle {
    pub stream: ChunkStream,
    pub cancel: CancelHandle,
}

/// Collected terminal response for callers that don't want streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    pub usage: Option<UsageRecord>,
    /// The provider that produced the answer (the last one attempted).
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_marker_has_no_content() {
        let chunk = CanonicalChunk::final_marker(4, "local", None);
        assert!(chunk.is_final);
        assert!(chunk.content.is_empty());
        assert_eq!(chunk.sequence, 4);
    }
}
