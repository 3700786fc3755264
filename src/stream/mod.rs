//! Stream normalization.
//!
//! Consumes an adapter's raw output (one full sync-json answer, or chunked
//! frames in provider-specific framing) and emits the canonical chunk
//! sequence: zero or more content chunks with sequence numbers strictly
//! increasing from 0, terminated by exactly one `is_final = true` chunk.
//! Callers get the same "stream always ends with an explicit final marker"
//! contract regardless of backend shape.
//!
//! Frames are not guaranteed to align with parse boundaries: a unit may
//! straddle two reads, so bytes are buffered until a complete unit is
//! available. A unit that fails to decode is skipped, not fatal: one
//! corrupt frame must not abort an otherwise-healthy stream.
//!
//! Normalization is pull-based: the upstream read happens only when the
//! caller polls, so a slow consumer pauses the adapter stream instead of
//! growing an unbounded buffer.

use std::sync::Arc;

use bytes::BytesMut;
use futures_util::StreamExt;

use crate::adapters::{FragmentDecoder, RawEventStream, RawProviderEvent};
use crate::error::GatewayError;
use crate::registry::RegisteredProvider;
use crate::types::{CanonicalChunk, ChunkStream, ProtocolClass, StreamFraming};
use crate::usage::{self, UsageMapping};

/// Normalize one attempt's raw events into canonical chunks.
pub fn normalize(raw: RawEventStream, provider: &RegisteredProvider) -> ChunkStream {
    let name = provider.descriptor.name.clone();
    let mapping = provider.adapter.usage_mapping();
    match provider.descriptor.protocol {
        ProtocolClass::SyncJson => normalize_sync(raw, name, mapping),
        ProtocolClass::ChunkedStream => {
            let Some(decoder) = provider.adapter.decoder() else {
                return error_stream(GatewayError::Configuration(format!(
                    "provider '{name}' is chunked-stream but its adapter has no decoder"
                )));
            };
            match provider.descriptor.framing {
                Some(StreamFraming::Ndjson) => normalize_ndjson(raw, name, decoder, mapping),
                Some(StreamFraming::Sse) => normalize_sse(raw, name, decoder, mapping),
                None => error_stream(GatewayError::Configuration(format!(
                    "provider '{name}' is chunked-stream but declares no framing"
                ))),
            }
        }
    }
}

fn error_stream(err: GatewayError) -> ChunkStream {
    let items: Vec<Result<CanonicalChunk, GatewayError>> = vec![Err(err)];
    Box::pin(futures_util::stream::iter(items))
}

/// Sync-json: the whole answer becomes one non-final chunk, followed by a
/// zero-content final marker carrying the mapped usage.
fn normalize_sync(mut raw: RawEventStream, name: String, mapping: UsageMapping) -> ChunkStream {
    let s = async_stream::stream! {
        match raw.next().await {
            Some(Ok(RawProviderEvent::Complete { content, usage })) => {
                let record = usage::merge(&name, usage.as_ref(), &mapping);
                yield Ok(CanonicalChunk::delta(0, content, &name));
                yield Ok(CanonicalChunk::final_marker(1, &name, record));
            }
            Some(Ok(RawProviderEvent::Frame(_))) => {
                yield Err(GatewayError::Stream(format!(
                    "provider '{name}' is sync-json but produced chunked frames"
                )));
            }
            Some(Err(e)) => yield Err(e),
            None => {
                yield Err(GatewayError::Stream(format!(
                    "provider '{name}' produced no response"
                )));
            }
        }
    };
    Box::pin(s)
}

/// Chunked NDJSON: buffer bytes, split on newlines, decode each complete
/// line. The `done` frame produces the final chunk; frames still in flight
/// after it are dropped.
fn normalize_ndjson(
    mut raw: RawEventStream,
    name: String,
    decoder: Arc<dyn FragmentDecoder>,
    mapping: UsageMapping,
) -> ChunkStream {
    let s = async_stream::stream! {
        let mut buf = BytesMut::new();
        let mut seq: u64 = 0;
        let mut finished = false;

        'read: while let Some(item) = raw.next().await {
            let frame = match item {
                Ok(RawProviderEvent::Frame(bytes)) => bytes,
                Ok(RawProviderEvent::Complete { .. }) => {
                    yield Err(GatewayError::Stream(format!(
                        "provider '{name}' is chunked-stream but produced a sync response"
                    )));
                    return;
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            buf.extend_from_slice(&frame);

            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line = buf.split_to(pos + 1);
                let Ok(unit) = std::str::from_utf8(&line[..pos]) else {
                    tracing::debug!(provider = %name, "skipping non-utf8 frame");
                    continue;
                };
                let unit = unit.trim();
                if unit.is_empty() {
                    continue;
                }
                let Some(frag) = decoder.decode(unit) else {
                    tracing::debug!(provider = %name, "skipping undecodable frame");
                    continue;
                };
                if let Some(text) = frag.text {
                    yield Ok(CanonicalChunk::delta(seq, text, &name));
                    seq += 1;
                }
                if frag.done {
                    let record = usage::merge(&name, frag.usage.as_ref(), &mapping);
                    yield Ok(CanonicalChunk::final_marker(seq, &name, record));
                    finished = true;
                    break 'read;
                }
            }
        }

        if !finished {
            // A final unit may arrive without a trailing newline.
            if let Ok(unit) = std::str::from_utf8(&buf) {
                let unit = unit.trim();
                if !unit.is_empty() {
                    if let Some(frag) = decoder.decode(unit) {
                        if let Some(text) = frag.text {
                            yield Ok(CanonicalChunk::delta(seq, text, &name));
                            seq += 1;
                        }
                        if frag.done {
                            let record = usage::merge(&name, frag.usage.as_ref(), &mapping);
                            yield Ok(CanonicalChunk::final_marker(seq, &name, record));
                            finished = true;
                        }
                    }
                }
            }
            if !finished {
                yield Err(GatewayError::Stream(format!(
                    "stream from provider '{name}' ended without a completion marker"
                )));
            }
        }
    };
    Box::pin(s)
}

/// Chunked SSE: run the frames through an SSE parser and decode each `data`
/// payload. The `[DONE]` sentinel (or end-of-stream after a finish frame)
/// closes the stream with the final marker; usage may arrive on a separate
/// frame before the sentinel.
fn normalize_sse(
    raw: RawEventStream,
    name: String,
    decoder: Arc<dyn FragmentDecoder>,
    mapping: UsageMapping,
) -> ChunkStream {
    use eventsource_stream::Eventsource;

    let upstream_name = name.clone();
    let bytes = raw.map(move |item| match item {
        Ok(RawProviderEvent::Frame(bytes)) => Ok(bytes),
        Ok(RawProviderEvent::Complete { .. }) => Err(GatewayError::Stream(format!(
            "provider '{upstream_name}' is chunked-stream but produced a sync response"
        ))),
        Err(e) => Err(e),
    });

    let s = async_stream::stream! {
        let mut events = Box::pin(bytes.eventsource());
        let mut seq: u64 = 0;
        let mut done_seen = false;
        let mut pending_usage: Option<serde_json::Value> = None;

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(GatewayError::Stream(format!(
                        "SSE stream error from provider '{name}': {e}"
                    )));
                    return;
                }
            };
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                let record = usage::merge(&name, pending_usage.as_ref(), &mapping);
                yield Ok(CanonicalChunk::final_marker(seq, &name, record));
                return;
            }
            let Some(frag) = decoder.decode(data) else {
                tracing::debug!(provider = %name, "skipping undecodable SSE payload");
                continue;
            };
            if let Some(text) = frag.text {
                yield Ok(CanonicalChunk::delta(seq, text, &name));
                seq += 1;
            }
            if frag.usage.is_some() {
                pending_usage = frag.usage;
            }
            if frag.done {
                done_seen = true;
            }
        }

        if done_seen {
            // The upstream closed after its finish frame without sending the
            // sentinel; the answer is still complete.
            let record = usage::merge(&name, pending_usage.as_ref(), &mapping);
            yield Ok(CanonicalChunk::final_marker(seq, &name, record));
        } else {
            yield Err(GatewayError::Stream(format!(
                "stream from provider '{name}' ended without a completion marker"
            )));
        }
    };
    Box::pin(s)
}
