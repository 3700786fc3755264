//! Shared mock adapters for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use ai_gateway::adapters::{
    AttemptContext, FragmentDecoder, OllamaFragmentDecoder, ProviderAdapter, RawEventStream,
    RawProviderEvent,
};
use ai_gateway::error::GatewayError;
use ai_gateway::types::{
    Capability, ConnectionInfo, GenerationRequest, ProtocolClass, ProviderDescriptor,
    StreamFraming,
};
use ai_gateway::usage::UsageMapping;

pub fn sync_descriptor(name: &str, priority: u8, capabilities: Vec<Capability>) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.into(),
        protocol: ProtocolClass::SyncJson,
        framing: None,
        capabilities,
        priority,
        connection: ConnectionInfo::default(),
    }
}

pub fn ndjson_descriptor(
    name: &str,
    priority: u8,
    capabilities: Vec<Capability>,
) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.into(),
        protocol: ProtocolClass::ChunkedStream,
        framing: Some(StreamFraming::Ndjson),
        capabilities,
        priority,
        connection: ConnectionInfo::default(),
    }
}

pub fn chat_caps() -> Vec<Capability> {
    vec![Capability::TextGeneration, Capability::Streaming]
}

pub fn stt_caps() -> Vec<Capability> {
    vec![Capability::AudioTranscription]
}

/// Sync-json mock that answers deterministically and counts invocations.
pub struct SyncMock {
    pub name: String,
    pub answer: String,
    pub usage: Option<serde_json::Value>,
    pub calls: Arc<AtomicUsize>,
}

impl SyncMock {
    pub fn new(name: &str, answer: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.into(),
                answer: answer.into(),
                usage: None,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ProviderAdapter for SyncMock {
    fn name(&self) -> &str {
        &self.name
    }
    fn usage_mapping(&self) -> UsageMapping {
        UsageMapping::OPENAI
    }
    async fn invoke(
        &self,
        _request: &GenerationRequest,
        _ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let event = RawProviderEvent::Complete {
            content: self.answer.clone(),
            usage: self.usage.clone(),
        };
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(event)])))
    }
}

/// Mock whose invocation always fails at the transport level.
pub struct TransportFailMock {
    pub name: String,
    pub calls: Arc<AtomicUsize>,
}

impl TransportFailMock {
    pub fn new(name: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.into(),
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ProviderAdapter for TransportFailMock {
    fn name(&self) -> &str {
        &self.name
    }
    fn usage_mapping(&self) -> UsageMapping {
        UsageMapping::OPENAI
    }
    async fn invoke(
        &self,
        _request: &GenerationRequest,
        _ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GatewayError::transport(&self.name, "connection refused"))
    }
}

/// Chunked NDJSON mock fed from scripted frames; optionally dies with a
/// transport error after emitting them.
pub struct NdjsonMock {
    pub name: String,
    pub frames: Vec<String>,
    pub fail_at_end: bool,
    pub calls: Arc<AtomicUsize>,
}

impl NdjsonMock {
    /// Frames that stream the given deltas and then terminate cleanly.
    pub fn completing(name: &str, deltas: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let mut frames: Vec<String> = deltas
            .iter()
            .map(|d| {
                format!(
                    "{}\n",
                    serde_json::json!({"message": {"role": "assistant", "content": d}, "done": false})
                )
            })
            .collect();
        frames.push(format!(
            "{}\n",
            serde_json::json!({"done": true, "prompt_eval_count": 7, "eval_count": 11})
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.into(),
                frames,
                fail_at_end: false,
                calls: calls.clone(),
            },
            calls,
        )
    }

    /// Frames that stream the given deltas and then die mid-stream.
    pub fn dying(name: &str, deltas: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let frames = deltas
            .iter()
            .map(|d| {
                format!(
                    "{}\n",
                    serde_json::json!({"message": {"role": "assistant", "content": d}, "done": false})
                )
            })
            .collect();
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.into(),
                frames,
                fail_at_end: true,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ProviderAdapter for NdjsonMock {
    fn name(&self) -> &str {
        &self.name
    }
    fn usage_mapping(&self) -> UsageMapping {
        UsageMapping::OLLAMA
    }
    fn decoder(&self) -> Option<Arc<dyn FragmentDecoder>> {
        Some(Arc::new(OllamaFragmentDecoder))
    }
    async fn invoke(
        &self,
        _request: &GenerationRequest,
        _ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<Result<RawProviderEvent, GatewayError>> = self
            .frames
            .iter()
            .map(|f| Ok(RawProviderEvent::Frame(Bytes::from(f.clone()))))
            .collect();
        if self.fail_at_end {
            items.push(Err(GatewayError::transport(&self.name, "connection reset")));
        }
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

/// What a scratch-file probe saw during its invocation.
#[derive(Debug, Clone)]
pub struct ScratchObservation {
    pub path: PathBuf,
    pub existed: bool,
}

pub enum ProbeMode {
    /// Record the scratch file, then never produce output.
    Hang,
    /// Record the scratch file, then answer.
    Complete(&'static str),
    /// Record the scratch file, then fail at the transport level.
    FailTransport,
}

/// Transcription mock that requires a scratch file and records what it saw.
pub struct ScratchProbe {
    pub name: String,
    pub mode: ProbeMode,
    pub seen: Arc<Mutex<Vec<ScratchObservation>>>,
}

impl ScratchProbe {
    pub fn new(name: &str, mode: ProbeMode) -> (Self, Arc<Mutex<Vec<ScratchObservation>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.into(),
                mode,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

#[async_trait]
impl ProviderAdapter for ScratchProbe {
    fn name(&self) -> &str {
        &self.name
    }
    fn usage_mapping(&self) -> UsageMapping {
        UsageMapping::OPENAI
    }
    fn needs_scratch_file(&self) -> bool {
        true
    }
    async fn invoke(
        &self,
        _request: &GenerationRequest,
        ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        let path = ctx
            .scratch_path
            .clone()
            .ok_or_else(|| GatewayError::Internal("probe expected a scratch file".into()))?;
        self.seen.lock().unwrap().push(ScratchObservation {
            existed: path.exists(),
            path,
        });
        match &self.mode {
            ProbeMode::Hang => {
                futures_util::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            ProbeMode::Complete(answer) => {
                let event = RawProviderEvent::Complete {
                    content: (*answer).to_string(),
                    usage: None,
                };
                Ok(Box::pin(futures_util::stream::iter(vec![Ok(event)])))
            }
            ProbeMode::FailTransport => {
                Err(GatewayError::transport(&self.name, "probe transport failure"))
            }
        }
    }
}
