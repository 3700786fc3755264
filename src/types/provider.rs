//! Provider descriptors and capability declarations.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Wire protocol class of a backend: a single JSON object per request, or an
/// incremental chunk stream in provider-specific framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolClass {
    SyncJson,
    ChunkedStream,
}

/// Chunk framing used by a `ChunkedStream` provider. The protocol class stays
/// the boundary-level contract; framing is a descriptor detail consumed by
/// the stream normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamFraming {
    /// Newline-delimited JSON objects.
    Ndjson,
    /// Server-sent events carrying JSON `data` payloads.
    Sse,
}

/// A capability a provider declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    TextGeneration,
    AudioTranscription,
    Streaming,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextGeneration => write!(f, "text-generation"),
            Self::AudioTranscription => write!(f, "audio-transcription"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// Endpoint and credential info for one provider. Opaque to the core logic;
/// only the adapter for the provider's dialect interprets it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
    /// Argv prefix for process-backed providers; the scratch file path is
    /// appended at invocation time.
    pub command: Vec<String>,
}

/// One configured backend: identity, protocol shape, declared capabilities
/// and fallback priority (lower rank is tried first).
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub protocol: ProtocolClass,
    pub framing: Option<StreamFraming>,
    pub capabilities: Vec<Capability>,
    pub priority: u8,
    pub connection: ConnectionInfo,
}

impl ProviderDescriptor {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_check() {
        let desc = ProviderDescriptor {
            name: "local".into(),
            protocol: ProtocolClass::ChunkedStream,
            framing: Some(StreamFraming::Ndjson),
            capabilities: vec![Capability::TextGeneration, Capability::Streaming],
            priority: 1,
            connection: ConnectionInfo::default(),
        };
        assert!(desc.supports(Capability::TextGeneration));
        assert!(!desc.supports(Capability::AudioTranscription));
    }

    #[test]
    fn protocol_class_serde_names() {
        let sync: ProtocolClass = serde_json::from_str("\"sync-json\"").expect("parse");
        assert_eq!(sync, ProtocolClass::SyncJson);
        let chunked: ProtocolClass = serde_json::from_str("\"chunked-stream\"").expect("parse");
        assert_eq!(chunked, ProtocolClass::ChunkedStream);
    }
}
