//! Injected gateway configuration.
//!
//! The host supplies an ordered list of provider records plus orchestration
//! limits, deserialized once at startup. The gateway treats it as read-only;
//! there is no hot reload.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::types::{Capability, ConnectionInfo, ProtocolClass, ProviderDescriptor, StreamFraming};

/// Which wire dialect a provider speaks. The adapter factory uses this to
/// instantiate the matching translation shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Local model server chat over newline-delimited JSON.
    OllamaChat,
    /// OpenAI-compatible chat completions (sync JSON or SSE streaming).
    OpenaiChat,
    /// OpenAI-compatible audio transcription via multipart upload.
    OpenaiTranscribe,
    /// Local transcription command invoked as a child process.
    WhisperCli,
}

/// One provider record from the injected configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub adapter: AdapterKind,
    pub protocol: ProtocolClass,
    #[serde(default)]
    pub framing: Option<StreamFraming>,
    pub capabilities: Vec<Capability>,
    pub priority: u8,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
}

impl ProviderConfig {
    /// Build the descriptor for this record. Framing defaults to the
    /// dialect's native framing when omitted.
    pub fn descriptor(&self) -> ProviderDescriptor {
        let framing = match self.protocol {
            ProtocolClass::SyncJson => None,
            ProtocolClass::ChunkedStream => self.framing.or(match self.adapter {
                AdapterKind::OllamaChat => Some(StreamFraming::Ndjson),
                AdapterKind::OpenaiChat => Some(StreamFraming::Sse),
                _ => None,
            }),
        };
        ProviderDescriptor {
            name: self.name.clone(),
            protocol: self.protocol,
            framing,
            capabilities: self.capabilities.clone(),
            priority: self.priority,
            connection: ConnectionInfo {
                base_url: self.base_url.clone(),
                api_key: self.api_key.clone(),
                model: self.model.clone(),
                command: self.command.clone(),
            },
        }
    }
}

fn default_attempt_ceiling_ms() -> u64 {
    20_000
}

fn default_min_attempt_budget_ms() -> u64 {
    250
}

fn default_fallback_jitter_ms() -> u64 {
    25
}

/// Orchestration limits. The per-attempt ceiling keeps a slow first
/// candidate from starving all fallbacks; the floor is the budget below
/// which dispatching another attempt is pointless.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorLimits {
    #[serde(default = "default_attempt_ceiling_ms")]
    pub per_attempt_ceiling_ms: u64,
    #[serde(default = "default_min_attempt_budget_ms")]
    pub min_attempt_budget_ms: u64,
    /// Upper bound of the random pacing pause before a fallback dispatch.
    #[serde(default = "default_fallback_jitter_ms")]
    pub fallback_jitter_ms: u64,
}

impl Default for OrchestratorLimits {
    fn default() -> Self {
        Self {
            per_attempt_ceiling_ms: default_attempt_ceiling_ms(),
            min_attempt_budget_ms: default_min_attempt_budget_ms(),
            fallback_jitter_ms: default_fallback_jitter_ms(),
        }
    }
}

impl OrchestratorLimits {
    pub fn per_attempt_ceiling(&self) -> Duration {
        Duration::from_millis(self.per_attempt_ceiling_ms)
    }

    pub fn min_attempt_budget(&self) -> Duration {
        Duration::from_millis(self.min_attempt_budget_ms)
    }
}

/// Top-level injected configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub limits: OrchestratorLimits,
}
