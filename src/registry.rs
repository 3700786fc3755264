//! Provider registry and selection policy.
//!
//! Holds the configured descriptors paired with adapter instances. The
//! registry is built once from injected configuration, is immutable
//! afterwards, and is shared read-only across all in-flight requests.

use std::sync::Arc;

use crate::adapters::{
    OllamaChatAdapter, OpenAiChatAdapter, OpenAiTranscribeAdapter, ProviderAdapter,
    WhisperCliAdapter,
};
use crate::config::{AdapterKind, GatewayConfig, ProviderConfig};
use crate::error::GatewayError;
use crate::types::{GenerationRequest, ProtocolClass, ProviderDescriptor, StreamFraming};

/// One configured backend: its descriptor plus the adapter that speaks its
/// dialect.
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub adapter: Arc<dyn ProviderAdapter>,
}

/// Read-only provider registry.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<RegisteredProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from injected configuration. One HTTP client is
    /// shared by all HTTP-backed adapters.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::new();
        let mut registry = Self::new();
        let mut seen = std::collections::HashSet::new();
        for provider in &config.providers {
            if !seen.insert(provider.name.clone()) {
                return Err(GatewayError::Configuration(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            let adapter = build_adapter(provider, &client)?;
            registry.register(provider.descriptor(), adapter);
        }
        Ok(registry)
    }

    /// Register a provider. Public so tests and hosts can install custom
    /// adapters behind the same selection policy.
    pub fn register(&mut self, descriptor: ProviderDescriptor, adapter: Arc<dyn ProviderAdapter>) {
        self.providers
            .push(Arc::new(RegisteredProvider { descriptor, adapter }));
    }

    /// Candidate providers for a request: those whose capability set covers
    /// what the request needs, sorted by priority rank ascending (name as a
    /// deterministic tie-break), with the caller's advisory preferred
    /// provider moved to the front when eligible. An empty result is a
    /// request-validation error and must not trigger any network call.
    pub fn candidate_order(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Arc<RegisteredProvider>>, GatewayError> {
        let needed = request.required_capability();
        let mut candidates: Vec<Arc<RegisteredProvider>> = self
            .providers
            .iter()
            .filter(|p| p.descriptor.supports(needed))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(GatewayError::NoEligibleProvider(format!(
                "{} requires {}",
                request.kind, needed
            )));
        }
        candidates.sort_by(|a, b| {
            a.descriptor
                .priority
                .cmp(&b.descriptor.priority)
                .then_with(|| a.descriptor.name.cmp(&b.descriptor.name))
        });
        if let Some(preferred) = &request.options.preferred_provider {
            if let Some(pos) = candidates
                .iter()
                .position(|p| &p.descriptor.name == preferred)
            {
                let promoted = candidates.remove(pos);
                candidates.insert(0, promoted);
            }
        }
        Ok(candidates)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered provider names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .map(|p| p.descriptor.name.as_str())
            .collect()
    }
}

fn require_base_url(provider: &ProviderConfig) -> Result<String, GatewayError> {
    provider.base_url.clone().ok_or_else(|| {
        GatewayError::Configuration(format!("provider '{}' requires base_url", provider.name))
    })
}

fn require_model(provider: &ProviderConfig) -> Result<String, GatewayError> {
    provider.model.clone().ok_or_else(|| {
        GatewayError::Configuration(format!("provider '{}' requires model", provider.name))
    })
}

/// Instantiate the adapter matching one provider record, validating that the
/// declared protocol shape fits the dialect.
fn build_adapter(
    provider: &ProviderConfig,
    client: &reqwest::Client,
) -> Result<Arc<dyn ProviderAdapter>, GatewayError> {
    let descriptor = provider.descriptor();
    match provider.adapter {
        AdapterKind::OllamaChat => {
            if descriptor.protocol != ProtocolClass::ChunkedStream
                || descriptor.framing != Some(StreamFraming::Ndjson)
            {
                return Err(GatewayError::Configuration(format!(
                    "provider '{}': the local model server dialect streams ndjson",
                    provider.name
                )));
            }
            Ok(Arc::new(OllamaChatAdapter::new(
                &provider.name,
                require_base_url(provider)?,
                require_model(provider)?,
                client.clone(),
            )))
        }
        AdapterKind::OpenaiChat => {
            if descriptor.protocol == ProtocolClass::ChunkedStream
                && descriptor.framing != Some(StreamFraming::Sse)
            {
                return Err(GatewayError::Configuration(format!(
                    "provider '{}': the OpenAI-compatible dialect streams sse",
                    provider.name
                )));
            }
            Ok(Arc::new(OpenAiChatAdapter::new(
                &provider.name,
                require_base_url(provider)?,
                provider.api_key.clone(),
                require_model(provider)?,
                descriptor.protocol,
                client.clone(),
            )))
        }
        AdapterKind::OpenaiTranscribe => {
            if descriptor.protocol != ProtocolClass::SyncJson {
                return Err(GatewayError::Configuration(format!(
                    "provider '{}': transcription endpoints answer sync-json",
                    provider.name
                )));
            }
            Ok(Arc::new(OpenAiTranscribeAdapter::new(
                &provider.name,
                require_base_url(provider)?,
                provider.api_key.clone(),
                provider.model.clone().unwrap_or_else(|| "whisper-1".into()),
                client.clone(),
            )))
        }
        AdapterKind::WhisperCli => {
            if descriptor.protocol != ProtocolClass::SyncJson {
                return Err(GatewayError::Configuration(format!(
                    "provider '{}': process-backed transcription answers sync-json",
                    provider.name
                )));
            }
            if provider.command.is_empty() {
                return Err(GatewayError::Configuration(format!(
                    "provider '{}' requires a non-empty command",
                    provider.name
                )));
            }
            Ok(Arc::new(WhisperCliAdapter::new(
                &provider.name,
                provider.command.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::adapters::{AttemptContext, RawEventStream};
    use crate::types::{Capability, ConnectionInfo};
    use crate::usage::UsageMapping;

    struct NullAdapter(&'static str);

    #[async_trait]
    impl ProviderAdapter for NullAdapter {
        fn name(&self) -> &str {
            self.0
        }
        fn usage_mapping(&self) -> UsageMapping {
            UsageMapping::OPENAI
        }
        async fn invoke(
            &self,
            _request: &GenerationRequest,
            _ctx: &AttemptContext,
        ) -> Result<RawEventStream, GatewayError> {
            Err(GatewayError::Internal("not invoked in these tests".into()))
        }
    }

    fn descriptor(name: &str, priority: u8, capabilities: Vec<Capability>) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            protocol: ProtocolClass::SyncJson,
            framing: None,
            capabilities,
            priority,
            connection: ConnectionInfo::default(),
        }
    }

    fn registry_of(entries: &[(&'static str, u8, Vec<Capability>)]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for (name, priority, caps) in entries {
            registry.register(
                descriptor(name, *priority, caps.clone()),
                Arc::new(NullAdapter(name)),
            );
        }
        registry
    }

    #[test]
    fn orders_by_priority_then_name() {
        let registry = registry_of(&[
            ("beta", 2, vec![Capability::TextGeneration]),
            ("alpha", 2, vec![Capability::TextGeneration]),
            ("local", 1, vec![Capability::TextGeneration]),
        ]);
        let request = GenerationRequest::chat("hi");
        let order = registry.candidate_order(&request).expect("candidates");
        let names: Vec<_> = order.iter().map(|p| p.descriptor.name.as_str()).collect();
        assert_eq!(names, vec!["local", "alpha", "beta"]);
    }

    #[test]
    fn filters_by_required_capability() {
        let registry = registry_of(&[
            ("chat-only", 1, vec![Capability::TextGeneration]),
            ("stt", 2, vec![Capability::AudioTranscription]),
        ]);
        let request = GenerationRequest::transcribe(vec![0u8], "audio/wav");
        let order = registry.candidate_order(&request).expect("candidates");
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].descriptor.name, "stt");
    }

    #[test]
    fn no_eligible_provider_is_validation_error() {
        let registry = registry_of(&[("chat-only", 1, vec![Capability::TextGeneration])]);
        let request = GenerationRequest::transcribe(vec![0u8], "audio/wav");
        let err = registry.candidate_order(&request).err().expect("no provider");
        assert!(matches!(err, GatewayError::NoEligibleProvider(_)));
        assert!(!err.triggers_fallback());
    }

    #[test]
    fn preferred_provider_moves_to_front_when_eligible() {
        let registry = registry_of(&[
            ("local", 1, vec![Capability::TextGeneration]),
            ("cloud", 2, vec![Capability::TextGeneration]),
        ]);
        let mut request = GenerationRequest::chat("hi");
        request.options.preferred_provider = Some("cloud".into());
        let order = registry.candidate_order(&request).expect("candidates");
        let names: Vec<_> = order.iter().map(|p| p.descriptor.name.as_str()).collect();
        assert_eq!(names, vec!["cloud", "local"]);
    }

    #[test]
    fn ineligible_preferred_provider_is_ignored() {
        let registry = registry_of(&[
            ("local", 1, vec![Capability::TextGeneration]),
            ("stt", 2, vec![Capability::AudioTranscription]),
        ]);
        let mut request = GenerationRequest::chat("hi");
        request.options.preferred_provider = Some("stt".into());
        let order = registry.candidate_order(&request).expect("candidates");
        assert_eq!(order[0].descriptor.name, "local");
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn factory_rejects_inconsistent_protocol() {
        let config: GatewayConfig = serde_json::from_value(serde_json::json!({
            "providers": [{
                "name": "bad",
                "adapter": "ollama-chat",
                "protocol": "sync-json",
                "capabilities": ["text-generation"],
                "priority": 1,
                "base_url": "http://localhost:11434",
                "model": "llama3.2"
            }]
        }))
        .expect("config");
        let err = ProviderRegistry::from_config(&config).err().expect("reject");
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
