//! Adapter for a locally hosted Ollama-style model server.
//!
//! Chat responses stream as newline-delimited JSON: each line carries a
//! partial `message.content` and a `done` flag; the final line additionally
//! carries `prompt_eval_count`/`eval_count` usage fields.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{
    AttemptContext, FragmentDecoder, DecodedFragment, ProviderAdapter, RawEventStream,
    ensure_success, frame_stream,
};
use crate::error::GatewayError;
use crate::types::GenerationRequest;
use crate::usage::UsageMapping;

pub struct OllamaChatAdapter {
    name: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaChatAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            model: model.into(),
            client,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Result<Value, GatewayError> {
        let prompt = request.prompt().ok_or_else(|| {
            GatewayError::InvalidParameter("chat request requires a text prompt".into())
        })?;
        let model = request.options.model.as_deref().unwrap_or(&self.model);
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });
        // Sampling parameters live under `options` in this dialect;
        // max output tokens maps to `num_predict`.
        let mut options = serde_json::Map::new();
        if let Some(t) = request.options.temperature {
            options.insert("temperature".into(), json!(t));
        }
        if let Some(n) = request.options.max_output_tokens {
            options.insert("num_predict".into(), json!(n));
        }
        if !options.is_empty() {
            body["options"] = Value::Object(options);
        }
        Ok(body)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaChatAdapter {
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
        request: &GenerationRequest,
        _ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        let body = self.build_body(request)?;
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(&self.name, e.to_string()))?;
        let response = ensure_success(&self.name, response).await?;
        Ok(frame_stream(self.name.clone(), response))
    }
}

/// Decoder for one NDJSON line of an Ollama-style chat stream.
pub struct OllamaFragmentDecoder;

impl FragmentDecoder for OllamaFragmentDecoder {
    fn decode(&self, unit: &str) -> Option<DecodedFragment> {
        let value: Value = serde_json::from_str(unit).ok()?;
        if !value.is_object() {
            return None;
        }
        let text = value
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
        // Usage fields sit at the top level of the final frame; hand the
        // whole frame to the aggregator so it can pull them by name.
        let usage = done.then(|| value.clone());
        Some(DecodedFragment { text, done, usage })
    }
}
