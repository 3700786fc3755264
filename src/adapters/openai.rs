//! Adapters for OpenAI-compatible cloud providers.
//!
//! Chat completions are served either as one JSON object (`stream: false`)
//! or as SSE delta frames (`stream: true`); transcription is a multipart
//! upload answered with a single JSON object. Which mode a configured
//! provider uses is driven by its descriptor's protocol class.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use super::{
    AttemptContext, DecodedFragment, FragmentDecoder, ProviderAdapter, RawEventStream,
    complete_stream, ensure_success, frame_stream,
};
use crate::error::GatewayError;
use crate::resource::extension_for_mime;
use crate::types::{GenerationRequest, ProtocolClass};
use crate::usage::UsageMapping;

pub struct OpenAiChatAdapter {
    name: String,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    protocol: ProtocolClass,
    client: reqwest::Client,
}

impl OpenAiChatAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        protocol: ProtocolClass,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            protocol,
            client,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Result<Value, GatewayError> {
        let prompt = request.prompt().ok_or_else(|| {
            GatewayError::InvalidParameter("chat request requires a text prompt".into())
        })?;
        let model = request.options.model.as_deref().unwrap_or(&self.model);
        let streaming = self.protocol == ProtocolClass::ChunkedStream;
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": streaming,
        });
        if streaming {
            body["stream_options"] = json!({ "include_usage": true });
        }
        if let Some(t) = request.options.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = request.options.max_output_tokens {
            body["max_tokens"] = json!(n);
        }
        Ok(body)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiChatAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn usage_mapping(&self) -> UsageMapping {
        UsageMapping::OPENAI
    }

    fn decoder(&self) -> Option<Arc<dyn FragmentDecoder>> {
        match self.protocol {
            ProtocolClass::ChunkedStream => Some(Arc::new(OpenAiSseDecoder)),
            ProtocolClass::SyncJson => None,
        }
    }

    async fn invoke(
        &self,
        request: &GenerationRequest,
        _ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        let body = self.build_body(request)?;
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| GatewayError::transport(&self.name, e.to_string()))?;
        let response = ensure_success(&self.name, response).await?;

        match self.protocol {
            ProtocolClass::ChunkedStream => Ok(frame_stream(self.name.clone(), response)),
            ProtocolClass::SyncJson => {
                let value: Value = response.json().await.map_err(|e| {
                    GatewayError::transport(&self.name, format!("malformed response body: {e}"))
                })?;
                let content = value
                    .get("choices")
                    .and_then(|c| c.get(0))
                    .and_then(|c| c.get("message"))
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        GatewayError::transport(
                            &self.name,
                            "malformed response body: missing choices[0].message.content",
                        )
                    })?
                    .to_string();
                let usage = value.get("usage").filter(|u| !u.is_null()).cloned();
                Ok(complete_stream(content, usage))
            }
        }
    }
}

/// Decoder for one SSE `data` payload of an OpenAI-style chat stream.
/// `done` marks the frame carrying a finish reason; a usage-only frame
/// (sent when `include_usage` is honored) carries no choices at all.
pub struct OpenAiSseDecoder;

impl FragmentDecoder for OpenAiSseDecoder {
    fn decode(&self, unit: &str) -> Option<DecodedFragment> {
        let value: Value = serde_json::from_str(unit).ok()?;
        if !value.is_object() {
            return None;
        }
        let choice = value.get("choices").and_then(|c| c.get(0));
        let text = choice
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let done = choice
            .and_then(|c| c.get("finish_reason"))
            .map(|r| !r.is_null())
            .unwrap_or(false);
        let usage = value.get("usage").filter(|u| !u.is_null()).cloned();
        Some(DecodedFragment { text, done, usage })
    }
}

pub struct OpenAiTranscribeAdapter {
    name: String,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiTranscribeAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            client,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiTranscribeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn usage_mapping(&self) -> UsageMapping {
        UsageMapping::OPENAI
    }

    async fn invoke(
        &self,
        request: &GenerationRequest,
        _ctx: &AttemptContext,
    ) -> Result<RawEventStream, GatewayError> {
        let (data, mime) = request.audio().ok_or_else(|| {
            GatewayError::InvalidParameter("transcription request requires an audio payload".into())
        })?;
        let file_name = format!("audio.{}", extension_for_mime(mime).unwrap_or("bin"));
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| GatewayError::InvalidParameter(format!("invalid audio mime: {e}")))?;
        let model = request.options.model.as_deref().unwrap_or(&self.model);
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", model.to_string());
        if let Some(language) = &request.options.language {
            form = form.text("language", language.clone());
        }

        let mut builder = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::transport(&self.name, e.to_string()))?;
        let response = ensure_success(&self.name, response).await?;
        let value: Value = response.json().await.map_err(|e| {
            GatewayError::transport(&self.name, format!("malformed response body: {e}"))
        })?;
        let content = value
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::transport(&self.name, "malformed response body: missing text")
            })?
            .to_string();
        let usage = value.get("usage").filter(|u| !u.is_null()).cloned();
        Ok(complete_stream(content, usage))
    }
}
