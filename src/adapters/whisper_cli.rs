//! Adapter for a local transcription command.
//!
//! The configured argv is spawned with the attempt's scratch file path
//! appended; stdout is parsed as JSON `{ "text": … }` with a plain-text
//! fallback. Behind the adapter trait this is just another sync-json
//! provider: process mechanics get no special treatment, and the scratch
//! file lifecycle belongs to the resource manager like any other transient
//! input.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;

use super::{AttemptContext, ProviderAdapter, RawEventStream, complete_stream};
use crate::error::GatewayError;
use crate::types::GenerationRequest;
use crate::usage::UsageMapping;

pub struct WhisperCliAdapter {
    name: String,
    command: Vec<String>,
}

impl WhisperCliAdapter {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

#[async_trait]
impl ProviderAdapter for WhisperCliAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn usage_mapping(&self) -> UsageMapping {
        // The CLI reports no usage; the mapping never finds its fields.
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
        let path = ctx.scratch_path.as_ref().ok_or_else(|| {
            GatewayError::Internal("transcription attempt is missing its scratch file".into())
        })?;
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| GatewayError::Configuration("empty transcription command".into()))?;

        let output = tokio::process::Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the invocation (timeout or caller cancellation) must
            // stop the transcription process, not leave it running.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                GatewayError::transport(&self.name, format!("failed to run '{program}': {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let snippet: String = stderr.chars().take(200).collect();
            return Err(GatewayError::transport(
                &self.name,
                format!("'{program}' exited with {}: {snippet}", output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let content = serde_json::from_str::<Value>(stdout.trim())
            .ok()
            .and_then(|v| v.get("text").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_else(|| stdout.trim().to_string());
        Ok(complete_stream(content, None))
    }
}
