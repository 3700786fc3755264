//! Usage aggregation across heterogeneous provider reporting.
//!
//! Field-name mapping is provider-specific and declared per adapter: the
//! local model server reports `prompt_eval_count`/`eval_count`, the
//! OpenAI-compatible dialect reports `prompt_tokens`/`completion_tokens`.

use serde_json::Value;

use crate::types::UsageRecord;

/// Field names under which one provider dialect reports usage counts.
#[derive(Debug, Clone, Copy)]
pub struct UsageMapping {
    pub input_field: &'static str,
    pub output_field: &'static str,
}

impl UsageMapping {
    /// OpenAI-compatible dialect.
    pub const OPENAI: Self = Self {
        input_field: "prompt_tokens",
        output_field: "completion_tokens",
    };

    /// Local model server (Ollama-style) dialect.
    pub const OLLAMA: Self = Self {
        input_field: "prompt_eval_count",
        output_field: "eval_count",
    };
}

/// Merge a raw provider usage object into a `UsageRecord`. The total is the
/// sum only when both components are present; otherwise it stays absent.
/// Returns `None` when the provider reported nothing at all.
pub fn merge(provider: &str, raw: Option<&Value>, mapping: &UsageMapping) -> Option<UsageRecord> {
    let raw = raw?;
    let input_units = raw.get(mapping.input_field).and_then(Value::as_u64);
    let output_units = raw.get(mapping.output_field).and_then(Value::as_u64);
    if input_units.is_none() && output_units.is_none() {
        return None;
    }
    let total_units = match (input_units, output_units) {
        (Some(i), Some(o)) => Some(i + o),
        _ => None,
    };
    Some(UsageRecord {
        provider_name: provider.to_string(),
        input_units,
        output_units,
        total_units,
    })
}
