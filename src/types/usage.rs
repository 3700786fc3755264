//! Normalized usage accounting.

use serde::{Deserialize, Serialize};

/// Token/unit usage reported by a provider, normalized into one schema.
/// Every count is optional: a provider that doesn't report usage is recorded
/// as absent, never as zero: a defaulted zero would be indistinguishable
/// from a genuinely free response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider_name: String,
    pub input_units: Option<u64>,
    pub output_units: Option<u64>,
    pub total_units: Option<u64>,
}

impl UsageRecord {
    pub fn empty(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            input_units: None,
            output_units: None,
            total_units: None,
        }
    }

    /// Whether any component was actually reported.
    pub fn is_reported(&self) -> bool {
        self.input_units.is_some() || self.output_units.is_some()
    }
}
