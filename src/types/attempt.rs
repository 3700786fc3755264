//! Attempt records: one provider dispatch for one request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::usage::UsageRecord;

/// Lifecycle of one attempt. Exactly one attempt is active (`Dispatched` or
/// `Streaming`) per request at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Dispatched,
    Streaming,
    Completed,
    Failed,
}

/// One (request, provider) pairing. Superseded by another attempt when the
/// orchestrator falls back.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub request_id: String,
    pub provider: String,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
    pub usage: Option<UsageRecord>,
}

impl Attempt {
    pub fn new(request_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            provider: provider.into(),
            state: AttemptState::Dispatched,
            started_at: Utc::now(),
            usage: None,
        }
    }

    /// First raw event observed from the adapter.
    pub fn mark_streaming(&mut self) {
        self.state = AttemptState::Streaming;
    }

    pub fn complete(&mut self, usage: Option<UsageRecord>) {
        self.state = AttemptState::Completed;
        self.usage = usage;
    }

    pub fn fail(&mut self) {
        self.state = AttemptState::Failed;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AttemptState::Dispatched | AttemptState::Streaming)
    }

    /// Milliseconds since dispatch, for diagnostics.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

/// One recorded sub-failure, attached to `AllProvidersExhausted` for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub provider: String,
    pub error: String,
}
