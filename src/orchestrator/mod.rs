//! Fallback orchestration.
//!
//! Drives one request through its candidate providers in priority order.
//! A transport-level failure before any output advances to the next
//! candidate invisibly; a failure after partial delivery is terminal,
//! because a different provider cannot coherently continue a partial
//! answer. Per-attempt budgets keep a slow first candidate from starving
//! the fallbacks: each attempt gets `min(ceiling, remaining / candidates
//! left)`, and below a floor no further attempt is dispatched.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::time::Instant;

use crate::config::{GatewayConfig, OrchestratorLimits};
use crate::error::GatewayError;
use crate::registry::{ProviderRegistry, RegisteredProvider};
use crate::resource::{ScratchFile, ScratchStore};
use crate::stream::normalize;
use crate::types::{
    Attempt, AttemptFailure, CanonicalChunk, ChunkStream, ChunkStreamHandle, GenerationRequest,
    GenerationResponse,
};
use crate::util::cancel::make_cancellable_stream;

/// The gateway facade: registry plus orchestration policy. Cheap to share;
/// all state is read-only after construction.
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    scratch: ScratchStore,
    limits: OrchestratorLimits,
}

impl Gateway {
    /// Build a gateway from injected configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let registry = ProviderRegistry::from_config(&config)?;
        Ok(Self {
            registry: Arc::new(registry),
            scratch: ScratchStore::new(),
            limits: config.limits,
        })
    }

    /// Build a gateway around a pre-assembled registry. Hosts and tests use
    /// this to install custom adapters behind the same orchestration.
    pub fn with_registry(registry: ProviderRegistry, limits: OrchestratorLimits) -> Self {
        Self {
            registry: Arc::new(registry),
            scratch: ScratchStore::new(),
            limits,
        }
    }

    /// Place scratch files under a specific directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.scratch = ScratchStore::in_dir(dir);
        self
    }

    /// Submit a request and get its canonical chunk stream. Provider
    /// eligibility is validated here, before any network call; the stream
    /// itself is lazy and does nothing until polled. The returned handle's
    /// cancel (or dropping the stream) aborts the active attempt, closes
    /// its upstream connection and releases its scratch resources.
    pub fn submit(&self, request: GenerationRequest) -> Result<ChunkStreamHandle, GatewayError> {
        let candidates = self.registry.candidate_order(&request)?;
        let stream = run_request(
            request,
            candidates,
            self.scratch.clone(),
            self.limits.clone(),
        );
        let (stream, cancel) = make_cancellable_stream(stream);
        Ok(ChunkStreamHandle { stream, cancel })
    }

    /// Submit and collect into a single terminal response, for callers that
    /// don't want streaming.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GatewayError> {
        let mut handle = self.submit(request)?;
        let mut content = String::new();
        let mut usage = None;
        let mut provider = String::new();
        while let Some(item) = handle.stream.next().await {
            let chunk = item?;
            provider = chunk.provider.clone();
            if chunk.is_final {
                usage = chunk.usage;
                break;
            }
            content.push_str(&chunk.content);
        }
        Ok(GenerationResponse {
            content,
            usage,
            provider,
        })
    }
}

/// Outcome of consuming one attempt's normalized stream.
enum AttemptOutcome {
    /// The final marker arrived; held back until scratch release so the
    /// attempt's resources are gone before its terminal state is visible.
    Finished(CanonicalChunk),
    Failed(GatewayError),
}

fn run_request(
    request: GenerationRequest,
    candidates: Vec<Arc<RegisteredProvider>>,
    scratch: ScratchStore,
    limits: OrchestratorLimits,
) -> ChunkStream {
    let s = async_stream::stream! {
        let deadline = Instant::now() + request.deadline;
        let total = candidates.len();
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for (idx, candidate) in candidates.into_iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let left = (total - idx) as u32;
            let budget = (remaining / left).min(limits.per_attempt_ceiling());
            if budget < limits.min_attempt_budget() {
                tracing::warn!(
                    request_id = %request.id,
                    remaining_ms = remaining.as_millis() as u64,
                    "deadline budget too small for another attempt"
                );
                break;
            }
            if idx > 0 && limits.fallback_jitter_ms > 0 {
                // Brief jittered pacing before re-dispatching elsewhere.
                let pause = rand::thread_rng().gen_range(0..=limits.fallback_jitter_ms);
                tokio::time::sleep(Duration::from_millis(pause)).await;
            }

            let name = candidate.descriptor.name.clone();
            let mut attempt = Attempt::new(&request.id, &name);
            tracing::debug!(
                request_id = %request.id,
                provider = %name,
                rank = idx,
                budget_ms = budget.as_millis() as u64,
                "dispatching attempt"
            );

            // Scratch materialization is per attempt, never reused across
            // attempts: the second provider of a fallback chain gets its own
            // fresh file.
            let mut scratch_file: Option<ScratchFile> = None;
            if candidate.adapter.needs_scratch_file() {
                let Some((data, mime)) = request.audio() else {
                    attempt.fail();
                    failures.push(AttemptFailure {
                        provider: name.clone(),
                        error: "adapter needs a scratch file but the payload is text".into(),
                    });
                    continue;
                };
                match scratch.materialize(&request.id, data, mime).await {
                    Ok(file) => scratch_file = Some(file),
                    Err(e) => {
                        attempt.fail();
                        tracing::warn!(
                            request_id = %request.id,
                            provider = %name,
                            error = %e,
                            "scratch materialization failed"
                        );
                        failures.push(AttemptFailure {
                            provider: name.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                }
            }
            let ctx = crate::adapters::AttemptContext {
                request_id: request.id.clone(),
                scratch_path: scratch_file.as_ref().map(|f| f.path().to_path_buf()),
            };

            let attempt_deadline = Instant::now() + budget;
            let raw = match tokio::time::timeout_at(
                attempt_deadline,
                candidate.adapter.invoke(&request, &ctx),
            )
            .await
            {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    if let Some(file) = scratch_file.take() {
                        file.release();
                    }
                    attempt.fail();
                    tracing::debug!(
                        request_id = %request.id,
                        provider = %name,
                        elapsed_ms = attempt.elapsed_ms(),
                        error = %e,
                        "attempt failed before output, falling back"
                    );
                    failures.push(AttemptFailure {
                        provider: name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
                Err(_) => {
                    if let Some(file) = scratch_file.take() {
                        file.release();
                    }
                    attempt.fail();
                    failures.push(AttemptFailure {
                        provider: name.clone(),
                        error: "attempt timed out before producing output".into(),
                    });
                    continue;
                }
            };
            attempt.mark_streaming();

            let mut chunks = normalize(raw, &candidate);
            let mut delivered: u64 = 0;
            let outcome = loop {
                match tokio::time::timeout_at(attempt_deadline, chunks.next()).await {
                    Ok(Some(Ok(chunk))) => {
                        if chunk.is_final {
                            break AttemptOutcome::Finished(chunk);
                        }
                        delivered += 1;
                        yield Ok(chunk);
                    }
                    Ok(Some(Err(e))) => break AttemptOutcome::Failed(e),
                    Ok(None) => {
                        break AttemptOutcome::Failed(GatewayError::Stream(format!(
                            "stream from provider '{name}' ended unexpectedly"
                        )));
                    }
                    Err(_) => {
                        break AttemptOutcome::Failed(GatewayError::transport(
                            &name,
                            "attempt deadline elapsed",
                        ));
                    }
                }
            };

            // Close the upstream connection and release this attempt's
            // scratch file before the attempt reaches a terminal state.
            drop(chunks);
            if let Some(file) = scratch_file.take() {
                file.release();
            }

            match outcome {
                AttemptOutcome::Finished(final_chunk) => {
                    attempt.complete(final_chunk.usage.clone());
                    tracing::debug!(
                        request_id = %request.id,
                        provider = %name,
                        chunks = delivered + 1,
                        elapsed_ms = attempt.elapsed_ms(),
                        "attempt completed"
                    );
                    yield Ok(final_chunk);
                    return;
                }
                AttemptOutcome::Failed(e) => {
                    attempt.fail();
                    if delivered > 0 {
                        // Partial output already reached the caller; a new
                        // provider cannot continue it. Terminal.
                        tracing::warn!(
                            request_id = %request.id,
                            provider = %name,
                            delivered,
                            error = %e,
                            "stream failed after partial delivery"
                        );
                        yield Err(GatewayError::PartialStream {
                            provider: name,
                            delivered,
                            message: e.to_string(),
                        });
                        return;
                    }
                    tracing::debug!(
                        request_id = %request.id,
                        provider = %name,
                        elapsed_ms = attempt.elapsed_ms(),
                        error = %e,
                        "attempt failed before output, falling back"
                    );
                    failures.push(AttemptFailure {
                        provider: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::warn!(
            request_id = %request.id,
            attempts = failures.len(),
            "all providers exhausted"
        );
        yield Err(GatewayError::AllProvidersExhausted { attempts: failures });
    };
    Box::pin(s)
}
