//! # ai-gateway
//!
//! Provider orchestration gateway for chat generation and audio
//! transcription. Accepts one request shape, dispatches it to
//! protocol-incompatible AI backends (a locally hosted model server, one
//! or more OpenAI-compatible cloud providers, a local transcription
//! command), normalizes their sync/streaming protocols into one canonical
//! chunk stream, and recovers from upstream failure by falling back to
//! alternate providers, with scratch resources cleaned up on every exit
//! path including caller cancellation.
//!
//! ```rust,ignore
//! use ai_gateway::prelude::*;
//!
//! let gateway = Gateway::new(config)?;
//! let mut handle = gateway.submit(GenerationRequest::chat("suggest a warm-up"))?;
//! while let Some(chunk) = handle.stream.next().await {
//!     let chunk = chunk?;
//!     if chunk.is_final {
//!         break;
//!     }
//!     print!("{}", chunk.content);
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod resource;
pub mod stream;
pub mod telemetry;
pub mod types;
pub mod usage;
pub mod util;

pub use config::{AdapterKind, GatewayConfig, OrchestratorLimits, ProviderConfig};
pub use error::GatewayError;
pub use orchestrator::Gateway;
pub use registry::{ProviderRegistry, RegisteredProvider};
pub use types::{
    CanonicalChunk, ChunkStream, ChunkStreamHandle, GenerationRequest, GenerationResponse,
    RequestOptions, UsageRecord,
};

/// Common imports for gateway hosts.
pub mod prelude {
    pub use crate::config::{GatewayConfig, OrchestratorLimits};
    pub use crate::error::GatewayError;
    pub use crate::orchestrator::Gateway;
    pub use crate::types::{
        CanonicalChunk, ChunkStreamHandle, GenerationRequest, GenerationResponse, RequestOptions,
    };
    pub use futures_util::StreamExt;
}
