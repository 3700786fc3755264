//! Core data types for the gateway.
//!
//! One file per concern; everything is re-exported at the module root.

mod attempt;
mod chunk;
mod provider;
mod request;
mod usage;

pub use attempt::{Attempt, AttemptFailure, AttemptState};
pub use chunk::{CanonicalChunk, ChunkStream, ChunkStreamHandle, GenerationResponse};
pub use provider::{
    Capability, ConnectionInfo, ProtocolClass, ProviderDescriptor, StreamFraming,
};
pub use request::{GenerationRequest, RequestKind, RequestOptions, RequestPayload};
pub use usage::UsageRecord;
