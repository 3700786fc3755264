//! Cancellation utilities.
//!
//! Provides first-class cancellation handles for chunk streams. Cancelling
//! stops polling as soon as possible; dropping the cancelled stream closes
//! the underlying HTTP connection (or kills the child process) so providers
//! stop generating output.

use tokio_util::sync::CancellationToken;

use crate::types::ChunkStream;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Make a chunk stream cancellable and return its cancel handle.
pub fn make_cancellable_stream(stream: ChunkStream) -> (ChunkStream, CancelHandle) {
    let handle = CancelHandle::new();
    let token = handle.token.clone();
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures_util::StreamExt;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    (Box::pin(s), handle)
}
