//! Scratch resource management.
//!
//! Some backends need the audio payload materialized to a filesystem path.
//! A `ScratchFile` is owned by exactly one attempt and is never reused: a
//! fallback's second provider gets its own fresh materialization. Explicit
//! `release` logs (but never propagates) deletion failure; dropping an
//! unreleased file deletes as a backstop, which is what guarantees cleanup
//! when a caller cancels mid-attempt.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempPath;

use crate::error::GatewayError;

/// Factory for per-attempt scratch files.
#[derive(Debug, Clone, Default)]
pub struct ScratchStore {
    dir: Option<PathBuf>,
}

impl ScratchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place scratch files under a specific directory instead of the system
    /// temp dir.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Write the payload to a uniquely named temporary file. The name
    /// carries the request id for traceability; the extension comes from
    /// the declared MIME, with content sniffing as fallback.
    pub async fn materialize(
        &self,
        request_id: &str,
        data: &Bytes,
        mime: &str,
    ) -> Result<ScratchFile, GatewayError> {
        let ext = extension_for_mime(mime)
            .or_else(|| infer::get(data).map(|kind| kind.extension()))
            .unwrap_or("bin");
        let prefix = format!("attempt-{request_id}-");
        let suffix = format!(".{ext}");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(&suffix);
        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| GatewayError::Resource(format!("failed to create scratch file: {e}")))?;
        let path = file.into_temp_path();
        tokio::fs::write(&*path, &data[..])
            .await
            .map_err(|e| GatewayError::Resource(format!("failed to write scratch file: {e}")))?;
        tracing::debug!(
            request_id,
            path = %path.display(),
            bytes = data.len(),
            "materialized scratch file"
        );
        Ok(ScratchFile { path: Some(path) })
    }
}

/// A transient file owned by one attempt. Deleted on `release` or on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        // The option is only vacated by `release`, which consumes self.
        self.path.as_deref().expect("scratch file already released")
    }

    /// Delete the file. Deletion failure is logged and recorded for
    /// observability, never surfaced as a request failure; the request
    /// itself may have succeeded.
    pub fn release(mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.to_path_buf();
            if let Err(e) = path.close() {
                let err = GatewayError::Resource(format!(
                    "failed to remove scratch file {}: {e}",
                    shown.display()
                ));
                tracing::warn!(error = %err, "scratch cleanup failed");
            } else {
                tracing::debug!(path = %shown.display(), "released scratch file");
            }
        }
    }
}

/// File extension for a declared audio MIME type.
pub(crate) fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.split(';').next().unwrap_or(mime).trim() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/webm" => Some("webm"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}
