//! Unified error type for dashreel.
//!
//! Every boundary-facing failure funnels into [`Error`], which carries enough
//! context for HTTP handlers to derive a status code via [`Error::http_status`].

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in dashreel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested path resolves outside the configured media root.
    #[error("Path outside sandbox: {}", path.display())]
    OutsideSandbox {
        /// The path as requested by the caller.
        path: PathBuf,
    },

    /// The media root is unset or unusable.
    #[error("Misconfigured root: {0}")]
    MisconfiguredRoot(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "file", "directory").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The external encoder failed or produced no manifest.
    #[error("Transcode failed for {}: {detail}", source_path.display())]
    TranscodeFailed {
        /// The source that was being transcoded.
        source_path: PathBuf,
        /// Diagnostic detail from the encoder.
        detail: String,
    },

    /// A read failed while a response body was being streamed.
    #[error("Stream I/O error: {source}")]
    StreamIo {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external tool could not be located or launched.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::OutsideSandbox { .. } => 403,
            Error::MisconfiguredRoot(_) => 500,
            Error::NotFound { .. } => 404,
            Error::TranscodeFailed { .. } => 500,
            Error::StreamIo { .. } => 500,
            Error::Validation(_) => 400,
            Error::Tool { .. } => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::OutsideSandbox { .. } => "outside_sandbox",
            Error::MisconfiguredRoot(_) => "misconfigured_root",
            Error::NotFound { .. } => "not_found",
            Error::TranscodeFailed { .. } => "transcode_failed",
            Error::StreamIo { .. } => "stream_io_error",
            Error::Validation(_) => "validation_error",
            Error::Tool { .. } => "tool_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::OutsideSandbox`].
    pub fn outside_sandbox(path: impl AsRef<Path>) -> Self {
        Error::OutsideSandbox {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::TranscodeFailed`].
    pub fn transcode_failed(source_path: impl AsRef<Path>, detail: impl Into<String>) -> Self {
        Error::TranscodeFailed {
            source_path: source_path.as_ref().to_path_buf(),
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
