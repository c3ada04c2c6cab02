//! The kernel-wide error taxonomy.
//!
//! Every subsystem crate defines its own local error enum and converts into
//! [`KernelError`] at its public boundary. The wire protocol never sees a
//! stack trace: [`KernelError::wire_code`] is the only thing serialized back
//! to a client, paired with a human message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The nine-member error taxonomy from the kernel specification.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum KernelError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("tool error: {0}")]
    ToolError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KernelError {
    /// The stable string the wire protocol uses, per spec.md §7.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::SandboxUnavailable(_) => "sandbox_unavailable",
            Self::ToolError(_) => "tool_error",
            Self::Timeout(_) => "timeout",
            Self::NetworkError(_) => "network_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        Self::Forbidden(what.into())
    }

    pub fn unauthorized(what: impl Into<String>) -> Self {
        Self::Unauthorized(what.into())
    }
}

/// A wire-safe rendering of a [`KernelError`], used as the payload of
/// `response.error` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub error: String,
    pub message: String,
}

impl From<&KernelError> for WireError {
    fn from(e: &KernelError) -> Self {
        Self {
            error: e.wire_code().to_string(),
            message: e.message(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
