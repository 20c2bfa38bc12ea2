//! Error kinds with distinct handling policies.
//!
//! - ClientInput: request-scoped, becomes a 4xx response.
//! - TransientIo: background snapshot/cleanup failure, logged, retried next cycle.
//! - StartupIntegrity: fatal, the store refuses to start serving.
//!
//! Most of the crate works with `anyhow::Result`; these kinds are wrapped into
//! `anyhow::Error` and recovered with `downcast_ref::<StoreError>()` where the
//! policy matters.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{reason} (http {status})")]
    ClientInput { status: u16, reason: String },

    #[error("{op} failed: {cause:#}")]
    TransientIo {
        op: &'static str,
        cause: anyhow::Error,
    },

    #[error("startup integrity: {cause:#}")]
    StartupIntegrity { cause: anyhow::Error },
}

impl StoreError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        StoreError::ClientInput {
            status: 400,
            reason: reason.into(),
        }
    }

    pub fn too_large(limit: u64) -> Self {
        StoreError::ClientInput {
            status: 413,
            reason: format!("request body exceeds {} bytes", limit),
        }
    }

    pub fn transient(op: &'static str, cause: anyhow::Error) -> Self {
        StoreError::TransientIo { op, cause }
    }

    pub fn startup(cause: anyhow::Error) -> Self {
        StoreError::StartupIntegrity { cause }
    }

    /// HTTP status for request-scoped errors; 500 for the rest.
    pub fn http_status(&self) -> u16 {
        match self {
            StoreError::ClientInput { status, .. } => *status,
            _ => 500,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::StartupIntegrity { .. })
    }
}
