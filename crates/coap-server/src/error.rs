//! Resource server error types.

use thiserror::Error;

/// Failures of endpoint registration and removal. All are reported and
/// leave the tree untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("resource not found: {path}")]
    ResourceNotFound { path: String },

    #[error("cannot register {path}: {reason}")]
    PathConflict { path: String, reason: String },

    #[error("resource {path} is registered by another owner")]
    NotOwner { path: String },
}

/// Failures of [`WorkerPool::submit`](crate::WorkerPool::submit).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The pool was shut down while the submitter waited for queue space.
    #[error("interrupted while waiting for queue space (tenant {tenant_id})")]
    Interrupted { tenant_id: i32 },

    #[error("worker pool is shut down")]
    ShutDown,

    /// No worker is running and none could be started.
    #[error("no worker thread available (tenant {tenant_id})")]
    NoWorkers { tenant_id: i32 },
}
