//! Unified error type for the server runtime.

use hathora_control::ControlPlaneError;
use hathora_model::{AddrError, ModelError};
use hathora_resolver::ResolveError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` lets `?` convert any sub-crate error, so callers of
/// [`ServerRuntime`](crate::ServerRuntime) handle a single type.
#[derive(Debug, thiserror::Error)]
pub enum HathoraError {
    /// Resolving the server context failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A direct control-plane call failed.
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    /// Model data could not be interpreted (lobby config, region name).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The room's public address could not be resolved.
    #[error(transparent)]
    Addr(#[from] AddrError),

    /// The session bootstrapper refused to start.
    #[error("session start failed: {0}")]
    SessionStart(String),

    /// The resolution deadline elapsed or the run was cancelled.
    #[error("server context resolution was cancelled")]
    Cancelled,
}
