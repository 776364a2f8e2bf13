use std::fmt;

/// Which kind of control-plane record a request was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Process,
    ConnectionInfo,
    Lobby,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::ConnectionInfo => write!(f, "connection info"),
            Self::Lobby => write!(f, "lobby"),
        }
    }
}

/// Errors returned by a [`ControlPlane`](crate::ControlPlane).
///
/// `Clone` so one failed resolution can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlPlaneError {
    /// The record does not exist (HTTP 404).
    #[error("{resource} {id} not found")]
    NotFound { resource: Resource, id: String },

    /// The control plane rejected our credentials (HTTP 401/403).
    #[error("unauthorized")]
    Unauthorized,

    /// The request could not be completed (network, 5xx, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The response arrived but could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ControlPlaneError {
    pub fn not_found(resource: Resource, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Returns `true` for the "does not exist" outcome, which callers often
    /// treat as an expected absence rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
