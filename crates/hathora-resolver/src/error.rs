//! Error types for the resolver layer.

use hathora_control::{ControlPlaneError, Operation};
use hathora_model::{ContextDefect, ProcessId, RoomId};

/// Whether a failure came from talking to the platform or from what it
/// answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A fetch failed or returned nothing usable.
    Remote,
    /// Every fetch succeeded but the combined answer is inconsistent.
    Validation,
}

/// Errors that end a resolution.
///
/// Expected outcomes (not deployed, process stopped, lobby absent when not
/// required, cancellation) are not errors; see
/// [`Resolution`](crate::Resolution).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// The control plane does not know the process, or returned one
    /// without an id.
    #[error("process {0} not found")]
    NoProcess(ProcessId),

    /// The process exists but has no active rooms.
    #[error("process {0} has no active rooms")]
    NoActiveRooms(ProcessId),

    /// Polling ended without the room's connection info becoming active.
    #[error("room {0} has no active connection info")]
    NoConnectionInfo(RoomId),

    /// A lobby was required but could not be fetched. `source` is
    /// `NotFound` when the room simply has no lobby.
    #[error("lobby required for room {room_id}: {source}")]
    LobbyRequired {
        room_id: RoomId,
        #[source]
        source: ControlPlaneError,
    },

    /// A control-plane request failed unexpectedly.
    #[error("{op} failed for {id}: {source}")]
    Remote {
        op: Operation,
        id: String,
        #[source]
        source: ControlPlaneError,
    },

    /// All fetches succeeded but the server context failed validation.
    #[error("server context for process {process_id} room {room_id} is invalid: {defect}")]
    InvalidContext {
        process_id: ProcessId,
        room_id: RoomId,
        defect: ContextDefect,
    },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidContext { .. } => ErrorKind::Validation,
            _ => ErrorKind::Remote,
        }
    }

    /// The room the failure relates to, when there is one. Covers remote
    /// failures of room-scoped operations too.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::NoConnectionInfo(room_id)
            | Self::LobbyRequired { room_id, .. }
            | Self::InvalidContext { room_id, .. } => Some(room_id.as_str()),
            Self::Remote {
                op: Operation::GetConnectionInfo | Operation::GetLobbyInfo,
                id,
                ..
            } => Some(id.as_str()),
            _ => None,
        }
    }
}
