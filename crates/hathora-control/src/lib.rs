//! Control-plane boundary for Hathora server context resolution.
//!
//! The REST client that talks to Hathora is an external collaborator. This
//! crate only describes what the resolver needs from it, as the
//! [`ControlPlane`] trait, plus the pieces every implementation shares:
//!
//! - [`CancelToken`]: one shared cancellation signal threaded through a
//!   whole resolution
//! - [`PollConfig`]: interval, jitter and attempt cap for the
//!   connection-info poll
//! - [`ControlPlaneError`]: typed failures, with "not found" kept apart
//!   from real outages
//!
//! # Feature Flags
//!
//! - `memory` (off by default): `InMemoryControlPlane`, a scripted control
//!   plane for tests and local emulation of a deployed process

mod cancel;
mod error;
#[cfg(feature = "memory")]
mod memory;
mod poll;

pub use cancel::CancelToken;
pub use error::{ControlPlaneError, Resource};
#[cfg(feature = "memory")]
pub use memory::{Call, InMemoryControlPlane};
pub use poll::{PollConfig, poll_until_active};

use std::fmt;
use std::future::Future;

use hathora_model::{ConnectionInfo, Lobby, ProcessId, ProcessInfo, RoomId, RoomInfo};

/// The remote operations the resolver performs, by name.
///
/// Used in error context and by the in-memory control plane for failure
/// injection and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetProcessInfo,
    GetActiveRoomsForProcess,
    GetConnectionInfo,
    GetLobbyInfo,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetProcessInfo => write!(f, "GetProcessInfo"),
            Self::GetActiveRoomsForProcess => {
                write!(f, "GetActiveRoomsForProcess")
            }
            Self::GetConnectionInfo => write!(f, "GetConnectionInfo"),
            Self::GetLobbyInfo => write!(f, "GetLobbyInfo"),
        }
    }
}

/// Async access to Hathora's control plane.
///
/// Implementations wrap a REST client authenticated with the app secret.
/// Every method is a suspension point; none of them retry on their own
/// except [`poll_connection_info_until_active`](Self::poll_connection_info_until_active).
///
/// Callers race the single-shot fetches against their [`CancelToken`]
/// with [`CancelToken::run_until_cancelled`], so an implementation must
/// tolerate its futures being dropped mid-request.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` so one client can be shared behind an `Arc`
/// by concurrent resolutions.
pub trait ControlPlane: Send + Sync + 'static {
    /// Fetches a process by id.
    fn get_process_info(
        &self,
        process_id: &ProcessId,
    ) -> impl Future<Output = Result<ProcessInfo, ControlPlaneError>> + Send;

    /// Lists the active rooms of a process, in control-plane order.
    fn get_active_rooms_for_process(
        &self,
        process_id: &ProcessId,
    ) -> impl Future<Output = Result<Vec<RoomInfo>, ControlPlaneError>> + Send;

    /// Fetches the current connection info of a room.
    ///
    /// Returns [`ControlPlaneError::NotFound`] while the room is still
    /// being scheduled.
    fn get_connection_info(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<ConnectionInfo, ControlPlaneError>> + Send;

    /// Fetches the lobby attached to a room.
    ///
    /// A room without a lobby yields [`ControlPlaneError::NotFound`].
    fn get_lobby_info(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Lobby, ControlPlaneError>> + Send;

    /// Polls [`get_connection_info`](Self::get_connection_info) until the
    /// room reports `Active`.
    ///
    /// Returns `Ok(None)` if `cancel` fires or `config.max_attempts` runs
    /// out. Defaults to [`poll_until_active`]; clients with a server-side
    /// long-poll can override it.
    fn poll_connection_info_until_active(
        &self,
        room_id: &RoomId,
        config: &PollConfig,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Option<ConnectionInfo>, ControlPlaneError>> + Send
    {
        poll_until_active(self, room_id, config, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::GetLobbyInfo.to_string(), "GetLobbyInfo");
        assert_eq!(
            Operation::GetActiveRoomsForProcess.to_string(),
            "GetActiveRoomsForProcess"
        );
    }

    #[test]
    fn test_not_found_helper() {
        let err = ControlPlaneError::not_found(Resource::Lobby, "r-1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "lobby r-1 not found");
        assert!(!ControlPlaneError::Unauthorized.is_not_found());
    }

    #[test]
    fn test_operation_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Operation::GetProcessInfo, 1);
        map.insert(Operation::GetLobbyInfo, 2);
        assert_eq!(map[&Operation::GetLobbyInfo], 2);
    }
}
