//! Resolving one room: connection info plus optional lobby.

use std::sync::Arc;

use hathora_control::{CancelToken, ControlPlane, ControlPlaneError, Operation, PollConfig};
use hathora_model::{Lobby, RoomContext, RoomId, RoomInfo};
use tracing::{debug, trace};

use crate::ResolveError;

/// What [`RoomResolver::resolve_room`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutcome {
    /// Connection info is active. The context is not validated yet.
    Resolved(RoomContext),
    Cancelled,
}

/// Turns a room from the active-room list into a [`RoomContext`].
///
/// The connection poll and the lobby fetch both give up as soon as the
/// token fires, and cancellation is checked again between steps. A
/// cancelled resolution never yields a partial context.
pub struct RoomResolver<C> {
    control: Arc<C>,
    poll: PollConfig,
}

impl<C> Clone for RoomResolver<C> {
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            poll: self.poll.clone(),
        }
    }
}

impl<C: ControlPlane> RoomResolver<C> {
    pub fn new(control: Arc<C>, poll: PollConfig) -> Self {
        Self { control, poll }
    }

    /// Resolves `room`.
    ///
    /// With `lobby_expected`, any failure to fetch the lobby (including
    /// its absence) is [`ResolveError::LobbyRequired`]. Without it, a
    /// missing lobby is fine but any other lobby failure still surfaces
    /// as [`ResolveError::Remote`].
    pub async fn resolve_room(
        &self,
        room: &RoomInfo,
        lobby_expected: bool,
        cancel: &CancelToken,
    ) -> Result<RoomOutcome, ResolveError> {
        if cancel.is_cancelled() {
            return Ok(RoomOutcome::Cancelled);
        }

        let room_id = &room.room_id;
        let connection = self
            .control
            .poll_connection_info_until_active(room_id, &self.poll, cancel)
            .await
            .map_err(|source| ResolveError::Remote {
                op: Operation::GetConnectionInfo,
                id: room_id.to_string(),
                source,
            })?;

        if cancel.is_cancelled() {
            return Ok(RoomOutcome::Cancelled);
        }

        let Some(connection) = connection else {
            return Err(ResolveError::NoConnectionInfo(room_id.clone()));
        };
        debug!(
            %room_id,
            endpoint = ?connection.exposed_port.as_ref().map(ToString::to_string),
            "room connection info active"
        );

        let Some(fetched) = cancel
            .run_until_cancelled(self.control.get_lobby_info(room_id))
            .await
        else {
            return Ok(RoomOutcome::Cancelled);
        };
        let lobby = lobby_from(room_id, fetched, lobby_expected)?;

        if cancel.is_cancelled() {
            return Ok(RoomOutcome::Cancelled);
        }

        Ok(RoomOutcome::Resolved(RoomContext::new(
            room.clone(),
            Some(connection),
            lobby,
        )))
    }
}

fn lobby_from(
    room_id: &RoomId,
    fetched: Result<Lobby, ControlPlaneError>,
    lobby_expected: bool,
) -> Result<Option<Lobby>, ResolveError> {
    match fetched {
        Ok(lobby) => Ok(Some(lobby)),
        Err(source) if lobby_expected => Err(ResolveError::LobbyRequired {
            room_id: room_id.clone(),
            source,
        }),
        Err(ControlPlaneError::NotFound { .. }) => {
            trace!(%room_id, "room has no lobby");
            Ok(None)
        }
        Err(source) => Err(ResolveError::Remote {
            op: Operation::GetLobbyInfo,
            id: room_id.to_string(),
            source,
        }),
    }
}
