//! Aggregates built by the resolver: [`RoomContext`] and [`ServerContext`].

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{
    AddrError, ConnectionInfo, ConnectionStatus, Lobby, ProcessId,
    ProcessInfo, Region, RoomInfo, RoomStatus,
};

// ---------------------------------------------------------------------------
// ContextDefect
// ---------------------------------------------------------------------------

/// The first clause of the validity predicate a context fails.
///
/// Clauses are checked in predicate order, so a context missing both its
/// connection info and its lobby reports `NoConnectionInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextDefect {
    /// No connection info was attached to the room.
    NoConnectionInfo,
    /// Connection info exists but its status is not `Active`.
    ConnectionNotActive(ConnectionStatus),
    /// Connection info is `Active` but carries no exposed port.
    NoExposedPort,
    /// The room itself is not `Active`.
    RoomNotActive(RoomStatus),
    /// A lobby was expected but none was found.
    LobbyMissing,
}

impl fmt::Display for ContextDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnectionInfo => write!(f, "no connection info"),
            Self::ConnectionNotActive(s) => {
                write!(f, "connection status is {s}, expected active")
            }
            Self::NoExposedPort => write!(f, "connection has no exposed port"),
            Self::RoomNotActive(s) => {
                write!(f, "room status is {s}, expected active")
            }
            Self::LobbyMissing => write!(f, "lobby expected but missing"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomContext
// ---------------------------------------------------------------------------

/// A room together with its connection info and optional lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomContext {
    pub room: RoomInfo,
    pub connection: Option<ConnectionInfo>,
    pub lobby: Option<Lobby>,
}

impl RoomContext {
    pub fn new(
        room: RoomInfo,
        connection: Option<ConnectionInfo>,
        lobby: Option<Lobby>,
    ) -> Self {
        Self {
            room,
            connection,
            lobby,
        }
    }

    /// Returns the first failing validity clause, or `None` if valid.
    pub fn defect(&self, lobby_expected: bool) -> Option<ContextDefect> {
        let Some(conn) = &self.connection else {
            return Some(ContextDefect::NoConnectionInfo);
        };
        if conn.status != ConnectionStatus::Active {
            return Some(ContextDefect::ConnectionNotActive(conn.status));
        }
        if conn.exposed_port.is_none() {
            return Some(ContextDefect::NoExposedPort);
        }
        if self.room.status != RoomStatus::Active {
            return Some(ContextDefect::RoomNotActive(self.room.status));
        }
        if lobby_expected && self.lobby.is_none() {
            return Some(ContextDefect::LobbyMissing);
        }
        None
    }

    /// Active connection with a port, active room, and a lobby if one is
    /// expected.
    pub fn is_valid(&self, lobby_expected: bool) -> bool {
        self.defect(lobby_expected).is_none()
    }

    /// Returns `true` if the connection info carries a non-zero port.
    pub fn has_port(&self) -> bool {
        self.host_port().is_some_and(|(_, port)| port > 0)
    }

    /// The room's public `(host, port)`, without DNS resolution.
    pub fn host_port(&self) -> Option<(&str, u16)> {
        self.connection
            .as_ref()
            .and_then(|c| c.exposed_port.as_ref())
            .map(|p| (p.host.as_str(), p.port))
    }

    /// The room's public endpoint formatted as `"host:port"`.
    pub fn endpoint(&self) -> Option<String> {
        self.host_port().map(|(host, port)| format!("{host}:{port}"))
    }

    /// Resolves the public host to a socket address, preferring IPv4.
    ///
    /// Suspends while DNS resolution runs. Returns
    /// [`AddrError::NoExposedPort`] when there is nothing to resolve, which
    /// callers should treat differently from a lookup failure.
    pub async fn resolve_socket_addr(&self) -> Result<SocketAddr, AddrError> {
        let (host, port) = self.host_port().ok_or_else(|| {
            AddrError::NoExposedPort(self.room.room_id.clone())
        })?;

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| AddrError::Lookup {
                host: host.to_string(),
                source,
            })?
            .collect();

        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| AddrError::NoAddress(host.to_string()))
    }
}

impl fmt::Display for RoomContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid = self.is_valid(self.lobby.is_some());
        write!(
            f,
            "room={} room_status={} valid={valid} endpoint={}",
            self.room.room_id,
            self.room.status,
            self.endpoint().as_deref().unwrap_or("none"),
        )?;
        match &self.lobby {
            Some(lobby) => write!(f, " lobby_created_by={}", lobby.created_by),
            None => write!(f, " lobby=none"),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerContext
// ---------------------------------------------------------------------------

/// Everything a dedicated server learned about itself in one resolution.
///
/// Built once per successful resolution and shared behind an `Arc`.
/// A later resolution produces a new value rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerContext {
    /// The process id used to resolve (from the environment or an override).
    pub process_id_source: ProcessId,
    pub process: ProcessInfo,
    /// Active rooms in control-plane order.
    pub active_rooms: Vec<RoomInfo>,
    /// Resolved context of `active_rooms[0]`.
    pub first_room: RoomContext,
}

impl ServerContext {
    pub fn new(
        process_id_source: ProcessId,
        process: ProcessInfo,
        active_rooms: Vec<RoomInfo>,
        first_room: RoomContext,
    ) -> Self {
        Self {
            process_id_source,
            process,
            active_rooms,
            first_room,
        }
    }

    /// Returns the first failing validity clause of the first room.
    pub fn defect(&self, lobby_expected: bool) -> Option<ContextDefect> {
        self.first_room.defect(lobby_expected)
    }

    pub fn is_valid(&self, lobby_expected: bool) -> bool {
        self.first_room.is_valid(lobby_expected)
    }

    pub fn region(&self) -> Region {
        self.process.region
    }

    pub fn lobby(&self) -> Option<&Lobby> {
        self.first_room.lobby.as_ref()
    }

    pub fn host_port(&self) -> Option<(&str, u16)> {
        self.first_room.host_port()
    }

    pub fn endpoint(&self) -> Option<String> {
        self.first_room.endpoint()
    }

    pub async fn resolve_socket_addr(&self) -> Result<SocketAddr, AddrError> {
        self.first_room.resolve_socket_addr().await
    }
}

impl fmt::Display for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "process={} status={:?} region={} active_rooms={} first_room=[{}]",
            self.process.process_id,
            self.process.status,
            self.process.region,
            self.active_rooms.len(),
            self.first_room,
        )
    }
}
