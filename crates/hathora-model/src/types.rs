//! Control-plane records: what Hathora reports about processes, rooms,
//! connections and lobbies.
//!
//! Field names serialize in camelCase and statuses in lowercase, matching
//! the control plane's JSON so a REST client can deserialize straight into
//! these types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a compute process, assigned by the control plane.
///
/// A deployed server learns its own id from the `HATHORA_PROCESS_ID`
/// environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub String);

impl ProcessId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a room (a game-session slot bound to a process).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A Hathora Cloud region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Seattle,
    LosAngeles,
    WashingtonDC,
    Chicago,
    London,
    Frankfurt,
    Mumbai,
    Singapore,
    Tokyo,
    Sydney,
    SaoPaulo,
}

impl Region {
    /// Every region, in control-plane order.
    pub const ALL: [Region; 11] = [
        Self::Seattle,
        Self::LosAngeles,
        Self::WashingtonDC,
        Self::Chicago,
        Self::London,
        Self::Frankfurt,
        Self::Mumbai,
        Self::Singapore,
        Self::Tokyo,
        Self::Sydney,
        Self::SaoPaulo,
    ];

    /// The control-plane spelling, e.g. `"WashingtonDC"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seattle => "Seattle",
            Self::LosAngeles => "LosAngeles",
            Self::WashingtonDC => "WashingtonDC",
            Self::Chicago => "Chicago",
            Self::London => "London",
            Self::Frankfurt => "Frankfurt",
            Self::Mumbai => "Mumbai",
            Self::Singapore => "Singapore",
            Self::Tokyo => "Tokyo",
            Self::Sydney => "Sydney",
            Self::SaoPaulo => "SaoPaulo",
        }
    }

    /// A display name with spaces, e.g. `"Washington DC"`.
    pub fn friendly_name(&self) -> String {
        let name = self.as_str();
        let mut out = String::with_capacity(name.len() + 2);
        let mut prev: Option<char> = None;
        for c in name.chars() {
            // Break before an uppercase letter that follows a lowercase one
            // ("SaoPaulo") but keep acronyms together ("DC").
            if let Some(p) = prev {
                if c.is_uppercase() && p.is_lowercase() {
                    out.push(' ');
                }
            }
            out.push(c);
            prev = Some(c);
        }
        out
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ModelError;

    /// Parses a region name case-insensitively (`"seattle"`, `"Seattle"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ModelError::UnknownRegion(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Transport protocol of an exposed port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    #[default]
    Udp,
    Tls,
}

/// A publicly reachable `host:port` the control plane exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedPort {
    /// Port name from the deployment config (usually `"default"`).
    pub name: String,
    /// Public host name.
    pub host: String,
    /// Public port number.
    pub port: u16,
    #[serde(rename = "transportType", default)]
    pub transport: TransportKind,
}

impl ExposedPort {
    /// Creates a `"default"` UDP port, which is what most game servers expose.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            name: "default".to_string(),
            host: host.into(),
            port,
            transport: TransportKind::Udp,
        }
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// Lifecycle status of a compute process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Initializing,
    Active,
    Stopped,
}

/// Identity of the compute process this server runs in.
///
/// The exposed ports here belong to the container and may be set before
/// the process is reachable; dialability is decided by
/// [`ConnectionInfo::status`], not by these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub process_id: ProcessId,
    pub status: ProcessStatus,
    pub region: Region,
    #[serde(default)]
    pub exposed_port: Option<ExposedPort>,
    #[serde(default)]
    pub additional_exposed_ports: Vec<ExposedPort>,
}

impl ProcessInfo {
    /// Returns `true` if the control plane reports the process as stopped.
    pub fn is_stopped(&self) -> bool {
        self.status == ProcessStatus::Stopped
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Lifecycle status of a room. Only `Active` is accepted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Scheduling,
    Active,
    Suspended,
    Destroyed,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduling => write!(f, "scheduling"),
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// A room bound to a process, as listed by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub status: RoomStatus,
}

impl RoomInfo {
    /// Convenience constructor for an `Active` room.
    pub fn active(room_id: impl Into<String>) -> Self {
        Self {
            room_id: RoomId::new(room_id),
            status: RoomStatus::Active,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection info
// ---------------------------------------------------------------------------

/// Whether a room's endpoint is dialable yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Starting,
    Active,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Network reachability of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub room_id: RoomId,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub exposed_port: Option<ExposedPort>,
}

impl ConnectionInfo {
    /// An `Active` connection reachable at `host:port`.
    pub fn active(
        room_id: RoomId,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            room_id,
            status: ConnectionStatus::Active,
            exposed_port: Some(ExposedPort::new(host, port)),
        }
    }

    /// A `Starting` connection with no address yet.
    pub fn starting(room_id: RoomId) -> Self {
        Self {
            room_id,
            status: ConnectionStatus::Starting,
            exposed_port: None,
        }
    }

    /// Returns `true` if the endpoint is dialable.
    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Active
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// Optional metadata attached to a room, usually created by a client.
///
/// `initial_config` is an opaque serialized string; decode it into your
/// own shape with [`Lobby::initial_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub room_id: RoomId,
    pub region: Region,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub initial_config: Option<String>,
}

impl Lobby {
    /// Decodes the initial configuration payload as JSON into `T`.
    #[cfg(feature = "json")]
    pub fn initial_config<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, ModelError> {
        let raw = self
            .initial_config
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ModelError::MissingInitialConfig(self.room_id.clone())
            })?;
        serde_json::from_str(raw).map_err(ModelError::MalformedInitialConfig)
    }
}
