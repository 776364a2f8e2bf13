//! Data model for Hathora server context resolution.
//!
//! This crate defines what the control plane tells a dedicated server
//! about itself, and the aggregates the resolver builds out of it:
//!
//! - **Control-plane records** ([`ProcessInfo`], [`RoomInfo`],
//!   [`ConnectionInfo`], [`Lobby`]): fetched once per resolution attempt,
//!   never mutated.
//! - **Aggregates** ([`RoomContext`], [`ServerContext`]): the answer to
//!   "who am I and how do clients reach me", with validity predicates.
//! - **Errors** ([`ModelError`], [`AddrError`]).
//!
//! # Three statuses, three layers
//!
//! [`ProcessStatus`], [`RoomStatus`] and [`ConnectionStatus`] are not
//! interchangeable. A room can be `Active` while its process is still
//! initializing. Only [`ConnectionStatus::Active`] says an endpoint is
//! dialable.
//!
//! ```text
//! ProcessInfo ─┬─ RoomInfo[0] ── ConnectionInfo ── Lobby?
//!              └─ RoomInfo[1..] (listed, not resolved)
//! ```

mod context;
mod error;
mod types;

pub use context::{ContextDefect, RoomContext, ServerContext};
pub use error::{AddrError, ModelError};
pub use types::{
    ConnectionInfo, ConnectionStatus, ExposedPort, Lobby, ProcessId,
    ProcessInfo, ProcessStatus, Region, RoomId, RoomInfo, RoomStatus,
    TransportKind,
};
