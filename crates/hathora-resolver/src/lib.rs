//! Server context resolution for Hathora-hosted dedicated servers.
//!
//! A freshly started process only knows its process id. This crate asks
//! the control plane everything else (which room it hosts, how clients
//! reach it, which lobby created it) and keeps the answer around for the
//! rest of the process:
//!
//! - [`DeployEnv`]: what the platform put in the environment
//! - [`RoomResolver`]: connection info and lobby of one room
//! - [`ServerContextResolver`]: process → rooms → first room, validated
//! - [`ContextCache`]: latest context, bounded wait, change notification
//!
//! ```text
//! DeployEnv ──→ ServerContextResolver ──→ ContextCache ──→ subscribers
//!                    │         ▲
//!                    ▼         │
//!               RoomResolver ──┘
//! ```
//!
//! Expected outcomes (not deployed, process stopped, cancelled) come back
//! as [`Resolution`] values. Only real failures are [`ResolveError`]s.

mod cache;
mod config;
mod env;
mod error;
mod flight;
mod room;
mod server;

pub use cache::{ContextCache, SubscriptionId};
pub use config::{CacheConfig, ResolvePhase, ResolverConfig};
pub use env::{
    DeployEnv, ENV_APP_SECRET, ENV_MOCK_PROCESS_ID, ENV_PROCESS_ID, ENV_PUBLIC_IP,
    ENV_PUBLIC_PORT, ENV_REGION,
};
pub use error::{ErrorKind, ResolveError};
pub use room::{RoomOutcome, RoomResolver};
pub use server::{Absence, Resolution, ServerContextResolver};
