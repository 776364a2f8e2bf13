//! # hathora-server
//!
//! Startup wiring for dedicated game servers hosted on Hathora.
//!
//! A server process builds one [`ServerRuntime`], which resolves who the
//! process is (room, lobby, public address) through the control plane and
//! hands the result to your [`SessionStarter`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hathora_server::prelude::*;
//!
//! // Implement SessionStarter for your session layer, then:
//! // let runtime = ServerRuntime::builder()
//! //     .container_port(7777)
//! //     .build(Arc::new(my_control_plane));
//! // runtime.run(&my_starter, &CancelToken::new()).await?;
//! // runtime.teardown();
//! ```

mod bootstrap;
mod error;
pub mod logging;
mod region;
mod runtime;

pub use bootstrap::{SessionStartConfig, SessionStarter};
pub use error::HathoraError;
pub use region::{SessionRegion, UnknownSessionRegion};
pub use runtime::{DEFAULT_CONTAINER_PORT, RunOutcome, ServerRuntime, ServerRuntimeBuilder};

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use std::sync::Arc;

    pub use hathora_control::{CancelToken, ControlPlane, ControlPlaneError, PollConfig};
    pub use hathora_model::{Lobby, ProcessId, Region, RoomId, ServerContext};
    pub use hathora_resolver::{
        CacheConfig, ContextCache, DeployEnv, Resolution, ResolveError, ResolverConfig,
    };

    pub use crate::{
        HathoraError, RunOutcome, ServerRuntime, SessionRegion, SessionStartConfig,
        SessionStarter,
    };
}
