//! Handing a resolved server context to the session layer.
//!
//! The session network (whatever hosts the actual game session) is an
//! external collaborator. It needs three things from us: the port to bind
//! inside the container, the public address clients dial, and which
//! session region to register in. [`SessionStartConfig`] carries exactly
//! that, and [`SessionStarter`] is the hook that receives it.

use std::fmt;
use std::net::IpAddr;

use hathora_model::{Region, ServerContext};
use serde::{Deserialize, Serialize};

use crate::{HathoraError, SessionRegion};

/// Everything the session layer needs to start hosting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartConfig {
    /// Port the game server listens on inside the container.
    pub bind_port: u16,
    /// Public address clients connect to, from the room's connection info.
    pub public_ip: IpAddr,
    pub public_port: u16,
    pub region: SessionRegion,
}

impl SessionStartConfig {
    /// Builds the start config from a resolved context.
    ///
    /// The public host is DNS-resolved, preferring IPv4. `env_region`
    /// (from `HATHORA_REGION`) wins over the region the control plane
    /// reports for the process.
    pub async fn from_context(
        ctx: &ServerContext,
        container_port: u16,
        env_region: Option<Region>,
    ) -> Result<Self, HathoraError> {
        let public = ctx.resolve_socket_addr().await?;
        let region = env_region.unwrap_or_else(|| ctx.region());
        Ok(Self {
            bind_port: container_port,
            public_ip: public.ip(),
            public_port: public.port(),
            region: SessionRegion::from_hathora(region),
        })
    }
}

impl fmt::Display for SessionStartConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bind=:{} public={}:{} region={}",
            self.bind_port, self.public_ip, self.public_port, self.region
        )
    }
}

/// Starts the game session once the server knows who it is.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` so one starter can live for the whole process
/// and be called from any task.
///
/// # Example
///
/// ```rust
/// use hathora_server::{HathoraError, SessionStartConfig, SessionStarter};
///
/// struct PrintStarter;
///
/// impl SessionStarter for PrintStarter {
///     async fn start(&self, config: SessionStartConfig) -> Result<(), HathoraError> {
///         println!("hosting on {config}");
///         Ok(())
///     }
/// }
/// ```
pub trait SessionStarter: Send + Sync + 'static {
    fn start(
        &self,
        config: SessionStartConfig,
    ) -> impl std::future::Future<Output = Result<(), HathoraError>> + Send;
}
