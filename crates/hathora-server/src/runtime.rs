//! `ServerRuntime` builder and the startup sequence.
//!
//! The process entry point owns the runtime: it builds it once, runs it,
//! and tears it down on shutdown. Components that need the resolved
//! context get the cache handed to them through [`ServerRuntime::cache`].

use std::sync::Arc;

use hathora_control::{CancelToken, ControlPlane};
use hathora_resolver::{
    Absence, ContextCache, DeployEnv, Resolution, ResolverConfig, ServerContextResolver,
};
use tracing::info;

use crate::{HathoraError, SessionStartConfig, SessionStarter};

/// Port the game server binds inside the container unless told otherwise.
pub const DEFAULT_CONTAINER_PORT: u16 = 7777;

/// How a [`ServerRuntime::run`] ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No process id in the environment. Nothing to host.
    NotDeployed,
    /// The control plane reports the process as stopped.
    ProcessStopped,
    /// The session was started with this config.
    Started(SessionStartConfig),
}

/// Builder for a [`ServerRuntime`].
///
/// # Example
///
/// ```rust,ignore
/// let runtime = ServerRuntime::builder()
///     .container_port(7777)
///     .config(ResolverConfig { lobby_expected: true, ..Default::default() })
///     .build(Arc::new(my_control_plane));
/// runtime.run(&my_starter, &CancelToken::new()).await?;
/// runtime.teardown();
/// ```
#[derive(Debug)]
pub struct ServerRuntimeBuilder {
    env: Option<DeployEnv>,
    config: ResolverConfig,
    container_port: u16,
}

impl ServerRuntimeBuilder {
    /// Creates a builder that reads the process environment at build time.
    pub fn new() -> Self {
        Self {
            env: None,
            config: ResolverConfig::default(),
            container_port: DEFAULT_CONTAINER_PORT,
        }
    }

    /// Uses `env` instead of reading the process environment.
    pub fn env(mut self, env: DeployEnv) -> Self {
        self.env = Some(env);
        self
    }

    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn container_port(mut self, port: u16) -> Self {
        self.container_port = port;
        self
    }

    /// Wires the resolver and cache around `control`.
    pub fn build<C: ControlPlane>(self, control: Arc<C>) -> ServerRuntime<C> {
        let env = self.env.unwrap_or_else(DeployEnv::from_env);
        let cache = Arc::new(ContextCache::for_env(&env, self.config.cache.clone()));
        let resolver = ServerContextResolver::new(control, &env, &self.config, Arc::clone(&cache));
        info!(
            deployed = env.is_deployed(),
            mock = env.is_mock(),
            container_port = self.container_port,
            "server runtime initialized"
        );
        ServerRuntime {
            env,
            config: self.config,
            container_port: self.container_port,
            cache,
            resolver,
        }
    }
}

impl Default for ServerRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The resolver, its cache and the startup sequence for one process.
pub struct ServerRuntime<C> {
    env: DeployEnv,
    config: ResolverConfig,
    container_port: u16,
    cache: Arc<ContextCache>,
    resolver: ServerContextResolver<C>,
}

impl ServerRuntime<()> {
    /// Creates a builder. The control plane type is picked at
    /// [`build`](ServerRuntimeBuilder::build).
    pub fn builder() -> ServerRuntimeBuilder {
        ServerRuntimeBuilder::new()
    }
}

impl<C: ControlPlane> ServerRuntime<C> {
    pub fn env(&self) -> &DeployEnv {
        &self.env
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The shared context cache. Hand this to anything that needs the
    /// server context or wants to hear about new resolutions.
    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &ServerContextResolver<C> {
        &self.resolver
    }

    /// Resolves the server context and starts the session.
    ///
    /// Resolution is bounded by the configured `resolve_deadline` as well
    /// as by `cancel`: every remote call, including a hung single fetch,
    /// is abandoned once either fires. A non-deployed process returns
    /// [`RunOutcome::NotDeployed`] without touching the control plane.
    pub async fn run<S: SessionStarter>(
        &self,
        starter: &S,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, HathoraError> {
        if !self.env.is_deployed() {
            info!("not running on Hathora, skipping server context resolution");
            return Ok(RunOutcome::NotDeployed);
        }

        let deadline = cancel.child_with_deadline(self.config.resolve_deadline);
        let ctx = match self
            .resolver
            .resolve(self.config.lobby_expected, &deadline)
            .await?
        {
            Resolution::Resolved(ctx) => ctx,
            Resolution::Absent(Absence::NotDeployed) => return Ok(RunOutcome::NotDeployed),
            Resolution::Absent(Absence::ProcessStopped) => {
                return Ok(RunOutcome::ProcessStopped);
            }
            Resolution::Cancelled => return Err(HathoraError::Cancelled),
        };

        let start =
            SessionStartConfig::from_context(&ctx, self.container_port, self.env.region).await?;
        info!(%start, "starting session");
        starter.start(start.clone()).await?;
        Ok(RunOutcome::Started(start))
    }

    /// Drops every cache subscriber. Call once on shutdown.
    pub fn teardown(&self) {
        let dropped = self.cache.subscriber_count();
        self.cache.clear_subscribers();
        info!(subscribers = dropped, "server runtime torn down");
    }
}
