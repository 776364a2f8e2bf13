//! Runs the full startup sequence of a Hathora-hosted server locally,
//! against an in-memory control plane that behaves like a freshly
//! scheduled room: connection info reports `Starting` for a couple of
//! polls, then goes active, and the room has a lobby with a JSON config.
//!
//! ```text
//! RUST_LOG=debug cargo run -p mock-deploy
//! ```

use std::time::Duration;

use hathora_control::InMemoryControlPlane;
use hathora_model::{ConnectionInfo, ProcessInfo, ProcessStatus, RoomInfo};
use hathora_server::logging::init_logging;
use hathora_server::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const MOCK_PROCESS_ID: &str = "mock-process-1";
const MOCK_ROOM_ID: &str = "mock-room-1";

// ---------------------------------------------------------------------------
// Lobby config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MatchConfig {
    mode: String,
    max_players: u8,
}

// ---------------------------------------------------------------------------
// Session starter
// ---------------------------------------------------------------------------

/// Stands in for the session network: logs what it would host.
struct LoggingStarter;

impl SessionStarter for LoggingStarter {
    async fn start(&self, config: SessionStartConfig) -> Result<(), HathoraError> {
        info!(%config, "session would start here");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock control plane
// ---------------------------------------------------------------------------

fn mock_control(process_id: &ProcessId) -> Result<InMemoryControlPlane, serde_json::Error> {
    let cp = InMemoryControlPlane::new().with_latency(Duration::from_millis(50));
    cp.add_process(ProcessInfo {
        process_id: process_id.clone(),
        status: ProcessStatus::Active,
        region: Region::Frankfurt,
        exposed_port: None,
        additional_exposed_ports: Vec::new(),
    });
    cp.set_active_rooms(process_id, vec![RoomInfo::active(MOCK_ROOM_ID)]);
    cp.set_connection_info_after(
        ConnectionInfo::active(RoomId::new(MOCK_ROOM_ID), "127.0.0.1", 7777),
        2,
    );
    cp.set_lobby(Lobby {
        room_id: RoomId::new(MOCK_ROOM_ID),
        region: Region::Frankfurt,
        created_by: "local-player".into(),
        initial_config: Some(serde_json::to_string(&MatchConfig {
            mode: "ranked".into(),
            max_players: 8,
        })?),
    });
    Ok(cp)
}

/// The real environment, or a mock override when not deployed.
fn mock_env() -> DeployEnv {
    let env = DeployEnv::from_env();
    if env.is_deployed() {
        env
    } else {
        env.with_override(MOCK_PROCESS_ID)
    }
}

fn config() -> ResolverConfig {
    ResolverConfig {
        lobby_expected: true,
        poll: PollConfig::fixed(Duration::from_millis(200)),
        resolve_deadline: Duration::from_secs(10),
        ..ResolverConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info")?;

    let env = mock_env();
    let process_id = env
        .effective_process_id()
        .cloned()
        .unwrap_or_else(|| ProcessId::new(MOCK_PROCESS_ID));
    let control = Arc::new(mock_control(&process_id)?);

    let runtime = ServerRuntime::builder()
        .env(env)
        .config(config())
        .build(control);

    runtime.cache().subscribe(|ctx| {
        match ctx.lobby().map(|l| l.initial_config::<MatchConfig>()) {
            Some(Ok(cfg)) => info!(mode = %cfg.mode, max_players = cfg.max_players, "lobby config"),
            Some(Err(e)) => warn!(error = %e, "lobby config unreadable"),
            None => info!("no lobby"),
        }
    });

    let outcome = runtime.run(&LoggingStarter, &CancelToken::new()).await?;
    info!(?outcome, "startup finished");

    if let Some(ctx) = runtime.cache().get_cached_default().await {
        info!(endpoint = ctx.endpoint().as_deref().unwrap_or("none"), "cached context");
    }

    runtime.teardown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_mock_deploy_starts_after_connection_goes_active() {
        let pid = ProcessId::new(MOCK_PROCESS_ID);
        let control = Arc::new(mock_control(&pid).unwrap());
        let runtime = ServerRuntime::builder()
            .env(DeployEnv::default().with_override(MOCK_PROCESS_ID))
            .config(config())
            .build(Arc::clone(&control));

        let outcome = runtime.run(&LoggingStarter, &CancelToken::new()).await.unwrap();
        let RunOutcome::Started(start) = outcome else {
            panic!("expected a started session, got {outcome:?}");
        };
        assert_eq!(start.public_port, 7777);
        assert_eq!(start.region, SessionRegion::Eu);
        assert_eq!(
            control.call_count(hathora_control::Operation::GetConnectionInfo),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_config_decodes() {
        let pid = ProcessId::new(MOCK_PROCESS_ID);
        let runtime = ServerRuntime::builder()
            .env(DeployEnv::default().with_override(MOCK_PROCESS_ID))
            .config(config())
            .build(Arc::new(mock_control(&pid).unwrap()));
        runtime.run(&LoggingStarter, &CancelToken::new()).await.unwrap();

        let ctx = runtime.cache().current().unwrap();
        let cfg: MatchConfig = ctx.lobby().unwrap().initial_config().unwrap();
        assert_eq!(
            cfg,
            MatchConfig {
                mode: "ranked".into(),
                max_players: 8,
            }
        );
    }
}
