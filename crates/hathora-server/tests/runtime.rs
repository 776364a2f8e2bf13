//! Integration tests for the runtime startup sequence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hathora_control::{CancelToken, InMemoryControlPlane, Operation, PollConfig};
use hathora_model::{
    ConnectionInfo, ProcessId, ProcessInfo, ProcessStatus, Region, RoomId, RoomInfo,
};
use hathora_resolver::{DeployEnv, ResolveError, ResolverConfig};
use hathora_server::{
    HathoraError, RunOutcome, ServerRuntime, SessionRegion, SessionStartConfig, SessionStarter,
};

// =========================================================================
// Mock session starter
// =========================================================================

#[derive(Default)]
struct RecordingStarter {
    started: Mutex<Vec<SessionStartConfig>>,
    refuse: bool,
}

impl RecordingStarter {
    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    fn started(&self) -> Vec<SessionStartConfig> {
        self.started.lock().unwrap().clone()
    }
}

impl SessionStarter for RecordingStarter {
    async fn start(&self, config: SessionStartConfig) -> Result<(), HathoraError> {
        if self.refuse {
            return Err(HathoraError::SessionStart("port in use".into()));
        }
        self.started.lock().unwrap().push(config);
        Ok(())
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn control() -> Arc<InMemoryControlPlane> {
    Arc::new(InMemoryControlPlane::single_room(
        "p-1",
        Region::Chicago,
        "r-1",
        "1.2.3.4",
        7777,
    ))
}

fn config() -> ResolverConfig {
    ResolverConfig {
        poll: PollConfig::fixed(Duration::from_secs(1)),
        resolve_deadline: Duration::from_secs(5),
        ..ResolverConfig::default()
    }
}

fn deployed() -> DeployEnv {
    DeployEnv::default().with_process_id("p-1")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_not_deployed_skips_everything() {
    let cp = control();
    let runtime = ServerRuntime::builder()
        .env(DeployEnv::default())
        .config(config())
        .build(Arc::clone(&cp));
    let starter = RecordingStarter::default();

    let outcome = runtime.run(&starter, &CancelToken::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::NotDeployed);
    assert!(cp.calls().is_empty());
    assert!(starter.started().is_empty());
    assert!(runtime.cache().get_cached_default().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_deployed_process_starts_session() {
    let cp = control();
    let runtime = ServerRuntime::builder()
        .env(deployed())
        .config(config())
        .container_port(7000)
        .build(Arc::clone(&cp));
    let starter = RecordingStarter::default();

    let outcome = runtime.run(&starter, &CancelToken::new()).await.unwrap();
    let RunOutcome::Started(start) = outcome else {
        panic!("expected a started session, got {outcome:?}");
    };
    assert_eq!(start.bind_port, 7000);
    assert_eq!(start.public_ip.to_string(), "1.2.3.4");
    assert_eq!(start.public_port, 7777);
    assert_eq!(start.region, SessionRegion::Us);
    assert_eq!(starter.started(), vec![start]);

    let ctx = runtime.cache().current().unwrap();
    assert_eq!(ctx.process_id_source, ProcessId::new("p-1"));
}

#[tokio::test(start_paused = true)]
async fn test_env_region_overrides_process_region() {
    let mut env = deployed();
    env.region = Some(Region::Mumbai);
    let runtime = ServerRuntime::builder().env(env).config(config()).build(control());
    let starter = RecordingStarter::default();

    runtime.run(&starter, &CancelToken::new()).await.unwrap();
    assert_eq!(starter.started()[0].region, SessionRegion::In);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_is_bounded_by_deadline() {
    let cp = InMemoryControlPlane::new();
    cp.add_process(ProcessInfo {
        process_id: ProcessId::new("p-1"),
        status: ProcessStatus::Active,
        region: Region::Chicago,
        exposed_port: None,
        additional_exposed_ports: Vec::new(),
    });
    cp.set_active_rooms(&ProcessId::new("p-1"), vec![RoomInfo::active("r-1")]);
    cp.set_connection_info_after(
        ConnectionInfo::active(RoomId::new("r-1"), "1.2.3.4", 7777),
        u32::MAX,
    );
    let cp = Arc::new(cp);
    let runtime = ServerRuntime::builder()
        .env(deployed())
        .config(config())
        .build(Arc::clone(&cp));
    let starter = RecordingStarter::default();

    let start = tokio::time::Instant::now();
    let err = runtime.run(&starter, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, HathoraError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert!(starter.started().is_empty());
    assert!(runtime.cache().current().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_abandons_hung_process_fetch() {
    let cp = Arc::new(
        InMemoryControlPlane::single_room("p-1", Region::Chicago, "r-1", "1.2.3.4", 7777)
            .with_latency(Duration::from_secs(3_600)),
    );
    let runtime = ServerRuntime::builder()
        .env(deployed())
        .config(config())
        .build(Arc::clone(&cp));
    let starter = RecordingStarter::default();

    let start = tokio::time::Instant::now();
    let err = runtime.run(&starter, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, HathoraError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(cp.call_count(Operation::GetProcessInfo), 1);
    assert_eq!(cp.call_count(Operation::GetActiveRoomsForProcess), 0);
    assert!(starter.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancel_abandons_hung_process_fetch() {
    let cp = Arc::new(
        InMemoryControlPlane::single_room("p-1", Region::Chicago, "r-1", "1.2.3.4", 7777)
            .with_latency(Duration::from_secs(600)),
    );
    let runtime = ServerRuntime::builder()
        .env(deployed())
        .config(config())
        .build(Arc::clone(&cp));
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let start = tokio::time::Instant::now();
    let err = runtime
        .run(&RecordingStarter::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, HathoraError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert!(runtime.cache().current().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_rooms_fetch_is_bounded_by_deadline() {
    let cp = InMemoryControlPlane::single_room("p-1", Region::Chicago, "r-1", "1.2.3.4", 7777)
        .with_latency(Duration::from_secs(3));
    let cp = Arc::new(cp);
    let runtime = ServerRuntime::builder()
        .env(deployed())
        .config(config())
        .build(Arc::clone(&cp));

    // Process answers at 3s, the rooms fetch would at 6s.
    let start = tokio::time::Instant::now();
    let err = runtime
        .run(&RecordingStarter::default(), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HathoraError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(cp.call_count(Operation::GetActiveRoomsForProcess), 1);
    assert_eq!(cp.call_count(Operation::GetConnectionInfo), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_process_does_not_start() {
    let cp = control();
    cp.add_process(ProcessInfo {
        process_id: ProcessId::new("p-1"),
        status: ProcessStatus::Stopped,
        region: Region::Chicago,
        exposed_port: None,
        additional_exposed_ports: Vec::new(),
    });
    let runtime = ServerRuntime::builder().env(deployed()).config(config()).build(cp);
    let starter = RecordingStarter::default();

    let outcome = runtime.run(&starter, &CancelToken::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::ProcessStopped);
    assert!(starter.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_required_lobby_surfaces_resolve_error() {
    let runtime = ServerRuntime::builder()
        .env(deployed())
        .config(ResolverConfig {
            lobby_expected: true,
            ..config()
        })
        .build(control());

    let err = runtime
        .run(&RecordingStarter::default(), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HathoraError::Resolve(ResolveError::LobbyRequired { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_starter_failure_propagates() {
    let runtime = ServerRuntime::builder().env(deployed()).config(config()).build(control());

    let err = runtime
        .run(&RecordingStarter::refusing(), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HathoraError::SessionStart(_)));
    // The context was still resolved and cached.
    assert!(runtime.cache().current().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_clears_subscribers() {
    let cp = control();
    let runtime = ServerRuntime::builder().env(deployed()).config(config()).build(Arc::clone(&cp));
    runtime.cache().subscribe(|_| {});
    runtime.cache().subscribe(|_| {});
    assert_eq!(runtime.cache().subscriber_count(), 2);

    runtime.teardown();
    assert_eq!(runtime.cache().subscriber_count(), 0);
    assert_eq!(cp.call_count(Operation::GetProcessInfo), 0);
}
