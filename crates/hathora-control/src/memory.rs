//! Scripted in-memory control plane.
//!
//! Stands in for the Hathora REST API in tests and when emulating a
//! deployed process locally. Records calls so tests can assert on
//! exactly which remote requests a resolution made.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hathora_model::{
    ConnectionInfo, Lobby, ProcessId, ProcessInfo, ProcessStatus, Region,
    RoomId, RoomInfo,
};

use crate::{ControlPlane, ControlPlaneError, Operation, Resource};

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Operation,
    /// The process or room id the request was about.
    pub id: String,
}

/// Connection info that reports `Starting` for the first few fetches.
#[derive(Debug)]
struct ScriptedConnection {
    info: ConnectionInfo,
    starting_fetches_left: u32,
}

#[derive(Debug, Default)]
struct State {
    processes: HashMap<ProcessId, ProcessInfo>,
    rooms: HashMap<ProcessId, Vec<RoomInfo>>,
    connections: HashMap<RoomId, ScriptedConnection>,
    lobbies: HashMap<RoomId, Lobby>,
    failures: HashMap<Operation, ControlPlaneError>,
    /// Most recent calls, oldest first.
    calls: VecDeque<Call>,
    /// Every call ever made, per operation.
    counts: HashMap<Operation, usize>,
}

/// A [`ControlPlane`] backed by in-memory maps.
///
/// Unknown processes, rooms and lobbies answer `NotFound`, like the real
/// API. An unknown process has no active rooms.
#[derive(Debug, Default)]
pub struct InMemoryControlPlane {
    state: Mutex<State>,
    latency: Duration,
}

impl InMemoryControlPlane {
    /// How many recent calls [`calls`](Self::calls) keeps. Older ones are
    /// dropped so a long poll does not grow the log without bound;
    /// [`call_count`](Self::call_count) stays exact.
    pub const CALL_LOG_CAPACITY: usize = 1024;

    /// Creates an empty control plane.
    pub fn new() -> Self {
        Self::default()
    }

    /// A process with one active room whose connection info is already
    /// active at `host:port`, and no lobby.
    pub fn single_room(
        process_id: &str,
        region: Region,
        room_id: &str,
        host: &str,
        port: u16,
    ) -> Self {
        let cp = Self::new();
        cp.add_process(ProcessInfo {
            process_id: ProcessId::new(process_id),
            status: ProcessStatus::Active,
            region,
            exposed_port: None,
            additional_exposed_ports: Vec::new(),
        });
        cp.set_active_rooms(
            &ProcessId::new(process_id),
            vec![RoomInfo::active(room_id)],
        );
        cp.set_connection_info(ConnectionInfo::active(
            RoomId::new(room_id),
            host,
            port,
        ));
        cp
    }

    /// Delays every request by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn add_process(&self, info: ProcessInfo) {
        self.state()
            .processes
            .insert(info.process_id.clone(), info);
    }

    /// Replaces the active-room list of a process. Order is preserved.
    pub fn set_active_rooms(&self, process_id: &ProcessId, rooms: Vec<RoomInfo>) {
        self.state().rooms.insert(process_id.clone(), rooms);
    }

    pub fn set_connection_info(&self, info: ConnectionInfo) {
        self.set_connection_info_after(info, 0);
    }

    /// Serves `info`, but only after `starting_fetches` fetches that
    /// report `Starting` with no port.
    pub fn set_connection_info_after(
        &self,
        info: ConnectionInfo,
        starting_fetches: u32,
    ) {
        self.state().connections.insert(
            info.room_id.clone(),
            ScriptedConnection {
                info,
                starting_fetches_left: starting_fetches,
            },
        );
    }

    pub fn set_lobby(&self, lobby: Lobby) {
        self.state().lobbies.insert(lobby.room_id.clone(), lobby);
    }

    /// Makes every request of kind `op` fail with `err` until cleared.
    pub fn fail(&self, op: Operation, err: ControlPlaneError) {
        self.state().failures.insert(op, err);
    }

    pub fn clear_failure(&self, op: Operation) {
        self.state().failures.remove(&op);
    }

    /// The most recent requests, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.iter().cloned().collect()
    }

    /// Total requests of kind `op`, including ones aged out of the log.
    pub fn call_count(&self, op: Operation) -> usize {
        self.state().counts.get(&op).copied().unwrap_or(0)
    }

    /// Ids passed to the logged requests of kind `op`, in order.
    pub fn call_ids(&self, op: Operation) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.id.clone())
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call, waits out the latency, then returns any injected
    /// failure. The lock is never held across the sleep.
    async fn begin(
        &self,
        op: Operation,
        id: &str,
    ) -> Result<(), ControlPlaneError> {
        {
            let mut state = self.state();
            if state.calls.len() == Self::CALL_LOG_CAPACITY {
                state.calls.pop_front();
            }
            state.calls.push_back(Call {
                op,
                id: id.to_string(),
            });
            *state.counts.entry(op).or_default() += 1;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.state().failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl ControlPlane for InMemoryControlPlane {
    async fn get_process_info(
        &self,
        process_id: &ProcessId,
    ) -> Result<ProcessInfo, ControlPlaneError> {
        self.begin(Operation::GetProcessInfo, process_id.as_str())
            .await?;
        self.state()
            .processes
            .get(process_id)
            .cloned()
            .ok_or_else(|| {
                ControlPlaneError::not_found(Resource::Process, process_id)
            })
    }

    async fn get_active_rooms_for_process(
        &self,
        process_id: &ProcessId,
    ) -> Result<Vec<RoomInfo>, ControlPlaneError> {
        self.begin(Operation::GetActiveRoomsForProcess, process_id.as_str())
            .await?;
        Ok(self
            .state()
            .rooms
            .get(process_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_connection_info(
        &self,
        room_id: &RoomId,
    ) -> Result<ConnectionInfo, ControlPlaneError> {
        self.begin(Operation::GetConnectionInfo, room_id.as_str())
            .await?;
        let mut state = self.state();
        let scripted = state.connections.get_mut(room_id).ok_or_else(|| {
            ControlPlaneError::not_found(Resource::ConnectionInfo, room_id)
        })?;
        if scripted.starting_fetches_left > 0 {
            scripted.starting_fetches_left -= 1;
            return Ok(ConnectionInfo::starting(room_id.clone()));
        }
        Ok(scripted.info.clone())
    }

    async fn get_lobby_info(
        &self,
        room_id: &RoomId,
    ) -> Result<Lobby, ControlPlaneError> {
        self.begin(Operation::GetLobbyInfo, room_id.as_str()).await?;
        self.state()
            .lobbies
            .get(room_id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(Resource::Lobby, room_id))
    }
}
