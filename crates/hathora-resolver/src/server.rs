//! Resolving the whole server context for this process.

use std::sync::Arc;

use hathora_control::{CancelToken, ControlPlane, Operation};
use hathora_model::{ProcessId, ServerContext};
use tracing::{Instrument, Span, debug, error, field, info, trace};

use crate::flight::{self, InFlight, Role};
use crate::{
    ContextCache, DeployEnv, ResolveError, ResolvePhase, ResolverConfig, RoomOutcome,
    RoomResolver,
};

/// Why a resolution produced no context without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// No process id: this is not a deployed server.
    NotDeployed,
    /// The control plane reports the process as stopped.
    ProcessStopped,
}

/// The non-error outcomes of [`ServerContextResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Arc<ServerContext>),
    Absent(Absence),
    /// The caller's token fired. Nothing was published.
    Cancelled,
}

impl Resolution {
    pub fn context(&self) -> Option<&Arc<ServerContext>> {
        match self {
            Self::Resolved(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn into_context(self) -> Option<Arc<ServerContext>> {
        match self {
            Self::Resolved(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Resolves process → rooms → first room into a validated
/// [`ServerContext`] and publishes it to the cache.
///
/// ## Lifecycle
///
/// ```text
/// resolve()
///   ├─ no process id ─────────────────────────────→ Absent(NotDeployed)
///   ├─ GetProcessInfo ── stopped ─────────────────→ Absent(ProcessStopped)
///   ├─ GetActiveRoomsForProcess ── empty ─────────→ Err(NoActiveRooms)
///   ├─ RoomResolver (rooms[0]) ── cancelled ──────→ Cancelled
///   ├─ validate ── defect ────────────────────────→ Err(InvalidContext)
///   └─ publish ───────────────────────────────────→ Resolved
/// ```
///
/// Concurrent calls for the same process and lobby requirement share one
/// run unless `single_flight` is off in the config.
pub struct ServerContextResolver<C> {
    control: Arc<C>,
    rooms: RoomResolver<C>,
    cache: Arc<ContextCache>,
    process_id: Option<ProcessId>,
    single_flight: bool,
    flights: InFlight,
}

impl<C: ControlPlane> ServerContextResolver<C> {
    pub fn new(
        control: Arc<C>,
        env: &DeployEnv,
        config: &ResolverConfig,
        cache: Arc<ContextCache>,
    ) -> Self {
        Self {
            rooms: RoomResolver::new(Arc::clone(&control), config.poll.clone()),
            control,
            cache,
            process_id: env.effective_process_id().cloned(),
            single_flight: config.single_flight,
            flights: InFlight::default(),
        }
    }

    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    pub fn process_id(&self) -> Option<&ProcessId> {
        self.process_id.as_ref()
    }

    /// Resolves the process this server runs as.
    ///
    /// Makes no remote call when the environment names no process.
    pub async fn resolve(
        &self,
        lobby_expected: bool,
        cancel: &CancelToken,
    ) -> Result<Resolution, ResolveError> {
        let Some(process_id) = &self.process_id else {
            debug!("no process id in the environment, not a deployed server");
            return Ok(Resolution::Absent(Absence::NotDeployed));
        };
        self.resolve_process(process_id, lobby_expected, cancel).await
    }

    /// Resolves an explicit process id.
    pub async fn resolve_process(
        &self,
        process_id: &ProcessId,
        lobby_expected: bool,
        cancel: &CancelToken,
    ) -> Result<Resolution, ResolveError> {
        if !self.single_flight {
            return self.run(process_id, lobby_expected, cancel).await;
        }

        loop {
            match self.flights.join((process_id.clone(), lobby_expected)) {
                Role::Leader(guard) => {
                    let outcome = self.run(process_id, lobby_expected, cancel).await;
                    guard.finish(&outcome);
                    return outcome;
                }
                Role::Follower(rx) => {
                    debug!(%process_id, "joining in-flight resolution");
                    tokio::select! {
                        shared = flight::wait(rx) => match shared {
                            Some(outcome) => return outcome,
                            None => trace!(%process_id, "in-flight resolution abandoned, retrying"),
                        },
                        _ = cancel.cancelled() => return Ok(Resolution::Cancelled),
                    }
                }
            }
        }
    }

    async fn run(
        &self,
        process_id: &ProcessId,
        lobby_expected: bool,
        cancel: &CancelToken,
    ) -> Result<Resolution, ResolveError> {
        let span = tracing::info_span!(
            "resolve",
            %process_id,
            lobby_expected,
            phase = field::Empty,
        );
        let outcome = self
            .run_phases(process_id, lobby_expected, cancel)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match &outcome {
            Ok(Resolution::Resolved(ctx)) => info!(%ctx, "server context resolved"),
            Ok(Resolution::Absent(absence)) => info!(?absence, "no server context"),
            Ok(Resolution::Cancelled) => debug!("resolution cancelled"),
            Err(e) => error!(
                room_id = e.room_id(),
                kind = ?e.kind(),
                error = %e,
                "server context resolution failed"
            ),
        }
        outcome
    }

    async fn run_phases(
        &self,
        process_id: &ProcessId,
        lobby_expected: bool,
        cancel: &CancelToken,
    ) -> Result<Resolution, ResolveError> {
        let mut phase = PhaseTracker::start();

        phase.advance(ResolvePhase::FetchingProcess);
        let Some(fetched) = cancel
            .run_until_cancelled(self.control.get_process_info(process_id))
            .await
        else {
            phase.advance(ResolvePhase::Cancelled);
            return Ok(Resolution::Cancelled);
        };
        if matches!(&fetched, Ok(p) if p.is_stopped()) {
            return Ok(Resolution::Absent(Absence::ProcessStopped));
        }
        if cancel.is_cancelled() {
            phase.advance(ResolvePhase::Cancelled);
            return Ok(Resolution::Cancelled);
        }
        let process = match fetched {
            Ok(p) if !p.process_id.is_empty() => p,
            Ok(_) => return Err(phase.fail(ResolveError::NoProcess(process_id.clone()))),
            Err(e) if e.is_not_found() => {
                return Err(phase.fail(ResolveError::NoProcess(process_id.clone())));
            }
            Err(source) => {
                return Err(phase.fail(ResolveError::Remote {
                    op: Operation::GetProcessInfo,
                    id: process_id.to_string(),
                    source,
                }));
            }
        };

        phase.advance(ResolvePhase::FetchingRooms);
        let Some(fetched) = cancel
            .run_until_cancelled(self.control.get_active_rooms_for_process(process_id))
            .await
        else {
            phase.advance(ResolvePhase::Cancelled);
            return Ok(Resolution::Cancelled);
        };
        let active_rooms = match fetched {
            Ok(rooms) => rooms,
            Err(source) => {
                return Err(phase.fail(ResolveError::Remote {
                    op: Operation::GetActiveRoomsForProcess,
                    id: process_id.to_string(),
                    source,
                }));
            }
        };
        if cancel.is_cancelled() {
            phase.advance(ResolvePhase::Cancelled);
            return Ok(Resolution::Cancelled);
        }
        let Some(first) = active_rooms.first().cloned() else {
            return Err(phase.fail(ResolveError::NoActiveRooms(process_id.clone())));
        };
        if active_rooms.len() > 1 {
            debug!(
                rooms = active_rooms.len(),
                room_id = %first.room_id,
                "several active rooms, using the first"
            );
        }

        phase.advance(ResolvePhase::ResolvingFirstRoom);
        let resolved = self.rooms.resolve_room(&first, lobby_expected, cancel).await;
        let first_room = match resolved {
            Ok(RoomOutcome::Resolved(room)) => room,
            Ok(RoomOutcome::Cancelled) => {
                phase.advance(ResolvePhase::Cancelled);
                return Ok(Resolution::Cancelled);
            }
            Err(e) => return Err(phase.fail(e)),
        };

        phase.advance(ResolvePhase::Validating);
        let room_id = first_room.room.room_id.clone();
        let ctx = ServerContext::new(process_id.clone(), process, active_rooms, first_room);
        if let Some(defect) = ctx.defect(lobby_expected) {
            return Err(phase.fail(ResolveError::InvalidContext {
                process_id: process_id.clone(),
                room_id,
                defect,
            }));
        }

        phase.advance(ResolvePhase::Resolved);
        let ctx = Arc::new(ctx);
        self.cache.publish(Arc::clone(&ctx));
        Ok(Resolution::Resolved(ctx))
    }
}

/// Walks [`ResolvePhase`] and mirrors it onto the current span.
struct PhaseTracker {
    phase: ResolvePhase,
}

impl PhaseTracker {
    fn start() -> Self {
        Self {
            phase: ResolvePhase::NotDeployed,
        }
    }

    fn advance(&mut self, to: ResolvePhase) {
        debug_assert!(
            self.phase.can_transition_to(to),
            "invalid phase transition {} -> {}",
            self.phase,
            to
        );
        self.phase = to;
        Span::current().record("phase", to.as_str());
        trace!(phase = %to, "resolve phase");
    }

    fn fail(&mut self, err: ResolveError) -> ResolveError {
        self.advance(ResolvePhase::Failed);
        err
    }
}
