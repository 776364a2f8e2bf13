//! Resolver configuration and the resolution state machine.

use std::fmt;
use std::time::Duration;

use hathora_control::PollConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ResolverConfig
// ---------------------------------------------------------------------------

/// Configuration for resolving and caching the server context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fail resolution when the first room has no lobby.
    pub lobby_expected: bool,

    /// Timing of the connection-info poll.
    pub poll: PollConfig,

    /// Upper bound on a whole resolution started by the runtime. Callers
    /// driving the resolver directly supply their own token instead.
    pub resolve_deadline: Duration,

    /// Share one in-flight resolution between concurrent callers for the
    /// same process. Disable to let every call hit the control plane.
    pub single_flight: bool,

    pub cache: CacheConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lobby_expected: false,
            poll: PollConfig::default(),
            resolve_deadline: Duration::from_secs(60),
            single_flight: true,
            cache: CacheConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Bounded-wait settings for [`ContextCache`](crate::ContextCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long `get_cached_default` waits for a first resolution.
    pub wait_timeout: Duration,

    /// How often a waiting caller re-checks the cache.
    pub poll_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// ResolvePhase
// ---------------------------------------------------------------------------

/// Where a resolution currently is.
///
/// The happy path is strictly ordered:
///
/// ```text
/// NotDeployed → FetchingProcess → FetchingRooms → ResolvingFirstRoom
///             → Validating → Resolved
/// ```
///
/// `Cancelled` and `Failed` are reachable from every intermediate phase.
/// `NotDeployed` is the starting point; a resolution with no process id
/// never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvePhase {
    NotDeployed,
    FetchingProcess,
    FetchingRooms,
    ResolvingFirstRoom,
    Validating,
    Resolved,
    Cancelled,
    Failed,
}

impl ResolvePhase {
    /// Returns `true` once the resolution has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled | Self::Failed)
    }

    /// The next phase on the happy path, or `None` from a terminal one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotDeployed => Some(Self::FetchingProcess),
            Self::FetchingProcess => Some(Self::FetchingRooms),
            Self::FetchingRooms => Some(Self::ResolvingFirstRoom),
            Self::ResolvingFirstRoom => Some(Self::Validating),
            Self::Validating => Some(Self::Resolved),
            Self::Resolved | Self::Cancelled | Self::Failed => None,
        }
    }

    /// Returns `true` if moving to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        match target {
            Self::Cancelled | Self::Failed => {
                self != Self::NotDeployed && !self.is_terminal()
            }
            _ => self.next() == Some(target),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotDeployed => "NotDeployed",
            Self::FetchingProcess => "FetchingProcess",
            Self::FetchingRooms => "FetchingRooms",
            Self::ResolvingFirstRoom => "ResolvingFirstRoom",
            Self::Validating => "Validating",
            Self::Resolved => "Resolved",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for ResolvePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_next_follows_strict_order() {
        assert_eq!(
            ResolvePhase::NotDeployed.next(),
            Some(ResolvePhase::FetchingProcess)
        );
        assert_eq!(
            ResolvePhase::FetchingProcess.next(),
            Some(ResolvePhase::FetchingRooms)
        );
        assert_eq!(
            ResolvePhase::FetchingRooms.next(),
            Some(ResolvePhase::ResolvingFirstRoom)
        );
        assert_eq!(
            ResolvePhase::ResolvingFirstRoom.next(),
            Some(ResolvePhase::Validating)
        );
        assert_eq!(
            ResolvePhase::Validating.next(),
            Some(ResolvePhase::Resolved)
        );
        assert_eq!(ResolvePhase::Resolved.next(), None);
    }

    #[test]
    fn test_phase_exits_reachable_from_intermediate_phases_only() {
        for phase in [
            ResolvePhase::FetchingProcess,
            ResolvePhase::FetchingRooms,
            ResolvePhase::ResolvingFirstRoom,
            ResolvePhase::Validating,
        ] {
            assert!(phase.can_transition_to(ResolvePhase::Cancelled));
            assert!(phase.can_transition_to(ResolvePhase::Failed));
        }
        assert!(!ResolvePhase::NotDeployed.can_transition_to(ResolvePhase::Failed));
        assert!(!ResolvePhase::Resolved.can_transition_to(ResolvePhase::Cancelled));
        assert!(!ResolvePhase::FetchingProcess.can_transition_to(ResolvePhase::Validating));
    }

    #[test]
    fn test_resolver_config_default() {
        let config = ResolverConfig::default();
        assert!(!config.lobby_expected);
        assert!(config.single_flight);
        assert_eq!(config.cache.wait_timeout, Duration::from_secs(10));
        assert_eq!(config.cache.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_resolver_config_fills_missing_fields_from_defaults() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{ "lobby_expected": true }"#).unwrap();
        assert!(config.lobby_expected);
        assert_eq!(config.resolve_deadline, Duration::from_secs(60));
        assert_eq!(config.poll, PollConfig::default());
    }
}
