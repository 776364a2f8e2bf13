//! Bounded poll for a room's connection info.
//!
//! The control plane has no push notification for "room became
//! dialable", so we ask repeatedly. The loop is bounded by the caller's
//! [`CancelToken`] (and optionally an attempt cap), never by wall-clock
//! time of its own.

use std::time::Duration;

use hathora_model::{ConnectionInfo, RoomId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{CancelToken, ControlPlane, ControlPlaneError};

/// Timing for [`poll_until_active`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Base delay between attempts.
    pub interval: Duration,

    /// Upper bound of random extra delay added to each interval, so many
    /// servers booting together don't hit the API in lockstep.
    pub jitter: Duration,

    /// Give up after this many attempts. `None` polls until cancelled.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            jitter: Duration::from_millis(250),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    /// A fixed interval with no jitter and no attempt cap.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::ZERO,
            max_attempts: None,
        }
    }

    /// The delay before the next attempt: `interval` plus `0..=jitter`.
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let max_us = self.jitter.as_micros().min(u128::from(u64::MAX)) as u64;
        let extra = rand::rng().random_range(0..=max_us);
        self.interval + Duration::from_micros(extra)
    }
}

/// Polls `control` until `room_id`'s connection info is `Active`.
///
/// - `NotFound` means the room is not scheduled yet and is retried.
/// - Any other error ends the poll and is returned.
/// - Cancellation is checked before every attempt and raced against both
///   the request and the sleep; a cancelled poll returns `Ok(None)`.
pub async fn poll_until_active<C>(
    control: &C,
    room_id: &RoomId,
    config: &PollConfig,
    cancel: &CancelToken,
) -> Result<Option<ConnectionInfo>, ControlPlaneError>
where
    C: ControlPlane + ?Sized,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!(%room_id, attempt, "connection info poll cancelled");
            return Ok(None);
        }

        attempt += 1;
        let Some(fetched) = cancel
            .run_until_cancelled(control.get_connection_info(room_id))
            .await
        else {
            debug!(%room_id, attempt, "connection info poll cancelled mid-request");
            return Ok(None);
        };
        match fetched {
            Ok(info) if info.is_active() => {
                debug!(%room_id, attempt, "connection info active");
                return Ok(Some(info));
            }
            Ok(info) => {
                trace!(%room_id, attempt, status = %info.status, "connection not active yet");
            }
            Err(e) if e.is_not_found() => {
                trace!(%room_id, attempt, "connection info not found yet");
            }
            Err(e) => return Err(e),
        }

        if config.max_attempts.is_some_and(|max| attempt >= max) {
            warn!(%room_id, attempt, "connection info never became active");
            return Ok(None);
        }

        let delay = config.next_delay();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                debug!(%room_id, attempt, "connection info poll cancelled");
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poll_config() {
        let cfg = PollConfig::default();
        assert_eq!(cfg.interval, Duration::from_secs(1));
        assert_eq!(cfg.max_attempts, None);
    }

    #[test]
    fn test_next_delay_without_jitter_is_interval() {
        let cfg = PollConfig::fixed(Duration::from_millis(200));
        assert_eq!(cfg.next_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_next_delay_stays_within_jitter_bound() {
        let cfg = PollConfig {
            interval: Duration::from_millis(100),
            jitter: Duration::from_millis(50),
            max_attempts: None,
        };
        for _ in 0..100 {
            let d = cfg.next_delay();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }
}
