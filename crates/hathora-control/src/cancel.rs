//! Shared cancellation signal.
//!
//! One token is created per resolution and threaded through every remote
//! call. Clones share the same flag: cancelling any clone cancels them all.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;

/// A cloneable, one-way cancellation flag.
///
/// Built on a `watch` channel so waiters can `await` the flip instead of
/// polling. Once cancelled, a token never resets.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Creates a token that cancels itself after `deadline`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_deadline(deadline: Duration) -> Self {
        let token = Self::new();
        let weak = Arc::downgrade(&token.flag);
        let mut done = token.flag.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {}
                _ = done.changed() => return,
            }
            cancel_weak(&weak);
        });
        token
    }

    /// Creates a new token that is cancelled when `self` is cancelled or
    /// when `deadline` elapses, whichever comes first.
    ///
    /// Cancelling the child does not cancel `self`. The timer task exits
    /// as soon as the child is cancelled or every clone of it is dropped,
    /// so a finished resolution does not keep the parent alive until the
    /// deadline. Must be called from within a Tokio runtime.
    pub fn child_with_deadline(&self, deadline: Duration) -> Self {
        let child = Self::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }
        let parent = self.clone();
        let weak = Arc::downgrade(&child.flag);
        // Errors once the last clone of the child is dropped.
        let mut done = child.flag.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {}
                _ = parent.cancelled() => {}
                _ = done.changed() => return,
            }
            cancel_weak(&weak);
        });
        child
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Drives `fut` until it completes or the token is cancelled.
    ///
    /// Returns `None` if the token fired first, dropping `fut` mid-flight.
    /// A future that is already ready wins over an already-cancelled
    /// token.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            out = fut => Some(out),
            _ = self.cancelled() => None,
        }
    }

    /// Completes when the token is cancelled. Completes immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so this cannot observe a
        // closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

fn cancel_weak(flag: &Weak<watch::Sender<bool>>) {
    if let Some(flag) = flag.upgrade() {
        flag.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_completes_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_cancels_after_deadline() {
        let token = CancelToken::with_deadline(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_follows_parent_but_not_the_reverse() {
        let parent = CancelToken::new();
        let child = parent.child_with_deadline(Duration::from_secs(60));
        child.cancel();
        assert!(!parent.is_cancelled());

        let child = parent.child_with_deadline(Duration::from_secs(60));
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .unwrap();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_timer_releases_parent_once_child_is_dropped() {
        let parent = CancelToken::new();
        let child = parent.child_with_deadline(Duration::from_secs(60));
        assert_eq!(Arc::strong_count(&parent.flag), 2);

        drop(child);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(Arc::strong_count(&parent.flag), 1);
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_timer_exits_when_child_is_cancelled() {
        let parent = CancelToken::new();
        let child = parent.child_with_deadline(Duration::from_secs(60));
        child.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(Arc::strong_count(&parent.flag), 1);
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled_drops_slow_future() {
        let token = CancelToken::with_deadline(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        let out = token
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert_eq!(out, None);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_run_until_cancelled_prefers_ready_future() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(token.run_until_cancelled(async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_cancels_at_its_own_deadline() {
        let parent = CancelToken::new();
        let child = parent.child_with_deadline(Duration::from_millis(500));
        child.cancelled().await;
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
