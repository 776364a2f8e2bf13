//! Latest resolved server context plus change notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use hathora_model::ServerContext;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{CacheConfig, DeployEnv};

/// Handle returned by [`ContextCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&Arc<ServerContext>) + Send + Sync>;

/// Holds the most recent successful resolution.
///
/// Last write wins. Readers see the previous value until a new one is
/// published. Subscribers are called synchronously on the publishing task,
/// after the new value is visible, and never with any lock held; a
/// subscriber may call back into the cache. Late subscribers get no
/// replay; use [`current`](Self::current) for that.
pub struct ContextCache {
    deployed: bool,
    config: CacheConfig,
    slot: RwLock<Option<Arc<ServerContext>>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl ContextCache {
    /// `deployed` is whether a process id exists to resolve. A cache for
    /// a non-deployed process never waits.
    pub fn new(deployed: bool, config: CacheConfig) -> Self {
        Self {
            deployed,
            config,
            slot: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn for_env(env: &DeployEnv, config: CacheConfig) -> Self {
        Self::new(env.is_deployed(), config)
    }

    /// The cached context, without waiting.
    pub fn current(&self) -> Option<Arc<ServerContext>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the cached context, waiting up to `timeout` for a first
    /// resolution to land.
    ///
    /// Returns `None` at once when not deployed. A `None` after waiting
    /// means no resolution finished in time, which is logged.
    pub async fn get_cached(&self, timeout: Duration) -> Option<Arc<ServerContext>> {
        if !self.deployed {
            return None;
        }
        if let Some(ctx) = self.current() {
            return Some(ctx);
        }

        let interval = self.config.poll_interval.max(Duration::from_millis(1));
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(?timeout, "timed out waiting for a resolved server context");
                return None;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
            if let Some(ctx) = self.current() {
                return Some(ctx);
            }
        }
    }

    /// [`get_cached`](Self::get_cached) with the configured wait timeout.
    pub async fn get_cached_default(&self) -> Option<Arc<ServerContext>> {
        self.get_cached(self.config.wait_timeout).await
    }

    /// Stores `ctx` and notifies every current subscriber.
    pub fn publish(&self, ctx: Arc<ServerContext>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&ctx));

        let subscribers: Vec<Subscriber> = self
            .subscribers()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        debug!(
            process_id = %ctx.process_id_source,
            subscribers = subscribers.len(),
            "server context published"
        );
        for subscriber in subscribers {
            subscriber(&ctx);
        }
    }

    /// Registers `f` to be called on every later publish.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&Arc<ServerContext>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers().push((id, Arc::new(f)));
        id
    }

    /// Returns `true` if `id` was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn clear_subscribers(&self) {
        self.subscribers().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ContextCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCache")
            .field("deployed", &self.deployed)
            .field("config", &self.config)
            .field("cached", &self.current().is_some())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use hathora_model::{
        ConnectionInfo, ProcessId, ProcessInfo, ProcessStatus, Region, RoomContext, RoomId,
        RoomInfo,
    };

    use super::*;

    fn context(pid: &str) -> Arc<ServerContext> {
        Arc::new(ServerContext::new(
            ProcessId::new(pid),
            ProcessInfo {
                process_id: ProcessId::new(pid),
                status: ProcessStatus::Active,
                region: Region::Chicago,
                exposed_port: None,
                additional_exposed_ports: Vec::new(),
            },
            vec![RoomInfo::active("r-1")],
            RoomContext::new(
                RoomInfo::active("r-1"),
                Some(ConnectionInfo::active(RoomId::new("r-1"), "1.2.3.4", 7777)),
                None,
            ),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_deployed_returns_none_immediately() {
        let cache = ContextCache::new(false, CacheConfig::default());
        let start = Instant::now();
        assert!(cache.get_cached(Duration::from_secs(10)).await.is_none());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_value_returns_immediately() {
        let cache = ContextCache::new(true, CacheConfig::default());
        cache.publish(context("p-1"));
        let start = Instant::now();
        let got = cache.get_cached(Duration::from_secs(10)).await.unwrap();
        assert_eq!(got.process_id_source, ProcessId::new("p-1"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ContextCache::new(true, CacheConfig::default());
        cache.publish(context("p-1"));
        cache.publish(context("p-2"));
        assert_eq!(
            cache.current().unwrap().process_id_source,
            ProcessId::new("p-2")
        );
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let cache = ContextCache::new(true, CacheConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = cache.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        cache.publish(context("p-1"));
        assert!(cache.unsubscribe(id));
        assert!(!cache.unsubscribe(id));
        cache.publish(context("p-1"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_sees_new_value_and_may_reenter() {
        let cache = Arc::new(ContextCache::new(true, CacheConfig::default()));
        let seen = Arc::new(Mutex::new(None));
        let (c, s) = (Arc::clone(&cache), Arc::clone(&seen));
        cache.subscribe(move |ctx| {
            let current = c.current().map(|cur| Arc::ptr_eq(&cur, ctx));
            *s.lock().unwrap() = current;
        });
        cache.publish(context("p-1"));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_clear_subscribers() {
        let cache = ContextCache::new(true, CacheConfig::default());
        cache.subscribe(|_| {});
        cache.subscribe(|_| {});
        assert_eq!(cache.subscriber_count(), 2);
        cache.clear_subscribers();
        assert_eq!(cache.subscriber_count(), 0);
    }
}
