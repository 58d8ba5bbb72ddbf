use crate::PreviewInfo;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Storage capability behind the [`CacheFacade`].
///
/// Implementations own eviction and expiry; the facade only forwards the
/// configured time-to-live on every write.
#[async_trait]
pub trait PreviewCache: Send + Sync {
    async fn try_get(&self, key: &str) -> Option<PreviewInfo>;

    async fn set(&self, key: &str, value: &PreviewInfo, ttl: Duration);
}

/// Always misses, discards writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl PreviewCache for NoopCache {
    async fn try_get(&self, _key: &str) -> Option<PreviewInfo> {
        None
    }

    async fn set(&self, _key: &str, _value: &PreviewInfo, _ttl: Duration) {}
}

#[derive(Clone)]
pub struct CacheFacade {
    store: Arc<dyn PreviewCache>,
    ttl: Duration,
}

impl CacheFacade {
    /// A facade over [`NoopCache`].
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(ttl, NoopCache)
    }

    pub fn with_store(ttl: Duration, store: impl PreviewCache + 'static) -> Self {
        Self {
            store: Arc::new(store),
            ttl,
        }
    }

    pub fn from_shared(ttl: Duration, store: Arc<dyn PreviewCache>) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn try_get(&self, key: &str) -> Option<PreviewInfo> {
        self.store.try_get(key).await
    }

    pub async fn set(&self, key: &str, value: &PreviewInfo) {
        self.store.set(key, value, self.ttl).await;
    }
}

impl std::fmt::Debug for CacheFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFacade").field("ttl", &self.ttl).finish()
    }
}
