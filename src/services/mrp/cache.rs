use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use super::engine::MrpRun;
use crate::errors::ServiceError;

struct CachedRun {
    run: Arc<MrpRun>,
    computed_at: Instant,
}

/// Process-wide cache for the most recent run, with a single-flight guard.
///
/// The slot mutex is held across the refresh, so concurrent requests that
/// find the cache stale queue up behind the one in-flight computation and
/// then read its result. A failed refresh publishes nothing; the previous
/// (expired) entry stays untouched.
pub struct MrpRunCache {
    ttl: Duration,
    slot: Mutex<Option<CachedRun>>,
}

impl MrpRunCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<Arc<MrpRun>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MrpRun, ServiceError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.computed_at.elapsed() < self.ttl {
                debug!("serving MRP run from cache");
                return Ok(Arc::clone(&cached.run));
            }
        }

        let run = Arc::new(refresh().await?);
        *slot = Some(CachedRun {
            run: Arc::clone(&run),
            computed_at: Instant::now(),
        });
        Ok(run)
    }

    /// Drops the cached run; the next request recomputes.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty_run() -> MrpRun {
        MrpRun {
            started_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            results: vec![],
            initial_approved: HashMap::new(),
            initial_open_po: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn fresh_entries_are_shared_without_recompute() {
        let cache = MrpRunCache::new(Duration::from_secs(60));
        let computes = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_refresh(|| async {
                    computes.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_run())
                })
                .await
                .unwrap();
        }
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_trigger_a_new_run() {
        let cache = MrpRunCache::new(Duration::from_millis(0));
        let computes = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_refresh(|| async {
                    computes.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_run())
                })
                .await
                .unwrap();
        }
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_publishes_nothing() {
        let cache = MrpRunCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_refresh(|| async {
                Err(ServiceError::UpstreamUnavailable("erp down".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));

        // The failure left no cached value behind; this compute runs.
        let computes = AtomicUsize::new(0);
        cache
            .get_or_refresh(|| async {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok(empty_run())
            })
            .await
            .unwrap();
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_stale_readers_share_one_flight() {
        let cache = Arc::new(MrpRunCache::new(Duration::from_secs(60)));
        let computes = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let computes = Arc::clone(&computes);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async {
                        computes.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(empty_run())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }
}
