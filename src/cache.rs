//! In-memory release cache with per-repository single-flight refresh.
//!
//! Each repository owns one slot holding its last successful fetch and, while
//! a refresh is running, a shared handle to that refresh. Callers that find a
//! refresh in progress await the same handle instead of issuing their own
//! request. Refreshes run as spawned tasks, so a caller going away does not
//! cancel a fetch other callers are waiting on.
//!
//! Slots live in a fixed number of shards, each behind its own mutex. Locks
//! are only held for map bookkeeping, never across an await.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use tokio::time::Instant;

use crate::provider::{GatewayError, Release, ReleaseGateway, RepoId};

/// Default freshness window of a cached release list.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

const SHARD_COUNT: usize = 16;

/// An immutable, cheaply cloned release list.
pub type Releases = Arc<[Release]>;

type PendingFetch = Shared<BoxFuture<'static, Result<Releases, GatewayError>>>;

/// The result of one complete, successful upstream fetch.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub repo: RepoId,
    pub releases: Releases,
    pub fetched_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    pending: Option<PendingFetch>,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a fresh entry
    pub hits: u64,
    /// Started an upstream fetch
    pub misses: u64,
    /// Joined a fetch another caller started
    pub coalesced: u64,
    /// Fetches that failed and fell back to an expired entry
    pub stale_served: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    stale_served: AtomicU64,
}

struct Inner {
    gateway: Arc<dyn ReleaseGateway>,
    ttl: Duration,
    shards: Vec<Mutex<HashMap<RepoId, Slot>>>,
    counters: Counters,
}

/// TTL'd, single-flight cache of repository release lists.
#[derive(Clone)]
pub struct ReleaseCache {
    inner: Arc<Inner>,
}

impl ReleaseCache {
    pub fn new(gateway: Arc<dyn ReleaseGateway>, ttl: Duration) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();

        Self {
            inner: Arc::new(Inner {
                gateway,
                ttl,
                shards,
                counters: Counters::default(),
            }),
        }
    }

    /// Returns the releases of `repo`, fetching them if the cached copy is
    /// missing or expired.
    ///
    /// A failed fetch falls back to the previous (expired) release list when
    /// there is one, and is only reported to callers otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, repo: &RepoId) -> Result<Releases, GatewayError> {
        let pending = {
            let mut shard = self.inner.lock_shard(repo);
            let slot = shard.entry(repo.clone()).or_default();

            let now = Instant::now();
            if let Some(entry) = slot.entry.as_ref().filter(|e| e.is_fresh(now)) {
                debug!("Cache hit for {}", repo);
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.releases.clone());
            }

            match &slot.pending {
                Some(pending) => {
                    debug!("Joining in-flight fetch for {}", repo);
                    self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    pending.clone()
                }
                None => {
                    debug!("Cache miss for {}, fetching releases", repo);
                    self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                    let pending = Inner::spawn_fetch(self.inner.clone(), repo.clone());
                    slot.pending = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            stale_served: counters.stale_served.load(Ordering::Relaxed),
        }
    }

    /// Number of repositories with a cached release list.
    pub fn len(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|shard| {
                let shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
                shard.values().filter(|slot| slot.entry.is_some()).count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    // Slots stay consistent even if a holder panicked: every critical section
    // replaces whole fields.
    fn lock_shard(&self, repo: &RepoId) -> MutexGuard<'_, HashMap<RepoId, Slot>> {
        let mut hasher = DefaultHasher::new();
        repo.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_fetch(inner: Arc<Inner>, repo: RepoId) -> PendingFetch {
        let task = {
            let inner = inner.clone();
            let repo = repo.clone();
            tokio::spawn(async move {
                let result = inner.gateway.fetch_releases(&repo).await;
                inner.complete(&repo, result)
            })
        };

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Release fetch for {} did not finish: {}", repo, e);
                    inner.abandon(&repo);
                    Err(GatewayError::Transport(format!(
                        "release fetch for {} did not finish",
                        repo
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Records the outcome of a fetch and clears the in-flight marker.
    fn complete(
        &self,
        repo: &RepoId,
        result: Result<Vec<Release>, GatewayError>,
    ) -> Result<Releases, GatewayError> {
        let mut shard = self.lock_shard(repo);
        let slot = shard.entry(repo.clone()).or_default();
        slot.pending = None;

        match result {
            Ok(releases) => {
                let releases: Releases = releases.into();
                let now = Instant::now();
                debug!("Cached {} releases for {}", releases.len(), repo);
                slot.entry = Some(CacheEntry {
                    repo: repo.clone(),
                    releases: releases.clone(),
                    fetched_at: now,
                    expires_at: now + self.ttl,
                });
                Ok(releases)
            }
            Err(e) => {
                if let Some(stale) = &slot.entry {
                    warn!("Refreshing {} failed ({}), serving stale releases", repo, e);
                    self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                    return Ok(stale.releases.clone());
                }

                warn!("Fetching releases for {} failed: {}", repo, e);
                shard.remove(repo);
                Err(e)
            }
        }
    }

    fn abandon(&self, repo: &RepoId) {
        let mut shard = self.lock_shard(repo);
        if let Some(slot) = shard.get_mut(repo) {
            slot.pending = None;
        }
    }
}
