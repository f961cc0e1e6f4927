//! SHA-1 digests of Squirrel.Windows packages.
//!
//! The release API does not report package hashes. A release built with
//! Squirrel.Windows normally ships its own `RELEASES` file, which already
//! lists them; that file is used when present. Packages it does not cover are
//! downloaded and hashed. Both results are memoized per download URL.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::sync::OnceCell;

use crate::provider::{GatewayError, Release, ReleaseAsset, ReleaseGateway};

/// Asset name of the index file Squirrel.Windows publishes with a release.
pub const SIDECAR_NAME: &str = "RELEASES";

type Sidecar = Arc<HashMap<String, String>>;

/// Per-key memo whose concurrent first lookups share one initialization.
/// A failed initialization is not remembered.
struct Memo<T> {
    cells: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> Memo<T> {
    fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_try_init<F, Fut>(&self, key: &str, init: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let cell = {
            let mut cells = self.lock_cells();
            cells.entry(key.to_string()).or_default().clone()
        };

        let result = cell.get_or_try_init(init).await.cloned();
        if result.is_err() {
            // Drop the empty cell unless a later caller already filled or replaced it.
            let mut cells = self.lock_cells();
            if cells
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell) && !current.initialized())
            {
                cells.remove(key);
            }
        }
        result
    }

    fn lock_cells(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<T>>>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock_cells().len()
    }
}

/// Resolves package digests for release feeds.
pub struct PackageDigests {
    gateway: Arc<dyn ReleaseGateway>,
    sidecars: Memo<Sidecar>,
    content: Memo<String>,
}

impl PackageDigests {
    pub fn new(gateway: Arc<dyn ReleaseGateway>) -> Self {
        Self {
            gateway,
            sidecars: Memo::new(),
            content: Memo::new(),
        }
    }

    /// Digests of every `.nupkg` asset of `release`, keyed by download URL.
    #[tracing::instrument(skip(self, release), fields(tag = %release.tag))]
    pub async fn resolve(
        &self,
        release: &Release,
    ) -> Result<HashMap<String, String>, GatewayError> {
        let packages = super::packages(release);
        let mut digests = HashMap::with_capacity(packages.len());
        if packages.is_empty() {
            return Ok(digests);
        }

        let sidecar = match release.assets.iter().find(|a| a.name == SIDECAR_NAME) {
            Some(asset) => Some(self.sidecar(asset).await?),
            None => None,
        };

        for package in packages {
            let listed = sidecar
                .as_ref()
                .and_then(|entries| entries.get(&package.name))
                .cloned();

            let digest = match listed {
                Some(digest) => digest,
                None => self.content_digest(package).await?,
            };
            digests.insert(package.download_url.clone(), digest);
        }

        Ok(digests)
    }

    async fn sidecar(&self, asset: &ReleaseAsset) -> Result<Sidecar, GatewayError> {
        self.sidecars
            .get_or_try_init(&asset.download_url, || async {
                debug!("Reading package digests from {}", asset.download_url);
                let bytes = self.gateway.fetch_asset(&asset.download_url).await?;
                let entries = parse_sidecar(&String::from_utf8_lossy(&bytes));
                if entries.is_empty() {
                    warn!("{} lists no packages", asset.download_url);
                }
                Ok::<_, GatewayError>(Arc::new(entries))
            })
            .await
    }

    async fn content_digest(&self, package: &ReleaseAsset) -> Result<String, GatewayError> {
        self.content
            .get_or_try_init(&package.download_url, || async {
                info!(
                    "Hashing {} ({} bytes) for the RELEASES feed",
                    package.name, package.size
                );
                self.gateway.digest_asset(&package.download_url).await
            })
            .await
    }
}

/// Parses a Squirrel.Windows `RELEASES` file into file name → SHA-1.
///
/// Malformed lines are skipped.
pub fn parse_sidecar(text: &str) -> HashMap<String, String> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let digest = fields.next()?;
            let file = fields.next()?;
            fields.next()?.parse::<u64>().ok()?;

            if digest.len() != 40 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }

            let name = file.rsplit('/').next().unwrap_or(file);
            Some((name.to_string(), digest.to_ascii_uppercase()))
        })
        .collect()
}
