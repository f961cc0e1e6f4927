//! Update resolution.
//!
//! Turns an update check into a [`Resolution`]: load the repository's
//! releases from the cache, keep the public stable ones, pick the highest
//! version, then either match a platform asset and compare versions or build
//! the Windows feed.

use std::cmp::Ordering;

use log::debug;
use thiserror::Error;

use crate::cache::ReleaseCache;
use crate::feed::{self, PackageDigests};
use crate::platform::{Platform, match_asset};
use crate::provider::{GatewayError, Release, ReleaseAsset, RepoId};
use crate::version::{self, Version, strip_v};

/// One update check, as received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateQuery {
    pub repo: RepoId,
    /// Platform name as given in the request path
    pub platform: String,
    /// Version the client is running
    pub version: String,
    /// Whether the client asked for the `RELEASES` feed
    pub wants_feed: bool,
}

/// Why no update could be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotFoundReason {
    #[error("invalid repository name")]
    InvalidRepository,
    #[error("unsupported platform")]
    UnsupportedPlatform,
    #[error("no public stable release")]
    NoQualifyingRelease,
    #[error("no asset for the requested platform")]
    NoMatchingAsset,
    #[error("release has no packages for the feed")]
    NoPackagesForFeed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    UpToDate,
    UpdateAvailable {
        release: Release,
        asset: ReleaseAsset,
    },
    /// `RELEASES` feed text
    Feed(String),
    NotFound(NotFoundReason),
    UpstreamError(GatewayError),
}

pub struct UpdateResolver {
    cache: ReleaseCache,
    digests: PackageDigests,
}

impl UpdateResolver {
    pub fn new(cache: ReleaseCache, digests: PackageDigests) -> Self {
        Self { cache, digests }
    }

    pub fn cache(&self) -> &ReleaseCache {
        &self.cache
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, query: &UpdateQuery) -> Resolution {
        let resolution = self.resolve_inner(query).await;
        debug!(
            "{} {} {} (feed: {}) -> {}",
            query.repo,
            query.platform,
            query.version,
            query.wants_feed,
            describe(&resolution)
        );
        resolution
    }

    async fn resolve_inner(&self, query: &UpdateQuery) -> Resolution {
        if !query.repo.is_valid() {
            return Resolution::NotFound(NotFoundReason::InvalidRepository);
        }

        let Ok(platform) = query.platform.parse::<Platform>() else {
            return Resolution::NotFound(NotFoundReason::UnsupportedPlatform);
        };

        let releases = match self.cache.get(&query.repo).await {
            Ok(releases) => releases,
            Err(e) => return Resolution::UpstreamError(e),
        };

        let Some(candidate) = select_candidate(&releases) else {
            return Resolution::NotFound(NotFoundReason::NoQualifyingRelease);
        };

        if query.wants_feed {
            return self.feed(candidate).await;
        }

        let Some(asset) = match_asset(platform, &candidate.assets) else {
            return Resolution::NotFound(NotFoundReason::NoMatchingAsset);
        };

        if is_up_to_date(&query.version, &candidate.tag) {
            Resolution::UpToDate
        } else {
            Resolution::UpdateAvailable {
                release: candidate.clone(),
                asset: asset.clone(),
            }
        }
    }

    async fn feed(&self, release: &Release) -> Resolution {
        if feed::packages(release).is_empty() {
            return Resolution::NotFound(NotFoundReason::NoPackagesForFeed);
        }

        let digests = match self.digests.resolve(release).await {
            Ok(digests) => digests,
            Err(e) => return Resolution::UpstreamError(e),
        };

        match feed::build(release, &digests) {
            Some(text) => Resolution::Feed(text),
            None => Resolution::NotFound(NotFoundReason::NoPackagesForFeed),
        }
    }
}

/// Picks the public stable release with the highest tag.
///
/// Equal versions are ordered by publication date; fully tied releases keep
/// upstream order, so the first listed one wins. Tags that do not parse as
/// versions rank below every tag that does.
pub fn select_candidate(releases: &[Release]) -> Option<&Release> {
    releases
        .iter()
        .rev()
        .filter(|release| release.is_qualifying())
        .map(|release| (rank(release), release))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, release)| release)
}

fn rank(release: &Release) -> (Option<Version>, Option<&str>) {
    (
        release.tag.parse::<Version>().ok(),
        release.published_at.as_deref(),
    )
}

/// Whether a client on `requested` already runs `latest` or newer.
///
/// Versions that cannot be compared count as up to date only when they are
/// literally the same, so a malformed client version is always offered the
/// release.
fn is_up_to_date(requested: &str, latest: &str) -> bool {
    match version::compare(requested, latest) {
        Ok(order) => order != Ordering::Less,
        Err(e) => {
            debug!("{}, comparing versions literally", e);
            strip_v(requested.trim()) == strip_v(latest.trim())
        }
    }
}

fn describe(resolution: &Resolution) -> String {
    match resolution {
        Resolution::UpToDate => "up to date".to_string(),
        Resolution::UpdateAvailable { release, asset } => {
            format!("update to {} ({})", release.tag, asset.name)
        }
        Resolution::Feed(text) => format!("feed with {} packages", text.lines().count()),
        Resolution::NotFound(reason) => format!("not found: {}", reason),
        Resolution::UpstreamError(e) => format!("upstream error: {}", e),
    }
}
