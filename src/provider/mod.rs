//! Release source abstraction.
//!
//! This module defines the value types the rest of the crate works with
//! (repositories, releases, assets) and the [`ReleaseGateway`] trait that
//! fetches them from a release-hosting API.

mod github;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use github::{DEFAULT_API_URL, GitHubGateway};

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Whether owner and repo are both plain names: ASCII letters, digits,
    /// `-`, `_` and `.`, but not `.` or `..` alone.
    pub fn is_valid(&self) -> bool {
        is_name(&self.owner) && is_name(&self.repo)
    }
}

fn is_name(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A downloadable asset from a release.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseAsset {
    pub name: String,
    pub size: u64,
    pub download_url: String,
}

/// A release as published upstream.
///
/// Built once at the gateway boundary and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    /// Version tag (e.g., "v1.0.0"), used for ordering
    pub tag: String,
    /// Human-readable release title, shown to update clients
    pub name: String,
    /// Release notes
    pub notes: String,
    pub draft: bool,
    pub prerelease: bool,
    /// Publication date (ISO 8601)
    pub published_at: Option<String>,
    /// Downloadable assets, in upstream order
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Whether the release is public and stable.
    pub fn is_qualifying(&self) -> bool {
        !self.draft && !self.prerelease
    }
}

/// Failures reported by a [`ReleaseGateway`].
///
/// `Clone` so one failed fetch can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("repository not found: {0}")]
    RepoNotFound(String),
    #[error("upstream rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("upstream transport error: {0}")]
    Transport(String),
}

/// Source of releases and release asset contents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseGateway: Send + Sync {
    /// Fetch a single page of up to 100 releases, newest first.
    async fn fetch_releases(&self, repo: &RepoId) -> Result<Vec<Release>, GatewayError>;

    /// Download the raw contents of a small release asset.
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, GatewayError>;

    /// SHA-1 of a release asset's contents as upper-case hex. The asset is
    /// hashed while it streams in and is never held in memory whole.
    async fn digest_asset(&self, url: &str) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_display() {
        assert_eq!(RepoId::new("owner", "repo").to_string(), "owner/repo");
    }

    #[test]
    fn test_repo_id_valid_names() {
        assert!(RepoId::new("owner", "repo").is_valid());
        assert!(RepoId::new("Some-Org_2", "app.desktop").is_valid());
        assert!(RepoId::new("owner", ".github").is_valid());
    }

    #[test]
    fn test_repo_id_rejects_path_tricks() {
        assert!(!RepoId::new("", "repo").is_valid());
        assert!(!RepoId::new("owner", "").is_valid());
        assert!(!RepoId::new("..", "repo").is_valid());
        assert!(!RepoId::new("owner", ".").is_valid());
        assert!(!RepoId::new("../orgs", "victim").is_valid());
        assert!(!RepoId::new("owner", "repo/releases").is_valid());
        assert!(!RepoId::new("owner", "repo?per_page=1").is_valid());
        assert!(!RepoId::new("owner", "re po").is_valid());
        assert!(!RepoId::new("owner", "répo").is_valid());
    }

    #[test]
    fn test_is_qualifying() {
        let stable = Release::default();
        assert!(stable.is_qualifying());

        let draft = Release {
            draft: true,
            ..Default::default()
        };
        assert!(!draft.is_qualifying());

        let pre = Release {
            prerelease: true,
            ..Default::default()
        };
        assert!(!pre.is_qualifying());
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::RateLimited("403".into());
        assert!(err.to_string().contains("rate limit"));
    }
}
