//! GitHub implementation of [`ReleaseGateway`].

use async_trait::async_trait;
use log::{debug, warn};
use sha1::{Digest, Sha1};

use crate::http::HttpClient;

use super::{GatewayError, Release, ReleaseAsset, ReleaseGateway, RepoId};

/// Default GitHub REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Releases requested per fetch. Only the first page is ever read.
const PAGE_SIZE: &str = "100";

/// GitHub API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Release {
        pub tag_name: String,
        pub name: Option<String>,
        pub body: Option<String>,
        #[serde(default)]
        pub draft: bool,
        #[serde(default)]
        pub prerelease: bool,
        pub published_at: Option<String>,
        #[serde(default)]
        pub assets: Vec<Asset>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Asset {
        pub name: String,
        pub size: u64,
        pub browser_download_url: String,
    }
}

/// Fetches releases from the GitHub REST API.
pub struct GitHubGateway {
    http_client: HttpClient,
    api_url: String,
}

impl GitHubGateway {
    /// Create from an existing HttpClient.
    pub fn from_http_client(http_client: HttpClient, api_url: &str) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReleaseGateway for GitHubGateway {
    #[tracing::instrument(skip(self))]
    async fn fetch_releases(&self, repo: &RepoId) -> Result<Vec<Release>, GatewayError> {
        if !repo.is_valid() {
            return Err(GatewayError::RepoNotFound(repo.to_string()));
        }

        let url = format!(
            "{}/repos/{}/{}/releases",
            self.api_url, repo.owner, repo.repo
        );
        debug!("Fetching releases from {}...", url);

        let parsed: Vec<api::Release> = self
            .http_client
            .get_json_with_query(&url, &[("per_page", PAGE_SIZE)])
            .await
            .map_err(|e| match e {
                GatewayError::RepoNotFound(_) => GatewayError::RepoNotFound(repo.to_string()),
                other => other,
            })?;

        debug!("Fetched {} releases for {}", parsed.len(), repo);
        Ok(parsed.into_iter().map(Release::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        self.http_client
            .get_bytes(url)
            .await
            .map_err(|e| missing_asset(url, e))
    }

    #[tracing::instrument(skip(self))]
    async fn digest_asset(&self, url: &str) -> Result<String, GatewayError> {
        let mut hasher = Sha1::new();
        let size = self
            .http_client
            .get_chunks(url, |chunk| hasher.update(chunk))
            .await
            .map_err(|e| missing_asset(url, e))?;

        let digest = hex::encode_upper(hasher.finalize());
        debug!("SHA-1 of {} ({} bytes) is {}", url, size, digest);
        Ok(digest)
    }
}

/// A 404 on an asset means the release is broken, not that the repository
/// is unknown.
fn missing_asset(url: &str, error: GatewayError) -> GatewayError {
    match error {
        GatewayError::RepoNotFound(_) => {
            warn!("Release asset {} is missing upstream", url);
            GatewayError::Transport(format!("asset not found: {}", url))
        }
        other => other,
    }
}

impl From<api::Release> for Release {
    fn from(r: api::Release) -> Self {
        Release {
            name: r
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| r.tag_name.clone()),
            tag: r.tag_name,
            notes: r.body.unwrap_or_default(),
            draft: r.draft,
            prerelease: r.prerelease,
            published_at: r.published_at,
            assets: r.assets.into_iter().map(|a| a.into()).collect(),
        }
    }
}

impl From<api::Asset> for ReleaseAsset {
    fn from(a: api::Asset) -> Self {
        ReleaseAsset {
            name: a.name,
            size: a.size,
            download_url: a.browser_download_url,
        }
    }
}
