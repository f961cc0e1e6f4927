//! HTTP surface of the update service.
//!
//! - `GET /{owner}/{repo}/{platform}/{version}`: Squirrel.Mac style update
//!   check, answered with a JSON manifest (200), nothing new (204) or 404
//! - `GET /{owner}/{repo}/{platform}/{version}/RELEASES`: Squirrel.Windows
//!   feed; any query string is ignored
//!
//! Everything else is 404.

mod response;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use log::info;
use tokio::net::TcpListener;

use crate::cache::ReleaseCache;
use crate::config::RelayConfig;
use crate::feed::PackageDigests;
use crate::http::HttpClient;
use crate::provider::{GitHubGateway, ReleaseGateway, RepoId};
use crate::resolver::{UpdateQuery, UpdateResolver};

pub use response::{UpdateManifest, into_response, upstream_status};

type UpdatePath = Path<(String, String, String, String)>;

/// Builds the router around a resolver.
pub fn router(resolver: Arc<UpdateResolver>) -> Router {
    Router::new()
        .route("/{owner}/{repo}/{platform}/{version}", get(check_update))
        .route(
            "/{owner}/{repo}/{platform}/{version}/RELEASES",
            get(release_feed),
        )
        .fallback(not_found)
        .with_state(resolver)
}

/// Wires the GitHub gateway, cache and resolver described by `config`.
pub fn build_resolver(config: &RelayConfig) -> Result<UpdateResolver> {
    let http_client = HttpClient::with_token(config.token(), config.upstream_timeout())
        .context("Failed to build HTTP client")?;
    let gateway: Arc<dyn ReleaseGateway> = Arc::new(GitHubGateway::from_http_client(
        http_client,
        &config.api_url,
    ));

    Ok(UpdateResolver::new(
        ReleaseCache::new(gateway.clone(), config.cache_ttl()),
        PackageDigests::new(gateway),
    ))
}

/// Serves until `shutdown` completes.
pub async fn run_with_shutdown<F>(config: RelayConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    if config.token().is_none() {
        info!("No GitHub token configured, using anonymous API access");
    }

    let resolver = Arc::new(build_resolver(&config)?);
    let app = router(resolver);

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(
        "Listening on {} (upstream {}, cache TTL {}s)",
        listener.local_addr()?,
        config.api_url,
        config.cache_ttl
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn check_update(
    State(resolver): State<Arc<UpdateResolver>>,
    Path((owner, repo, platform, version)): UpdatePath,
) -> Response {
    let query = UpdateQuery {
        repo: RepoId::new(owner, repo),
        platform,
        version,
        wants_feed: false,
    };
    into_response(resolver.resolve(&query).await)
}

async fn release_feed(
    State(resolver): State<Arc<UpdateResolver>>,
    Path((owner, repo, platform, version)): UpdatePath,
) -> Response {
    let query = UpdateQuery {
        repo: RepoId::new(owner, repo),
        platform,
        version,
        wants_feed: true,
    };
    into_response(resolver.resolve(&query).await)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TTL;
    use crate::provider::{MockReleaseGateway, Release, ReleaseAsset};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(gateway: MockReleaseGateway) -> Router {
        let gateway: Arc<dyn ReleaseGateway> = Arc::new(gateway);
        router(Arc::new(UpdateResolver::new(
            ReleaseCache::new(gateway.clone(), DEFAULT_TTL),
            PackageDigests::new(gateway),
        )))
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_root_is_not_found() {
        assert_eq!(
            get_status(app(MockReleaseGateway::new()), "/").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_partial_path_is_not_found() {
        let app = app(MockReleaseGateway::new());
        assert_eq!(
            get_status(app.clone(), "/owner/repo").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(app, "/owner/repo/darwin/1.0.0/extra/RELEASES").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_encoded_slash_in_repository_is_not_found() {
        let app = app(MockReleaseGateway::new());
        assert_eq!(
            get_status(app.clone(), "/..%2Forgs/victim/darwin/1.0.0").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(app, "/owner/repo%2F..%2F..%2Fuser/win32/1.0.0/RELEASES").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_update_route_reaches_resolver() {
        let mut gateway = MockReleaseGateway::new();
        gateway
            .expect_fetch_releases()
            .withf(|repo| repo.owner == "owner" && repo.repo == "repo")
            .times(1)
            .returning(|_| {
                Ok(vec![Release {
                    tag: "v1.0.0".into(),
                    name: "1.0.0".into(),
                    assets: vec![ReleaseAsset {
                        name: "App-mac.zip".into(),
                        size: 1,
                        download_url: "https://dl/App-mac.zip".into(),
                    }],
                    ..Default::default()
                }])
            });
        let app = app(gateway);

        assert_eq!(
            get_status(app.clone(), "/owner/repo/darwin/0.9.0").await,
            StatusCode::OK
        );
        assert_eq!(
            get_status(app, "/owner/repo/darwin/1.0.0").await,
            StatusCode::NO_CONTENT
        );
    }

    #[tokio::test]
    async fn test_feed_route_ignores_query_string() {
        let mut gateway = MockReleaseGateway::new();
        gateway
            .expect_fetch_releases()
            .times(1)
            .returning(|_| Ok(vec![]));
        let app = app(gateway);

        assert_eq!(
            get_status(app, "/owner/repo/win32/0.0.0/RELEASES?id=App&localVersion=0.0.0").await,
            StatusCode::NOT_FOUND
        );
    }
}
