//! Mapping of resolutions to Squirrel protocol responses.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use log::warn;
use serde::Serialize;

use crate::provider::GatewayError;
use crate::resolver::Resolution;

/// JSON body Squirrel.Mac expects when an update is available.
#[derive(Debug, Serialize, PartialEq)]
pub struct UpdateManifest {
    pub name: String,
    pub notes: String,
    pub url: String,
    pub pub_date: Option<String>,
}

/// Status an upstream failure is reported with.
///
/// An unknown repository is indistinguishable from one without updates.
pub fn upstream_status(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::RepoNotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::RateLimited(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn into_response(resolution: Resolution) -> Response {
    match resolution {
        Resolution::UpToDate => StatusCode::NO_CONTENT.into_response(),
        Resolution::UpdateAvailable { release, asset } => {
            let manifest = UpdateManifest {
                name: release.name,
                notes: release.notes,
                url: asset.download_url,
                pub_date: release.published_at,
            };
            (StatusCode::OK, Json(manifest)).into_response()
        }
        Resolution::Feed(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Resolution::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        Resolution::UpstreamError(e) => {
            let status = upstream_status(&e);
            if status != StatusCode::NOT_FOUND {
                warn!("Upstream failure: {}", e);
            }
            status.into_response()
        }
    }
}
