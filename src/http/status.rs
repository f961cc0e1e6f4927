//! Classification of upstream HTTP failures into [`GatewayError`].

use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::provider::GatewayError;

/// Header GitHub uses to report the remaining request quota.
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Classifies a non-success response.
///
/// `body` is only consulted for 403 responses, where GitHub signals primary
/// rate limiting in the message text.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => {
            GatewayError::RepoNotFound("The requested resource was not found".to_string())
        }
        StatusCode::TOO_MANY_REQUESTS => {
            GatewayError::RateLimited("Too many requests".to_string())
        }
        StatusCode::FORBIDDEN if is_rate_limited(headers, body) => {
            GatewayError::RateLimited("GitHub API rate limit exceeded".to_string())
        }
        s => GatewayError::Transport(format!("HTTP {} error", s.as_u16())),
    }
}

fn is_rate_limited(headers: &HeaderMap, body: &str) -> bool {
    let exhausted = headers
        .get(RATE_LIMIT_REMAINING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    exhausted || body.to_lowercase().contains("rate limit")
}

/// Wraps a connection, timeout or decoding failure.
pub fn transport_error(context: &str, error: reqwest::Error) -> GatewayError {
    GatewayError::Transport(format!("{}: {}", context, error))
}
