//! HTTP client module with upstream status classification.

mod client;
mod status;

pub use client::HttpClient;
pub use status::{classify_status, transport_error};
