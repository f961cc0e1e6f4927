//! Update server for Squirrel.Mac and Squirrel.Windows clients.
//!
//! Update checks are answered from the releases a repository publishes on
//! GitHub. Release lists are cached in memory per repository, and concurrent
//! checks for the same repository share a single upstream request.

pub mod cache;
pub mod config;
pub mod feed;
pub mod http;
pub mod platform;
pub mod provider;
pub mod resolver;
pub mod server;
pub mod version;

pub use cache::{CacheStats, ReleaseCache};
pub use config::RelayConfig;
pub use resolver::{NotFoundReason, Resolution, UpdateQuery, UpdateResolver};
pub use server::{router, run_with_shutdown};
