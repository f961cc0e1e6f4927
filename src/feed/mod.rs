//! Squirrel.Windows `RELEASES` feed.
//!
//! The feed lists one package per line as `<SHA1> <url> <size>`. Package
//! digests come from [`PackageDigests`]; this module only assembles the text.

mod digests;

use std::collections::HashMap;

use log::debug;

use crate::platform::NameRule;
use crate::provider::{Release, ReleaseAsset};

pub use digests::{PackageDigests, SIDECAR_NAME, parse_sidecar};

const PACKAGE_RULE: NameRule = NameRule::Suffix(".nupkg");

/// The `.nupkg` assets of a release, in release order.
pub fn packages(release: &Release) -> Vec<&ReleaseAsset> {
    release
        .assets
        .iter()
        .filter(|asset| PACKAGE_RULE.matches(&asset.name))
        .collect()
}

/// Builds the feed text for `release`.
///
/// `digests` maps package download URLs to their SHA-1. Returns `None` when
/// the release has no packages with a known digest.
pub fn build(release: &Release, digests: &HashMap<String, String>) -> Option<String> {
    let lines: Vec<String> = packages(release)
        .into_iter()
        .filter_map(|asset| match digests.get(&asset.download_url) {
            Some(digest) => Some(format!("{} {} {}", digest, asset.download_url, asset.size)),
            None => {
                debug!("No digest for {}, leaving it out of the feed", asset.name);
                None
            }
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    let mut feed = lines.join("\n");
    feed.push('\n');
    Some(feed)
}
