use crate::provider::ReleaseAsset;

use super::Platform;

/// A file name rule. Matching ignores ASCII case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    /// File name ends with the given text
    Suffix(&'static str),
    /// File name contains the given text
    Contains(&'static str),
}

impl NameRule {
    pub fn matches(&self, file_name: &str) -> bool {
        let name = file_name.to_ascii_lowercase();
        match self {
            NameRule::Suffix(suffix) => name.ends_with(suffix),
            NameRule::Contains(needle) => name.contains(needle),
        }
    }
}

pub(super) const DARWIN_RULES: &[NameRule] = &[
    NameRule::Suffix("-mac.zip"),
    NameRule::Suffix("-darwin.zip"),
    NameRule::Suffix("osx.zip"),
    NameRule::Suffix(".dmg"),
];

pub(super) const WIN32_RULES: &[NameRule] = &[
    NameRule::Suffix(".exe"),
    NameRule::Contains("win32-x64"),
];

/// Pick the asset for `platform`.
///
/// Rules are tried in priority order and the first rule with any match wins.
/// Within a rule, the first asset in release order is taken.
pub fn match_asset(platform: Platform, assets: &[ReleaseAsset]) -> Option<&ReleaseAsset> {
    platform
        .rules()
        .iter()
        .find_map(|rule| assets.iter().find(|asset| rule.matches(&asset.name)))
}
