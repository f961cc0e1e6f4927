//! Target platforms and release asset selection.
//!
//! Update clients name their platform in the request path; this module
//! maps that name to a [`Platform`] and picks the matching asset from a
//! release using a declarative table of file name rules.

mod matcher;

use std::str::FromStr;

pub use matcher::{NameRule, match_asset};

/// A platform served by the update endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// macOS, served through Squirrel.Mac
    Darwin,
    /// Windows, served through Squirrel.Windows
    Win32,
}

impl Platform {
    /// Asset naming rules for this platform, highest priority first.
    pub fn rules(self) -> &'static [NameRule] {
        match self {
            Platform::Darwin => matcher::DARWIN_RULES,
            Platform::Win32 => matcher::WIN32_RULES,
        }
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "darwin" | "mac" | "macos" | "osx" => Ok(Platform::Darwin),
            "win32" | "win" | "win64" | "windows" => Ok(Platform::Win32),
            _ => anyhow::bail!("Unknown platform: {}. Expected darwin or win32.", s),
        }
    }
}
