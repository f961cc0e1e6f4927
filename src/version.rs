//! Version comparison for release tags and client-reported versions.
//!
//! Versions are dot-separated numeric segments with an optional leading
//! `v`/`V`, an optional pre-release suffix after `-` and optional build
//! metadata after `+`. Missing trailing segments count as zero, so `1.0`
//! and `1.0.0` are the same version.

use std::cmp::Ordering;
use std::str::FromStr;

use semver::Prerelease;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: String,
}

impl VersionParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed version.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    pre: Option<Prerelease>,
}

/// Removes at most one leading `v` or `V`.
pub fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionParseError> {
    let a: Version = a.parse()?;
    let b: Version = b.parse()?;
    Ok(a.cmp(&b))
}

impl Version {
    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let rest = strip_v(input.trim());
        let rest = rest.split_once('+').map_or(rest, |(core, _build)| core);

        let (core, pre) = match rest.split_once('-') {
            Some((core, suffix)) => {
                let pre = Prerelease::new(suffix).map_err(|e| {
                    VersionParseError::new(input, format!("bad pre-release suffix: {}", e))
                })?;
                if pre.is_empty() {
                    return Err(VersionParseError::new(input, "empty pre-release suffix"));
                }
                (core, Some(pre))
            }
            None => (rest, None),
        };

        if core.is_empty() {
            return Err(VersionParseError::new(input, "empty version"));
        }

        let segments = core
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionParseError::new(
                        input,
                        format!("non-numeric segment '{}'", segment),
                    ));
                }
                segment
                    .parse::<u64>()
                    .map_err(|e| VersionParseError::new(input, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Version { segments, pre })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }

        // A pre-release sorts before the release it leads up to.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}
