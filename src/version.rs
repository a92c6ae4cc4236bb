/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::version
  ------------------------------------------------------------
  Purpose:
    Parse and order NuGet-flavoured package versions and
    derive the major-version bucket key of a version string.

  Security / Safety Notes:
    Pure data handling; no I/O performed in this module.

  Dependencies:
    thiserror for parse errors.

  Operational Scope:
    Used by the version selector, the artifact fetcher, and
    the cleanup pass to compare versions.

  Revision History:
    2026-10-16 NMR  Introduced PackageVersion.
  ------------------------------------------------------------
  Principles Observed:
    - Total ordering for deterministic selection
    - Explicit parse failures instead of silent coercion
============================================================*/

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Version parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version `{input}`: {reason}")]
    InvalidFormat { input: String, reason: String },
    #[error("Invalid number `{component}` in version `{input}`")]
    InvalidNumber { input: String, component: String },
}

/// A package version: up to four numeric release components and an
/// optional dotted pre-release label. Build metadata is kept for display
/// but ignored by comparisons.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    pub prerelease: Vec<String>,
    pub build: Option<String>,
}

impl PackageVersion {
    #[cfg(test)]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: Vec::new(),
            build: None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Registry identity form: lower-cased, without build metadata, with
    /// the fourth component only when it is non-zero.
    pub fn normalized(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision != 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        if self.is_prerelease() {
            out.push('-');
            out.push_str(&self.prerelease.join("."));
        }
        out.to_ascii_lowercase()
    }

    fn release(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }
}

/// Leading dot-delimited token of a raw version string, the bucket key
/// used to group versions into major families. Treated as opaque text.
pub fn major_key(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.split('.').next().unwrap_or(trimmed)
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason: &str| VersionError::InvalidFormat {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("empty version"));
        }

        let (version_part, build) = match input.split_once('+') {
            Some((v, b)) if !b.is_empty() => (v, Some(b.to_string())),
            Some(_) => return Err(invalid("empty build metadata")),
            None => (input, None),
        };

        let (core, prerelease) = match version_part.split_once('-') {
            Some((c, p)) => {
                let labels: Vec<String> = p.split('.').map(str::to_string).collect();
                if labels.iter().any(|label| label.is_empty()) {
                    return Err(invalid("empty pre-release identifier"));
                }
                (c, labels)
            }
            None => (version_part, Vec::new()),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 4 {
            return Err(invalid("more than four release components"));
        }

        let mut numbers = [0_u64; 4];
        for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidNumber {
                    input: input.to_string(),
                    component: part.to_string(),
                });
            }
            *slot = part.parse().map_err(|_| VersionError::InvalidNumber {
                input: input.to_string(),
                component: part.to_string(),
            })?;
        }

        Ok(PackageVersion {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            revision: numbers[3],
            prerelease,
            build,
        })
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if self.is_prerelease() {
            write!(f, "-{}", self.prerelease.join("."))?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

fn compare_label(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| -> Option<u64> {
        if s.bytes().all(|c| c.is_ascii_digit()) {
            s.parse().ok()
        } else {
            None
        }
    };
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
    }
}

fn compare_prerelease(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (false, true) => return Ordering::Less,
        (true, false) => return Ordering::Greater,
        (false, false) => {}
    }
    for (left, right) in a.iter().zip(b.iter()) {
        match compare_label(left, right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release()
            .cmp(&other.release())
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}
