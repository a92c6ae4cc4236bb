/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::package_info
  ------------------------------------------------------------
  Purpose:
    Shared structures describing packages returned by the
    registry search and the versions selected for mirroring.

  Security / Safety Notes:
    Pure data container; no I/O performed in this module.

  Dependencies:
    serde for report serialization.

  Operational Scope:
    Passed from the registry client through the filters,
    the version selector, and the artifact fetcher.

  Revision History:
    2026-10-16 NMR  Introduced PackageSummary and VersionEntry.
  ------------------------------------------------------------
  Principles Observed:
    - Clear data contracts between modules
    - Parsed once, compared many times
============================================================*/

use serde::Serialize;

use crate::version::{major_key, PackageVersion};

/// One published version of a package as reported by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct VersionEntry {
    pub version: String,
    #[serde(skip)]
    pub parsed: Option<PackageVersion>,
    pub downloads: Option<u64>,
}

impl VersionEntry {
    /// Build an entry, parsing the version string. Unparsable strings are
    /// kept with `parsed == None` so a single bad entry never drops a package.
    pub fn new(version: impl Into<String>, downloads: Option<u64>) -> Self {
        let version = version.into();
        let parsed = version.parse::<PackageVersion>().ok();
        Self {
            version,
            parsed,
            downloads,
        }
    }

    /// Major-version bucket key of this entry.
    pub fn bucket(&self) -> &str {
        major_key(&self.version)
    }
}

/// Package summary produced by one search page.
#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub id: String,
    pub total_downloads: u64,
    pub versions: Vec<VersionEntry>,
}

impl PackageSummary {
    pub fn new(id: impl Into<String>, total_downloads: u64, versions: Vec<VersionEntry>) -> Self {
        Self {
            id: id.into(),
            total_downloads,
            versions,
        }
    }

    /// Lower-cased id, the name of the package folder on disk.
    pub fn folder_name(&self) -> String {
        self.id.to_lowercase()
    }
}

/// The versions chosen for one package during this run.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorTarget {
    pub package_id: String,
    pub selected: Vec<VersionEntry>,
}
