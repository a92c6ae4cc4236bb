/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::report
  ------------------------------------------------------------
  Purpose:
    Collect per-term mirror statistics and persist the run
    report as JSON.

  Security / Safety Notes:
    Report data is written to operator-controlled paths; no
    privileged operations are performed.

  Dependencies:
    serde for JSON serialization, chrono for timestamps.

  Operational Scope:
    Filled by the orchestrator and the cleanup pass, written
    once at the end of a run.

  Revision History:
    2026-10-16 NMR  Authored run report.
  ------------------------------------------------------------
  Principles Observed:
    - Deterministic ordering for reproducible reports
    - Every skip and failure is counted
============================================================*/

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::cleanup::CleanupReport;
use crate::error::{MirrorError, Result};

/// Statistics for one search term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermReport {
    pub term: String,
    pub pages_fetched: usize,
    /// Packages that passed the exclusion and download filters.
    pub candidates: usize,
    pub excluded: usize,
    pub below_threshold: usize,
    pub already_mirrored: usize,
    pub packages_mirrored: usize,
    /// Packages whose folder could not be created.
    pub claim_failed: usize,
    /// Versions that would be downloaded in a dry run.
    pub planned: usize,
    pub downloaded: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub throttled: usize,
    pub bytes_written: u64,
    pub error: Option<String>,
}

impl TermReport {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }
}

/// Totals across all terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub terms: usize,
    pub failed_terms: usize,
    pub packages_mirrored: usize,
    pub claim_failed: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub throttled: usize,
    pub bytes_written: u64,
}

impl RunTotals {
    pub fn from_terms(terms: &[TermReport]) -> Self {
        terms.iter().fold(
            RunTotals {
                terms: terms.len(),
                ..RunTotals::default()
            },
            |mut totals, term| {
                if term.error.is_some() {
                    totals.failed_terms += 1;
                }
                totals.packages_mirrored += term.packages_mirrored;
                totals.claim_failed += term.claim_failed;
                totals.downloaded += term.downloaded;
                totals.failed += term.failed;
                totals.throttled += term.throttled;
                totals.bytes_written = totals.bytes_written.saturating_add(term.bytes_written);
                totals
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub generated_by: String,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub totals: RunTotals,
}

/// Wrapper representing the full report document.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub terms: Vec<TermReport>,
    pub cleanup: Option<CleanupReport>,
}

impl RunReport {
    pub fn build(
        output_dir: &Path,
        dry_run: bool,
        terms: Vec<TermReport>,
        cleanup: Option<CleanupReport>,
    ) -> Self {
        let metadata = ReportMetadata {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            generated_by: concat!("nuget-mirror ", env!("CARGO_PKG_VERSION")).to_string(),
            output_dir: output_dir.to_path_buf(),
            dry_run,
            totals: RunTotals::from_terms(&terms),
        };
        Self {
            metadata,
            terms,
            cleanup,
        }
    }

    /// One-line summary for the status stream.
    pub fn summary(&self) -> String {
        let totals = &self.metadata.totals;
        let mut line = format!(
            "terms={} failed_terms={} packages={} claim_failed={} downloaded={} failed={} throttled={} bytes={}",
            totals.terms,
            totals.failed_terms,
            totals.packages_mirrored,
            totals.claim_failed,
            totals.downloaded,
            totals.failed,
            totals.throttled,
            totals.bytes_written
        );
        if let Some(cleanup) = &self.cleanup {
            line.push_str(&format!(
                " cleanup_deleted={} cleanup_freed={}",
                cleanup.files_deleted, cleanup.bytes_freed
            ));
        }
        line
    }
}

/// Persist the report to the given path.
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                MirrorError::Filesystem(format!(
                    "Failed to create report directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
    }
    let file = File::create(path).map_err(|err| {
        MirrorError::Filesystem(format!(
            "Failed to create report file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, report).map_err(|err| {
        MirrorError::Serialization(format!("Failed to write report {}: {err}", path.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(name: &str, downloaded: usize, bytes: u64, error: Option<&str>) -> TermReport {
        TermReport {
            downloaded,
            bytes_written: bytes,
            packages_mirrored: 1,
            error: error.map(str::to_string),
            ..TermReport::new(name)
        }
    }

    #[test]
    fn totals_aggregate_terms() {
        let terms = vec![
            term("microsoft", 3, 300, None),
            term("serilog", 2, 50, Some("status 503")),
            TermReport {
                claim_failed: 2,
                ..TermReport::new("newtonsoft")
            },
        ];
        let totals = RunTotals::from_terms(&terms);
        assert_eq!(totals.terms, 3);
        assert_eq!(totals.failed_terms, 1);
        assert_eq!(totals.claim_failed, 2);
        assert_eq!(totals.downloaded, 5);
        assert_eq!(totals.bytes_written, 350);
        assert_eq!(totals.packages_mirrored, 2);
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let report = RunReport::build(dir.path(), false, vec![term("json", 1, 10, None)], None);
        write_report(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["terms"][0]["term"], "json");
        assert_eq!(value["metadata"]["totals"]["downloaded"], 1);
        assert!(value["cleanup"].is_null());
        assert!(report.summary().contains("downloaded=1"));
    }
}
