/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::mirror
  ------------------------------------------------------------
  Purpose:
    Drive the mirror pipeline: page through each search term,
    filter candidates, claim package folders, select versions,
    and fetch artifacts under the oversize throttle.

  Security / Safety Notes:
    Writes only beneath the output directory. A package folder
    is claimed with a single create call before any download.

  Dependencies:
    paginator, selector, throttle, fetcher, store.

  Operational Scope:
    Invoked once per run by the binary entry point.

  Revision History:
    2026-10-16 NMR  Authored mirror orchestrator.
  ------------------------------------------------------------
  Principles Observed:
    - Transport errors end a term, never the run
    - Per-package and per-version failures are counted, never fatal
    - Existing package folders are never revisited
============================================================*/

use std::path::{Path, PathBuf};

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::fetcher::{ArtifactFetcher, FetchOutcome};
use crate::logger::Logger;
use crate::package_info::PackageSummary;
use crate::paginator::SearchPaginator;
use crate::registry::{ArtifactSource, SearchSource};
use crate::report::TermReport;
use crate::selector::mirror_target;
use crate::store;
use crate::throttle::{SizeThrottle, ThrottleDecision};

/// Parameters of one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub output_dir: PathBuf,
    pub batch_size: usize,
    pub max_results: usize,
    pub min_downloads: u64,
    pub include_prerelease: bool,
    pub max_versions: usize,
    pub exclude: Vec<String>,
    pub exclude_case_sensitive: bool,
    pub extension: String,
    pub oversize_threshold_bytes: u64,
    pub oversize_cap: u32,
    pub dry_run: bool,
}

impl MirrorSettings {
    pub fn from_config(config: &MirrorConfig, output_dir: PathBuf, dry_run: bool) -> Self {
        let mirror = &config.mirror;
        Self {
            output_dir,
            batch_size: mirror.batch_size,
            max_results: mirror.max_results,
            min_downloads: mirror.min_downloads,
            include_prerelease: mirror.include_prerelease,
            max_versions: mirror.max_versions,
            exclude: mirror.exclude.clone(),
            exclude_case_sensitive: mirror.exclude_case_sensitive,
            extension: config.artifact_extension().to_string(),
            oversize_threshold_bytes: config.throttle.oversize_threshold_bytes,
            oversize_cap: config.throttle.oversize_cap,
            dry_run,
        }
    }
}

/// Why a search result was not considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Excluded(String),
    BelowThreshold,
}

/// Top-level mirror driver.
pub struct Mirror<'a, S: SearchSource + ?Sized, A: ArtifactSource + ?Sized> {
    search: &'a S,
    artifacts: &'a A,
    settings: MirrorSettings,
    logger: &'a Logger,
}

impl<'a, S, A> Mirror<'a, S, A>
where
    S: SearchSource + ?Sized,
    A: ArtifactSource + ?Sized,
{
    pub fn new(search: &'a S, artifacts: &'a A, settings: MirrorSettings, logger: &'a Logger) -> Self {
        Self {
            search,
            artifacts,
            settings,
            logger,
        }
    }

    /// Mirror every term in order. Terms are independent; a failed term is
    /// recorded in its report and the next term proceeds.
    pub async fn run(&self, terms: &[String]) -> Result<Vec<TermReport>> {
        if !self.settings.dry_run {
            store::ensure_root(&self.settings.output_dir).await?;
        }
        let mut reports = Vec::with_capacity(terms.len());
        for term in terms {
            reports.push(self.mirror_term(term).await);
        }
        Ok(reports)
    }

    /// Filter applied before a candidate counts toward the budget.
    pub fn screen(&self, package: &PackageSummary) -> Option<Rejection> {
        let excluded = if self.settings.exclude_case_sensitive {
            self.settings
                .exclude
                .iter()
                .find(|pattern| package.id.contains(pattern.as_str()))
        } else {
            let id = package.id.to_lowercase();
            self.settings
                .exclude
                .iter()
                .find(|pattern| id.contains(&pattern.to_lowercase()))
        };
        if let Some(pattern) = excluded {
            return Some(Rejection::Excluded(pattern.clone()));
        }
        if package.total_downloads < self.settings.min_downloads {
            return Some(Rejection::BelowThreshold);
        }
        None
    }

    pub async fn mirror_term(&self, term: &str) -> TermReport {
        let mut report = TermReport::new(term);
        let mut paginator = SearchPaginator::new(
            term,
            self.settings.batch_size,
            self.settings.max_results,
            self.settings.include_prerelease,
        );
        self.logger.info("SEARCH", format!("Searching '{term}'"));

        while let Some(query) = paginator.next_query() {
            let page = match self.search.search_page(&query).await {
                Ok(page) => page,
                Err(err) => {
                    self.logger.error(
                        "SEARCH",
                        format!("'{term}' page at offset {} failed: {err}", query.offset),
                    );
                    report.error = Some(err.to_string());
                    paginator.abort();
                    break;
                }
            };
            paginator.begin_page();
            self.logger.debug(
                "PAGE",
                format!("'{term}' offset={} entries={}", query.offset, page.len()),
            );

            for package in &page {
                match self.screen(package) {
                    Some(Rejection::Excluded(pattern)) => {
                        report.excluded += 1;
                        self.logger.debug("EXCLUDED", format!("{} matches '{pattern}'", package.id));
                        continue;
                    }
                    Some(Rejection::BelowThreshold) => {
                        report.below_threshold += 1;
                        continue;
                    }
                    None => {}
                }

                report.candidates += 1;
                let more = paginator.accept();
                self.mirror_package(package, &mut report).await;
                if !more {
                    break;
                }
            }
            paginator.finish_page();
        }

        report.pages_fetched = paginator.pages_fetched();
        self.logger.info(
            "TERM",
            format!(
                "Finished search term '{term}': candidates={} mirrored={} downloaded={} failed={}",
                paginator.accepted_total(),
                report.packages_mirrored,
                report.downloaded,
                report.failed
            ),
        );
        report
    }

    /// Mirror one candidate. Every failure is logged and counted in the
    /// report; the caller moves on to the next candidate.
    async fn mirror_package(&self, package: &PackageSummary, report: &mut TermReport) {
        let folder = self.settings.output_dir.join(package.folder_name());

        if self.settings.dry_run {
            if store::dir_exists(&folder).await {
                report.already_mirrored += 1;
                return;
            }
            let target = mirror_target(&package.id, &package.versions, self.settings.max_versions);
            let versions: Vec<&str> = target.selected.iter().map(|e| e.version.as_str()).collect();
            self.logger.info(
                "PLAN",
                format!("{} - Downloads: {} - {}", package.id, package.total_downloads, versions.join(", ")),
            );
            report.packages_mirrored += 1;
            report.planned += versions.len();
            return;
        }

        match store::claim_dir(&folder).await {
            Ok(true) => {}
            Ok(false) => {
                report.already_mirrored += 1;
                self.logger.debug("EXISTS", format!("{} already mirrored", package.id));
                return;
            }
            Err(err) => {
                report.claim_failed += 1;
                self.logger.error("PACKAGE", format!("{}: {err}", package.id));
                return;
            }
        }
        report.packages_mirrored += 1;

        let target = mirror_target(&package.id, &package.versions, self.settings.max_versions);
        let fetcher = ArtifactFetcher::new(self.artifacts, &self.settings.extension, self.logger);
        let mut throttle = SizeThrottle::new(
            self.settings.oversize_threshold_bytes,
            self.settings.oversize_cap,
        );

        let mut skipped = 0_usize;
        for entry in &target.selected {
            let largest = self.largest_on_disk(&folder).await;
            if throttle.admit(largest) == ThrottleDecision::Skip {
                if skipped == 0 {
                    self.logger.warn(
                        "THROTTLE",
                        format!(
                            "{} reached {} oversize downloads; skipping remaining versions",
                            package.id,
                            throttle.oversize_count()
                        ),
                    );
                }
                skipped += 1;
                report.throttled += 1;
                continue;
            }

            self.logger.info(
                "DOWNLOAD",
                format!("{} - {} - Downloads: {}", package.id, entry.version, package.total_downloads),
            );
            match fetcher.fetch(&folder, &package.id, entry).await {
                FetchOutcome::Written { bytes, .. } => {
                    report.downloaded += 1;
                    report.bytes_written = report.bytes_written.saturating_add(bytes);
                }
                FetchOutcome::Unavailable => report.unavailable += 1,
                FetchOutcome::Failed(_) => report.failed += 1,
            }
        }
    }

    async fn largest_on_disk(&self, folder: &Path) -> u64 {
        match store::largest_file(folder).await {
            Ok(size) => size,
            Err(err) => {
                self.logger.warn("THROTTLE", format!("Cannot inspect {}: {err}", folder.display()));
                0
            }
        }
    }
}
