/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::cleanup
  ------------------------------------------------------------
  Purpose:
    Trim package folders that hold too many large artifacts,
    keeping the newest versions.

  Security / Safety Notes:
    Deletes files only inside package folders under the
    output directory. Dry runs delete nothing.

  Dependencies:
    store for listings and deletions, version for ordering.

  Operational Scope:
    Run on demand after mirroring or on its own.

  Revision History:
    2026-10-16 NMR  Authored oversize cleanup pass.
  ------------------------------------------------------------
  Principles Observed:
    - Per-file failures are logged and counted, never retried
    - Newest artifacts survive
============================================================*/

use std::cmp::Ordering;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::logger::Logger;
use crate::store::{self, StoredFile};
use crate::version::PackageVersion;

/// Cleanup parameters.
#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    pub oversize_threshold_bytes: u64,
    pub keep_largest: usize,
    pub extension: String,
    pub dry_run: bool,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub folders_scanned: usize,
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub failures: usize,
    pub dry_run: bool,
}

/// Scan every package folder under `root` and delete excess large files.
pub async fn run_cleanup(root: &Path, policy: &CleanupPolicy, logger: &Logger) -> Result<CleanupReport> {
    let mut report = CleanupReport {
        dry_run: policy.dry_run,
        ..CleanupReport::default()
    };
    if !store::dir_exists(root).await {
        logger.warn("CLEANUP", format!("{} does not exist; nothing to clean", root.display()));
        return Ok(report);
    }

    for folder in store::list_dirs(root).await? {
        report.folders_scanned += 1;
        let files = match store::list_files(&folder).await {
            Ok(files) => files,
            Err(err) => {
                logger.error("CLEANUP", err.to_string());
                report.failures += 1;
                continue;
            }
        };

        for victim in excess_large_files(&folder, files, policy) {
            if policy.dry_run {
                logger.info("CLEANUP", format!("Would delete {} ({} bytes)", victim.path.display(), victim.size));
                report.files_deleted += 1;
                report.bytes_freed = report.bytes_freed.saturating_add(victim.size);
                continue;
            }
            match store::delete_file(&victim.path).await {
                Ok(()) => {
                    logger.info("CLEANUP", format!("Deleted {} ({} bytes)", victim.path.display(), victim.size));
                    report.files_deleted += 1;
                    report.bytes_freed = report.bytes_freed.saturating_add(victim.size);
                }
                Err(err) => {
                    logger.error("CLEANUP", err.to_string());
                    report.failures += 1;
                }
            }
        }
    }

    logger.info(
        "CLEANUP",
        format!(
            "Scanned {} folders, deleted {} files, freed {} bytes, {} failures",
            report.folders_scanned, report.files_deleted, report.bytes_freed, report.failures
        ),
    );
    Ok(report)
}

/// Large files beyond the newest `keep_largest`, in deletion order.
fn excess_large_files(folder: &Path, files: Vec<StoredFile>, policy: &CleanupPolicy) -> Vec<StoredFile> {
    let folder_name = folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut large: Vec<(Option<PackageVersion>, StoredFile)> = files
        .into_iter()
        .filter(|file| file.size > policy.oversize_threshold_bytes)
        .map(|file| (version_from_name(&folder_name, &file.name, &policy.extension), file))
        .collect();
    if large.len() <= policy.keep_largest {
        return Vec::new();
    }

    large.sort_by(|(va, fa), (vb, fb)| match (va, vb) {
        (Some(a), Some(b)) => b.cmp(a).then_with(|| fa.name.cmp(&fb.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => fa.name.cmp(&fb.name),
    });
    large
        .into_iter()
        .skip(policy.keep_largest)
        .map(|(_, file)| file)
        .collect()
}

/// Parse `{id}.{version}.{ext}` where `{id}` matches the folder name
/// case-insensitively.
fn version_from_name(folder_name: &str, file_name: &str, extension: &str) -> Option<PackageVersion> {
    let lower = file_name.to_ascii_lowercase();
    let prefix = format!("{}.", folder_name.to_ascii_lowercase());
    let suffix = format!(".{}", extension.to_ascii_lowercase());
    if !lower.starts_with(&prefix) || !lower.ends_with(&suffix) || lower.len() < prefix.len() + suffix.len() {
        return None;
    }
    file_name
        .get(prefix.len()..file_name.len() - suffix.len())?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(dry_run: bool) -> CleanupPolicy {
        CleanupPolicy {
            oversize_threshold_bytes: 100,
            keep_largest: 2,
            extension: "nupkg".into(),
            dry_run,
        }
    }

    fn write(dir: &Path, name: &str, size: usize) {
        std::fs::write(dir.join(name), vec![0_u8; size]).unwrap();
    }

    #[test]
    fn version_is_read_from_file_name() {
        let v = version_from_name("foo.bar", "Foo.Bar.2.0.0-beta.nupkg", "nupkg").unwrap();
        assert_eq!(v.to_string(), "2.0.0-beta");
        assert!(version_from_name("foo.bar", "other.1.0.0.nupkg", "nupkg").is_none());
        assert!(version_from_name("foo.bar", "foo.bar.nupkg", "nupkg").is_none());
    }

    #[tokio::test]
    async fn deletes_oldest_large_files_beyond_cap() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("heavy.sdk");
        std::fs::create_dir(&folder).unwrap();
        write(&folder, "Heavy.Sdk.1.0.0.nupkg", 200);
        write(&folder, "Heavy.Sdk.2.0.0.nupkg", 300);
        write(&folder, "Heavy.Sdk.10.0.0.nupkg", 400);
        write(&folder, "Heavy.Sdk.3.0.0.nupkg", 50);
        let light = root.path().join("light.lib");
        std::fs::create_dir(&light).unwrap();
        write(&light, "Light.Lib.1.0.0.nupkg", 10);

        let report = run_cleanup(root.path(), &policy(false), &Logger::quiet()).await.unwrap();

        assert_eq!(report.folders_scanned, 2);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.bytes_freed, 200);
        assert_eq!(report.failures, 0);
        let names: Vec<String> = store::list_files(&folder)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec!["Heavy.Sdk.10.0.0.nupkg", "Heavy.Sdk.2.0.0.nupkg", "Heavy.Sdk.3.0.0.nupkg"]
        );
    }

    #[tokio::test]
    async fn dry_run_reports_without_deleting() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("heavy.sdk");
        std::fs::create_dir(&folder).unwrap();
        for major in 1..=4 {
            write(&folder, &format!("Heavy.Sdk.{major}.0.0.nupkg"), 150);
        }

        let report = run_cleanup(root.path(), &policy(true), &Logger::quiet()).await.unwrap();

        assert_eq!(report.files_deleted, 2);
        assert!(report.dry_run);
        assert_eq!(store::list_files(&folder).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_root_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let report = run_cleanup(&root.path().join("absent"), &policy(false), &Logger::quiet())
            .await
            .unwrap();
        assert_eq!(report, CleanupReport::default());
    }
}
