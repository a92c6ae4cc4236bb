/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::fetcher
  ------------------------------------------------------------
  Purpose:
    Drive one download attempt for one package version and
    persist the artifact into the package folder.

  Security / Safety Notes:
    Artifact names are built from the registry id and the
    version string; path separators are rejected.

  Dependencies:
    store for streamed writes, registry for the download seam.

  Operational Scope:
    Called by the orchestrator for every admitted version.
    Every failure ends as a FetchOutcome; nothing propagates.

  Revision History:
    2026-10-16 NMR  Authored artifact fetcher.
  ------------------------------------------------------------
  Principles Observed:
    - Failure isolated to a single (package, version) pair
    - No retries within a run
============================================================*/

use std::path::{Path, PathBuf};

use crate::error::MirrorError;
use crate::logger::Logger;
use crate::package_info::VersionEntry;
use crate::registry::{ArtifactSource, DownloadOutcome};
use crate::store;
use crate::version::PackageVersion;

/// Result of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Written { path: PathBuf, bytes: u64 },
    Unavailable,
    Failed(String),
}

/// Downloads single artifacts into package folders.
pub struct ArtifactFetcher<'a, A: ArtifactSource + ?Sized> {
    source: &'a A,
    extension: &'a str,
    logger: &'a Logger,
}

impl<'a, A: ArtifactSource + ?Sized> ArtifactFetcher<'a, A> {
    pub fn new(source: &'a A, extension: &'a str, logger: &'a Logger) -> Self {
        Self {
            source,
            extension,
            logger,
        }
    }

    /// `{id}.{version}.{ext}`
    pub fn file_name(&self, package_id: &str, version: &str) -> String {
        format!("{package_id}.{version}.{}", self.extension)
    }

    /// Attempt one download. The outcome is logged here; callers only count it.
    pub async fn fetch(&self, folder: &Path, package_id: &str, entry: &VersionEntry) -> FetchOutcome {
        let outcome = self.attempt(folder, package_id, entry).await;
        match &outcome {
            FetchOutcome::Written { path, bytes } => self.logger.info(
                "DOWNLOADED",
                format!("{} ({bytes} bytes)", path.display()),
            ),
            FetchOutcome::Unavailable => self.logger.warn(
                "UNAVAILABLE",
                format!("{package_id} {} is not available", entry.version),
            ),
            FetchOutcome::Failed(reason) => self.logger.error(
                "FAILED",
                format!("{package_id} {}: {reason}", entry.version),
            ),
        }
        outcome
    }

    async fn attempt(&self, folder: &Path, package_id: &str, entry: &VersionEntry) -> FetchOutcome {
        if let Err(err) = entry.version.parse::<PackageVersion>() {
            return FetchOutcome::Failed(MirrorError::from(err).to_string());
        }
        let version = entry.version.trim();
        if version.contains(['/', '\\']) || package_id.contains(['/', '\\']) {
            return FetchOutcome::Failed("path separator in package id or version".into());
        }

        let body = match self.source.fetch(package_id, version).await {
            Ok(DownloadOutcome::Available(body)) => body,
            Ok(DownloadOutcome::Unavailable) => return FetchOutcome::Unavailable,
            Err(err) => return FetchOutcome::Failed(err.to_string()),
        };

        let path = folder.join(self.file_name(package_id, version));
        match store::write_stream(&path, body).await {
            Ok(bytes) => FetchOutcome::Written { path, bytes },
            Err(err) => FetchOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;

    use crate::error::Result;

    /// Scripted download responses keyed by version.
    #[derive(Clone, Debug)]
    pub(crate) enum Scripted {
        Bytes(usize),
        Unavailable,
        Error,
    }

    #[derive(Default)]
    pub(crate) struct FakeArtifacts {
        pub(crate) responses: HashMap<String, Scripted>,
        pub(crate) calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeArtifacts {
        pub(crate) fn with(mut self, version: &str, response: Scripted) -> Self {
            self.responses.insert(version.to_string(), response);
            self
        }

        pub(crate) fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactSource for FakeArtifacts {
        async fn fetch(&self, package_id: &str, version: &str) -> Result<DownloadOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((package_id.to_string(), version.to_string()));
            match self.responses.get(version).cloned().unwrap_or(Scripted::Bytes(16)) {
                Scripted::Bytes(len) => {
                    let chunk = Bytes::from(vec![7_u8; len]);
                    Ok(DownloadOutcome::Available(Box::pin(stream::iter(vec![Ok::<_, MirrorError>(chunk)]))))
                }
                Scripted::Unavailable => Ok(DownloadOutcome::Unavailable),
                Scripted::Error => Err(MirrorError::Network(format!("connection reset for {version}"))),
            }
        }
    }

    #[tokio::test]
    async fn failure_of_one_version_does_not_stop_the_next() {
        let folder = tempfile::tempdir().unwrap();
        let source = FakeArtifacts::default()
            .with("2.0.0", Scripted::Error)
            .with("1.0.0", Scripted::Bytes(32));
        let logger = Logger::quiet();
        let fetcher = ArtifactFetcher::new(&source, "nupkg", &logger);

        let mut outcomes = Vec::new();
        for version in ["2.0.0", "1.0.0"] {
            outcomes.push(fetcher.fetch(folder.path(), "Foo.Bar", &VersionEntry::new(version, None)).await);
        }

        assert!(matches!(outcomes[0], FetchOutcome::Failed(_)));
        assert_eq!(
            outcomes[1],
            FetchOutcome::Written {
                path: folder.path().join("Foo.Bar.1.0.0.nupkg"),
                bytes: 32
            }
        );
        let files = store::list_files(folder.path()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn unparsable_version_fails_without_a_request() {
        let folder = tempfile::tempdir().unwrap();
        let source = FakeArtifacts::default();
        let logger = Logger::quiet();
        let fetcher = ArtifactFetcher::new(&source, "nupkg", &logger);

        let outcome = fetcher
            .fetch(folder.path(), "Foo.Bar", &VersionEntry::new("not-a-version", None))
            .await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn unavailable_writes_nothing() {
        let folder = tempfile::tempdir().unwrap();
        let source = FakeArtifacts::default().with("3.0.0", Scripted::Unavailable);
        let logger = Logger::quiet();
        let fetcher = ArtifactFetcher::new(&source, "nupkg", &logger);

        let outcome = fetcher
            .fetch(folder.path(), "Foo.Bar", &VersionEntry::new("3.0.0", None))
            .await;
        assert_eq!(outcome, FetchOutcome::Unavailable);
        assert!(store::list_files(folder.path()).await.unwrap().is_empty());
    }
}
