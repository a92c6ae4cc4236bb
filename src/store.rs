/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::store
  ------------------------------------------------------------
  Purpose:
    Filesystem primitives for the mirror tree: atomic package
    folder claims, file listings with sizes, streamed writes,
    and deletions.

  Security / Safety Notes:
    Writes stay beneath the configured output directory;
    file names are derived from registry ids and versions.

  Dependencies:
    tokio::fs for async I/O, futures-util for stream draining.

  Operational Scope:
    Used by the orchestrator, the fetcher, and the cleanup
    pass.

  Revision History:
    2026-10-16 NMR  Authored mirror store helpers.
  ------------------------------------------------------------
  Principles Observed:
    - Check-and-create is a single filesystem operation
    - Partial files are removed on failure
============================================================*/

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{MirrorError, Result};

/// A regular file found in a package folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Create the output root (and parents) if missing.
pub async fn ensure_root(root: &Path) -> Result<()> {
    fs::create_dir_all(root).await.map_err(|err| {
        MirrorError::Filesystem(format!(
            "Failed to create output directory {}: {err}",
            root.display()
        ))
    })
}

pub async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Atomically create a package folder. Returns `false` when the folder
/// already exists, which marks the package as mirrored.
pub async fn claim_dir(path: &Path) -> Result<bool> {
    match fs::create_dir(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(MirrorError::Filesystem(format!(
            "Failed to create package folder {}: {err}",
            path.display()
        ))),
    }
}

/// List regular files in `dir` with their sizes, sorted by name.
pub async fn list_files(dir: &Path) -> Result<Vec<StoredFile>> {
    let mut reader = fs::read_dir(dir).await.map_err(|err| {
        MirrorError::Filesystem(format!("Failed to read {}: {err}", dir.display()))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        files.push(StoredFile {
            path: entry.path(),
            name: entry.file_name().to_string_lossy().into_owned(),
            size: meta.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// List immediate subdirectories of `dir`, sorted by path.
pub async fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut reader = fs::read_dir(dir).await.map_err(|err| {
        MirrorError::Filesystem(format!("Failed to read {}: {err}", dir.display()))
    })?;

    let mut dirs = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Size of the largest file in `dir`, zero when empty.
pub async fn largest_file(dir: &Path) -> Result<u64> {
    Ok(list_files(dir)
        .await?
        .iter()
        .map(|file| file.size)
        .max()
        .unwrap_or(0))
}

/// Stream `body` into `path`, truncating any existing file. On failure the
/// partial file is removed before the error is returned.
pub async fn write_stream<S>(path: &Path, body: S) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let file = fs::File::create(path).await.map_err(|err| {
        MirrorError::Filesystem(format!("Failed to create {}: {err}", path.display()))
    })?;

    match drain_into(file, body, path).await {
        Ok(written) => Ok(written),
        Err(err) => {
            let _ = fs::remove_file(path).await;
            Err(err)
        }
    }
}

async fn drain_into<S>(file: fs::File, mut body: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await.map_err(|err| {
            MirrorError::Filesystem(format!("Failed to write {}: {err}", path.display()))
        })?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|err| {
        MirrorError::Filesystem(format!("Failed to flush {}: {err}", path.display()))
    })?;
    Ok(written)
}

pub async fn delete_file(path: &Path) -> Result<()> {
    fs::remove_file(path).await.map_err(|err| {
        MirrorError::Filesystem(format!("Failed to delete {}: {err}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn claim_dir_is_false_when_folder_exists() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("foo.bar");
        assert!(!dir_exists(&folder).await);
        assert!(claim_dir(&folder).await.unwrap());
        assert!(dir_exists(&folder).await);
        assert!(!claim_dir(&folder).await.unwrap());
    }

    #[tokio::test]
    async fn write_stream_truncates_and_reports_size() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("a.nupkg");
        std::fs::write(&path, vec![0_u8; 64]).unwrap();

        let chunks: Vec<Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"de"))];
        let written = write_stream(&path, stream::iter(chunks)).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcde");
    }

    #[tokio::test]
    async fn write_stream_removes_partial_file_on_error() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("broken.nupkg");
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(MirrorError::Network("connection reset".into())),
        ];
        assert!(write_stream(&path, stream::iter(chunks)).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn largest_file_and_listing() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(largest_file(root.path()).await.unwrap(), 0);
        std::fs::write(root.path().join("b.nupkg"), vec![1_u8; 10]).unwrap();
        std::fs::write(root.path().join("a.nupkg"), vec![1_u8; 30]).unwrap();
        std::fs::create_dir(root.path().join("nested")).unwrap();

        let files = list_files(root.path()).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.nupkg", "b.nupkg"]);
        assert_eq!(largest_file(root.path()).await.unwrap(), 30);
        assert_eq!(list_dirs(root.path()).await.unwrap(), vec![root.path().join("nested")]);

        delete_file(&root.path().join("a.nupkg")).await.unwrap();
        assert_eq!(largest_file(root.path()).await.unwrap(), 10);
    }
}
