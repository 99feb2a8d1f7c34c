//! Release archive download and extraction.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::store::RemoteStore;

use super::error::FetchError;

const BUFFER_SIZE: usize = 64 * 1024;

/// A release archive downloaded to the scratch directory.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedRelease {
    pub key: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the archive.
    pub sha256: String,
}

/// Result of unpacking an archive.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedRelease {
    pub target: PathBuf,
    pub files: usize,
    pub total_bytes: u64,
}

pub struct ReleaseFetcher {
    store: Arc<dyn RemoteStore>,
    release_prefix: String,
    scratch_dir: PathBuf,
}

impl ReleaseFetcher {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        release_prefix: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            release_prefix: release_prefix.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn release_key(&self, problem_id: u64, release_file_name: &str) -> String {
        format!("{}{}/{}", self.release_prefix, problem_id, release_file_name)
    }

    pub fn scratch_path(&self, problem_id: u64, release_file_name: &str) -> PathBuf {
        self.scratch_dir
            .join(format!("{}_{}", problem_id, release_file_name))
    }

    /// Downloads a release archive into the scratch directory.
    pub async fn fetch(
        &self,
        problem_id: u64,
        release_file_name: &str,
    ) -> Result<FetchedRelease, FetchError> {
        let key = self.release_key(problem_id, release_file_name);
        let path = self.scratch_path(problem_id, release_file_name);

        fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| FetchError::io(&self.scratch_dir, e))?;

        info!(key = %key, path = %path.display(), "Downloading release archive");
        let start = Instant::now();
        let size_bytes = self
            .store
            .get_to_file(&key, &path)
            .await
            .map_err(|source| FetchError::Download {
                key: key.clone(),
                source,
            })?;

        if size_bytes == 0 {
            let _ = fs::remove_file(&path).await;
            return Err(FetchError::EmptyArchive { key });
        }

        let sha256 = file_sha256(&path).await?;
        info!(
            key = %key,
            size_bytes,
            sha256 = %sha256,
            duration_ms = start.elapsed().as_millis() as u64,
            "Downloaded release archive"
        );

        Ok(FetchedRelease {
            key,
            path,
            size_bytes,
            sha256,
        })
    }

    /// Replaces `target` with the contents of `archive`, then deletes the archive.
    ///
    /// The archive is unpacked into a staging directory next to it first, so
    /// `target` is only touched once every entry has been read and verified.
    /// The archive is removed whether or not extraction succeeds.
    pub async fn extract_to(
        &self,
        archive: &Path,
        target: &Path,
    ) -> Result<ExtractedRelease, FetchError> {
        let archive_path = archive.to_path_buf();
        let target_path = target.to_path_buf();

        let result = tokio::task::spawn_blocking(move || {
            extract_zip(&archive_path, &target_path)
        })
        .await
        .map_err(|e| FetchError::io(archive, io::Error::other(e)))
        .and_then(|r| r);

        if let Err(e) = fs::remove_file(archive).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %archive.display(), error = %e, "Failed to remove release archive");
            }
        }

        let extracted = result?;
        info!(
            target = %extracted.target.display(),
            files = extracted.files,
            total_bytes = extracted.total_bytes,
            "Extracted release archive"
        );
        Ok(extracted)
    }
}

async fn file_sha256(path: &Path) -> Result<String, FetchError> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| FetchError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Staging directory used while unpacking `archive`.
fn staging_dir(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".staging");
    PathBuf::from(name)
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn extract_zip(archive_path: &Path, target: &Path) -> Result<ExtractedRelease, FetchError> {
    let staging = staging_dir(archive_path);
    remove_dir_if_exists(&staging).map_err(|e| FetchError::io(&staging, e))?;

    let result = unpack_into(archive_path, &staging).and_then(|(files, total_bytes)| {
        replace_dir(&staging, target)?;
        Ok(ExtractedRelease {
            target: target.to_path_buf(),
            files,
            total_bytes,
        })
    });

    if let Err(e) = remove_dir_if_exists(&staging) {
        warn!(path = %staging.display(), error = %e, "Failed to remove staging directory");
    }
    result
}

/// Unpacks every entry of `archive_path` below `dest`. Returns file count and bytes written.
fn unpack_into(archive_path: &Path, dest: &Path) -> Result<(usize, u64), FetchError> {
    let file = File::open(archive_path).map_err(|e| FetchError::io(archive_path, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| FetchError::invalid(archive_path, e))?;

    // Reject unsafe names before anything is written
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| FetchError::invalid(archive_path, e))?;
        if entry.enclosed_name().is_none() {
            return Err(FetchError::UnsafeEntry {
                path: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            });
        }
    }

    std::fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;

    let mut files = 0;
    let mut total_bytes = 0u64;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| FetchError::invalid(archive_path, e))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(FetchError::UnsafeEntry {
                path: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            });
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| FetchError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| FetchError::io(&out_path, e))?;

        // Read errors mean a corrupt entry (bad data or checksum), write errors are local I/O
        let mut written = 0u64;
        loop {
            let n = entry
                .read(&mut buffer)
                .map_err(|e| FetchError::invalid(archive_path, format!("{}: {}", entry.name(), e)))?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])
                .map_err(|e| FetchError::io(&out_path, e))?;
            written += n as u64;
        }

        debug!(entry = %out_path.display(), bytes = written, "Extracted entry");
        files += 1;
        total_bytes += written;
    }

    Ok((files, total_bytes))
}

/// Moves a fully unpacked `staging` directory into place as `target`.
fn replace_dir(staging: &Path, target: &Path) -> Result<(), FetchError> {
    remove_dir_if_exists(target).map_err(|e| FetchError::io(target, e))?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
    }

    match std::fs::rename(staging, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_dir(staging, target).map_err(|e| FetchError::io(target, e))
        }
        Err(e) => Err(FetchError::io(target, e)),
    }
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockRemoteStore};
    use tempfile::TempDir;

    const PREFIX: &str = "judger/data-release/";

    fn fetcher(store: &Arc<MockRemoteStore>, temp: &TempDir) -> ReleaseFetcher {
        ReleaseFetcher::new(
            Arc::clone(store) as Arc<dyn RemoteStore>,
            PREFIX,
            temp.path().join("scratch"),
        )
    }

    #[tokio::test]
    async fn test_fetch_downloads_to_scratch_path() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());
        let archive = fixtures::zip_archive(&[("1.in", "1 2\n"), ("1.out", "3\n")]);
        store
            .insert("judger/data-release/42/data.zip", archive.clone())
            .await;

        let fetched = fetcher(&store, &temp).fetch(42, "data.zip").await.unwrap();

        assert_eq!(fetched.path, temp.path().join("scratch/42_data.zip"));
        assert_eq!(fetched.size_bytes, archive.len() as u64);
        assert_eq!(fetched.sha256, format!("{:x}", Sha256::digest(&archive)));
        assert_eq!(std::fs::read(&fetched.path).unwrap(), archive);
    }

    #[tokio::test]
    async fn test_fetch_missing_archive_is_download_error() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());

        let err = fetcher(&store, &temp)
            .fetch(42, "data.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Download { .. }));
        assert!(err.is_retryable());
        assert!(!err.is_request_scoped());
    }

    #[tokio::test]
    async fn test_fetch_empty_archive_is_request_scoped() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());
        store
            .insert("judger/data-release/42/data.zip", Vec::new())
            .await;

        let err = fetcher(&store, &temp)
            .fetch(42, "data.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyArchive { .. }));
        assert!(err.is_request_scoped());
        assert!(!temp.path().join("scratch/42_data.zip").exists());
    }

    #[tokio::test]
    async fn test_extract_replaces_target_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());
        let fetcher = fetcher(&store, &temp);

        let target = temp.path().join("repo/data/42");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.in"), "old").unwrap();

        let archive = temp.path().join("42_data.zip");
        std::fs::write(
            &archive,
            fixtures::zip_archive(&[("1.in", "1 2\n"), ("sub/2.in", "5 6\n")]),
        )
        .unwrap();

        let extracted = fetcher.extract_to(&archive, &target).await.unwrap();

        assert_eq!(extracted.files, 2);
        assert!(!target.join("stale.in").exists());
        assert_eq!(std::fs::read_to_string(target.join("1.in")).unwrap(), "1 2\n");
        assert_eq!(
            std::fs::read_to_string(target.join("sub/2.in")).unwrap(),
            "5 6\n"
        );
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_extract_rejects_path_traversal() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());
        let fetcher = fetcher(&store, &temp);

        let target = temp.path().join("repo/data/42");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("keep.in"), "old").unwrap();

        let archive = temp.path().join("evil.zip");
        std::fs::write(&archive, fixtures::zip_archive(&[("../escape.txt", "x")])).unwrap();

        let err = fetcher.extract_to(&archive, &target).await.unwrap_err();
        assert!(matches!(err, FetchError::UnsafeEntry { .. }));
        assert!(err.is_request_scoped());
        assert!(target.join("keep.in").exists());
        assert!(!temp.path().join("repo/data/escape.txt").exists());
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_extract_checksum_failure_keeps_previous_data() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());
        let fetcher = fetcher(&store, &temp);

        let target = temp.path().join("repo/data/41");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("1.in"), "GOOD-ONE").unwrap();
        std::fs::write(target.join("2.in"), "GOOD-TWO").unwrap();

        let archive = temp.path().join("41_d.zip");
        std::fs::write(
            &archive,
            fixtures::corrupt_zip_archive(
                &[("1.in", "NEW-ONE-AAAAAAAA"), ("2.in", "NEW-TWO-BBBBBBBB")],
                "2.in",
            ),
        )
        .unwrap();

        let err = fetcher.extract_to(&archive, &target).await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidArchive { .. }));
        assert!(err.is_request_scoped());
        assert_eq!(std::fs::read_to_string(target.join("1.in")).unwrap(), "GOOD-ONE");
        assert_eq!(std::fs::read_to_string(target.join("2.in")).unwrap(), "GOOD-TWO");
        assert!(!archive.exists());
        assert!(!temp.path().join("41_d.zip.staging").exists());
    }

    #[tokio::test]
    async fn test_extract_rejects_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockRemoteStore::new());
        let fetcher = fetcher(&store, &temp);

        let archive = temp.path().join("corrupt.zip");
        std::fs::write(&archive, b"this is not a zip file").unwrap();

        let err = fetcher
            .extract_to(&archive, &temp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidArchive { .. }));
        assert!(!archive.exists());
        assert!(!temp.path().join("out").exists());
    }
}
