//! Testing utilities and mock implementations.
//!
//! Mocks for every external collaborator of the pipeline, so a whole run can
//! be exercised without an object store, a git remote or other processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use datacommit_core::testing::{fixtures, MockProcessControl, MockRemoteStore, MockRepository};
//!
//! let store = MockRemoteStore::new();
//! store.insert(&fixtures::descriptor_key("judger/data-commit/", 1700000000000, 42, "data.zip"), b"{}".to_vec()).await;
//! store.insert("judger/data-release/42/data.zip", fixtures::zip_archive(&[("1.in", "1 2\n")])).await;
//!
//! let repository = MockRepository::new(repo_dir.path());
//! repository.set_dirty(true).await; // simulate an interrupted run
//! ```

mod mock_process;
mod mock_repository;
mod mock_store;

pub use mock_process::MockProcessControl;
pub use mock_repository::{MockCommit, MockRepository};
pub use mock_store::{MockRemoteStore, StoreOperation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Builds an in-memory zip archive from `(name, content)` pairs.
    ///
    /// Names are stored verbatim, so unsafe names such as `../x` can be produced.
    pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options)
                .expect("zip entry can be started");
            zip.write_all(content.as_bytes())
                .expect("zip entry can be written");
        }
        zip.finish().expect("zip can be finished").into_inner()
    }

    /// Builds an uncompressed zip archive whose `corrupt` entry fails its checksum.
    ///
    /// Entries before it unpack fine. The content of `corrupt` must not appear
    /// elsewhere in the archive.
    pub fn corrupt_zip_archive(entries: &[(&str, &str)], corrupt: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            zip.start_file(*name, options)
                .expect("zip entry can be started");
            zip.write_all(content.as_bytes())
                .expect("zip entry can be written");
        }
        let mut bytes = zip.finish().expect("zip can be finished").into_inner();

        let content = entries
            .iter()
            .find(|(name, _)| *name == corrupt)
            .map(|(_, content)| content.as_bytes())
            .expect("corrupt entry is one of the entries");
        let offset = bytes
            .windows(content.len())
            .position(|window| window == content)
            .expect("stored content appears in the archive");
        bytes[offset + content.len() - 1] ^= 0xff;
        bytes
    }

    /// Request id of a descriptor, `<ts>-<problemId>-<releaseFileName>`.
    pub fn request_id(created_at_ms: i64, problem_id: u64, release_file_name: &str) -> String {
        format!("{}-{}-{}", created_at_ms, problem_id, release_file_name)
    }

    /// Full key of a commit descriptor under `prefix`.
    pub fn descriptor_key(
        prefix: &str,
        created_at_ms: i64,
        problem_id: u64,
        release_file_name: &str,
    ) -> String {
        format!(
            "{}{}.commit.json",
            prefix,
            request_id(created_at_ms, problem_id, release_file_name)
        )
    }

    /// Full key of a release archive under `prefix`.
    pub fn release_key(prefix: &str, problem_id: u64, release_file_name: &str) -> String {
        format!("{}{}/{}", prefix, problem_id, release_file_name)
    }
}
