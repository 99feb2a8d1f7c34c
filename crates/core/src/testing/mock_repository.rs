//! Mock data repository for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::repository::{CommitAuthor, CommitOutcome, Repository, RepositoryError};

/// File contents keyed by path relative to the repository root.
type Snapshot = BTreeMap<String, Vec<u8>>;

/// A commit recorded by the mock.
#[derive(Debug, Clone)]
pub struct MockCommit {
    pub revision: String,
    pub message: String,
    pub author: CommitAuthor,
    /// Paths the commit was limited to; empty for recovery commits.
    pub paths: Vec<PathBuf>,
    /// Content of the committed paths.
    pub files: Snapshot,
}

#[derive(Debug, Default)]
struct State {
    commits: Vec<MockCommit>,
    /// Last committed content per committed path.
    committed: BTreeMap<PathBuf, Snapshot>,
    pushed: usize,
    dirty: bool,
    pre_syncs: usize,
    push_attempts: usize,
    fail_pull: bool,
    fail_push: bool,
}

/// Mock implementation of the Repository trait.
///
/// Works on a real directory so extraction can be observed, but keeps the
/// commit history in memory:
/// - `stage_and_commit` snapshots the given paths and reports
///   `NothingToCommit` when the content matches the previous commit
/// - the working tree is clean unless marked dirty with [`set_dirty`](Self::set_dirty)
/// - pull and push failures can be injected
#[derive(Debug, Clone)]
pub struct MockRepository {
    root: PathBuf,
    identity: CommitAuthor,
    recovery_message: String,
    state: Arc<RwLock<State>>,
}

impl MockRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identity: CommitAuthor::new("oj-bot", "oj-bot@example.com"),
            recovery_message: "Commit leftover judger data from an interrupted run".to_string(),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Marks the working tree as containing uncommitted changes.
    pub async fn set_dirty(&self, dirty: bool) {
        self.state.write().await.dirty = dirty;
    }

    pub async fn set_fail_pull(&self, fail: bool) {
        self.state.write().await.fail_pull = fail;
    }

    pub async fn set_fail_push(&self, fail: bool) {
        self.state.write().await.fail_push = fail;
    }

    /// All commits in creation order.
    pub async fn commits(&self) -> Vec<MockCommit> {
        self.state.read().await.commits.clone()
    }

    /// Commits that have been pushed.
    pub async fn pushed_commits(&self) -> Vec<MockCommit> {
        let state = self.state.read().await;
        state.commits[..state.pushed].to_vec()
    }

    pub async fn pre_sync_count(&self) -> usize {
        self.state.read().await.pre_syncs
    }

    pub async fn push_attempts(&self) -> usize {
        self.state.read().await.push_attempts
    }

    fn snapshot(&self, relative: &Path) -> Snapshot {
        let mut files = Snapshot::new();
        collect_files(&self.root, &self.root.join(relative), &mut files);
        files
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Snapshot) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files);
        } else if let (Ok(relative), Ok(content)) = (path.strip_prefix(root), std::fs::read(&path))
        {
            files.insert(relative.to_string_lossy().replace('\\', "/"), content);
        }
    }
}

#[async_trait]
impl Repository for MockRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn pre_sync(&self) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.pre_syncs += 1;
        if state.fail_pull {
            return Err(RepositoryError::PullFailed {
                remote: "origin".to_string(),
                branch: "master".to_string(),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn is_clean(&self) -> Result<bool, RepositoryError> {
        Ok(!self.state.read().await.dirty)
    }

    async fn commit_recovery(&self) -> Result<CommitOutcome, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.dirty {
            return Ok(CommitOutcome::NothingToCommit);
        }
        state.dirty = false;

        let revision = format!("mockrev{:04}", state.commits.len() + 1);
        state.commits.push(MockCommit {
            revision: revision.clone(),
            message: self.recovery_message.clone(),
            author: self.identity.clone(),
            paths: Vec::new(),
            files: Snapshot::new(),
        });
        Ok(CommitOutcome::Committed { revision })
    }

    async fn stage_and_commit(
        &self,
        paths: &[PathBuf],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<CommitOutcome, RepositoryError> {
        let mut state = self.state.write().await;

        let mut changed = false;
        let mut files = Snapshot::new();
        for path in paths {
            let snapshot = self.snapshot(path);
            if state.committed.get(path) != Some(&snapshot) {
                changed = true;
            }
            files.extend(snapshot.clone());
            state.committed.insert(path.clone(), snapshot);
        }

        if !changed {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let revision = format!("mockrev{:04}", state.commits.len() + 1);
        state.commits.push(MockCommit {
            revision: revision.clone(),
            message: message.to_string(),
            author: author.clone(),
            paths: paths.to_vec(),
            files,
        });
        Ok(CommitOutcome::Committed { revision })
    }

    async fn push(&self) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.push_attempts += 1;
        if state.fail_push {
            return Err(RepositoryError::PushFailed {
                remote: "origin".to_string(),
                branch: "master".to_string(),
                stderr: "injected failure".to_string(),
            });
        }
        state.pushed = state.commits.len();
        Ok(())
    }
}
