//! [`Repository`] implementation on top of the `git` CLI.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::RepositoryConfig;

use super::error::RepositoryError;
use super::traits::{CommitAuthor, CommitOutcome, Repository};

pub struct GitRepository {
    program: PathBuf,
    root: PathBuf,
    remote: String,
    branch: String,
    identity: CommitAuthor,
    recovery_message: String,
}

impl GitRepository {
    pub fn new(config: &RepositoryConfig) -> Self {
        Self {
            program: PathBuf::from("git"),
            root: config.path.clone(),
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            identity: CommitAuthor::new(&config.user_name, &config.user_email),
            recovery_message: config.recovery_message.clone(),
        }
    }

    /// Uses `program` instead of the `git` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Runs git in the working copy and returns its raw output.
    ///
    /// The child is killed when the returned future is dropped.
    async fn git<I, S>(&self, args: I) -> Result<(String, Output), RepositoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        debug!(command = %command, "Running git");
        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RepositoryError::Spawn {
                command: command.clone(),
                source,
            })?;

        Ok((command, output))
    }

    /// Runs git and fails on a non-zero exit. Returns trimmed stdout.
    async fn run<I, S>(&self, args: I) -> Result<String, RepositoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (command, output) = self.git(args).await?;
        if !output.status.success() {
            return Err(RepositoryError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether the index differs from `HEAD` for `paths` (all paths when empty).
    async fn has_staged_changes(&self, paths: &[PathBuf]) -> Result<bool, RepositoryError> {
        let mut args: Vec<OsString> = vec!["diff".into(), "--cached".into(), "--quiet".into()];
        if !paths.is_empty() {
            args.push("--".into());
            args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        }

        let (command, output) = self.git(&args).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            code => Err(RepositoryError::CommandFailed {
                command,
                code,
                stderr: stderr_of(&output),
            }),
        }
    }

    async fn head_revision(&self) -> Result<String, RepositoryError> {
        self.run(["rev-parse", "HEAD"]).await
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl Repository for GitRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn pre_sync(&self) -> Result<(), RepositoryError> {
        self.run(["config", "user.name", self.identity.name.as_str()])
            .await?;
        self.run(["config", "user.email", self.identity.email.as_str()])
            .await?;

        let (_, output) = self
            .git(["pull", "--no-rebase", self.remote.as_str(), self.branch.as_str()])
            .await?;
        if !output.status.success() {
            return Err(RepositoryError::PullFailed {
                remote: self.remote.clone(),
                branch: self.branch.clone(),
                stderr: stderr_of(&output),
            });
        }

        info!(remote = %self.remote, branch = %self.branch, "Pulled data repository");
        Ok(())
    }

    async fn is_clean(&self) -> Result<bool, RepositoryError> {
        let status = self.run(["status", "--porcelain"]).await?;
        Ok(status.is_empty())
    }

    async fn commit_recovery(&self) -> Result<CommitOutcome, RepositoryError> {
        self.run(["add", "-A"]).await?;
        if !self.has_staged_changes(&[]).await? {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let author = self.identity.to_string();
        self.run([
            "commit",
            "-m",
            self.recovery_message.as_str(),
            "--author",
            author.as_str(),
        ])
        .await?;

        let revision = self.head_revision().await?;
        info!(revision = %revision, "Committed leftover changes");
        Ok(CommitOutcome::Committed { revision })
    }

    async fn stage_and_commit(
        &self,
        paths: &[PathBuf],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<CommitOutcome, RepositoryError> {
        let pathspec = paths.iter().map(|p| p.as_os_str().to_os_string());

        let mut add: Vec<OsString> = vec!["add".into(), "-A".into(), "--".into()];
        add.extend(pathspec.clone());
        self.run(&add).await?;

        if !self.has_staged_changes(paths).await? {
            debug!(?paths, "No staged changes");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let mut commit: Vec<OsString> = vec![
            "commit".into(),
            "-m".into(),
            message.into(),
            "--author".into(),
            author.to_string().into(),
            "--".into(),
        ];
        commit.extend(pathspec);
        self.run(&commit).await?;

        let revision = self.head_revision().await?;
        Ok(CommitOutcome::Committed { revision })
    }

    async fn push(&self) -> Result<(), RepositoryError> {
        let (_, output) = self
            .git(["push", self.remote.as_str(), self.branch.as_str()])
            .await?;
        if !output.status.success() {
            return Err(RepositoryError::PushFailed {
                remote: self.remote.clone(),
                branch: self.branch.clone(),
                stderr: stderr_of(&output),
            });
        }
        debug!(remote = %self.remote, branch = %self.branch, "Pushed");
        Ok(())
    }
}
