//! Git fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use datacommit_core::{config::RepositoryConfig, repository::GitRepository};

pub const RECOVERY_MESSAGE: &str = "Commit leftover judger data from an interrupted run";

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Skips the current test when `git` is not installed.
macro_rules! require_git {
    () => {
        if !common::git_available() {
            eprintln!("git not available, skipping");
            return;
        }
    };
}

/// Runs git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare remote with one commit on `master` and a working copy cloned from it.
pub struct GitFixture {
    pub temp_dir: TempDir,
    pub remote: PathBuf,
    pub work: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        Self::with_files(&[])
    }

    /// Like [`new`](Self::new), with `files` included in the initial commit.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let remote = temp_dir.path().join("remote.git");
        let work = temp_dir.path().join("work");

        std::fs::create_dir_all(&remote).unwrap();
        git(&remote, &["init", "--bare", "-q"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        let seed = Self::clone_remote(temp_dir.path(), &remote, "seed");
        std::fs::write(seed.join("README"), "judger data\n").unwrap();
        for (relative, content) in files {
            let path = seed.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-q", "-m", "init"]);
        git(&seed, &["push", "-q", "origin", "master"]);

        git(
            temp_dir.path(),
            &["clone", "-q", remote.to_str().unwrap(), work.to_str().unwrap()],
        );
        git(&work, &["config", "commit.gpgsign", "false"]);

        Self {
            temp_dir,
            remote,
            work,
        }
    }

    pub fn clone_remote(parent: &Path, remote: &Path, name: &str) -> PathBuf {
        let path = parent.join(name);
        git(
            parent,
            &["clone", "-q", remote.to_str().unwrap(), path.to_str().unwrap()],
        );
        git(&path, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        git(&path, &["config", "user.name", "seed"]);
        git(&path, &["config", "user.email", "seed@example.com"]);
        git(&path, &["config", "commit.gpgsign", "false"]);
        path
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            path: self.work.clone(),
            remote: "origin".to_string(),
            branch: "master".to_string(),
            data_dir: PathBuf::from("data"),
            user_name: "oj-bot".to_string(),
            user_email: "oj-bot@example.com".to_string(),
            recovery_message: RECOVERY_MESSAGE.to_string(),
        }
    }

    pub fn repository(&self) -> GitRepository {
        GitRepository::new(&self.repository_config())
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.work.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn remote_head(&self) -> String {
        git(&self.remote, &["rev-parse", "master"])
    }

    /// Subjects of the remote `master` history, newest first.
    pub fn remote_log(&self) -> Vec<String> {
        git(&self.remote, &["log", "--format=%s", "master"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Content of `relative` on the remote `master`.
    pub fn remote_file(&self, relative: &str) -> String {
        git(&self.remote, &["show", &format!("master:{}", relative)])
    }

    /// Files under `relative` on the remote `master`.
    pub fn remote_files(&self, relative: &str) -> Vec<String> {
        git(
            &self.remote,
            &["ls-tree", "-r", "--name-only", "master", relative],
        )
        .lines()
        .map(str::to_string)
        .collect()
    }
}
