//! Types for the processor module.

use serde::Serialize;
use std::fmt;

use crate::repository::CommitOutcome;

/// Progress of a commit request within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    Pending,
    /// Metadata and archive downloaded.
    Fetched,
    /// Archive unpacked into the problem directory.
    Extracted,
    Committed,
    Pushed,
    /// Descriptor deleted and marker updated.
    Retired,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Extracted => "extracted",
            Self::Committed => "committed",
            Self::Pushed => "pushed",
            Self::Retired => "retired",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that was committed, pushed and removed from the queue.
#[derive(Debug, Clone, Serialize)]
pub struct RetiredRequest {
    pub request_id: String,
    pub problem_id: u64,
    pub outcome: CommitOutcome,
    pub archive_sha256: String,
}

/// A request left in the queue after a request-scoped failure.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRequest {
    pub request_id: String,
    pub problem_id: u64,
    /// The stage the request failed to reach.
    pub stage: RequestStage,
    pub error: String,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Requests found in the queue at the start of the run.
    pub pending: usize,
    pub retired: Vec<RetiredRequest>,
    pub failed: Vec<FailedRequest>,
    /// Requests not attempted because an earlier request for the same problem failed.
    pub skipped: Vec<String>,
    /// Revisions of commits made for leftovers of interrupted runs.
    pub recovery_commits: Vec<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub(crate) fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            pending: 0,
            retired: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            recovery_commits: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Whether every pending request was retired.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}
