//! Types for the queue module.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, RepositoryConfig};
use crate::repository::CommitAuthor;

use super::error::QueueError;

/// Suffix shared by all commit descriptor names.
pub const DESCRIPTOR_SUFFIX: &str = ".commit.json";

/// `<ts>-<problemId>-<releaseFileName>`; the file name may itself contain `-`.
static REQUEST_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)-([0-9]+)-(.+)$").expect("request id pattern is valid")
});

/// A queued instruction to replace one problem's test data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRequest {
    /// Descriptor name without [`DESCRIPTOR_SUFFIX`].
    pub request_id: String,
    pub problem_id: u64,
    /// Object name of the release archive under `<release prefix><problemId>/`.
    pub release_file_name: String,
    pub created_at: DateTime<Utc>,
}

impl CommitRequest {
    /// Parses a descriptor object name (without the queue prefix).
    pub fn from_descriptor_name(name: &str) -> Result<Self, QueueError> {
        let request_id = name
            .strip_suffix(DESCRIPTOR_SUFFIX)
            .ok_or_else(|| QueueError::malformed(name, "missing .commit.json suffix"))?;

        let caps = REQUEST_ID_PATTERN
            .captures(request_id)
            .ok_or_else(|| QueueError::malformed(name, "expected <ts>-<problemId>-<file>"))?;

        let ts: i64 = caps[1]
            .parse()
            .map_err(|_| QueueError::malformed(name, "timestamp out of range"))?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(ts)
            .ok_or_else(|| QueueError::malformed(name, "timestamp out of range"))?;
        let problem_id: u64 = caps[2]
            .parse()
            .map_err(|_| QueueError::malformed(name, "problem id out of range"))?;

        Ok(Self {
            request_id: request_id.to_string(),
            problem_id,
            release_file_name: caps[3].to_string(),
            created_at,
        })
    }

    /// Object name of this request's descriptor.
    pub fn descriptor_name(&self) -> String {
        format!("{}{}", self.request_id, DESCRIPTOR_SUFFIX)
    }
}

/// Author and message for a request's commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitMetadata {
    pub author_name: String,
    pub author_email: String,
    pub commit_message: String,
}

impl CommitMetadata {
    pub fn author(&self) -> CommitAuthor {
        CommitAuthor::new(&self.author_name, &self.author_email)
    }
}

/// Values used when a descriptor body leaves a field out.
#[derive(Debug, Clone)]
pub struct CommitDefaults {
    pub author_name: String,
    pub author_email: String,
    /// `{problem_id}` is replaced with the request's problem id.
    pub message_template: String,
}

impl CommitDefaults {
    pub fn from_config(repository: &RepositoryConfig, pipeline: &PipelineConfig) -> Self {
        Self {
            author_name: repository.user_name.clone(),
            author_email: repository.user_email.clone(),
            message_template: pipeline.commit_message_template.clone(),
        }
    }

    pub fn message_for(&self, problem_id: u64) -> String {
        self.message_template
            .replace("{problem_id}", &problem_id.to_string())
    }
}

/// Descriptor body as written by the publisher.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CommitBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "commitMessage")]
    pub commit_message: Option<String>,
}

impl CommitBody {
    /// Parses a body; an empty or blank body is `{}`.
    pub fn parse(request_id: &str, bytes: &[u8]) -> Result<Self, QueueError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).map_err(|source| QueueError::InvalidBody {
            request_id: request_id.to_string(),
            source,
        })
    }

    pub fn into_metadata(self, problem_id: u64, defaults: &CommitDefaults) -> CommitMetadata {
        fn or_default(value: Option<String>, default: impl FnOnce() -> String) -> String {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(default)
        }

        CommitMetadata {
            author_name: or_default(self.name, || defaults.author_name.clone()),
            author_email: or_default(self.email, || defaults.author_email.clone()),
            commit_message: or_default(self.commit_message, || defaults.message_for(problem_id)),
        }
    }
}
