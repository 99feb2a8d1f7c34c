use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Local working copy of the judger data repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryConfig {
    /// Path of the git working copy.
    pub path: PathBuf,
    /// Remote to pull from and push to.
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch shared with the judging system.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the working copy that holds one subdirectory per problem.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Service identity used for repository config, recovery commits and as the default author.
    pub user_name: String,
    pub user_email: String,
    /// Message for commits that sweep up leftovers of an interrupted run.
    #[serde(default = "default_recovery_message")]
    pub recovery_message: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_recovery_message() -> String {
    "Commit leftover judger data from an interrupted run".to_string()
}

/// Remote object store holding the commit queue, release archives and marker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Prefix of commit-request descriptors (and of the marker).
    #[serde(default = "default_commit_prefix")]
    pub commit_prefix: String,
    /// Prefix of release archives, keyed `<prefix><problemId>/<releaseFileName>`.
    #[serde(default = "default_release_prefix")]
    pub release_prefix: String,
    /// Object name of the marker under `commit_prefix`.
    #[serde(default = "default_marker_name")]
    pub marker_name: String,
    /// Per-request timeout for remote operations (default: 300).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub local: Option<LocalStoreConfig>,
    #[serde(default)]
    pub s3: Option<S3StoreConfig>,
}

impl StoreConfig {
    /// Full key of the marker object.
    pub fn marker_key(&self) -> String {
        format!("{}{}", self.commit_prefix, self.marker_name)
    }
}

fn default_commit_prefix() -> String {
    "judger/data-commit/".to_string()
}

fn default_release_prefix() -> String {
    "judger/data-release/".to_string()
}

fn default_marker_name() -> String {
    "lastcommit".to_string()
}

fn default_request_timeout() -> u64 {
    300 // 5 minutes
}

/// Available store backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Directory on the local filesystem (development, tests).
    Local,
    /// S3-compatible bucket.
    S3,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalStoreConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3StoreConfig {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (e.g. "https://cos.ap-shanghai.myqcloud.com").
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

/// Single-instance lock configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_path")]
    pub path: PathBuf,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: default_lock_path(),
        }
    }
}

fn default_lock_path() -> PathBuf {
    PathBuf::from(".pid")
}

/// Commit pipeline behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Where release archives are downloaded before extraction.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Keep going with other problems after a request-scoped failure.
    #[serde(default = "default_true")]
    pub continue_on_request_error: bool,
    /// Fallback commit message; `{problem_id}` is substituted.
    #[serde(default = "default_commit_message_template")]
    pub commit_message_template: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            continue_on_request_error: true,
            commit_message_template: default_commit_message_template(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("oj3-judger-data-commit")
}

fn default_true() -> bool {
    true
}

fn default_commit_message_template() -> String {
    "Update judger data {problem_id} automatically".to_string()
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// When set, metrics are written here in Prometheus text format after each run.
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub repository: RepositoryConfig,
    pub store: SanitizedStoreConfig,
    pub lock: LockConfig,
    pub pipeline: PipelineConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStoreConfig {
    pub backend: String,
    pub commit_prefix: String,
    pub release_prefix: String,
    pub marker_name: String,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<SanitizedS3Config>,
}

/// Sanitized S3 config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedS3Config {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            repository: config.repository.clone(),
            store: SanitizedStoreConfig {
                backend: match config.store.backend {
                    StoreBackend::Local => "local".to_string(),
                    StoreBackend::S3 => "s3".to_string(),
                },
                commit_prefix: config.store.commit_prefix.clone(),
                release_prefix: config.store.release_prefix.clone(),
                marker_name: config.store.marker_name.clone(),
                request_timeout_secs: config.store.request_timeout_secs,
                local_root: config.store.local.as_ref().map(|l| l.root.clone()),
                s3: config.store.s3.as_ref().map(|s| SanitizedS3Config {
                    bucket: s.bucket.clone(),
                    region: s.region.clone(),
                    endpoint: s.endpoint.clone(),
                    credentials_configured: s
                        .secret_access_key
                        .as_ref()
                        .is_some_and(|k| !k.is_empty()),
                }),
            },
            lock: config.lock.clone(),
            pipeline: config.pipeline.clone(),
            metrics: config.metrics.clone(),
        }
    }
}
