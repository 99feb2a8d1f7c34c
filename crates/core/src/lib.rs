pub mod config;
pub mod fetcher;
pub mod lock;
pub mod marker;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod repository;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use fetcher::{ExtractedRelease, FetchError, FetchedRelease, ReleaseFetcher};
pub use lock::{
    KillOutcome, LockError, LockGuard, LockOutcome, PidLock, ProcessControl, SignalProcessControl,
};
pub use marker::MarkerStore;
pub use processor::{
    CommitProcessor, FailedRequest, ProcessorError, ProcessorSettings, RequestError, RequestStage,
    RetiredRequest, RunReport,
};
pub use queue::{CommitDefaults, CommitMetadata, CommitQueue, CommitRequest, QueueError};
pub use repository::{CommitAuthor, CommitOutcome, GitRepository, Repository, RepositoryError};
pub use store::{ObjectStoreBackend, RemoteStore, StoreError};
