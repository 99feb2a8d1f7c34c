//! Run loop of the commit pipeline.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use prometheus::HistogramTimer;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::fetcher::ReleaseFetcher;
use crate::lock::{LockOutcome, PidLock, ProcessControl};
use crate::marker::MarkerStore;
use crate::metrics;
use crate::queue::{CommitDefaults, CommitQueue, CommitRequest};
use crate::repository::{CommitOutcome, Repository};
use crate::store::RemoteStore;

use super::error::{ProcessorError, RequestError};
use super::types::{FailedRequest, RequestStage, RetiredRequest, RunReport};

/// Processing options taken from configuration.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Directory holding one subdirectory per problem, relative to the repository root.
    pub data_dir: PathBuf,
    pub continue_on_request_error: bool,
    pub defaults: CommitDefaults,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dir: config.repository.data_dir.clone(),
            continue_on_request_error: config.pipeline.continue_on_request_error,
            defaults: CommitDefaults::from_config(&config.repository, &config.pipeline),
        }
    }
}

/// A request failure tagged with the stage it failed to reach.
struct StageFailure {
    stage: RequestStage,
    error: RequestError,
}

trait AtStage<T> {
    fn at(self, stage: RequestStage) -> Result<T, StageFailure>;
}

impl<T, E: Into<RequestError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: RequestStage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

fn stage_timer(stage: RequestStage) -> HistogramTimer {
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .start_timer()
}

pub struct CommitProcessor {
    lock: PidLock,
    queue: CommitQueue,
    marker: MarkerStore,
    fetcher: ReleaseFetcher,
    repository: Arc<dyn Repository>,
    settings: ProcessorSettings,
}

impl CommitProcessor {
    pub fn new(
        lock: PidLock,
        queue: CommitQueue,
        marker: MarkerStore,
        fetcher: ReleaseFetcher,
        repository: Arc<dyn Repository>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            lock,
            queue,
            marker,
            fetcher,
            repository,
            settings,
        }
    }

    /// Wires all components from configuration around the given clients.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn RemoteStore>,
        repository: Arc<dyn Repository>,
        process: Arc<dyn ProcessControl>,
    ) -> Self {
        Self::new(
            PidLock::new(config.lock.path.clone(), process),
            CommitQueue::new(Arc::clone(&store), config.store.commit_prefix.clone()),
            MarkerStore::new(Arc::clone(&store), config.store.marker_key()),
            ReleaseFetcher::new(
                store,
                config.store.release_prefix.clone(),
                config.pipeline.scratch_dir.clone(),
            ),
            repository,
            ProcessorSettings::from_config(config),
        )
    }

    /// Executes one pipeline run.
    ///
    /// Returns `Ok` when the run went through the whole backlog; the report
    /// lists requests left queued after request-scoped failures. Any other
    /// failure aborts the run with an error. The lock is released on every
    /// path, including when the returned future is dropped.
    pub async fn run(&self) -> Result<RunReport, ProcessorError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("data_commit_run", run_id = %run_id);

        let result = self.run_locked(run_id).instrument(span).await;

        let label = match &result {
            Ok(report) if report.is_success() => "success",
            Ok(_) => "partial",
            Err(_) => "failed",
        };
        metrics::RUNS_TOTAL.with_label_values(&[label]).inc();
        if label == "success" {
            metrics::LAST_SUCCESS_TIMESTAMP.set(Utc::now().timestamp());
        }

        result
    }

    async fn run_locked(&self, run_id: String) -> Result<RunReport, ProcessorError> {
        let start = Instant::now();

        let guard = self.lock.acquire().await?;
        match guard.outcome() {
            LockOutcome::Free => debug!("Lock was free"),
            LockOutcome::StaleRecord { pid } => info!(pid, "Took over stale lock record"),
            LockOutcome::TookOver { pid } => {
                metrics::LOCK_TAKEOVERS.inc();
                warn!(pid, "Killed previous instance still holding the lock");
            }
        }

        let result = self.drain(run_id).await;

        if let Err(e) = guard.release() {
            warn!(error = %e, "Failed to release lock");
        }

        result.map(|mut report| {
            report.duration_ms = start.elapsed().as_millis() as u64;
            info!(
                pending = report.pending,
                retired = report.retired.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                duration_ms = report.duration_ms,
                "Run finished"
            );
            report
        })
    }

    async fn drain(&self, run_id: String) -> Result<RunReport, ProcessorError> {
        let mut report = RunReport::new(run_id);

        match self.marker.read().await {
            Ok(Some(last)) => info!(last_commit = %last, "Last retired request"),
            Ok(None) => info!("No marker found"),
            Err(e) => warn!(error = %e, "Failed to read marker"),
        }

        let pending = self.queue.list_pending().await?;
        report.pending = pending.len();
        metrics::BACKLOG_SIZE.set(pending.len() as i64);

        if pending.is_empty() {
            info!("No pending commit requests");
            return Ok(report);
        }
        info!(count = pending.len(), "Processing pending commit requests");

        self.repository
            .pre_sync()
            .await
            .map_err(ProcessorError::Sync)?;

        let mut blocked: HashSet<u64> = HashSet::new();

        for request in &pending {
            if blocked.contains(&request.problem_id) {
                warn!(
                    request_id = %request.request_id,
                    problem_id = request.problem_id,
                    "Skipping request, an earlier request for this problem failed"
                );
                metrics::REQUESTS_TOTAL.with_label_values(&["skipped"]).inc();
                report.skipped.push(request.request_id.clone());
                continue;
            }

            self.ensure_clean(&mut report).await?;

            let span = info_span!(
                "request",
                request_id = %request.request_id,
                problem_id = request.problem_id
            );
            match self.process_request(request).instrument(span).await {
                Ok(retired) => {
                    let label = match retired.outcome {
                        CommitOutcome::Committed { .. } => "committed",
                        CommitOutcome::NothingToCommit => "unchanged",
                    };
                    metrics::REQUESTS_TOTAL.with_label_values(&[label]).inc();
                    report.retired.push(retired);
                }
                Err(StageFailure { stage, error: e }) => {
                    metrics::REQUESTS_TOTAL.with_label_values(&["failed"]).inc();
                    error!(
                        request_id = %request.request_id,
                        problem_id = request.problem_id,
                        stage = %stage,
                        error = %e,
                        "Commit request failed, leaving it queued"
                    );

                    if !(e.is_request_scoped() && self.settings.continue_on_request_error) {
                        return Err(ProcessorError::Request {
                            request_id: request.request_id.clone(),
                            stage,
                            source: e,
                        });
                    }

                    report.failed.push(FailedRequest {
                        request_id: request.request_id.clone(),
                        problem_id: request.problem_id,
                        stage,
                        error: e.to_string(),
                    });
                    blocked.insert(request.problem_id);
                }
            }
        }

        Ok(report)
    }

    /// Commits and pushes leftovers of an interrupted run.
    async fn ensure_clean(&self, report: &mut RunReport) -> Result<(), ProcessorError> {
        if self
            .repository
            .is_clean()
            .await
            .map_err(ProcessorError::Recovery)?
        {
            return Ok(());
        }

        warn!("Working tree is not clean, committing leftovers");
        let outcome = self
            .repository
            .commit_recovery()
            .await
            .map_err(ProcessorError::Recovery)?;
        self.repository
            .push()
            .await
            .map_err(ProcessorError::Recovery)?;

        if let CommitOutcome::Committed { revision } = outcome {
            metrics::RECOVERY_COMMITS.inc();
            info!(revision = %revision, "Pushed recovery commit");
            report.recovery_commits.push(revision);
        }
        Ok(())
    }

    async fn process_request(
        &self,
        request: &CommitRequest,
    ) -> Result<RetiredRequest, StageFailure> {
        info!(release = %request.release_file_name, "Processing commit request");

        let timer = stage_timer(RequestStage::Fetched);
        let metadata = self
            .queue
            .fetch_request_body(request, &self.settings.defaults)
            .await
            .at(RequestStage::Fetched)?;
        debug!(
            author = %metadata.author(),
            message = %metadata.commit_message,
            "Resolved commit metadata"
        );
        let release = self
            .fetcher
            .fetch(request.problem_id, &request.release_file_name)
            .await
            .at(RequestStage::Fetched)?;
        timer.observe_duration();

        let timer = stage_timer(RequestStage::Extracted);
        let relative = self.settings.data_dir.join(request.problem_id.to_string());
        let target = self.repository.root().join(&relative);
        self.fetcher
            .extract_to(&release.path, &target)
            .await
            .at(RequestStage::Extracted)?;
        timer.observe_duration();

        let timer = stage_timer(RequestStage::Committed);
        let outcome = self
            .repository
            .stage_and_commit(
                std::slice::from_ref(&relative),
                &metadata.commit_message,
                &metadata.author(),
            )
            .await
            .at(RequestStage::Committed)?;
        timer.observe_duration();
        match &outcome {
            CommitOutcome::Committed { revision } => info!(revision = %revision, "Committed"),
            CommitOutcome::NothingToCommit => info!("Content unchanged, nothing to commit"),
        }

        // Also pushes a commit left unpublished by an interrupted run
        let timer = stage_timer(RequestStage::Pushed);
        self.repository.push().await.at(RequestStage::Pushed)?;
        timer.observe_duration();

        let timer = stage_timer(RequestStage::Retired);
        self.queue.retire(request).await.at(RequestStage::Retired)?;
        self.marker
            .write(&request.request_id)
            .await
            .at(RequestStage::Retired)?;
        timer.observe_duration();

        info!("Commit request retired");
        Ok(RetiredRequest {
            request_id: request.request_id.clone(),
            problem_id: request.problem_id,
            outcome,
            archive_sha256: release.sha256,
        })
    }
}
