//! Prometheus metrics for the commit pipeline.
//!
//! The pipeline runs as a short-lived job, so nothing is scraped directly.
//! After a run the binary writes the registry in text exposition format to
//! a file picked up by node-exporter's textfile collector.

use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// =============================================================================
// Runs
// =============================================================================

/// Runs total by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("datacommit_runs_total", "Total pipeline runs"),
        &["result"], // "success", "partial", "failed", "cancelled"
    )
    .expect("metric can be created")
});

/// Pending requests found by the last run.
pub static BACKLOG_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "datacommit_backlog_size",
        "Commit requests pending at the start of the last run",
    )
    .expect("metric can be created")
});

/// Previous instances killed to take over the lock.
pub static LOCK_TAKEOVERS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "datacommit_lock_takeovers_total",
        "Previous instances terminated to acquire the lock",
    )
    .expect("metric can be created")
});

/// Unix time of the last run that finished without errors.
pub static LAST_SUCCESS_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "datacommit_last_success_timestamp_seconds",
        "Unix time of the last successful run",
    )
    .expect("metric can be created")
});

// =============================================================================
// Requests
// =============================================================================

/// Requests handled total by result.
pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("datacommit_requests_total", "Total commit requests handled"),
        &["result"], // "committed", "unchanged", "failed", "skipped"
    )
    .expect("metric can be created")
});

/// Recovery commits made for leftovers of interrupted runs.
pub static RECOVERY_COMMITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "datacommit_recovery_commits_total",
        "Commits of leftover working-tree changes",
    )
    .expect("metric can be created")
});

/// Duration of request stages in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "datacommit_stage_duration_seconds",
            "Duration of commit request stages",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["stage"],
    )
    .expect("metric can be created")
});

/// Returns all pipeline metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(BACKLOG_SIZE.clone()),
        Box::new(LOCK_TAKEOVERS.clone()),
        Box::new(LAST_SUCCESS_TIMESTAMP.clone()),
        Box::new(REQUESTS_TOTAL.clone()),
        Box::new(RECOVERY_COMMITS.clone()),
        Box::new(STAGE_DURATION.clone()),
    ]
}

/// Encodes all pipeline metrics in Prometheus text format.
pub fn encode_text() -> Result<String, prometheus::Error> {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Writes the metrics to `path`, replacing it atomically.
pub async fn write_textfile(path: &Path) -> std::io::Result<()> {
    let text = encode_text().map_err(std::io::Error::other)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_includes_pipeline_metrics() {
        RUNS_TOTAL.with_label_values(&["success"]).inc();
        let text = encode_text().unwrap();
        assert!(text.contains("datacommit_runs_total"));
        assert!(text.contains("datacommit_backlog_size"));
    }

    #[tokio::test]
    async fn test_write_textfile() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("textfile/datacommit.prom");

        write_textfile(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# TYPE datacommit_backlog_size gauge"));
        assert!(!temp.path().join("textfile/datacommit.prom.tmp").exists());
    }
}
