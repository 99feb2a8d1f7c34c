//! Commit pipeline runs against a real git working copy.
//!
//! The queue and release archives live in the in-memory store; the
//! repository is a `GitRepository` cloned from a temporary bare remote, so
//! these tests observe exactly what the judging system would pull.
//! They are skipped when `git` is not installed.

use std::sync::Arc;

use datacommit_core::{
    load_config_from_str,
    lock::ProcessControl,
    processor::{CommitProcessor, RequestStage},
    repository::{CommitOutcome, Repository},
    store::RemoteStore,
    testing::{fixtures, MockProcessControl, MockRemoteStore},
};

#[macro_use]
mod common;

use common::{git, GitFixture, RECOVERY_MESSAGE};

const COMMIT_PREFIX: &str = "judger/data-commit/";
const RELEASE_PREFIX: &str = "judger/data-release/";

/// Test helper wiring a processor to a git fixture and the mock store.
struct GitHarness {
    processor: CommitProcessor,
    store: Arc<MockRemoteStore>,
    fixture: GitFixture,
}

impl GitHarness {
    fn new(fixture: GitFixture) -> Self {
        let temp = fixture.temp_dir.path();
        let config = load_config_from_str(&format!(
            r#"
[repository]
path = "{work}"
user_name = "oj-bot"
user_email = "oj-bot@example.com"
recovery_message = "{recovery}"

[store]
backend = "local"

[store.local]
root = "{store}"

[lock]
path = "{lock}"

[pipeline]
scratch_dir = "{scratch}"
"#,
            work = fixture.work.display(),
            recovery = RECOVERY_MESSAGE,
            store = temp.join("store").display(),
            lock = temp.join("run/.pid").display(),
            scratch = temp.join("scratch").display(),
        ))
        .expect("Failed to parse test config");

        let store = Arc::new(MockRemoteStore::new());
        let processor = CommitProcessor::from_config(
            &config,
            Arc::clone(&store) as Arc<dyn RemoteStore>,
            Arc::new(fixture.repository()) as Arc<dyn Repository>,
            Arc::new(MockProcessControl::new(4242)) as Arc<dyn ProcessControl>,
        );

        Self {
            processor,
            store,
            fixture,
        }
    }

    async fn publish_archive(
        &self,
        created_at_ms: i64,
        problem_id: u64,
        file_name: &str,
        archive: Vec<u8>,
    ) -> String {
        self.store
            .insert(
                &fixtures::descriptor_key(COMMIT_PREFIX, created_at_ms, problem_id, file_name),
                b"{}".to_vec(),
            )
            .await;
        self.store
            .insert(
                &fixtures::release_key(RELEASE_PREFIX, problem_id, file_name),
                archive,
            )
            .await;
        fixtures::request_id(created_at_ms, problem_id, file_name)
    }

    async fn publish(
        &self,
        created_at_ms: i64,
        problem_id: u64,
        file_name: &str,
        entries: &[(&str, &str)],
    ) -> String {
        self.publish_archive(
            created_at_ms,
            problem_id,
            file_name,
            fixtures::zip_archive(entries),
        )
        .await
    }
}

#[tokio::test]
async fn test_end_to_end_publishes_exactly_the_release() {
    require_git!();
    let harness = GitHarness::new(GitFixture::new());
    harness
        .publish(
            1700000000000,
            42,
            "data.zip",
            &[("1.in", "1 2\n"), ("1.out", "3\n")],
        )
        .await;

    let report = harness.processor.run().await.unwrap();

    assert!(report.is_success());
    let revision = report.retired[0].outcome.revision().unwrap().to_string();
    assert_eq!(harness.fixture.remote_head(), revision);
    assert_eq!(
        harness.fixture.remote_files("data/42"),
        vec!["data/42/1.in".to_string(), "data/42/1.out".to_string()]
    );
    assert_eq!(harness.fixture.remote_file("data/42/1.in"), "1 2");
    assert_eq!(
        harness.fixture.remote_log()[0],
        "Update judger data 42 automatically"
    );
    assert_eq!(git(&harness.fixture.work, &["status", "--porcelain"]), "");
}

#[tokio::test]
async fn test_republished_release_is_nothing_to_commit() {
    require_git!();
    let harness = GitHarness::new(GitFixture::new());
    let entries = [("1.in", "1 2\n"), ("1.out", "3\n")];
    harness
        .publish(1700000000000, 42, "data.zip", &entries)
        .await;
    harness.processor.run().await.unwrap();
    let head = harness.fixture.remote_head();

    harness
        .publish(1700000000500, 42, "data.zip", &entries)
        .await;
    let report = harness.processor.run().await.unwrap();

    assert_eq!(report.retired.len(), 1);
    assert_eq!(report.retired[0].outcome, CommitOutcome::NothingToCommit);
    assert_eq!(harness.fixture.remote_head(), head);
}

#[tokio::test]
async fn test_leftover_files_are_committed_before_next_request() {
    require_git!();
    let harness = GitHarness::new(GitFixture::new());
    // Files written by a run that died before committing
    harness.fixture.write("data/7/1.in", "partial");
    harness
        .publish(1700000000000, 42, "data.zip", &[("1.in", "42\n")])
        .await;

    let report = harness.processor.run().await.unwrap();

    assert_eq!(report.recovery_commits.len(), 1);
    assert_eq!(
        harness.fixture.remote_log(),
        vec![
            "Update judger data 42 automatically".to_string(),
            RECOVERY_MESSAGE.to_string(),
            "init".to_string(),
        ]
    );
    assert_eq!(harness.fixture.remote_file("data/7/1.in"), "partial");
    assert_eq!(
        harness.fixture.remote_files("data/42"),
        vec!["data/42/1.in".to_string()]
    );
}

#[tokio::test]
async fn test_corrupt_release_never_reaches_remote() {
    require_git!();
    let harness = GitHarness::new(GitFixture::with_files(&[
        ("data/41/1.in", "GOOD-ONE"),
        ("data/41/2.in", "GOOD-TWO"),
    ]));
    let broken = harness
        .publish_archive(
            1,
            41,
            "d.zip",
            fixtures::corrupt_zip_archive(
                &[("1.in", "NEW-ONE-AAAAAAAA"), ("2.in", "NEW-TWO-BBBBBBBB")],
                "2.in",
            ),
        )
        .await;
    let valid = harness.publish(2, 42, "d.zip", &[("1.in", "42\n")]).await;

    let report = harness.processor.run().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].request_id, broken);
    assert_eq!(report.failed[0].stage, RequestStage::Extracted);
    assert_eq!(report.retired[0].request_id, valid);
    assert!(report.recovery_commits.is_empty());

    assert_eq!(
        harness.fixture.remote_log(),
        vec![
            "Update judger data 42 automatically".to_string(),
            "init".to_string(),
        ]
    );
    assert_eq!(harness.fixture.remote_file("data/41/1.in"), "GOOD-ONE");
    assert_eq!(harness.fixture.remote_file("data/41/2.in"), "GOOD-TWO");
    assert_eq!(git(&harness.fixture.work, &["status", "--porcelain"]), "");
    assert!(!harness
        .fixture
        .temp_dir
        .path()
        .join("scratch/41_d.zip")
        .exists());
}
