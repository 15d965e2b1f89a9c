//! Tick-level behaviour: concurrency, empty sets, shutdown and rotation

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkup::logs::{LogStore, LogStoreError};
use checkup::monitoring::{CheckPipeline, OutcomeProcessor, TickSummary};
use checkup::store::{Collection, MemoryStore, RecordStore};
use checkup::{AlertDispatcher, CheckExecutor, FileLogStore, LogRotator, Scheduler};
use common::{FIRST_ID, Harness, RecordingSender, SECOND_ID, check_record};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_empty_check_set_ticks_cleanly() {
    let harness = Harness::new();
    let token = CancellationToken::new();

    let summary = harness.scheduler().tick(&token).await.unwrap().await.unwrap();

    assert_eq!(summary, TickSummary::default());
    assert!(harness.logs.list(true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_check_does_not_hold_back_fast_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let address = server.address().to_string();
    harness.insert(check_record(FIRST_ID, &format!("{address}/fast"))).await;
    let mut slow = check_record(SECOND_ID, &format!("{address}/slow"));
    slow["timeoutSeconds"] = json!(1);
    harness.insert(slow).await;

    let token = CancellationToken::new();
    let tick = harness.scheduler().tick(&token).await.unwrap();

    // The fast check is recorded well before the slow one gives up
    tokio::time::timeout(Duration::from_millis(800), async {
        while harness.stored(FIRST_ID).await["state"] != "up" {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("fast check should be persisted first");
    assert!(harness.stored(SECOND_ID).await.get("lastChecked").is_none());

    let summary = tick.await.unwrap();
    assert_eq!(summary.up, 1);
    assert_eq!(summary.down, 1);
    assert_eq!(summary.alerts, 0);

    let slow_entries = harness.entries(SECOND_ID).await;
    assert_eq!(slow_entries.len(), 1);
    assert!(slow_entries[0].outcome.error().is_some());
}

#[tokio::test]
async fn test_invalid_checks_are_counted_as_skipped() {
    let harness = Harness::new();
    let mut record = check_record(FIRST_ID, "localhost");
    record["timeoutSeconds"] = json!(9);
    record["method"] = json!("patch");
    harness.insert(record.clone()).await;

    let token = CancellationToken::new();
    let summary = harness.scheduler().tick(&token).await.unwrap().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total(), 1);
    assert_eq!(harness.stored(FIRST_ID).await, record);
}

#[tokio::test]
async fn test_cancel_stops_in_flight_checks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let harness = Harness::new();
    harness.insert(check_record(FIRST_ID, &server.address().to_string())).await;

    let token = CancellationToken::new();
    let tick = harness.scheduler().tick(&token).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(2), tick).await.unwrap().unwrap();

    assert_eq!(summary.cancelled, 1);
    assert!(harness.stored(FIRST_ID).await.get("lastChecked").is_none());
    assert!(harness.entries(FIRST_ID).await.is_empty());
}

#[tokio::test]
async fn test_scheduler_loop_runs_immediately_and_stops_on_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let mut record = check_record(FIRST_ID, &server.address().to_string());
    record["successCodes"] = json!([204]);
    harness.insert(record).await;

    let token = CancellationToken::new();
    let handle = harness.scheduler().start(token.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.stored(FIRST_ID).await["state"] != "up" {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first tick should run without waiting a full period");

    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rotation_after_evaluation_keeps_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = Harness::new();
    harness.insert(check_record(FIRST_ID, &server.address().to_string())).await;

    let token = CancellationToken::new();
    harness.scheduler().tick(&token).await.unwrap().await.unwrap();

    let rotator = LogRotator::new(harness.logs.clone(), Duration::from_secs(3600));
    let summary = rotator.rotate_all().await;
    assert_eq!(summary.rotated, 1);
    assert_eq!(summary.failed, 0);

    assert_eq!(harness.logs.read(FIRST_ID).await.unwrap(), "");

    let all = harness.logs.list(true).await.unwrap();
    let rotated: Vec<&String> = all.iter().filter(|id| id.starts_with(&format!("{FIRST_ID}-"))).collect();
    assert_eq!(rotated.len(), 1);

    let history = harness.logs.decompress(rotated[0]).await.unwrap();
    assert_eq!(history.lines().count(), 1);
    assert!(history.contains("\"alertTriggered\":false"));

    // A later evaluation lands in the emptied active log
    harness.scheduler().tick(&token).await.unwrap().await.unwrap();
    assert_eq!(harness.entries(FIRST_ID).await.len(), 1);
}

/// Log store whose appends take a while to land
struct SlowAppendLogs {
    inner: FileLogStore,
    delay: Duration,
}

#[async_trait]
impl LogStore for SlowAppendLogs {
    async fn append(&self, log_id: &str, line: &str) -> Result<(), LogStoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.append(log_id, line).await
    }

    async fn list(&self, include_compressed: bool) -> Result<Vec<String>, LogStoreError> {
        self.inner.list(include_compressed).await
    }

    async fn compress(&self, log_id: &str, new_id: &str) -> Result<(), LogStoreError> {
        self.inner.compress(log_id, new_id).await
    }

    async fn decompress(&self, log_id: &str) -> Result<String, LogStoreError> {
        self.inner.decompress(log_id).await
    }

    async fn truncate(&self, log_id: &str) -> Result<(), LogStoreError> {
        self.inner.truncate(log_id).await
    }

    async fn read(&self, log_id: &str) -> Result<String, LogStoreError> {
        self.inner.read(log_id).await
    }
}

struct SlowLogFixture {
    _dir: tempfile::TempDir,
    _server: MockServer,
    store: Arc<MemoryStore>,
    logs: Arc<SlowAppendLogs>,
    scheduler: Scheduler,
}

async fn slow_log_fixture() -> SlowLogFixture {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let logs = Arc::new(SlowAppendLogs {
        inner: FileLogStore::new(dir.path()),
        delay: Duration::from_millis(500),
    });
    let dispatcher =
        Arc::new(AlertDispatcher::new(store.clone(), Arc::new(RecordingSender::default())));
    let processor = OutcomeProcessor::new(store.clone(), logs.clone(), dispatcher);
    let pipeline = Arc::new(CheckPipeline::new(CheckExecutor::http().unwrap(), processor));

    let record = check_record(FIRST_ID, &server.address().to_string());
    store.create(Collection::Checks, FIRST_ID, &record).await.unwrap();

    let scheduler = Scheduler::new(store.clone(), pipeline, Duration::from_secs(60));
    SlowLogFixture { _dir: dir, _server: server, store, logs, scheduler }
}

async fn wait_until_persisted(store: &MemoryStore) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stored = store.read(Collection::Checks, FIRST_ID).await.unwrap();
            if stored["state"] == "up" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state should be persisted");
}

#[tokio::test]
async fn test_cancel_during_append_still_logs_the_evaluation() {
    let fixture = slow_log_fixture().await;
    let token = CancellationToken::new();

    let tick = fixture.scheduler.tick(&token).await.unwrap();
    wait_until_persisted(&fixture.store).await;
    token.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), tick).await.unwrap().unwrap();

    assert_eq!(summary.up, 1);
    assert_eq!(summary.cancelled, 0);
    assert_eq!(fixture.logs.read(FIRST_ID).await.unwrap().lines().count(), 1);
}

#[tokio::test]
async fn test_stopped_loop_waits_for_running_evaluations() {
    let fixture = slow_log_fixture().await;
    let token = CancellationToken::new();

    let handle = fixture.scheduler.start(token.clone());
    wait_until_persisted(&fixture.store).await;
    token.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    assert_eq!(fixture.logs.read(FIRST_ID).await.unwrap().lines().count(), 1);
}
