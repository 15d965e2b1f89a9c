//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use checkup::alerts::AlertError;
use checkup::logs::LogStore;
use checkup::monitoring::{CheckPipeline, OutcomeProcessor};
use checkup::store::{Collection, MemoryStore, RecordStore};
use checkup::{AlertDispatcher, AlertSender, CheckExecutor, FileLogStore, LogEntry, Scheduler};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Alert sender that remembers what it was asked to send
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, message)| message.clone()).collect()
    }
}

#[async_trait]
impl AlertSender for RecordingSender {
    async fn send(&self, destination: &str, message: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push((destination.to_string(), message.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub logs: Arc<FileLogStore>,
    pub sender: Arc<RecordingSender>,
    pub pipeline: Arc<CheckPipeline>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let logs = Arc::new(FileLogStore::new(dir.path().join("logs")));
        let sender = Arc::new(RecordingSender::default());

        let dispatcher = Arc::new(AlertDispatcher::new(store.clone(), sender.clone()));
        let processor = OutcomeProcessor::new(store.clone(), logs.clone(), dispatcher);
        let pipeline = Arc::new(CheckPipeline::new(CheckExecutor::http().unwrap(), processor));

        Self { dir, store, logs, sender, pipeline }
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.store.clone(), self.pipeline.clone(), Duration::from_secs(60))
    }

    pub async fn insert(&self, record: Value) {
        let id = record["id"].as_str().unwrap().to_string();
        self.store.create(Collection::Checks, &id, &record).await.unwrap();
    }

    pub async fn stored(&self, id: &str) -> Value {
        self.store.read(Collection::Checks, id).await.unwrap()
    }

    pub async fn entries(&self, id: &str) -> Vec<LogEntry> {
        match self.logs.read(id).await {
            Ok(text) => text.lines().map(|line| serde_json::from_str(line).unwrap()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// A stored check pointing at `url` (host and path, no scheme)
pub fn check_record(id: &str, url: &str) -> Value {
    json!({
        "id": id,
        "ownerId": "5551234567",
        "protocol": "http",
        "url": url,
        "method": "get",
        "successCodes": [200],
        "timeoutSeconds": 5,
        "state": "down"
    })
}

pub const FIRST_ID: &str = "aaaaaaaaaa0000000001";
pub const SECOND_ID: &str = "bbbbbbbbbb0000000002";
