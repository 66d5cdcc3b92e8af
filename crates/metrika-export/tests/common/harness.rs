//! Test harness wiring a fake Logs API, an in-memory store and an exporter.

#![allow(dead_code)]

use std::sync::Arc;

use metrika_export::db::init_in_memory;
use metrika_export::{EventStore, Exporter, LogProcess, TsvParser};

use super::fake_api::FakeLogsApi;

pub struct TestHarness {
    pub api: Arc<FakeLogsApi>,
    pub exporter: Arc<Exporter>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let db = init_in_memory()
            .await
            .expect("Failed to create test database");
        let api = Arc::new(FakeLogsApi::new());
        let exporter = Arc::new(Exporter::new(
            api.clone(),
            EventStore::new(db),
            TsvParser::default(),
        ));
        Self { api, exporter }
    }

    pub fn store(&self) -> &EventStore {
        self.exporter.store()
    }

    pub async fn process(&self, request_id: i64) -> LogProcess {
        self.store()
            .find_log_process(request_id)
            .await
            .expect("store query failed")
            .expect("log process should exist")
    }
}
