//! Scripted in-memory implementation of `LogsApi`.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use metrika_export::metrika::{
    LogRequest, LogRequestParams, LogRequestState, LogsApi, Result as ApiResult,
};
use metrika_export::{ApiError, LogProcessStatus};

use super::builders::parts;

/// First id handed out by `create_log_request`.
pub const FIRST_CREATED_ID: i64 = 1000;

#[derive(Default)]
struct FakeState {
    requests: BTreeMap<i64, LogRequest>,
    part_content: HashMap<(i64, i32), String>,
    failing_parts: HashSet<(i64, i32)>,
    failing_status: HashSet<i64>,
    fail_list: bool,
    fail_clean: bool,
    created: Vec<LogRequestParams>,
    downloads: Vec<(i64, i32)>,
    cleaned: Vec<i64>,
    status_queries: usize,
}

#[derive(Default)]
pub struct FakeLogsApi {
    state: Mutex<FakeState>,
}

fn not_found(what: String) -> ApiError {
    ApiError::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

fn server_error() -> ApiError {
    ApiError::Api {
        status: 500,
        message: "internal error".to_string(),
    }
}

impl FakeLogsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&self, request: LogRequest) {
        let mut state = self.state.lock().unwrap();
        state.requests.insert(request.request_id, request);
    }

    /// Changes what the remote side reports for `request_id`.
    pub fn set_status(&self, request_id: i64, status: LogProcessStatus, part_count: usize) {
        let mut state = self.state.lock().unwrap();
        let request = state
            .requests
            .get_mut(&request_id)
            .expect("request must be added first");
        request.status = status;
        request.parts = parts(part_count);
    }

    pub fn set_part(&self, request_id: i64, part: i32, content: String) {
        let mut state = self.state.lock().unwrap();
        state.part_content.insert((request_id, part), content);
    }

    pub fn fail_part(&self, request_id: i64, part: i32, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing_parts.insert((request_id, part));
        } else {
            state.failing_parts.remove(&(request_id, part));
        }
    }

    pub fn fail_status(&self, request_id: i64) {
        self.state.lock().unwrap().failing_status.insert(request_id);
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_clean(&self) {
        self.state.lock().unwrap().fail_clean = true;
    }

    pub fn created(&self) -> Vec<LogRequestParams> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn downloads(&self) -> Vec<(i64, i32)> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn cleaned(&self) -> Vec<i64> {
        self.state.lock().unwrap().cleaned.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.state.lock().unwrap().status_queries
    }
}

#[async_trait]
impl LogsApi for FakeLogsApi {
    async fn create_log_request(&self, params: &LogRequestParams) -> ApiResult<LogRequest> {
        let mut state = self.state.lock().unwrap();
        let request_id = FIRST_CREATED_ID + state.created.len() as i64;
        state.created.push(params.clone());

        let request = LogRequest {
            request_id,
            date1: params.date1,
            date2: params.date2,
            status: LogProcessStatus::Created,
            source: Some(params.source),
            fields: params.fields.clone(),
            size: None,
            parts: None,
        };
        state.requests.insert(request_id, request.clone());
        Ok(request)
    }

    async fn list_log_requests(&self) -> ApiResult<Vec<LogRequest>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(server_error());
        }
        Ok(state.requests.values().cloned().collect())
    }

    async fn log_request_status(&self, request_id: i64) -> ApiResult<LogRequestState> {
        let mut state = self.state.lock().unwrap();
        state.status_queries += 1;
        if state.failing_status.contains(&request_id) {
            return Err(server_error());
        }
        state
            .requests
            .get(&request_id)
            .map(|r| LogRequestState {
                status: r.status,
                parts: r.parts.clone(),
            })
            .ok_or_else(|| not_found(format!("log request {request_id}")))
    }

    async fn download_part(&self, request_id: i64, part: i32) -> ApiResult<String> {
        let mut state = self.state.lock().unwrap();
        state.downloads.push((request_id, part));
        if state.failing_parts.contains(&(request_id, part)) {
            return Err(server_error());
        }
        state
            .part_content
            .get(&(request_id, part))
            .cloned()
            .ok_or_else(|| not_found(format!("part {part} of {request_id}")))
    }

    async fn clean_log_request(&self, request_id: i64) -> ApiResult<LogRequestState> {
        let mut state = self.state.lock().unwrap();
        if state.fail_clean {
            return Err(server_error());
        }
        state.cleaned.push(request_id);
        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| not_found(format!("log request {request_id}")))?;
        request.status = LogProcessStatus::CleanedByUser;
        Ok(LogRequestState {
            status: request.status,
            parts: request.parts.clone(),
        })
    }
}
