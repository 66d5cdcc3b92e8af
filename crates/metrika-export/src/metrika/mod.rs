//! Client for the Yandex Metrika Logs API.
//!
//! The exporter only sees the [`LogsApi`] trait; [`MetrikaClient`] is the
//! HTTP implementation used by the daemon.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::MetrikaClient;
pub use error::{ApiError, Result};
pub use types::{
    LogRequest, LogRequestParams, LogRequestPart, LogRequestState, LogSource, HIT_FIELDS,
};

/// Remote log-export operations. Every call reports failure as a value; the
/// caller decides whether that means "not ready yet" or "retry later".
#[async_trait]
pub trait LogsApi: Send + Sync {
    /// Asks the remote side to start preparing a log for the given window.
    async fn create_log_request(&self, params: &LogRequestParams) -> Result<LogRequest>;

    /// Every log request the counter currently knows about.
    async fn list_log_requests(&self) -> Result<Vec<LogRequest>>;

    async fn log_request_status(&self, request_id: i64) -> Result<LogRequestState>;

    /// Raw tab-separated content of one part.
    async fn download_part(&self, request_id: i64, part: i32) -> Result<String>;

    /// Deletes the prepared log on the remote side.
    async fn clean_log_request(&self, request_id: i64) -> Result<LogRequestState>;
}
