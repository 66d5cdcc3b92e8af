use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::entities::log_process::NO_PART_PROCESSED;
use crate::db::{LogProcess, LogProcessStatus};

/// Hit fields requested from the Logs API, in column order of the export.
pub const HIT_FIELDS: [&str; 5] = [
    "ym:pv:goalsID",
    "ym:pv:counterUserIDHash",
    "ym:pv:dateTime",
    "ym:pv:watchID",
    "ym:pv:params",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Hits,
    Visits,
}

impl LogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSource::Hits => "hits",
            LogSource::Visits => "visits",
        }
    }
}

/// Parameters of `POST /logrequests`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequestParams {
    pub date1: NaiveDate,
    pub date2: NaiveDate,
    pub fields: Vec<String>,
    pub source: LogSource,
}

impl LogRequestParams {
    /// A hits export with the fixed field set for the inclusive window.
    pub fn hits(date1: NaiveDate, date2: NaiveDate) -> Self {
        Self {
            date1,
            date2,
            fields: HIT_FIELDS.iter().map(|f| f.to_string()).collect(),
            source: LogSource::Hits,
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("date1", self.date1.format("%Y-%m-%d").to_string()),
            ("date2", self.date2.format("%Y-%m-%d").to_string()),
            ("fields", self.fields.join(",")),
            ("source", self.source.as_str().to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRequestPart {
    pub part_number: i32,
    #[serde(default)]
    pub size: u64,
}

/// A log request as described by the Logs API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRequest {
    pub request_id: i64,
    pub date1: NaiveDate,
    pub date2: NaiveDate,
    pub status: LogProcessStatus,
    #[serde(default)]
    pub source: Option<LogSource>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub parts: Option<Vec<LogRequestPart>>,
}

impl LogRequest {
    pub fn total_parts(&self) -> i32 {
        part_count(self.parts.as_deref())
    }

    /// The local record for a request seen for the first time.
    pub fn to_log_process(&self) -> LogProcess {
        LogProcess {
            request_id: self.request_id,
            range_start: self.date1,
            range_end: self.date2,
            status: self.status,
            total_parts: self.total_parts(),
            last_processed_part: NO_PART_PROCESSED,
        }
    }
}

/// The subset of a log request returned by status and clean calls that the
/// pipeline relies on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogRequestState {
    pub status: LogProcessStatus,
    #[serde(default)]
    pub parts: Option<Vec<LogRequestPart>>,
}

impl LogRequestState {
    pub fn total_parts(&self) -> i32 {
        part_count(self.parts.as_deref())
    }
}

fn part_count(parts: Option<&[LogRequestPart]>) -> i32 {
    parts.map_or(0, |p| i32::try_from(p.len()).unwrap_or(i32::MAX))
}

/// `{"log_request": {...}}`
#[derive(Debug, Deserialize)]
pub(crate) struct LogRequestEnvelope<T> {
    pub log_request: T,
}

/// `{"requests": [...]}`
#[derive(Debug, Deserialize)]
pub(crate) struct LogRequestList {
    #[serde(default)]
    pub requests: Vec<LogRequest>,
}
