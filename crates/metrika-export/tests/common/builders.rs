//! Builders for Logs API payloads used across tests.

#![allow(dead_code)]

use chrono::NaiveDate;

use metrika_export::metrika::{LogRequest, LogRequestPart, HIT_FIELDS};
use metrika_export::LogProcessStatus;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

pub fn parts(count: usize) -> Option<Vec<LogRequestPart>> {
    (count > 0).then(|| {
        (0..count)
            .map(|n| LogRequestPart {
                part_number: n as i32,
                size: 1024,
            })
            .collect()
    })
}

pub fn log_request(
    request_id: i64,
    start: &str,
    end: &str,
    status: LogProcessStatus,
    part_count: usize,
) -> LogRequest {
    LogRequest {
        request_id,
        date1: date(start),
        date2: date(end),
        status,
        source: None,
        fields: HIT_FIELDS.iter().map(|f| f.to_string()).collect(),
        size: None,
        parts: parts(part_count),
    }
}

/// Builds the tab-separated content of one downloaded part.
#[derive(Debug, Clone)]
pub struct ExportBuilder {
    content: String,
}

impl ExportBuilder {
    pub fn new() -> Self {
        Self {
            content: format!("{}\n", HIT_FIELDS.join("\t")),
        }
    }

    /// Adds a hit. `time` is `YYYY-MM-DD HH:MM:SS`; it is written in the
    /// export's `HH: MM: SS` form.
    pub fn hit(mut self, goals: &[i64], hash: &str, time: &str, watch_id: &str, user_id: Option<&str>) -> Self {
        let goals = format!(
            "[{}]",
            goals.iter().map(|g| g.to_string()).collect::<Vec<_>>().join(",")
        );
        let time = time.replace(':', ": ");
        let params = match user_id {
            Some(id) => format!("\"{{\"\"__ymu\"\":{{\"\"UserID\"\":\"\"{id}\"\"}}}}\""),
            None => "\"{}\"".to_string(),
        };
        self.content += &[goals.as_str(), hash, &time, watch_id, &params].join("\t");
        self.content.push('\n');
        self
    }

    pub fn build(self) -> String {
        self.content
    }
}

impl Default for ExportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
