//! Parser for Logs API hit exports.
//!
//! The export is nominally TSV with a header line, but cells are not quoted
//! reliably: a record may end early on a stray newline, and the params cell
//! is a JSON object wrapped in CSV-style quoting. The parser therefore scans
//! cell by cell on tabs and treats a newline as a record boundary only once
//! the current record already has more than [`MIN_FIELDS_BEFORE_RECOVERY`]
//! cells.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::metrika::HIT_FIELDS;

const COLUMN_COUNT: usize = HIT_FIELDS.len();

/// A newline inside a cell only ends the record after this many cells.
const MIN_FIELDS_BEFORE_RECOVERY: usize = 2;

/// Stand-in for a params cell lost to an early newline.
const EMPTY_PARAMS: &str = "{}";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Key under which the export nests user parameters.
const USER_PARAMS_KEY: &str = "__ymu";

const USER_ID_PARAM: &str = "UserID";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Export is empty: missing header line")]
    MissingHeader,

    #[error("Unexpected header: expected [{expected}], found [{found}]")]
    HeaderMismatch { expected: String, found: String },

    #[error("Record {record}: malformed goal list '{value}': {source}")]
    GoalList {
        record: usize,
        value: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {record}: malformed timestamp '{value}'")]
    Timestamp { record: usize, value: String },

    #[error("Truncated final record: {found} of {expected} fields")]
    TruncatedRecord { found: usize, expected: usize },
}

/// One hit from the export.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub goal_ids: Vec<i64>,
    pub client_hash: String,
    pub event_time: DateTime<Utc>,
    pub watch_id: String,
    /// User parameters attached to the hit; empty when the cell was unusable.
    pub params: Map<String, Value>,
}

impl LogEntry {
    /// The external user id carried by this hit, if any.
    pub fn user_id(&self) -> Option<String> {
        match self.params.get(USER_ID_PARAM)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Turns one downloaded part into time-ordered [`LogEntry`] values.
#[derive(Debug, Clone, Copy)]
pub struct TsvParser {
    /// Offset of the counter's timezone; export timestamps are local.
    offset: FixedOffset,
}

impl Default for TsvParser {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl TsvParser {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parses a whole part. Any record that cannot be shaped into a
    /// [`LogEntry`] fails the part; a bad params cell does not.
    ///
    /// The result is sorted by event time (stable, so equal timestamps keep
    /// export order).
    pub fn parse(&self, content: &str) -> Result<Vec<LogEntry>, ParseError> {
        let (header, data) = match content.find('\n') {
            Some(idx) => (&content[..idx], &content[idx + 1..]),
            None => (content, ""),
        };
        validate_header(strip_cr(header))?;

        let mut entries = Vec::new();
        let mut fields: Vec<&str> = Vec::with_capacity(COLUMN_COUNT);
        let mut cursor = 0;

        while let Some(offset) = data[cursor..].find('\t') {
            let cell = &data[cursor..cursor + offset];
            match cell.find('\n') {
                Some(newline) if fields.len() > MIN_FIELDS_BEFORE_RECOVERY => {
                    fields.push(strip_cr(&cell[..newline]));
                    if fields.len() == COLUMN_COUNT - 1 {
                        fields.push(EMPTY_PARAMS);
                    }
                    cursor += newline + 1;
                }
                _ => {
                    fields.push(cell);
                    cursor += offset + 1;
                }
            }

            if fields.len() == COLUMN_COUNT {
                entries.push(self.build_entry(entries.len() + 1, &fields)?);
                fields.clear();
            }
        }

        // No tabs left: the tail holds at most the last cell of the final record.
        let rest = &data[cursor..];
        let (last_cell, trailing) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        let last_cell = strip_cr(last_cell);
        let complete_tail = trailing.trim().is_empty();
        if fields.len() == COLUMN_COUNT - 1 && complete_tail {
            fields.push(last_cell);
            entries.push(self.build_entry(entries.len() + 1, &fields)?);
        } else if fields.len() == COLUMN_COUNT - 2 && complete_tail && !last_cell.is_empty() {
            // Same recovery as mid-part: the record ended after its watch id.
            fields.push(last_cell);
            fields.push(EMPTY_PARAMS);
            entries.push(self.build_entry(entries.len() + 1, &fields)?);
        } else if !fields.is_empty() || !rest.trim().is_empty() {
            return Err(ParseError::TruncatedRecord {
                found: fields.len() + usize::from(!rest.trim().is_empty()),
                expected: COLUMN_COUNT,
            });
        }

        entries.sort_by_key(|e| e.event_time);
        Ok(entries)
    }

    fn build_entry(&self, record: usize, fields: &[&str]) -> Result<LogEntry, ParseError> {
        let &[goals, client_hash, date_time, watch_id, params] = fields else {
            return Err(ParseError::TruncatedRecord {
                found: fields.len(),
                expected: COLUMN_COUNT,
            });
        };

        let goal_ids: Vec<i64> =
            serde_json::from_str(goals).map_err(|source| ParseError::GoalList {
                record,
                value: goals.to_string(),
                source,
            })?;

        Ok(LogEntry {
            goal_ids,
            client_hash: client_hash.to_string(),
            event_time: self.parse_timestamp(record, date_time)?,
            watch_id: watch_id.to_string(),
            params: parse_params(params),
        })
    }

    /// Export timestamps look like `2024-12-12 10: 15: 00`.
    fn parse_timestamp(&self, record: usize, raw: &str) -> Result<DateTime<Utc>, ParseError> {
        let normalized = raw.replace(": ", ":");
        NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT)
            .ok()
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| ParseError::Timestamp {
                record,
                value: raw.to_string(),
            })
    }
}

/// Drops the `\r` left behind by CRLF line endings.
fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn validate_header(header: &str) -> Result<(), ParseError> {
    if header.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    if !header.split('\t').eq(HIT_FIELDS.iter().copied()) {
        return Err(ParseError::HeaderMismatch {
            expected: HIT_FIELDS.join(", "),
            found: header.split('\t').collect::<Vec<_>>().join(", "),
        });
    }
    Ok(())
}

/// Decodes a params cell such as `"{""__ymu"":{""UserID"":""42""}}"`.
///
/// Doubled quotes are collapsed and the outer quote pair dropped. User
/// parameters nested under `__ymu` are returned when present, otherwise the
/// decoded object itself. Anything undecodable yields an empty map.
fn parse_params(raw: &str) -> Map<String, Value> {
    let unescaped = raw.replace("\"\"", "\"");
    let mut chars = unescaped.chars();
    chars.next();
    chars.next_back();

    match serde_json::from_str::<Value>(chars.as_str()) {
        Ok(Value::Object(mut object)) => match object.remove(USER_PARAMS_KEY) {
            Some(Value::Object(user_params)) => user_params,
            _ => object,
        },
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> String {
        format!("{}\n", HIT_FIELDS.join("\t"))
    }

    fn row(fields: &[&str]) -> String {
        format!("{}\n", fields.join("\t"))
    }

    fn params_with_user(user_id: &str) -> String {
        format!("\"{{\"\"__ymu\"\":{{\"\"UserID\"\":\"\"{}\"\"}}}}\"", user_id)
    }

    fn sample_export() -> String {
        let mut content = header();
        content += &row(&["[11,22]", "hash-a", "2024-12-12 10: 15: 00", "w2", &params_with_user("S1")]);
        content += &row(&["[]", "hash-b", "2024-12-12 09: 00: 00", "w1", "\"{}\""]);
        content += &row(&["[33]", "hash-a", "2024-12-12 11: 30: 45", "w3", "\"{}\""]);
        content
    }

    #[test]
    fn test_parses_records_and_sorts_by_time() {
        let entries = TsvParser::default().parse(&sample_export()).unwrap();
        let watch_ids: Vec<&str> = entries.iter().map(|e| e.watch_id.as_str()).collect();
        assert_eq!(watch_ids, vec!["w1", "w2", "w3"]);

        let w2 = &entries[1];
        assert_eq!(w2.goal_ids, vec![11, 22]);
        assert_eq!(w2.client_hash, "hash-a");
        assert_eq!(w2.event_time.to_rfc3339(), "2024-12-12T10:15:00+00:00");
        assert_eq!(w2.user_id().as_deref(), Some("S1"));
        assert!(entries[0].goal_ids.is_empty());
    }

    #[test]
    fn test_entries_are_non_decreasing_in_time() {
        let entries = TsvParser::default().parse(&sample_export()).unwrap();
        assert!(entries.windows(2).all(|w| w[0].event_time <= w[1].event_time));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let content = sample_export();
        let parser = TsvParser::default();
        assert_eq!(parser.parse(&content).unwrap(), parser.parse(&content).unwrap());
    }

    #[test]
    fn test_equal_timestamps_keep_export_order() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "first", "\"{}\""]);
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "second", "\"{}\""]);
        let entries = TsvParser::default().parse(&content).unwrap();
        assert_eq!(entries[0].watch_id, "first");
        assert_eq!(entries[1].watch_id, "second");
    }

    #[test]
    fn test_timestamps_use_configured_offset() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "w", "\"{}\""]);
        let moscow = FixedOffset::east_opt(3 * 3600).unwrap();
        let entries = TsvParser::new(moscow).parse(&content).unwrap();
        assert_eq!(entries[0].event_time.to_rfc3339(), "2024-12-12T07:00:00+00:00");
    }

    #[test]
    fn test_malformed_params_yield_empty_map() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "w", "\"{\"\"__ymu\"\":{broken"]);
        let entries = TsvParser::default().parse(&content).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].params.is_empty());
        assert_eq!(entries[0].user_id(), None);
    }

    #[test]
    fn test_params_without_user_namespace_are_used_directly() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "w", "\"{\"\"UserID\"\":12345}\""]);
        let entries = TsvParser::default().parse(&content).unwrap();
        assert_eq!(entries[0].user_id().as_deref(), Some("12345"));
    }

    #[test]
    fn test_empty_user_id_counts_as_absent() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "w", &params_with_user("")]);
        let entries = TsvParser::default().parse(&content).unwrap();
        assert_eq!(entries[0].user_id(), None);
    }

    #[test]
    fn test_malformed_goal_list_fails_the_part() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "w1", "\"{}\""]);
        content += &row(&["[1,", "h", "2024-12-12 10: 00: 00", "w2", "\"{}\""]);
        let err = TsvParser::default().parse(&content).unwrap_err();
        assert!(matches!(err, ParseError::GoalList { record: 2, .. }));
    }

    #[test]
    fn test_malformed_timestamp_fails_the_part() {
        let mut content = header();
        content += &row(&["[1]", "h", "12/12/2024 10:00", "w", "\"{}\""]);
        let err = TsvParser::default().parse(&content).unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { record: 1, .. }));
    }

    #[test]
    fn test_header_must_match_requested_fields() {
        let content = "ym:pv:watchID\tym:pv:goalsID\n1\t[1]\n";
        let err = TsvParser::default().parse(content).unwrap_err();
        assert!(matches!(err, ParseError::HeaderMismatch { .. }));

        let err = TsvParser::default().parse("").unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader));
    }

    #[test]
    fn test_header_only_export_is_empty() {
        assert!(TsvParser::default().parse(&header()).unwrap().is_empty());
        let bare = HIT_FIELDS.join("\t");
        assert!(TsvParser::default().parse(&bare).unwrap().is_empty());
    }

    #[test]
    fn test_last_record_without_trailing_newline() {
        let mut content = sample_export();
        content += &["[7]", "hash-c", "2024-12-12 12: 00: 00", "w4", "\"{}\""].join("\t");
        let entries = TsvParser::default().parse(&content).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].watch_id, "w4");
        assert_eq!(entries[3].goal_ids, vec![7]);
    }

    #[test]
    fn test_truncated_final_record_fails_the_part() {
        let mut content = header();
        content += &row(&["[1]", "h", "2024-12-12 10: 00: 00", "w1", "\"{}\""]);
        content += "[2]\th2\t2024-12-12 10: 00: 00\n";
        let err = TsvParser::default().parse(&content).unwrap_err();
        assert!(matches!(err, ParseError::TruncatedRecord { expected: 5, .. }));
    }

    #[test]
    fn test_record_ending_after_watch_id_gets_empty_params() {
        let mut content = header();
        content += "[1]\th1\t2024-12-12 10: 00: 00\tw1\n";
        content += &row(&["[2]", "h2", "2024-12-12 10: 05: 00", "w2", &params_with_user("S2")]);
        let entries = TsvParser::default().parse(&content).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].watch_id, "w1");
        assert!(entries[0].params.is_empty());
        assert_eq!(entries[1].goal_ids, vec![2]);
        assert_eq!(entries[1].user_id().as_deref(), Some("S2"));
    }

    #[test]
    fn test_final_record_ending_after_watch_id_gets_empty_params() {
        let mut content = header();
        content += &row(&["[2]", "h2", "2024-12-12 10: 05: 00", "w2", &params_with_user("S2")]);
        content += "[1]\th1\t2024-12-12 10: 00: 00\tw1\n";
        let entries = TsvParser::default().parse(&content).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].watch_id, "w1");
        assert_eq!(entries[0].goal_ids, vec![1]);
        assert!(entries[0].params.is_empty());

        // Same without the final newline.
        let content = content.trim_end_matches('\n');
        assert_eq!(TsvParser::default().parse(content).unwrap().len(), 2);
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = sample_export().replace('\n', "\r\n");
        let entries = TsvParser::default().parse(&content).unwrap();

        let watch_ids: Vec<&str> = entries.iter().map(|e| e.watch_id.as_str()).collect();
        assert_eq!(watch_ids, vec!["w1", "w2", "w3"]);
        assert_eq!(entries[1].user_id().as_deref(), Some("S1"));
    }

    #[test]
    fn test_newline_in_early_cell_is_kept_verbatim() {
        // Only two cells consumed: the newline is treated as cell content.
        let mut content = header();
        content += &row(&["[1]", "ha\nsh", "2024-12-12 10: 00: 00", "w1", "\"{}\""]);
        let entries = TsvParser::default().parse(&content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].client_hash, "ha\nsh");
    }

    #[test]
    fn test_newline_inside_params_of_middle_record_fails_the_part() {
        let mut content = header();
        content += &row(&["[1]", "h1", "2024-12-12 10: 00: 00", "w1", "\"{\"\"a\"\":\n1}\""]);
        content += &row(&["[2]", "h2", "2024-12-12 10: 05: 00", "w2", "\"{}\""]);
        let err = TsvParser::default().parse(&content).unwrap_err();
        assert!(matches!(err, ParseError::GoalList { record: 2, .. }));
    }
}
