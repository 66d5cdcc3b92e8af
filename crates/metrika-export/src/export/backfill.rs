//! Secondary id backfill and goal expansion for one parsed part.

use std::collections::HashMap;

use crate::db::ExportedEvent;

use super::parser::LogEntry;

/// Last secondary id seen for each client hash.
///
/// Scoped to a single part: build one per part and drop it afterwards.
#[derive(Debug, Default)]
pub struct SecondaryIdBackfill {
    latest: HashMap<String, String>,
}

impl SecondaryIdBackfill {
    pub fn new() -> Self {
        Self::default()
    }

    /// The effective secondary id for `entry`. An id carried by the entry
    /// replaces the remembered one for its hash.
    pub fn resolve(&mut self, entry: &LogEntry) -> Option<String> {
        match entry.user_id() {
            Some(id) => {
                self.latest.insert(entry.client_hash.clone(), id.clone());
                Some(id)
            }
            None => self.latest.get(&entry.client_hash).cloned(),
        }
    }
}

/// Expands time-ordered entries into one event per (entry, goal) pair with
/// the secondary id carried forward per client hash.
///
/// Entries without goals emit nothing but still update the backfill state.
pub fn transform(entries: &[LogEntry]) -> Vec<ExportedEvent> {
    let mut backfill = SecondaryIdBackfill::new();
    let mut events = Vec::with_capacity(entries.len());

    for entry in entries {
        let secondary_id = backfill.resolve(entry);
        events.extend(entry.goal_ids.iter().map(|&goal_id| ExportedEvent {
            watch_id: entry.watch_id.clone(),
            goal_id,
            event_time: entry.event_time,
            client_hash: entry.client_hash.clone(),
            secondary_id: secondary_id.clone(),
        }));
    }

    events
}
