//! Summary counters persisted alongside the work items.
//!
//! The counters are derived data. [`recompute_metadata`] is the only code
//! path that produces them, and the store calls it once at the end of every
//! successful mutation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{Status, WorkItem};

/// Counts per status plus the time of the last successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub total_items: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub completed: usize,
    pub last_updated: DateTime<Utc>,
}

impl StoreMetadata {
    /// Count for one status.
    #[must_use]
    pub const fn count(&self, status: Status) -> usize {
        match status {
            Status::NotStarted => self.not_started,
            Status::InProgress => self.in_progress,
            Status::Blocked => self.blocked,
            Status::Completed => self.completed,
        }
    }

    /// `true` when the counters agree with `items`.
    #[must_use]
    pub fn matches(&self, items: &BTreeMap<String, WorkItem>) -> bool {
        let fresh = recompute_metadata(items, self.last_updated);
        fresh == *self
    }
}

/// Recompute the summary block from scratch.
#[must_use]
pub fn recompute_metadata(items: &BTreeMap<String, WorkItem>, now: DateTime<Utc>) -> StoreMetadata {
    let mut meta = StoreMetadata {
        total_items: items.len(),
        not_started: 0,
        in_progress: 0,
        blocked: 0,
        completed: 0,
        last_updated: now,
    };

    for item in items.values() {
        match item.status {
            Status::NotStarted => meta.not_started += 1,
            Status::InProgress => meta.in_progress += 1,
            Status::Blocked => meta.blocked += 1,
            Status::Completed => meta.completed += 1,
        }
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{Priority, WorkItemType};

    #[test]
    fn counts_every_status() {
        let now = Utc::now();
        let mut items = BTreeMap::new();
        for (id, status) in [
            ("a", Status::NotStarted),
            ("b", Status::NotStarted),
            ("c", Status::InProgress),
            ("d", Status::Completed),
        ] {
            let mut item = WorkItem::new(id, WorkItemType::Feature, id, Priority::Medium, now);
            item.status = status;
            items.insert(id.to_string(), item);
        }

        let meta = recompute_metadata(&items, now);
        assert_eq!(meta.total_items, 4);
        assert_eq!(meta.count(Status::NotStarted), 2);
        assert_eq!(meta.count(Status::InProgress), 1);
        assert_eq!(meta.count(Status::Blocked), 0);
        assert_eq!(meta.count(Status::Completed), 1);
        assert!(meta.matches(&items));
    }

    #[test]
    fn empty_store_has_zero_counts() {
        let meta = recompute_metadata(&BTreeMap::new(), Utc::now());
        assert_eq!(meta.total_items, 0);
        assert_eq!(meta.completed, 0);
    }
}
