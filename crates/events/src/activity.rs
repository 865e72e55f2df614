//! Activity log: the audit-trail collaborator.
//!
//! Audit tracking is an explicit trait rather than behavior mixed into every
//! record type: the billing layer reports each state change to an
//! `ActivityLog`, keyed by record id and document number, and embedding
//! applications decide where those entries go (memory, database, UI feed).

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentops_core::{DomainError, RecordId};

/// One tracked state change on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub record_id: RecordId,
    pub record_type: String,
    /// Document number at the time of the event (e.g. "INV00042", "New").
    pub document_no: String,
    /// Stable event type identifier (e.g. "contracts.contract.activated").
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    /// Free-form note (cancellation reasons land here).
    pub note: Option<String>,
}

/// Audit-trail sink for record lifecycle events.
///
/// Implementations must be safe to share across threads. A failing log
/// aborts the surrounding operation; trail and state change succeed or fail
/// together.
pub trait ActivityLog: Send + Sync {
    fn record(&self, entry: ActivityEntry) -> Result<(), DomainError>;

    /// Entries for one record, oldest first.
    fn entries_for(&self, record_id: RecordId) -> Vec<ActivityEntry>;
}

impl<L> ActivityLog for Arc<L>
where
    L: ActivityLog + ?Sized,
{
    fn record(&self, entry: ActivityEntry) -> Result<(), DomainError> {
        (**self).record(entry)
    }

    fn entries_for(&self, record_id: RecordId) -> Vec<ActivityEntry> {
        (**self).entries_for(record_id)
    }
}

/// In-memory activity log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    entries: RwLock<Vec<ActivityEntry>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActivityLog for InMemoryActivityLog {
    fn record(&self, entry: ActivityEntry) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DomainError::invariant("activity log lock poisoned"))?;
        entries.push(entry);
        Ok(())
    }

    fn entries_for(&self, record_id: RecordId) -> Vec<ActivityEntry> {
        match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|e| e.record_id == record_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
