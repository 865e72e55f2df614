//! Durable sequence counters backed by a JSON snapshot file.
//!
//! The snapshot stores the last issued number per document type and is
//! rewritten after every issuance, before the number is handed out. A crash
//! between issuance and the caller persisting its record leaves a gap, which
//! the numbering contract allows.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::sequence::{format_number, DocumentType, NumberingError, SequenceService};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    counters: HashMap<DocumentType, u64>,
}

/// File-backed sequence counters.
#[derive(Debug)]
pub struct FileSequences {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

impl FileSequences {
    /// Open (or initialize) the snapshot at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NumberingError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Snapshot::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), NumberingError> {
        // Write-then-rename so a crash mid-write never corrupts the snapshot.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl SequenceService for FileSequences {
    fn next_id(&self, doc_type: DocumentType) -> Result<String, NumberingError> {
        let mut state = self.state.lock().map_err(|_| NumberingError::LockPoisoned)?;
        let counter = state.counters.entry(doc_type).or_insert(0);
        *counter += 1;
        let number = format_number(doc_type, *counter);
        Self::persist(&self.path, &state)?;
        Ok(number)
    }
}
