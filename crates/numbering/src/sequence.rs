use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Document types that draw numbers from the sequence service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Contract,
    Invoice,
    Payment,
    ServiceAct,
}

impl DocumentType {
    /// Number prefix, e.g. `INV` for invoices.
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentType::Contract => "CON",
            DocumentType::Invoice => "INV",
            DocumentType::Payment => "PAY",
            DocumentType::ServiceAct => "ACT",
        }
    }

    pub const ALL: [DocumentType; 4] = [
        DocumentType::Contract,
        DocumentType::Invoice,
        DocumentType::Payment,
        DocumentType::ServiceAct,
    ];
}

#[derive(Debug, Error)]
pub enum NumberingError {
    #[error("sequence state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sequence state corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("sequence lock poisoned")]
    LockPoisoned,
}

/// Issues unique document numbers per document type.
///
/// Numbers are monotonically increasing per type and never reissued; the
/// service makes no gap-free promise.
pub trait SequenceService: Send + Sync {
    fn next_id(&self, doc_type: DocumentType) -> Result<String, NumberingError>;
}

impl<S> SequenceService for Arc<S>
where
    S: SequenceService + ?Sized,
{
    fn next_id(&self, doc_type: DocumentType) -> Result<String, NumberingError> {
        (**self).next_id(doc_type)
    }
}

/// Draw the next number, falling back to the literal `"New"` when no service
/// is wired or issuance fails. A record may legitimately carry the
/// placeholder number until a real one is issued.
pub fn next_or_new(
    sequences: Option<&dyn SequenceService>,
    doc_type: DocumentType,
) -> String {
    match sequences {
        Some(s) => s.next_id(doc_type).unwrap_or_else(|_| "New".to_string()),
        None => "New".to_string(),
    }
}

pub(crate) fn format_number(doc_type: DocumentType, seq: u64) -> String {
    format!("{}{seq:05}", doc_type.prefix())
}

/// In-memory sequence counters.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemorySequences {
    counters: RwLock<HashMap<DocumentType, u64>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceService for InMemorySequences {
    fn next_id(&self, doc_type: DocumentType) -> Result<String, NumberingError> {
        let mut counters = self
            .counters
            .write()
            .map_err(|_| NumberingError::LockPoisoned)?;
        let counter = counters.entry(doc_type).or_insert(0);
        *counter += 1;
        Ok(format_number(doc_type, *counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_monotonic_numbers_per_type() {
        let sequences = InMemorySequences::new();
        assert_eq!(sequences.next_id(DocumentType::Invoice).unwrap(), "INV00001");
        assert_eq!(sequences.next_id(DocumentType::Invoice).unwrap(), "INV00002");
        // Each document type has its own counter.
        assert_eq!(sequences.next_id(DocumentType::Payment).unwrap(), "PAY00001");
        assert_eq!(sequences.next_id(DocumentType::Contract).unwrap(), "CON00001");
        assert_eq!(
            sequences.next_id(DocumentType::ServiceAct).unwrap(),
            "ACT00001"
        );
    }

    #[test]
    fn next_or_new_falls_back_without_service() {
        assert_eq!(next_or_new(None, DocumentType::Invoice), "New");
    }

    #[test]
    fn next_or_new_uses_wired_service() {
        let sequences = InMemorySequences::new();
        assert_eq!(
            next_or_new(Some(&sequences), DocumentType::Invoice),
            "INV00001"
        );
    }

    #[test]
    fn concurrent_issuance_never_duplicates() {
        let sequences = std::sync::Arc::new(InMemorySequences::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sequences = sequences.clone();
            handles.push(std::thread::spawn(move || {
                (0..100)
                    .map(|_| sequences.next_id(DocumentType::Invoice).unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let issued = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), issued);
    }
}
