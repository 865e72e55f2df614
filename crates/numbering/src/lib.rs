//! `rentops-numbering` — document number issuance.
//!
//! Every contract, invoice, payment and service act asks for a unique,
//! monotonically issued number keyed by its document type. Issued numbers
//! are never reused; gaps are tolerated (a rolled-back operation burns its
//! number).

pub mod file;
pub mod sequence;

pub use file::FileSequences;
pub use sequence::{next_or_new, DocumentType, InMemorySequences, NumberingError, SequenceService};
