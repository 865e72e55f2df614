//! `rentops-events` — domain events and the activity log.
//!
//! Contracts, invoices, payments and service acts report their lifecycle
//! events to an [`ActivityLog`] collaborator. This replaces inherited
//! message-thread behavior with an explicit audit-trail seam: entities that
//! want tracking take an `Arc<dyn ActivityLog>`, others simply don't.

pub mod activity;
pub mod event;

pub use activity::{ActivityEntry, ActivityLog, InMemoryActivityLog};
pub use event::Event;
