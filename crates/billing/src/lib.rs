//! `rentops-billing` — the application layer.
//!
//! Stores, the invoice generation run, payment settlement orchestration,
//! outbound notification and report references. Domain rules live in the
//! aggregate crates; this one wires them to collaborators.

pub mod notify;
pub mod reports;
pub mod run;
pub mod service;
pub mod store;

pub use notify::{
    NoopNotifier, Notification, Notifier, RecordingNotifier, INVOICE_EMAIL_TEMPLATE,
};
pub use reports::{
    invoice_report, service_act_report, ReportRef, INVOICE_REPORT_TEMPLATE,
    SERVICE_ACT_REPORT_TEMPLATE,
};
pub use run::{lines_for_contract, InvoiceRun, InvoiceRunOutcome};
pub use service::BillingService;
pub use store::{
    ClientStore, ContractStore, InMemoryStore, InvoiceStore, ProductStore, ServiceActStore,
};
