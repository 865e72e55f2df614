//! `rentops-invoicing` — invoices, invoice lines and payment settlement.
//!
//! The invoice is the aggregate root; lines and payments are entities owned
//! by it. All settlement arithmetic (`amount`, `paid_amount`, `residual`)
//! lives here and is recomputed explicitly after every state change.

pub mod invoice;
pub mod payment;

pub use invoice::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceLine, InvoiceStatus,
    DUE_DATE_OFFSET_DAYS,
};
pub use payment::{Payment, PaymentId, PaymentMethod, PaymentStatus};
