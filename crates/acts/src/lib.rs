//! `rentops-acts` — service acts documenting work performed under a contract.

pub mod service_act;

pub use service_act::{
    ActLine, ServiceAct, ServiceActCommand, ServiceActEvent, ServiceActId, DEFAULT_UNIT,
};
