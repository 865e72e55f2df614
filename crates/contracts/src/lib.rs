//! `rentops-contracts` — rental contracts between clients and the provider.

pub mod contract;

pub use contract::{
    Contract, ContractCommand, ContractEvent, ContractId, ContractItem, ContractStatus,
};
