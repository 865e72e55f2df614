//! In-memory aggregate stores.
//!
//! One store per aggregate type, a `RwLock<HashMap>` keyed by the typed id.
//! Saves go through an optimistic concurrency check: callers state the
//! version they loaded, and a stale save is a conflict.

use std::collections::HashMap;
use std::sync::RwLock;

use rentops_acts::ServiceAct;
use rentops_contracts::Contract;
use rentops_core::{Aggregate, DomainError, DomainResult, ExpectedVersion};
use rentops_invoicing::Invoice;
use rentops_parties::Client;
use rentops_products::RentalProduct;

/// Shared in-memory store for one aggregate type.
///
/// Intended for tests/dev and as the seam a persistent store would replace.
#[derive(Debug, Default)]
pub struct InMemoryStore<A: Aggregate> {
    records: RwLock<HashMap<A::Id, A>>,
}

pub type ClientStore = InMemoryStore<Client>;
pub type ProductStore = InMemoryStore<RentalProduct>;
pub type ContractStore = InMemoryStore<Contract>;
pub type InvoiceStore = InMemoryStore<Invoice>;
pub type ServiceActStore = InMemoryStore<ServiceAct>;

impl<A> InMemoryStore<A>
where
    A: Aggregate + Clone,
{
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Load a copy of the aggregate, or `NotFound`.
    pub fn get(&self, id: &A::Id) -> DomainResult<A> {
        self.try_get(id)?.ok_or(DomainError::NotFound)
    }

    /// Load a copy of the aggregate if present.
    pub fn try_get(&self, id: &A::Id) -> DomainResult<Option<A>> {
        let records = self
            .records
            .read()
            .map_err(|_| DomainError::invariant("store lock poisoned"))?;
        Ok(records.get(id).cloned())
    }

    /// Persist the aggregate after checking the version the caller loaded.
    ///
    /// An absent record counts as version 0, so creations pass
    /// `ExpectedVersion::Exact(0)`.
    pub fn save(&self, aggregate: A, expected: ExpectedVersion) -> DomainResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| DomainError::invariant("store lock poisoned"))?;
        let current = records
            .get(aggregate.id())
            .map(|a| a.version())
            .unwrap_or(0);
        expected.check(current)?;
        records.insert(aggregate.id().clone(), aggregate);
        Ok(())
    }

    /// Copies of all stored aggregates, in no particular order.
    pub fn list(&self) -> DomainResult<Vec<A>> {
        let records = self
            .records
            .read()
            .map_err(|_| DomainError::invariant("store lock poisoned"))?;
        Ok(records.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rentops_contracts::contract::DraftContract;
    use rentops_contracts::{ContractCommand, ContractId, ContractItem};
    use rentops_core::{AggregateRoot, Money, RecordId};
    use rentops_products::{ProductId, ProductKind};

    fn drafted_contract() -> Contract {
        let id = ContractId::new(RecordId::new());
        let mut contract = Contract::empty(id);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let cmd = DraftContract {
            contract_id: id,
            number: "CON00001".to_string(),
            client_id: rentops_parties::ClientId::new(RecordId::new()),
            start_date: today,
            end_date: today + chrono::Days::new(90),
            items: vec![ContractItem {
                product_id: ProductId::new(RecordId::new()),
                kind: ProductKind::Service,
                description: "Monitoring".to_string(),
                monthly_price: Money::from_cents(50_000),
            }],
            notes: None,
            today,
            occurred_at: Utc::now(),
        };
        let events = contract
            .handle(&ContractCommand::DraftContract(cmd))
            .unwrap();
        contract.apply(&events[0]);
        contract
    }

    #[test]
    fn save_and_get_round_trip() {
        let store = ContractStore::new();
        let contract = drafted_contract();
        let id = contract.id_typed();

        store.save(contract, ExpectedVersion::Exact(0)).unwrap();
        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.number(), "CON00001");
        assert_eq!(loaded.version(), 1);
    }

    #[test]
    fn missing_record_is_not_found() {
        let store = ContractStore::new();
        let err = store.get(&ContractId::new(RecordId::new())).unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn stale_save_is_a_conflict() {
        let store = ContractStore::new();
        let contract = drafted_contract();
        store
            .save(contract.clone(), ExpectedVersion::Exact(0))
            .unwrap();

        // Saving again as a creation races a record already at version 1.
        let err = store
            .save(contract, ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn any_version_skips_the_check() {
        let store = ContractStore::new();
        let contract = drafted_contract();
        store
            .save(contract.clone(), ExpectedVersion::Any)
            .unwrap();
        store.save(contract, ExpectedVersion::Any).unwrap();
        assert_eq!(store.len(), 1);
    }
}
