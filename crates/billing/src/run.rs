//! Invoice generation run parameters and contract selection.
//!
//! The run fans one invoice out per selected active contract; the selection
//! rules live here so they can be tested apart from the stores.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use rentops_contracts::Contract;
use rentops_core::{DomainError, DomainResult};
use rentops_invoicing::{InvoiceId, InvoiceLine};

/// Parameters for one invoice generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRun {
    /// Invoice date for every generated invoice.
    pub date: NaiveDate,
    /// Bill every active contract.
    pub include_active: bool,
    /// Bill active contracts ending within `days_to_expire` of `date`.
    pub include_expiring: bool,
    pub days_to_expire: u32,
}

impl InvoiceRun {
    pub fn validate(&self) -> DomainResult<()> {
        if self.days_to_expire < 1 {
            return Err(DomainError::validation(
                "days to expire must be at least 1",
            ));
        }
        Ok(())
    }

    fn cutoff(&self) -> NaiveDate {
        self.date + Days::new(u64::from(self.days_to_expire))
    }

    /// Whether this run bills the given contract.
    ///
    /// Only active contracts qualify; with both flags clear nothing is
    /// selected and the run is a no-op.
    pub fn selects(&self, contract: &Contract) -> bool {
        if !contract.is_active() {
            return false;
        }
        if self.include_active {
            return true;
        }
        self.include_expiring && contract.ends_on_or_before(self.cutoff())
    }
}

/// Invoice lines for one contract: the items 1:1, quantity 1, unit price =
/// agreed monthly price.
pub fn lines_for_contract(contract: &Contract) -> Vec<InvoiceLine> {
    contract
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| InvoiceLine {
            line_no: (i + 1) as u32,
            product_id: item.product_id,
            kind: item.kind,
            description: item.description.clone(),
            quantity: 1,
            unit_price: item.monthly_price,
        })
        .collect()
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceRunOutcome {
    pub invoice_ids: Vec<InvoiceId>,
}

impl InvoiceRunOutcome {
    pub fn is_empty(&self) -> bool {
        self.invoice_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rentops_contracts::contract::{ActivateContract, DraftContract};
    use rentops_contracts::{ContractCommand, ContractId, ContractItem};
    use rentops_core::{Aggregate, Money, RecordId};
    use rentops_parties::ClientId;
    use rentops_products::{ProductId, ProductKind};

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn active_contract(end_date: NaiveDate) -> Contract {
        let id = ContractId::new(RecordId::new());
        let mut contract = Contract::empty(id);
        let events = contract
            .handle(&ContractCommand::DraftContract(DraftContract {
                contract_id: id,
                number: "CON00001".to_string(),
                client_id: ClientId::new(RecordId::new()),
                start_date: run_date(),
                end_date,
                items: vec![ContractItem {
                    product_id: ProductId::new(RecordId::new()),
                    kind: ProductKind::Server,
                    description: "Server 4 CPU, 16 GB RAM".to_string(),
                    monthly_price: Money::from_cents(100_000),
                }],
                notes: None,
                today: run_date(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        contract.apply(&events[0]);

        let events = contract
            .handle(&ContractCommand::ActivateContract(ActivateContract {
                contract_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        contract.apply(&events[0]);
        contract
    }

    #[test]
    fn days_to_expire_below_one_is_rejected() {
        let run = InvoiceRun {
            date: run_date(),
            include_active: true,
            include_expiring: false,
            days_to_expire: 0,
        };
        assert!(matches!(
            run.validate().unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn include_active_selects_every_active_contract() {
        let run = InvoiceRun {
            date: run_date(),
            include_active: true,
            include_expiring: false,
            days_to_expire: 30,
        };
        let far_out = active_contract(run_date() + Days::new(365));
        assert!(run.selects(&far_out));
    }

    #[test]
    fn include_expiring_honors_the_cutoff() {
        let run = InvoiceRun {
            date: run_date(),
            include_active: false,
            include_expiring: true,
            days_to_expire: 30,
        };
        let expiring = active_contract(run_date() + Days::new(30));
        let far_out = active_contract(run_date() + Days::new(31));
        assert!(run.selects(&expiring));
        assert!(!run.selects(&far_out));
    }

    #[test]
    fn neither_flag_selects_nothing() {
        let run = InvoiceRun {
            date: run_date(),
            include_active: false,
            include_expiring: false,
            days_to_expire: 30,
        };
        let contract = active_contract(run_date() + Days::new(10));
        assert!(!run.selects(&contract));
    }

    #[test]
    fn draft_contracts_are_never_selected() {
        let run = InvoiceRun {
            date: run_date(),
            include_active: true,
            include_expiring: true,
            days_to_expire: 30,
        };
        let id = ContractId::new(RecordId::new());
        let mut draft = Contract::empty(id);
        let events = draft
            .handle(&ContractCommand::DraftContract(DraftContract {
                contract_id: id,
                number: "CON00002".to_string(),
                client_id: ClientId::new(RecordId::new()),
                start_date: run_date(),
                end_date: run_date() + Days::new(10),
                items: vec![ContractItem {
                    product_id: ProductId::new(RecordId::new()),
                    kind: ProductKind::Service,
                    description: "Monitoring".to_string(),
                    monthly_price: Money::from_cents(50_000),
                }],
                notes: None,
                today: run_date(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        draft.apply(&events[0]);
        assert!(!run.selects(&draft));
    }

    #[test]
    fn lines_mirror_contract_items() {
        let contract = active_contract(run_date() + Days::new(90));
        let lines = lines_for_contract(&contract);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_no, 1);
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[0].unit_price, Money::from_cents(100_000));
        assert_eq!(lines[0].description, "Server 4 CPU, 16 GB RAM");
    }
}
