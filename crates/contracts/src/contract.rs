use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentops_core::{Aggregate, AggregateRoot, DomainError, Money, RecordId};
use rentops_events::Event;
use rentops_parties::ClientId;
use rentops_products::{ProductId, ProductKind};

/// Contract identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub RecordId);

impl ContractId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ContractId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Contract status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Active,
    Expired,
    Cancelled,
}

/// A contracted item: snapshot of the product at signing time.
///
/// Prices and descriptions are copied onto the contract so that later catalog
/// edits never change what was agreed (invoice generation reads these, not
/// the catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractItem {
    pub product_id: ProductId,
    pub kind: ProductKind,
    pub description: String,
    /// Monthly price in smallest currency unit.
    pub monthly_price: Money,
}

/// Aggregate root: Contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    id: ContractId,
    /// Document number issued by the sequence service ("New" until issued).
    number: String,
    client_id: Option<ClientId>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    items: Vec<ContractItem>,
    status: ContractStatus,
    notes: Option<String>,
    cancel_reason: Option<String>,
    /// Recomputed after every item mutation.
    monthly_total: Money,
    version: u64,
    created: bool,
}

impl Contract {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ContractId) -> Self {
        Self {
            id,
            number: "New".to_string(),
            client_id: None,
            start_date: NaiveDate::MIN,
            end_date: NaiveDate::MIN,
            items: Vec::new(),
            status: ContractStatus::Draft,
            notes: None,
            cancel_reason: None,
            monthly_total: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ContractId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn items(&self) -> &[ContractItem] {
        &self.items
    }

    pub fn status(&self) -> ContractStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Sum of item monthly prices.
    pub fn monthly_total(&self) -> Money {
        self.monthly_total
    }

    /// Display name: "{number} / {client}"-style naming is left to read
    /// models; the aggregate only knows its number.
    pub fn is_active(&self) -> bool {
        self.status == ContractStatus::Active
    }

    /// Whether the contract runs out on or before `cutoff` (used by the
    /// invoice generation run to pick up soon-expiring contracts).
    pub fn ends_on_or_before(&self, cutoff: NaiveDate) -> bool {
        self.end_date <= cutoff
    }

    fn recompute_monthly_total(&mut self) {
        self.monthly_total = self.items.iter().map(|i| i.monthly_price).sum();
    }
}

impl AggregateRoot for Contract {
    type Id = ContractId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DraftContract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContract {
    pub contract_id: ContractId,
    pub number: String,
    pub client_id: ClientId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<ContractItem>,
    pub notes: Option<String>,
    /// Business "today"; passed in so the aggregate stays deterministic.
    pub today: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendItems (draft contracts only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendItems {
    pub contract_id: ContractId,
    pub items: Vec<ContractItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateContract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateContract {
    pub contract_id: ContractId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireContract (driven by an external scheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireContract {
    pub contract_id: ContractId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelContract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelContract {
    pub contract_id: ContractId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCommand {
    DraftContract(DraftContract),
    AmendItems(AmendItems),
    ActivateContract(ActivateContract),
    ExpireContract(ExpireContract),
    CancelContract(CancelContract),
}

/// Event: ContractDrafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDrafted {
    pub contract_id: ContractId,
    pub number: String,
    pub client_id: ClientId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<ContractItem>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContractItemsAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractItemsAmended {
    pub contract_id: ContractId,
    pub items: Vec<ContractItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContractActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractActivated {
    pub contract_id: ContractId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContractExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractExpired {
    pub contract_id: ContractId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContractCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCancelled {
    pub contract_id: ContractId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    ContractDrafted(ContractDrafted),
    ContractItemsAmended(ContractItemsAmended),
    ContractActivated(ContractActivated),
    ContractExpired(ContractExpired),
    ContractCancelled(ContractCancelled),
}

impl Event for ContractEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContractEvent::ContractDrafted(_) => "contracts.contract.drafted",
            ContractEvent::ContractItemsAmended(_) => "contracts.contract.items_amended",
            ContractEvent::ContractActivated(_) => "contracts.contract.activated",
            ContractEvent::ContractExpired(_) => "contracts.contract.expired",
            ContractEvent::ContractCancelled(_) => "contracts.contract.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ContractEvent::ContractDrafted(e) => e.occurred_at,
            ContractEvent::ContractItemsAmended(e) => e.occurred_at,
            ContractEvent::ContractActivated(e) => e.occurred_at,
            ContractEvent::ContractExpired(e) => e.occurred_at,
            ContractEvent::ContractCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Contract {
    type Command = ContractCommand;
    type Event = ContractEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ContractEvent::ContractDrafted(e) => {
                self.id = e.contract_id;
                self.number = e.number.clone();
                self.client_id = Some(e.client_id);
                self.start_date = e.start_date;
                self.end_date = e.end_date;
                self.items = e.items.clone();
                self.notes = e.notes.clone();
                self.status = ContractStatus::Draft;
                self.created = true;
            }
            ContractEvent::ContractItemsAmended(e) => {
                self.items = e.items.clone();
            }
            ContractEvent::ContractActivated(_) => {
                self.status = ContractStatus::Active;
            }
            ContractEvent::ContractExpired(_) => {
                self.status = ContractStatus::Expired;
            }
            ContractEvent::ContractCancelled(e) => {
                self.status = ContractStatus::Cancelled;
                self.cancel_reason = Some(e.reason.clone());
            }
        }

        // Explicit recomputation: derived totals are refreshed on every
        // application, never lazily.
        self.recompute_monthly_total();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ContractCommand::DraftContract(cmd) => self.handle_draft(cmd),
            ContractCommand::AmendItems(cmd) => self.handle_amend_items(cmd),
            ContractCommand::ActivateContract(cmd) => self.handle_activate(cmd),
            ContractCommand::ExpireContract(cmd) => self.handle_expire(cmd),
            ContractCommand::CancelContract(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Contract {
    fn ensure_contract_id(&self, contract_id: ContractId) -> Result<(), DomainError> {
        if self.id != contract_id {
            return Err(DomainError::invariant("contract_id mismatch"));
        }
        Ok(())
    }

    fn check_items(items: &[ContractItem]) -> Result<(), DomainError> {
        if items.is_empty() {
            return Err(DomainError::validation(
                "contract must have at least one product",
            ));
        }
        for item in items {
            if !item.monthly_price.is_positive() {
                return Err(DomainError::validation(
                    "contract item price must be positive",
                ));
            }
        }
        Ok(())
    }

    fn handle_draft(&self, cmd: &DraftContract) -> Result<Vec<ContractEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("contract already exists"));
        }

        if cmd.end_date < cmd.start_date {
            return Err(DomainError::validation(
                "end date cannot be before start date",
            ));
        }
        if cmd.start_date < cmd.today {
            return Err(DomainError::validation("start date cannot be in the past"));
        }
        Self::check_items(&cmd.items)?;

        Ok(vec![ContractEvent::ContractDrafted(ContractDrafted {
            contract_id: cmd.contract_id,
            number: cmd.number.clone(),
            client_id: cmd.client_id,
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            items: cmd.items.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend_items(&self, cmd: &AmendItems) -> Result<Vec<ContractEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_contract_id(cmd.contract_id)?;

        if self.status != ContractStatus::Draft {
            return Err(DomainError::invariant(
                "only draft contracts can be amended",
            ));
        }
        Self::check_items(&cmd.items)?;

        Ok(vec![ContractEvent::ContractItemsAmended(
            ContractItemsAmended {
                contract_id: cmd.contract_id,
                items: cmd.items.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_activate(
        &self,
        cmd: &ActivateContract,
    ) -> Result<Vec<ContractEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_contract_id(cmd.contract_id)?;

        if self.status == ContractStatus::Active {
            return Err(DomainError::conflict("contract is already active"));
        }
        if self.status == ContractStatus::Cancelled {
            return Err(DomainError::invariant(
                "cancelled contracts cannot be activated",
            ));
        }
        // Activation gate: a contract without products never goes active.
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "contract must have at least one product",
            ));
        }

        Ok(vec![ContractEvent::ContractActivated(ContractActivated {
            contract_id: cmd.contract_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireContract) -> Result<Vec<ContractEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_contract_id(cmd.contract_id)?;

        if self.status != ContractStatus::Active {
            return Err(DomainError::invariant(
                "only active contracts can expire",
            ));
        }

        Ok(vec![ContractEvent::ContractExpired(ContractExpired {
            contract_id: cmd.contract_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelContract) -> Result<Vec<ContractEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_contract_id(cmd.contract_id)?;

        if self.status == ContractStatus::Cancelled {
            return Err(DomainError::conflict("contract is already cancelled"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "please provide a reason for cancellation",
            ));
        }

        Ok(vec![ContractEvent::ContractCancelled(ContractCancelled {
            contract_id: cmd.contract_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_contract_id() -> ContractId {
        ContractId::new(RecordId::new())
    }

    fn test_client_id() -> ClientId {
        ClientId::new(RecordId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn server_item() -> ContractItem {
        ContractItem {
            product_id: ProductId::new(RecordId::new()),
            kind: ProductKind::Server,
            description: "Server 4 CPU, 16 GB RAM".to_string(),
            monthly_price: Money::from_cents(100_000),
        }
    }

    fn service_item() -> ContractItem {
        ContractItem {
            product_id: ProductId::new(RecordId::new()),
            kind: ProductKind::Service,
            description: "Monitoring".to_string(),
            monthly_price: Money::from_cents(50_000),
        }
    }

    fn draft_cmd(id: ContractId, items: Vec<ContractItem>) -> DraftContract {
        DraftContract {
            contract_id: id,
            number: "CON00001".to_string(),
            client_id: test_client_id(),
            start_date: today(),
            end_date: today() + chrono::Days::new(365),
            items,
            notes: None,
            today: today(),
            occurred_at: test_time(),
        }
    }

    fn drafted_contract(items: Vec<ContractItem>) -> Contract {
        let mut contract = Contract::empty(test_contract_id());
        let cmd = draft_cmd(contract.id_typed(), items);
        let events = contract
            .handle(&ContractCommand::DraftContract(cmd))
            .unwrap();
        contract.apply(&events[0]);
        contract
    }

    #[test]
    fn draft_contract_starts_in_draft_with_items() {
        let contract = drafted_contract(vec![server_item(), service_item()]);
        assert_eq!(contract.status(), ContractStatus::Draft);
        assert_eq!(contract.items().len(), 2);
        assert_eq!(contract.number(), "CON00001");
    }

    #[test]
    fn monthly_total_sums_item_prices() {
        let contract = drafted_contract(vec![server_item(), service_item()]);
        assert_eq!(contract.monthly_total(), Money::from_cents(150_000));
    }

    #[test]
    fn end_date_before_start_date_is_rejected() {
        let contract = Contract::empty(test_contract_id());
        let mut cmd = draft_cmd(contract.id_typed(), vec![server_item()]);
        cmd.end_date = cmd.start_date - chrono::Days::new(1);

        let err = contract
            .handle(&ContractCommand::DraftContract(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn start_date_in_the_past_is_rejected() {
        let contract = Contract::empty(test_contract_id());
        let mut cmd = draft_cmd(contract.id_typed(), vec![server_item()]);
        cmd.start_date = cmd.today - chrono::Days::new(1);

        let err = contract
            .handle(&ContractCommand::DraftContract(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn contract_without_items_is_rejected() {
        let contract = Contract::empty(test_contract_id());
        let cmd = draft_cmd(contract.id_typed(), vec![]);

        let err = contract
            .handle(&ContractCommand::DraftContract(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn activate_moves_draft_to_active() {
        let mut contract = drafted_contract(vec![server_item()]);
        let cmd = ActivateContract {
            contract_id: contract.id_typed(),
            occurred_at: test_time(),
        };
        let events = contract
            .handle(&ContractCommand::ActivateContract(cmd))
            .unwrap();
        contract.apply(&events[0]);
        assert_eq!(contract.status(), ContractStatus::Active);
        assert!(contract.is_active());
    }

    #[test]
    fn cancel_without_reason_is_rejected() {
        let contract = drafted_contract(vec![server_item()]);
        let cmd = CancelContract {
            contract_id: contract.id_typed(),
            reason: "  ".to_string(),
            occurred_at: test_time(),
        };

        let err = contract
            .handle(&ContractCommand::CancelContract(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancel_with_reason_succeeds_and_is_terminal() {
        let mut contract = drafted_contract(vec![server_item()]);
        let cmd = CancelContract {
            contract_id: contract.id_typed(),
            reason: "client churned".to_string(),
            occurred_at: test_time(),
        };
        let events = contract
            .handle(&ContractCommand::CancelContract(cmd.clone()))
            .unwrap();
        contract.apply(&events[0]);
        assert_eq!(contract.status(), ContractStatus::Cancelled);
        assert_eq!(contract.cancel_reason(), Some("client churned"));

        // Cancelled is terminal: no second cancel, no activation.
        let err = contract
            .handle(&ContractCommand::CancelContract(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = contract
            .handle(&ContractCommand::ActivateContract(ActivateContract {
                contract_id: contract.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn amend_items_recomputes_monthly_total() {
        let mut contract = drafted_contract(vec![server_item()]);
        assert_eq!(contract.monthly_total(), Money::from_cents(100_000));

        let cmd = AmendItems {
            contract_id: contract.id_typed(),
            items: vec![server_item(), service_item()],
            occurred_at: test_time(),
        };
        let events = contract
            .handle(&ContractCommand::AmendItems(cmd))
            .unwrap();
        contract.apply(&events[0]);
        assert_eq!(contract.monthly_total(), Money::from_cents(150_000));
    }

    #[test]
    fn amend_items_rejected_outside_draft() {
        let mut contract = drafted_contract(vec![server_item()]);
        let events = contract
            .handle(&ContractCommand::ActivateContract(ActivateContract {
                contract_id: contract.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        contract.apply(&events[0]);

        let err = contract
            .handle(&ContractCommand::AmendItems(AmendItems {
                contract_id: contract.id_typed(),
                items: vec![service_item()],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn expire_requires_active() {
        let mut contract = drafted_contract(vec![server_item()]);
        let err = contract
            .handle(&ContractCommand::ExpireContract(ExpireContract {
                contract_id: contract.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let events = contract
            .handle(&ContractCommand::ActivateContract(ActivateContract {
                contract_id: contract.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        contract.apply(&events[0]);

        let events = contract
            .handle(&ContractCommand::ExpireContract(ExpireContract {
                contract_id: contract.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        contract.apply(&events[0]);
        assert_eq!(contract.status(), ContractStatus::Expired);
    }

    #[test]
    fn ends_on_or_before_matches_cutoffs() {
        let contract = drafted_contract(vec![server_item()]);
        let end = contract.end_date();
        assert!(contract.ends_on_or_before(end));
        assert!(contract.ends_on_or_before(end + chrono::Days::new(1)));
        assert!(!contract.ends_on_or_before(end - chrono::Days::new(1)));
    }
}
