use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentops_contracts::ContractId;
use rentops_core::{Aggregate, AggregateRoot, DomainError, Money, RecordId};
use rentops_events::Event;
use rentops_products::ProductId;

/// Default unit of measure for act lines.
pub const DEFAULT_UNIT: &str = "hour";

/// Service act identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceActId(pub RecordId);

impl ServiceActId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ServiceActId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One delivered-work line on a service act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActLine {
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: u32,
    /// Unit of measure, e.g. "hour", "month", "unit".
    pub unit: String,
    /// Price per unit in smallest currency unit.
    pub price: Money,
}

impl ActLine {
    /// Line subtotal = quantity × price. Overflow is checked at command time.
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.price.cents() * i64::from(self.quantity))
    }
}

/// Aggregate root: ServiceAct.
///
/// Records the services actually delivered under a contract in a period.
/// `amount_total` is a stored derived value, refreshed after every `apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAct {
    id: ServiceActId,
    /// Document number issued by the sequence service ("New" until issued).
    number: String,
    contract_id: Option<ContractId>,
    date: NaiveDate,
    lines: Vec<ActLine>,
    description: Option<String>,
    amount_total: Money,
    version: u64,
    created: bool,
}

impl ServiceAct {
    pub fn empty(id: ServiceActId) -> Self {
        Self {
            id,
            number: "New".to_string(),
            contract_id: None,
            date: NaiveDate::MIN,
            lines: Vec::new(),
            description: None,
            amount_total: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ServiceActId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn contract_id(&self) -> Option<ContractId> {
        self.contract_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn lines(&self) -> &[ActLine] {
        &self.lines
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Total of all line subtotals.
    pub fn amount_total(&self) -> Money {
        self.amount_total
    }

    /// Base filename for the rendered act document.
    pub fn report_base_filename(&self) -> String {
        format!("ServiceAct_{}_{}", self.number, self.date)
    }

    fn recompute_amount_total(&mut self) {
        self.amount_total = self.lines.iter().map(ActLine::subtotal).sum();
    }
}

impl AggregateRoot for ServiceAct {
    type Id = ServiceActId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DraftServiceAct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftServiceAct {
    pub act_id: ServiceActId,
    pub number: String,
    pub contract_id: ContractId,
    pub date: NaiveDate,
    pub lines: Vec<ActLine>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendActLines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendActLines {
    pub act_id: ServiceActId,
    pub lines: Vec<ActLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceActCommand {
    DraftServiceAct(DraftServiceAct),
    AmendActLines(AmendActLines),
}

/// Event: ServiceActDrafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceActDrafted {
    pub act_id: ServiceActId,
    pub number: String,
    pub contract_id: ContractId,
    pub date: NaiveDate,
    pub lines: Vec<ActLine>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ServiceActLinesAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceActLinesAmended {
    pub act_id: ServiceActId,
    pub lines: Vec<ActLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceActEvent {
    ServiceActDrafted(ServiceActDrafted),
    ServiceActLinesAmended(ServiceActLinesAmended),
}

impl Event for ServiceActEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ServiceActEvent::ServiceActDrafted(_) => "acts.service_act.drafted",
            ServiceActEvent::ServiceActLinesAmended(_) => "acts.service_act.lines_amended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ServiceActEvent::ServiceActDrafted(e) => e.occurred_at,
            ServiceActEvent::ServiceActLinesAmended(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ServiceAct {
    type Command = ServiceActCommand;
    type Event = ServiceActEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ServiceActEvent::ServiceActDrafted(e) => {
                self.id = e.act_id;
                self.number = e.number.clone();
                self.contract_id = Some(e.contract_id);
                self.date = e.date;
                self.lines = e.lines.clone();
                self.description = e.description.clone();
                self.created = true;
            }
            ServiceActEvent::ServiceActLinesAmended(e) => {
                self.lines = e.lines.clone();
            }
        }

        self.recompute_amount_total();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ServiceActCommand::DraftServiceAct(cmd) => self.handle_draft(cmd),
            ServiceActCommand::AmendActLines(cmd) => self.handle_amend_lines(cmd),
        }
    }
}

impl ServiceAct {
    fn ensure_act_id(&self, act_id: ServiceActId) -> Result<(), DomainError> {
        if self.id != act_id {
            return Err(DomainError::invariant("act_id mismatch"));
        }
        Ok(())
    }

    fn check_lines(lines: &[ActLine]) -> Result<(), DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "service act must have at least one line",
            ));
        }
        let mut total = Money::ZERO;
        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::validation(
                    "act line quantity must be positive",
                ));
            }
            if !line.price.is_positive() {
                return Err(DomainError::validation("act line price must be positive"));
            }
            if line.unit.trim().is_empty() {
                return Err(DomainError::validation("act line unit must not be blank"));
            }
            let subtotal = line.price.checked_mul(line.quantity)?;
            total = total.checked_add(subtotal)?;
        }
        Ok(())
    }

    fn handle_draft(&self, cmd: &DraftServiceAct) -> Result<Vec<ServiceActEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("service act already exists"));
        }
        Self::check_lines(&cmd.lines)?;

        Ok(vec![ServiceActEvent::ServiceActDrafted(ServiceActDrafted {
            act_id: cmd.act_id,
            number: cmd.number.clone(),
            contract_id: cmd.contract_id,
            date: cmd.date,
            lines: cmd.lines.clone(),
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend_lines(
        &self,
        cmd: &AmendActLines,
    ) -> Result<Vec<ServiceActEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_act_id(cmd.act_id)?;
        Self::check_lines(&cmd.lines)?;

        Ok(vec![ServiceActEvent::ServiceActLinesAmended(
            ServiceActLinesAmended {
                act_id: cmd.act_id,
                lines: cmd.lines.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
