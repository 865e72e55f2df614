use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentops_contracts::ContractId;
use rentops_core::{Aggregate, AggregateRoot, DomainError, Money, RecordId};
use rentops_events::Event;
use rentops_products::{ProductId, ProductKind};

use crate::payment::{Payment, PaymentId, PaymentMethod, PaymentStatus};

/// Days between invoice date and the default due date.
pub const DUE_DATE_OFFSET_DAYS: u64 = 30;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub RecordId);

impl InvoiceId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

/// One charge on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub kind: ProductKind,
    pub description: String,
    pub quantity: u32,
    /// Price in smallest currency unit.
    pub unit_price: Money,
}

impl InvoiceLine {
    /// Line amount = quantity × unit price.
    ///
    /// Overflow is ruled out at command time (`check_lines`), so plain
    /// multiplication is safe here.
    pub fn amount(&self) -> Money {
        Money::from_cents(self.unit_price.cents() * i64::from(self.quantity))
    }
}

/// Aggregate root: Invoice.
///
/// Owns its lines and its payments. `amount`, `paid_amount` and `residual`
/// are stored derived values, refreshed by [`Invoice::recompute_totals`] at
/// the end of every `apply`; there is no implicit dependency graph to lag
/// behind a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    /// Document number issued by the sequence service ("New" until issued).
    number: String,
    contract_id: Option<ContractId>,
    date: NaiveDate,
    due_date: NaiveDate,
    lines: Vec<InvoiceLine>,
    payments: Vec<Payment>,
    status: InvoiceStatus,
    cancel_reason: Option<String>,
    amount: Money,
    paid_amount: Money,
    residual: Money,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            number: "New".to_string(),
            contract_id: None,
            date: NaiveDate::MIN,
            due_date: NaiveDate::MIN,
            lines: Vec::new(),
            payments: Vec::new(),
            status: InvoiceStatus::Draft,
            cancel_reason: None,
            amount: Money::ZERO,
            paid_amount: Money::ZERO,
            residual: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
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

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn payment(&self, payment_id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Total of all line amounts.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Total of **confirmed** payments. Draft and cancelled payments do not
    /// settle anything.
    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    /// Balance due: `amount - paid_amount`. Signed, never clamped.
    pub fn residual(&self) -> Money {
        self.residual
    }

    /// Base filename for the rendered invoice document.
    pub fn report_base_filename(&self) -> String {
        format!("Invoice_{}_{}", self.number, self.date)
    }

    fn recompute_totals(&mut self) {
        self.amount = self.lines.iter().map(InvoiceLine::amount).sum();
        self.paid_amount = self
            .payments
            .iter()
            .filter(|p| p.is_confirmed())
            .map(|p| p.amount)
            .sum();
        self.residual = Money::from_cents(self.amount.cents() - self.paid_amount.cents());
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DraftInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub contract_id: ContractId,
    pub date: NaiveDate,
    /// Defaults to `date + DUE_DATE_OFFSET_DAYS` when absent.
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendLines (draft invoices only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendLines {
    pub invoice_id: InvoiceId,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendInvoice {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPaid (explicit check; confirmation also flips on its own).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaid {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment (creates a draft payment on the invoice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    /// Business "today"; payment dates in the future are rejected.
    pub today: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    DraftInvoice(DraftInvoice),
    AmendLines(AmendLines),
    SendInvoice(SendInvoice),
    MarkPaid(MarkPaid),
    CancelInvoice(CancelInvoice),
    RecordPayment(RecordPayment),
    ConfirmPayment(ConfirmPayment),
    CancelPayment(CancelPayment),
}

/// Event: InvoiceDrafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDrafted {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub contract_id: ContractId,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceLinesAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLinesAmended {
    pub invoice_id: InvoiceId,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSent {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceMarkedPaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMarkedPaid {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCancelled {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceDrafted(InvoiceDrafted),
    InvoiceLinesAmended(InvoiceLinesAmended),
    InvoiceSent(InvoiceSent),
    InvoiceMarkedPaid(InvoiceMarkedPaid),
    InvoiceCancelled(InvoiceCancelled),
    PaymentRecorded(PaymentRecorded),
    PaymentConfirmed(PaymentConfirmed),
    PaymentCancelled(PaymentCancelled),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceDrafted(_) => "invoicing.invoice.drafted",
            InvoiceEvent::InvoiceLinesAmended(_) => "invoicing.invoice.lines_amended",
            InvoiceEvent::InvoiceSent(_) => "invoicing.invoice.sent",
            InvoiceEvent::InvoiceMarkedPaid(_) => "invoicing.invoice.marked_paid",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
            InvoiceEvent::PaymentRecorded(_) => "invoicing.payment.recorded",
            InvoiceEvent::PaymentConfirmed(_) => "invoicing.payment.confirmed",
            InvoiceEvent::PaymentCancelled(_) => "invoicing.payment.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceDrafted(e) => e.occurred_at,
            InvoiceEvent::InvoiceLinesAmended(e) => e.occurred_at,
            InvoiceEvent::InvoiceSent(e) => e.occurred_at,
            InvoiceEvent::InvoiceMarkedPaid(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
            InvoiceEvent::PaymentRecorded(e) => e.occurred_at,
            InvoiceEvent::PaymentConfirmed(e) => e.occurred_at,
            InvoiceEvent::PaymentCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceDrafted(e) => {
                self.id = e.invoice_id;
                self.number = e.number.clone();
                self.contract_id = Some(e.contract_id);
                self.date = e.date;
                self.due_date = e.due_date;
                self.lines = e.lines.clone();
                self.status = InvoiceStatus::Draft;
                self.created = true;
            }
            InvoiceEvent::InvoiceLinesAmended(e) => {
                self.lines = e.lines.clone();
            }
            InvoiceEvent::InvoiceSent(_) => {
                self.status = InvoiceStatus::Sent;
            }
            InvoiceEvent::InvoiceMarkedPaid(_) => {
                self.status = InvoiceStatus::Paid;
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                self.status = InvoiceStatus::Cancelled;
                self.cancel_reason = Some(e.reason.clone());
            }
            InvoiceEvent::PaymentRecorded(e) => {
                self.payments.push(Payment {
                    id: e.payment_id,
                    number: e.number.clone(),
                    amount: e.amount,
                    method: e.method,
                    date: e.date,
                    status: PaymentStatus::Draft,
                    cancel_reason: None,
                });
            }
            InvoiceEvent::PaymentConfirmed(e) => {
                if let Some(p) = self.payments.iter_mut().find(|p| p.id == e.payment_id) {
                    p.status = PaymentStatus::Confirmed;
                }
            }
            InvoiceEvent::PaymentCancelled(e) => {
                if let Some(p) = self.payments.iter_mut().find(|p| p.id == e.payment_id) {
                    p.status = PaymentStatus::Cancelled;
                    p.cancel_reason = Some(e.reason.clone());
                }
            }
        }

        // Explicit settlement refresh in the same state transition as the
        // mutation; never deferred.
        self.recompute_totals();

        // A confirmation that clears the balance settles the invoice.
        if let InvoiceEvent::PaymentConfirmed(_) = event {
            if self.residual.cents() <= 0 && self.status != InvoiceStatus::Cancelled {
                self.status = InvoiceStatus::Paid;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::DraftInvoice(cmd) => self.handle_draft(cmd),
            InvoiceCommand::AmendLines(cmd) => self.handle_amend_lines(cmd),
            InvoiceCommand::SendInvoice(cmd) => self.handle_send(cmd),
            InvoiceCommand::MarkPaid(cmd) => self.handle_mark_paid(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
            InvoiceCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            InvoiceCommand::ConfirmPayment(cmd) => self.handle_confirm_payment(cmd),
            InvoiceCommand::CancelPayment(cmd) => self.handle_cancel_payment(cmd),
        }
    }
}

impl Invoice {
    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn check_lines(lines: &[InvoiceLine]) -> Result<(), DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "invoice must have at least one line",
            ));
        }
        let mut total = Money::ZERO;
        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::validation(
                    "invoice line quantity must be positive",
                ));
            }
            if !line.unit_price.is_positive() {
                return Err(DomainError::validation(
                    "invoice line unit price must be positive",
                ));
            }
            let line_amount = line.unit_price.checked_mul(line.quantity)?;
            total = total.checked_add(line_amount)?;
        }
        Ok(())
    }

    fn handle_draft(&self, cmd: &DraftInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        Self::check_lines(&cmd.lines)?;

        let due_date = match cmd.due_date {
            Some(due) => {
                if due < cmd.date {
                    return Err(DomainError::validation(
                        "due date cannot be before invoice date",
                    ));
                }
                due
            }
            None => cmd.date + Days::new(DUE_DATE_OFFSET_DAYS),
        };

        Ok(vec![InvoiceEvent::InvoiceDrafted(InvoiceDrafted {
            invoice_id: cmd.invoice_id,
            number: cmd.number.clone(),
            contract_id: cmd.contract_id,
            date: cmd.date,
            due_date,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend_lines(&self, cmd: &AmendLines) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::invariant("only draft invoices can be amended"));
        }
        Self::check_lines(&cmd.lines)?;

        Ok(vec![InvoiceEvent::InvoiceLinesAmended(
            InvoiceLinesAmended {
                invoice_id: cmd.invoice_id,
                lines: cmd.lines.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_send(&self, cmd: &SendInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        match self.status {
            InvoiceStatus::Draft => Ok(vec![InvoiceEvent::InvoiceSent(InvoiceSent {
                invoice_id: cmd.invoice_id,
                occurred_at: cmd.occurred_at,
            })]),
            InvoiceStatus::Sent => Err(DomainError::conflict("invoice is already sent")),
            InvoiceStatus::Paid => Err(DomainError::conflict("invoice is already paid")),
            InvoiceStatus::Cancelled => Err(DomainError::invariant(
                "cancelled invoices cannot be sent",
            )),
        }
    }

    fn handle_mark_paid(&self, cmd: &MarkPaid) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status == InvoiceStatus::Paid {
            return Err(DomainError::conflict("invoice is already paid"));
        }
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::invariant(
                "cancelled invoices cannot be marked paid",
            ));
        }
        if self.residual.cents() > 0 {
            return Err(DomainError::validation("invoice still has a balance due"));
        }

        Ok(vec![InvoiceEvent::InvoiceMarkedPaid(InvoiceMarkedPaid {
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::conflict("invoice is already cancelled"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "please provide a reason for cancellation",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::invariant(
                "cancelled invoices cannot take payments",
            ));
        }
        if self.payment(cmd.payment_id).is_some() {
            return Err(DomainError::conflict("payment already exists"));
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if cmd.date > cmd.today {
            return Err(DomainError::validation(
                "payment date cannot be in the future",
            ));
        }

        Ok(vec![InvoiceEvent::PaymentRecorded(PaymentRecorded {
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            number: cmd.number.clone(),
            amount: cmd.amount,
            method: cmd.method,
            date: cmd.date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_payment(
        &self,
        cmd: &ConfirmPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::invariant(
                "payments on a cancelled invoice cannot be confirmed",
            ));
        }

        let payment = self.payment(cmd.payment_id).ok_or(DomainError::NotFound)?;
        match payment.status {
            PaymentStatus::Draft => {}
            PaymentStatus::Confirmed => {
                return Err(DomainError::conflict("payment is already confirmed"));
            }
            PaymentStatus::Cancelled => {
                return Err(DomainError::invariant(
                    "cancelled payments cannot be confirmed",
                ));
            }
        }

        // Checked against the residual as it stands now: a payment equal to
        // the residual settles the invoice, a larger one is rejected outright
        // and never partially applied.
        if payment.amount.cents() > self.residual.cents() {
            return Err(DomainError::validation(
                "payment amount cannot exceed the invoice residual",
            ));
        }

        Ok(vec![InvoiceEvent::PaymentConfirmed(PaymentConfirmed {
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            amount: payment.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel_payment(
        &self,
        cmd: &CancelPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        let payment = self.payment(cmd.payment_id).ok_or(DomainError::NotFound)?;
        match payment.status {
            PaymentStatus::Draft => {}
            PaymentStatus::Confirmed => {
                return Err(DomainError::invariant(
                    "confirmed payments cannot be cancelled",
                ));
            }
            PaymentStatus::Cancelled => {
                return Err(DomainError::conflict("payment is already cancelled"));
            }
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "please provide a reason for cancellation",
            ));
        }

        Ok(vec![InvoiceEvent::PaymentCancelled(PaymentCancelled {
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
