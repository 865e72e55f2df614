//! Application service: cross-aggregate orchestration.
//!
//! Every operation follows the same shape: load the aggregate, run the
//! command, apply the emitted events, persist behind an optimistic version
//! check, then report the events to the activity log. Domain decisions stay
//! inside the aggregates; this layer only wires ids, document numbers, the
//! clock and the collaborators together.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use rentops_acts::{
    ActLine, ServiceAct, ServiceActCommand, ServiceActEvent, ServiceActId,
    service_act::DraftServiceAct,
};
use rentops_contracts::{
    Contract, ContractCommand, ContractEvent, ContractId, ContractItem,
    contract::{
        ActivateContract, AmendItems, CancelContract, DraftContract, ExpireContract,
    },
};
use rentops_core::{Aggregate, DomainResult, ExpectedVersion, Money, RecordId};
use rentops_events::{ActivityEntry, ActivityLog, Event};
use rentops_invoicing::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, PaymentId, PaymentMethod,
    invoice::{
        CancelInvoice, CancelPayment, ConfirmPayment, DraftInvoice, MarkPaid,
        RecordPayment, SendInvoice,
    },
};
use rentops_numbering::{next_or_new, DocumentType, SequenceService};
use rentops_parties::ClientId;

use crate::notify::{Notification, Notifier, INVOICE_EMAIL_TEMPLATE};
use crate::run::{lines_for_contract, InvoiceRun, InvoiceRunOutcome};
use crate::store::{ContractStore, InMemoryStore, InvoiceStore, ServiceActStore};

/// Billing application service.
pub struct BillingService {
    contracts: Arc<ContractStore>,
    invoices: Arc<InvoiceStore>,
    acts: Arc<ServiceActStore>,
    sequences: Option<Arc<dyn SequenceService>>,
    activity: Arc<dyn ActivityLog>,
    notifier: Arc<dyn Notifier>,
}

impl BillingService {
    pub fn new(
        sequences: Option<Arc<dyn SequenceService>>,
        activity: Arc<dyn ActivityLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            contracts: Arc::new(ContractStore::new()),
            invoices: Arc::new(InvoiceStore::new()),
            acts: Arc::new(ServiceActStore::new()),
            sequences,
            activity,
            notifier,
        }
    }

    pub fn contract(&self, id: ContractId) -> DomainResult<Contract> {
        self.contracts.get(&id)
    }

    pub fn invoice(&self, id: InvoiceId) -> DomainResult<Invoice> {
        self.invoices.get(&id)
    }

    pub fn service_act(&self, id: ServiceActId) -> DomainResult<ServiceAct> {
        self.acts.get(&id)
    }

    pub fn activity_log(&self) -> &Arc<dyn ActivityLog> {
        &self.activity
    }

    fn next_number(&self, doc_type: DocumentType) -> String {
        next_or_new(self.sequences.as_deref(), doc_type)
    }

    /// Run one command against an aggregate and persist the outcome.
    fn execute<A>(
        store: &InMemoryStore<A>,
        mut aggregate: A,
        command: &A::Command,
    ) -> DomainResult<(A, Vec<A::Event>)>
    where
        A: Aggregate<Error = rentops_core::DomainError> + Clone,
    {
        let expected = ExpectedVersion::Exact(aggregate.version());
        let events = aggregate.handle(command)?;
        for event in &events {
            aggregate.apply(event);
        }
        store.save(aggregate.clone(), expected)?;
        Ok((aggregate, events))
    }

    fn log_contract_events(
        &self,
        contract: &Contract,
        events: &[ContractEvent],
    ) -> DomainResult<()> {
        for event in events {
            let note = match event {
                ContractEvent::ContractCancelled(e) => Some(e.reason.clone()),
                _ => None,
            };
            self.activity.record(ActivityEntry {
                record_id: contract.id_typed().0,
                record_type: "contracts.contract".to_string(),
                document_no: contract.number().to_string(),
                event_type: event.event_type().to_string(),
                occurred_at: event.occurred_at(),
                note,
            })?;
        }
        Ok(())
    }

    fn log_invoice_events(
        &self,
        invoice: &Invoice,
        events: &[InvoiceEvent],
    ) -> DomainResult<()> {
        for event in events {
            let note = match event {
                InvoiceEvent::InvoiceCancelled(e) => Some(e.reason.clone()),
                InvoiceEvent::PaymentCancelled(e) => Some(e.reason.clone()),
                _ => None,
            };
            self.activity.record(ActivityEntry {
                record_id: invoice.id_typed().0,
                record_type: "invoicing.invoice".to_string(),
                document_no: invoice.number().to_string(),
                event_type: event.event_type().to_string(),
                occurred_at: event.occurred_at(),
                note,
            })?;
        }
        Ok(())
    }

    fn log_act_events(
        &self,
        act: &ServiceAct,
        events: &[ServiceActEvent],
    ) -> DomainResult<()> {
        for event in events {
            self.activity.record(ActivityEntry {
                record_id: act.id_typed().0,
                record_type: "acts.service_act".to_string(),
                document_no: act.number().to_string(),
                event_type: event.event_type().to_string(),
                occurred_at: event.occurred_at(),
                note: None,
            })?;
        }
        Ok(())
    }

    // Contracts

    #[allow(clippy::too_many_arguments)]
    pub fn draft_contract(
        &self,
        client_id: ClientId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        items: Vec<ContractItem>,
        notes: Option<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<ContractId> {
        let contract_id = ContractId::new(RecordId::new());
        let number = self.next_number(DocumentType::Contract);
        let cmd = ContractCommand::DraftContract(DraftContract {
            contract_id,
            number: number.clone(),
            client_id,
            start_date,
            end_date,
            items,
            notes,
            today,
            occurred_at: now,
        });

        let (contract, events) =
            Self::execute(&self.contracts, Contract::empty(contract_id), &cmd)?;
        self.log_contract_events(&contract, &events)?;
        info!(%number, %client_id, "contract drafted");
        Ok(contract_id)
    }

    pub fn amend_contract_items(
        &self,
        contract_id: ContractId,
        items: Vec<ContractItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let contract = self.contracts.get(&contract_id)?;
        let cmd = ContractCommand::AmendItems(AmendItems {
            contract_id,
            items,
            occurred_at: now,
        });
        let (contract, events) = Self::execute(&self.contracts, contract, &cmd)?;
        self.log_contract_events(&contract, &events)
    }

    pub fn activate_contract(
        &self,
        contract_id: ContractId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let contract = self.contracts.get(&contract_id)?;
        let cmd = ContractCommand::ActivateContract(ActivateContract {
            contract_id,
            occurred_at: now,
        });
        let (contract, events) = Self::execute(&self.contracts, contract, &cmd)?;
        self.log_contract_events(&contract, &events)?;
        info!(number = %contract.number(), "contract activated");
        Ok(())
    }

    pub fn expire_contract(
        &self,
        contract_id: ContractId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let contract = self.contracts.get(&contract_id)?;
        let cmd = ContractCommand::ExpireContract(ExpireContract {
            contract_id,
            occurred_at: now,
        });
        let (contract, events) = Self::execute(&self.contracts, contract, &cmd)?;
        self.log_contract_events(&contract, &events)?;
        info!(number = %contract.number(), "contract expired");
        Ok(())
    }

    pub fn cancel_contract(
        &self,
        contract_id: ContractId,
        reason: String,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let contract = self.contracts.get(&contract_id)?;
        let cmd = ContractCommand::CancelContract(CancelContract {
            contract_id,
            reason,
            occurred_at: now,
        });
        let (contract, events) = Self::execute(&self.contracts, contract, &cmd)?;
        self.log_contract_events(&contract, &events)?;
        info!(number = %contract.number(), "contract cancelled");
        Ok(())
    }

    // Invoice generation

    /// Fan one invoice out per contract the run selects.
    pub fn generate_invoices(
        &self,
        run: InvoiceRun,
        now: DateTime<Utc>,
    ) -> DomainResult<InvoiceRunOutcome> {
        run.validate()?;

        let mut outcome = InvoiceRunOutcome::default();
        for contract in self.contracts.list()? {
            if !run.selects(&contract) {
                continue;
            }

            let invoice_id = InvoiceId::new(RecordId::new());
            let number = self.next_number(DocumentType::Invoice);
            let cmd = InvoiceCommand::DraftInvoice(DraftInvoice {
                invoice_id,
                number: number.clone(),
                contract_id: contract.id_typed(),
                date: run.date,
                due_date: None,
                lines: lines_for_contract(&contract),
                occurred_at: now,
            });

            let (invoice, events) =
                Self::execute(&self.invoices, Invoice::empty(invoice_id), &cmd)?;
            self.log_invoice_events(&invoice, &events)?;
            info!(
                %number,
                contract = %contract.number(),
                amount = %invoice.amount(),
                "invoice generated"
            );
            outcome.invoice_ids.push(invoice_id);
        }

        info!(
            date = %run.date,
            generated = outcome.invoice_ids.len(),
            "invoice generation run finished"
        );
        Ok(outcome)
    }

    // Invoices and payments

    /// Send the invoice; when a recipient is given, also dispatch the
    /// templated notification. Without one the send is state-only.
    pub fn send_invoice(
        &self,
        invoice_id: InvoiceId,
        recipient: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let invoice = self.invoices.get(&invoice_id)?;
        let cmd = InvoiceCommand::SendInvoice(SendInvoice {
            invoice_id,
            occurred_at: now,
        });
        let (invoice, events) = Self::execute(&self.invoices, invoice, &cmd)?;
        self.log_invoice_events(&invoice, &events)?;

        if let Some(recipient) = recipient {
            self.notifier.send(Notification {
                template: INVOICE_EMAIL_TEMPLATE.to_string(),
                recipient: recipient.to_string(),
                document_no: invoice.number().to_string(),
            })?;
        }
        info!(number = %invoice.number(), "invoice sent");
        Ok(())
    }

    pub fn record_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        date: NaiveDate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<PaymentId> {
        let invoice = self.invoices.get(&invoice_id)?;
        let payment_id = PaymentId::new(RecordId::new());
        let number = self.next_number(DocumentType::Payment);
        let cmd = InvoiceCommand::RecordPayment(RecordPayment {
            invoice_id,
            payment_id,
            number: number.clone(),
            amount,
            method,
            date,
            today,
            occurred_at: now,
        });
        let (invoice, events) = Self::execute(&self.invoices, invoice, &cmd)?;
        self.log_invoice_events(&invoice, &events)?;
        info!(%number, invoice = %invoice.number(), %amount, "payment recorded");
        Ok(payment_id)
    }

    pub fn confirm_payment(
        &self,
        invoice_id: InvoiceId,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let invoice = self.invoices.get(&invoice_id)?;
        let cmd = InvoiceCommand::ConfirmPayment(ConfirmPayment {
            invoice_id,
            payment_id,
            occurred_at: now,
        });
        let (invoice, events) = Self::execute(&self.invoices, invoice, &cmd)?;
        self.log_invoice_events(&invoice, &events)?;
        info!(
            invoice = %invoice.number(),
            paid = %invoice.paid_amount(),
            residual = %invoice.residual(),
            "payment confirmed"
        );
        Ok(())
    }

    pub fn cancel_payment(
        &self,
        invoice_id: InvoiceId,
        payment_id: PaymentId,
        reason: String,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let invoice = self.invoices.get(&invoice_id)?;
        let cmd = InvoiceCommand::CancelPayment(CancelPayment {
            invoice_id,
            payment_id,
            reason,
            occurred_at: now,
        });
        let (invoice, events) = Self::execute(&self.invoices, invoice, &cmd)?;
        self.log_invoice_events(&invoice, &events)
    }

    pub fn mark_invoice_paid(
        &self,
        invoice_id: InvoiceId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let invoice = self.invoices.get(&invoice_id)?;
        let cmd = InvoiceCommand::MarkPaid(MarkPaid {
            invoice_id,
            occurred_at: now,
        });
        let (invoice, events) = Self::execute(&self.invoices, invoice, &cmd)?;
        self.log_invoice_events(&invoice, &events)
    }

    pub fn cancel_invoice(
        &self,
        invoice_id: InvoiceId,
        reason: String,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let invoice = self.invoices.get(&invoice_id)?;
        let cmd = InvoiceCommand::CancelInvoice(CancelInvoice {
            invoice_id,
            reason,
            occurred_at: now,
        });
        let (invoice, events) = Self::execute(&self.invoices, invoice, &cmd)?;
        self.log_invoice_events(&invoice, &events)?;
        info!(number = %invoice.number(), "invoice cancelled");
        Ok(())
    }

    // Service acts

    pub fn draft_service_act(
        &self,
        contract_id: ContractId,
        date: NaiveDate,
        lines: Vec<ActLine>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<ServiceActId> {
        // The act must reference an existing contract.
        let contract = self.contracts.get(&contract_id)?;

        let act_id = ServiceActId::new(RecordId::new());
        let number = self.next_number(DocumentType::ServiceAct);
        let cmd = ServiceActCommand::DraftServiceAct(DraftServiceAct {
            act_id,
            number: number.clone(),
            contract_id,
            date,
            lines,
            description,
            occurred_at: now,
        });
        let (act, events) = Self::execute(&self.acts, ServiceAct::empty(act_id), &cmd)?;
        self.log_act_events(&act, &events)?;
        info!(%number, contract = %contract.number(), "service act drafted");
        Ok(act_id)
    }
}
