//! Printable document references.
//!
//! Rendering is out of scope; this module only derives the stable template
//! key and base filename a report renderer would use.

use rentops_acts::ServiceAct;
use rentops_invoicing::Invoice;

/// Template key for the printable invoice.
pub const INVOICE_REPORT_TEMPLATE: &str = "billing.report_invoice";

/// Template key for the printable service act.
pub const SERVICE_ACT_REPORT_TEMPLATE: &str = "billing.report_service_act";

/// Reference to a renderable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRef {
    pub template: &'static str,
    /// Filename without extension, e.g. "Invoice_INV00042_2024-06-01".
    pub base_filename: String,
}

pub fn invoice_report(invoice: &Invoice) -> ReportRef {
    ReportRef {
        template: INVOICE_REPORT_TEMPLATE,
        base_filename: invoice.report_base_filename(),
    }
}

pub fn service_act_report(act: &ServiceAct) -> ReportRef {
    ReportRef {
        template: SERVICE_ACT_REPORT_TEMPLATE,
        base_filename: act.report_base_filename(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rentops_acts::{ActLine, ServiceActCommand, ServiceActId, DEFAULT_UNIT};
    use rentops_acts::service_act::DraftServiceAct;
    use rentops_contracts::ContractId;
    use rentops_core::{Aggregate, Money, RecordId};

    #[test]
    fn act_report_uses_its_own_label() {
        let act_id = ServiceActId::new(RecordId::new());
        let mut act = ServiceAct::empty(act_id);
        let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let events = act
            .handle(&ServiceActCommand::DraftServiceAct(DraftServiceAct {
                act_id,
                number: "ACT00007".to_string(),
                contract_id: ContractId::new(RecordId::new()),
                date,
                lines: vec![ActLine {
                    line_no: 1,
                    product_id: None,
                    description: "On-site support".to_string(),
                    quantity: 2,
                    unit: DEFAULT_UNIT.to_string(),
                    price: Money::from_cents(12_500),
                }],
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        act.apply(&events[0]);

        let report = service_act_report(&act);
        assert_eq!(report.template, SERVICE_ACT_REPORT_TEMPLATE);
        assert_eq!(report.base_filename, "ServiceAct_ACT00007_2024-06-30");
    }
}
