//! Payment entity, owned by the invoice aggregate.
//!
//! Payments are not standalone aggregates: they are entities addressed
//! through invoice commands, so a confirmation and the resulting settlement
//! refresh are one atomic state transition on the invoice.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rentops_core::{Entity, Money, RecordId};

/// Payment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub RecordId);

impl PaymentId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How the client paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bank,
    Cash,
    Card,
}

/// Payment status lifecycle: draft → confirmed | cancelled, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Draft,
    Confirmed,
    Cancelled,
}

/// A recorded receipt against the owning invoice's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Document number issued by the sequence service ("New" until issued).
    pub number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub status: PaymentStatus,
    pub cancel_reason: Option<String>,
}

impl Payment {
    /// Only confirmed payments settle the invoice.
    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
