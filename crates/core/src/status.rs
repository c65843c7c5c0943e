//! Shared vocabulary for derived document statuses.
//!
//! Parents store the generic [`Coverage`] per fulfillment type; the
//! domain-specific names (`not_invoiced`, `shipped`, ...) exist only at the
//! API boundary.

use serde::{Deserialize, Serialize};

/// How much of a parent's line items one fulfillment type has consumed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    /// No fulfillment records of the type exist.
    None,
    /// Some capacity consumed, some remaining.
    Partial,
    /// Every line item's remaining capacity is zero.
    Full,
}

/// Payment progress against a monetary total.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProgress {
    Unpaid,
    Partial,
    Paid,
}

/// Externally visible invoice payment state.
///
/// `Overdue` is a time-derived view over an unpaid/partial invoice past its
/// due date; it is never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectivePaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

impl From<PaymentProgress> for EffectivePaymentStatus {
    fn from(progress: PaymentProgress) -> Self {
        match progress {
            PaymentProgress::Unpaid => EffectivePaymentStatus::Unpaid,
            PaymentProgress::Partial => EffectivePaymentStatus::Partial,
            PaymentProgress::Paid => EffectivePaymentStatus::Paid,
        }
    }
}
