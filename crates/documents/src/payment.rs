use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradebook_core::{round_money, DomainError, DomainResult, PaymentId};

use crate::invoice::InvoiceId;

/// A payment applied to an invoice. Many payments may settle one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Build a payment, normalizing the amount to money precision.
    pub fn new(
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let amount = round_money(amount);
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        Ok(Self {
            id: PaymentId::new(),
            invoice_id,
            amount,
            paid_at,
        })
    }
}
