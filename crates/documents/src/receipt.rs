use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradebook_core::{DocumentId, DomainError, DomainResult};

use crate::fulfillment::FulfillmentLine;
use crate::purchase_order::PurchaseOrderId;

/// Goods receipt identifier. Receipts carry no document number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(pub DocumentId);

impl ReceiptId {
    pub fn new(id: DocumentId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A goods receipt against a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    id: ReceiptId,
    purchase_order_id: PurchaseOrderId,
    lines: Vec<FulfillmentLine>,
    received_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(
        id: ReceiptId,
        purchase_order_id: PurchaseOrderId,
        lines: Vec<FulfillmentLine>,
        received_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "receipt requires at least one line",
            ));
        }
        if lines.iter().any(|line| line.quantity <= Decimal::ZERO) {
            return Err(DomainError::validation(
                "receipt line quantity must be positive",
            ));
        }

        Ok(Self {
            id,
            purchase_order_id,
            lines,
            received_at,
        })
    }

    pub fn id(&self) -> ReceiptId {
        self.id
    }

    pub fn purchase_order_id(&self) -> PurchaseOrderId {
        self.purchase_order_id
    }

    pub fn lines(&self) -> &[FulfillmentLine] {
        &self.lines
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
