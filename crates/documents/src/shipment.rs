use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradebook_core::{DocumentId, DomainError, DomainResult};

use crate::fulfillment::FulfillmentLine;
use crate::sales_order::SalesOrderId;

/// Shipment identifier. Shipments carry no document number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub DocumentId);

impl ShipmentId {
    pub fn new(id: DocumentId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A shipment of goods against a sales order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    id: ShipmentId,
    sales_order_id: SalesOrderId,
    lines: Vec<FulfillmentLine>,
    shipped_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(
        id: ShipmentId,
        sales_order_id: SalesOrderId,
        lines: Vec<FulfillmentLine>,
        shipped_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "shipment requires at least one line",
            ));
        }
        if lines.iter().any(|line| line.quantity <= Decimal::ZERO) {
            return Err(DomainError::validation(
                "shipment line quantity must be positive",
            ));
        }

        Ok(Self {
            id,
            sales_order_id,
            lines,
            shipped_at,
        })
    }

    pub fn id(&self) -> ShipmentId {
        self.id
    }

    pub fn sales_order_id(&self) -> SalesOrderId {
        self.sales_order_id
    }

    pub fn lines(&self) -> &[FulfillmentLine] {
        &self.lines
    }

    pub fn shipped_at(&self) -> DateTime<Utc> {
        self.shipped_at
    }
}
