use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebook_core::{DocumentId, DocumentKind, DocumentNumber, DomainError, DomainResult};

use crate::line_item::LineItem;
use crate::sales_order::{SalesOrder, SalesOrderId};

/// Quotation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationId(pub DocumentId);

impl QuotationId {
    pub fn new(id: DocumentId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for QuotationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Quotation status lifecycle. `Converted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Open,
    Converted,
}

/// A quotation: priced line items offered to a customer.
///
/// Converts at most once into a sales order, after which it is frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    id: QuotationId,
    number: DocumentNumber,
    customer: String,
    lines: Vec<LineItem>,
    status: QuotationStatus,
    converted_to: Option<SalesOrderId>,
    created_at: DateTime<Utc>,
}

impl Quotation {
    pub fn new(
        id: QuotationId,
        number: DocumentNumber,
        customer: impl Into<String>,
        lines: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if number.kind() != DocumentKind::Quotation {
            return Err(DomainError::invariant(format!(
                "quotation cannot carry number {number}"
            )));
        }
        let customer = customer.into();
        if customer.trim().is_empty() {
            return Err(DomainError::validation("customer must not be empty"));
        }
        if lines.is_empty() {
            return Err(DomainError::validation(
                "quotation requires at least one line item",
            ));
        }

        Ok(Self {
            id,
            number,
            customer,
            lines,
            status: QuotationStatus::Open,
            converted_to: None,
            created_at,
        })
    }

    pub fn id(&self) -> QuotationId {
        self.id
    }

    pub fn number(&self) -> DocumentNumber {
        self.number
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn status(&self) -> QuotationStatus {
        self.status
    }

    pub fn converted_to(&self) -> Option<SalesOrderId> {
        self.converted_to
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Fail with a conflict if this quotation has already been converted.
    pub fn ensure_open(&self) -> DomainResult<()> {
        if let Some(existing) = self.converted_to {
            return Err(DomainError::conflict(format!(
                "quotation {} was already converted to sales order {existing}",
                self.number
            )));
        }
        Ok(())
    }

    /// Propose the conversion of this quotation into a sales order.
    ///
    /// Returns the frozen quotation and the new order. Customer and line
    /// quantities/pricing carry over; the order's lines get fresh ids so
    /// fulfillment ledgers never alias quotation lines.
    pub fn convert(
        &self,
        order_id: SalesOrderId,
        order_number: DocumentNumber,
        now: DateTime<Utc>,
    ) -> DomainResult<(Quotation, SalesOrder)> {
        self.ensure_open()?;

        let lines = self
            .lines
            .iter()
            .map(|line| {
                LineItem::new(
                    line.product_id(),
                    line.product_name().to_string(),
                    line.quantity_ordered(),
                    line.unit_price(),
                    line.tax_rate(),
                )
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let order = SalesOrder::new(
            order_id,
            order_number,
            self.customer.clone(),
            lines,
            Some(self.id),
            now,
        )?;

        let mut frozen = self.clone();
        frozen.status = QuotationStatus::Converted;
        frozen.converted_to = Some(order_id);

        Ok((frozen, order))
    }
}
