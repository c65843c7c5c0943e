use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebook_core::{
    Coverage, DocumentId, DocumentKind, DocumentNumber, DomainError, DomainResult, LineItemId,
    PaymentProgress,
};

use crate::line_item::LineItem;
use crate::quotation::QuotationId;

/// Sales order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub DocumentId);

impl SalesOrderId {
    pub fn new(id: DocumentId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A sales order: capacity source for invoices and shipments.
///
/// The three status fields are derived from the order's children and are
/// replaced wholesale via [`SalesOrder::with_derived_statuses`]; they are
/// never set field-by-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    id: SalesOrderId,
    number: DocumentNumber,
    customer: String,
    lines: Vec<LineItem>,
    quotation_id: Option<QuotationId>,
    invoice_coverage: Coverage,
    shipment_coverage: Coverage,
    payment_progress: PaymentProgress,
    created_at: DateTime<Utc>,
}

impl SalesOrder {
    pub fn new(
        id: SalesOrderId,
        number: DocumentNumber,
        customer: impl Into<String>,
        lines: Vec<LineItem>,
        quotation_id: Option<QuotationId>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if number.kind() != DocumentKind::SalesOrder {
            return Err(DomainError::invariant(format!(
                "sales order cannot carry number {number}"
            )));
        }
        let customer = customer.into();
        if customer.trim().is_empty() {
            return Err(DomainError::validation("customer must not be empty"));
        }
        if lines.is_empty() {
            return Err(DomainError::validation(
                "sales order requires at least one line item",
            ));
        }

        Ok(Self {
            id,
            number,
            customer,
            lines,
            quotation_id,
            invoice_coverage: Coverage::None,
            shipment_coverage: Coverage::None,
            payment_progress: PaymentProgress::Unpaid,
            created_at,
        })
    }

    pub fn id(&self) -> SalesOrderId {
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

    pub fn quotation_id(&self) -> Option<QuotationId> {
        self.quotation_id
    }

    pub fn invoice_coverage(&self) -> Coverage {
        self.invoice_coverage
    }

    pub fn shipment_coverage(&self) -> Coverage {
        self.shipment_coverage
    }

    pub fn payment_progress(&self) -> PaymentProgress {
        self.payment_progress
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn find_line(&self, line_item_id: LineItemId) -> Option<&LineItem> {
        self.lines.iter().find(|line| line.id() == line_item_id)
    }

    /// Propose a copy with freshly derived statuses.
    pub fn with_derived_statuses(
        &self,
        invoice_coverage: Coverage,
        shipment_coverage: Coverage,
        payment_progress: PaymentProgress,
    ) -> Self {
        let mut next = self.clone();
        next.invoice_coverage = invoice_coverage;
        next.shipment_coverage = shipment_coverage;
        next.payment_progress = payment_progress;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tradebook_core::ProductId;

    fn test_line(quantity: u64) -> LineItem {
        LineItem::new(
            ProductId::new(),
            "Widget",
            Decimal::from(quantity),
            Decimal::new(500, 2),
            Decimal::ZERO,
        )
        .unwrap()
    }

    fn test_number() -> DocumentNumber {
        DocumentNumber::new(DocumentKind::SalesOrder, 2000)
    }

    #[test]
    fn new_orders_start_with_no_coverage() {
        let order = SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            test_number(),
            "Acme",
            vec![test_line(10)],
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.invoice_coverage(), Coverage::None);
        assert_eq!(order.shipment_coverage(), Coverage::None);
        assert_eq!(order.payment_progress(), PaymentProgress::Unpaid);
    }

    #[test]
    fn rejects_empty_line_set() {
        let err = SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            test_number(),
            "Acme",
            Vec::new(),
            None,
            Utc::now(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("at least one line") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_number_of_another_kind() {
        let err = SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::Invoice, 3000),
            "Acme",
            vec![test_line(1)],
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn with_derived_statuses_replaces_all_three() {
        let order = SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            test_number(),
            "Acme",
            vec![test_line(10)],
            None,
            Utc::now(),
        )
        .unwrap();

        let updated = order.with_derived_statuses(
            Coverage::Partial,
            Coverage::Full,
            PaymentProgress::Partial,
        );
        assert_eq!(updated.invoice_coverage(), Coverage::Partial);
        assert_eq!(updated.shipment_coverage(), Coverage::Full);
        assert_eq!(updated.payment_progress(), PaymentProgress::Partial);
        // identity and lines untouched
        assert_eq!(updated.id(), order.id());
        assert_eq!(updated.lines(), order.lines());
    }
}
