use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradebook_core::{
    round_money, DocumentId, DocumentKind, DocumentNumber, DomainError, DomainResult,
    PaymentProgress,
};

use crate::fulfillment::FulfillmentLine;
use crate::sales_order::{SalesOrder, SalesOrderId};

/// Terms applied when the caller does not name a due date.
const DEFAULT_PAYMENT_TERMS_DAYS: i64 = 30;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub DocumentId);

impl InvoiceId {
    pub fn new(id: DocumentId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// An invoice issued against a sales order.
///
/// The total is computed once at issue time from the order's pricing and the
/// invoiced quantities; payments are validated against this stored figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    number: DocumentNumber,
    sales_order_id: SalesOrderId,
    lines: Vec<FulfillmentLine>,
    total: Decimal,
    issued_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
    payment_progress: PaymentProgress,
}

impl Invoice {
    pub fn issue(
        id: InvoiceId,
        number: DocumentNumber,
        order: &SalesOrder,
        lines: Vec<FulfillmentLine>,
        issued_at: DateTime<Utc>,
        due_date: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        if number.kind() != DocumentKind::Invoice {
            return Err(DomainError::invariant(format!(
                "invoice cannot carry number {number}"
            )));
        }
        if lines.is_empty() {
            return Err(DomainError::validation(
                "invoice requires at least one line",
            ));
        }

        let mut total = Decimal::ZERO;
        for line in &lines {
            if line.quantity <= Decimal::ZERO {
                return Err(DomainError::validation(
                    "invoice line quantity must be positive",
                ));
            }
            let parent = order.find_line(line.line_item_id).ok_or_else(|| {
                DomainError::validation(format!(
                    "line item {} does not belong to sales order {}",
                    line.line_item_id,
                    order.number()
                ))
            })?;

            let net = line
                .quantity
                .checked_mul(parent.unit_price())
                .ok_or_else(|| DomainError::invariant("invoice line amount overflowed"))?;
            let net = round_money(net);
            let tax = net
                .checked_mul(parent.tax_rate())
                .ok_or_else(|| DomainError::invariant("invoice line tax overflowed"))?;
            let tax = round_money(tax);
            total = total
                .checked_add(net)
                .and_then(|t| t.checked_add(tax))
                .ok_or_else(|| DomainError::invariant("invoice total overflowed"))?;
        }

        Ok(Self {
            id,
            number,
            sales_order_id: order.id(),
            lines,
            total,
            issued_at,
            due_date: due_date
                .unwrap_or_else(|| issued_at + Duration::days(DEFAULT_PAYMENT_TERMS_DAYS)),
            payment_progress: PaymentProgress::Unpaid,
        })
    }

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn number(&self) -> DocumentNumber {
        self.number
    }

    pub fn sales_order_id(&self) -> SalesOrderId {
        self.sales_order_id
    }

    pub fn lines(&self) -> &[FulfillmentLine] {
        &self.lines
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    pub fn payment_progress(&self) -> PaymentProgress {
        self.payment_progress
    }

    /// Propose a copy with a freshly derived payment status.
    pub fn with_payment_progress(&self, payment_progress: PaymentProgress) -> Self {
        let mut next = self.clone();
        next.payment_progress = payment_progress;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradebook_core::{LineItemId, ProductId};

    use crate::line_item::LineItem;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order_with_lines(lines: Vec<LineItem>) -> SalesOrder {
        SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::SalesOrder, 2000),
            "Acme",
            lines,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn invoice_number() -> DocumentNumber {
        DocumentNumber::new(DocumentKind::Invoice, 3000)
    }

    #[test]
    fn total_uses_order_pricing_and_invoiced_quantity() {
        let line = LineItem::new(ProductId::new(), "Widget", dec("10"), dec("19.99"), dec("0.2"))
            .unwrap();
        let line_id = line.id();
        let order = order_with_lines(vec![line]);

        let invoice = Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            invoice_number(),
            &order,
            vec![FulfillmentLine::new(line_id, dec("3"))],
            Utc::now(),
            None,
        )
        .unwrap();

        // 3 × 19.99 = 59.97 net, 11.99 tax (20%, rounded)
        assert_eq!(invoice.total(), dec("71.96"));
        assert_eq!(invoice.payment_progress(), PaymentProgress::Unpaid);
    }

    #[test]
    fn due_date_defaults_to_net_30() {
        let line =
            LineItem::new(ProductId::new(), "Widget", dec("1"), dec("1"), dec("0")).unwrap();
        let line_id = line.id();
        let order = order_with_lines(vec![line]);
        let issued_at = Utc::now();

        let invoice = Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            invoice_number(),
            &order,
            vec![FulfillmentLine::new(line_id, dec("1"))],
            issued_at,
            None,
        )
        .unwrap();
        assert_eq!(invoice.due_date(), issued_at + Duration::days(30));

        let explicit = issued_at + Duration::days(14);
        let invoice = Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            invoice_number(),
            &order,
            vec![FulfillmentLine::new(line_id, dec("1"))],
            issued_at,
            Some(explicit),
        )
        .unwrap();
        assert_eq!(invoice.due_date(), explicit);
    }

    #[test]
    fn rejects_lines_foreign_to_the_order() {
        let line =
            LineItem::new(ProductId::new(), "Widget", dec("5"), dec("2"), dec("0")).unwrap();
        let order = order_with_lines(vec![line]);

        let err = Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            invoice_number(),
            &order,
            vec![FulfillmentLine::new(LineItemId::new(), dec("1"))],
            Utc::now(),
            None,
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("does not belong") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_non_positive_lines() {
        let line =
            LineItem::new(ProductId::new(), "Widget", dec("5"), dec("2"), dec("0")).unwrap();
        let line_id = line.id();
        let order = order_with_lines(vec![line]);

        assert!(Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            invoice_number(),
            &order,
            Vec::new(),
            Utc::now(),
            None,
        )
        .is_err());

        assert!(Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            invoice_number(),
            &order,
            vec![FulfillmentLine::new(line_id, Decimal::ZERO)],
            Utc::now(),
            None,
        )
        .is_err());
    }
}
