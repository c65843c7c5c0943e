//! Read-side views recomputed from stored documents.
//!
//! Nothing here is persisted. Each view is rebuilt from a consistent
//! snapshot on demand, so the figures always agree with the fulfillment
//! records they are derived from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use tradebook_core::{EffectivePaymentStatus, LineItemId, PaymentProgress};
use tradebook_documents::{
    Invoice, InvoiceId, PurchaseOrderId, Receipt, SalesOrderId, Shipment,
};
use tradebook_reconcile::{
    balance, consumed, effective_payment_status, invoice_payment_progress, paid_total,
    recorded_lines,
};

use crate::ledger::{InvoiceSnapshot, PurchaseOrderSnapshot, SalesOrderSnapshot};

/// Invoiced and shipped quantities for one sales order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRemaining {
    pub line_item_id: LineItemId,
    pub product_name: String,
    pub ordered: Decimal,
    pub invoiced: Decimal,
    pub shipped: Decimal,
    pub remaining_to_invoice: Decimal,
    pub remaining_to_ship: Decimal,
}

/// Per-line open quantities for a sales order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderRemaining {
    pub sales_order_id: SalesOrderId,
    pub lines: Vec<LineRemaining>,
}

/// Received quantities for one purchase order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLineRemaining {
    pub line_item_id: LineItemId,
    pub product_name: String,
    pub ordered: Decimal,
    pub received: Decimal,
    pub remaining_to_receive: Decimal,
}

/// Per-line open quantities for a purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderRemaining {
    pub purchase_order_id: PurchaseOrderId,
    pub lines: Vec<ReceiptLineRemaining>,
}

/// Paid and outstanding amounts for an invoice, with the effective status
/// at the requested instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceBalance {
    pub invoice_id: InvoiceId,
    pub total: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    pub progress: PaymentProgress,
    pub effective: EffectivePaymentStatus,
}

pub fn sales_order_remaining(snapshot: &SalesOrderSnapshot) -> SalesOrderRemaining {
    let invoice_lines = recorded_lines(snapshot.invoices.iter().map(Invoice::lines));
    let shipment_lines = recorded_lines(snapshot.shipments.iter().map(Shipment::lines));

    let lines = snapshot
        .order
        .lines()
        .iter()
        .map(|line| {
            let invoiced = consumed(line.id(), &invoice_lines);
            let shipped = consumed(line.id(), &shipment_lines);
            LineRemaining {
                line_item_id: line.id(),
                product_name: line.product_name().to_string(),
                ordered: line.quantity_ordered(),
                invoiced,
                shipped,
                remaining_to_invoice: line.quantity_ordered() - invoiced,
                remaining_to_ship: line.quantity_ordered() - shipped,
            }
        })
        .collect();

    SalesOrderRemaining {
        sales_order_id: snapshot.order.id(),
        lines,
    }
}

pub fn purchase_order_remaining(snapshot: &PurchaseOrderSnapshot) -> PurchaseOrderRemaining {
    let receipt_lines = recorded_lines(snapshot.receipts.iter().map(Receipt::lines));

    let lines = snapshot
        .order
        .lines()
        .iter()
        .map(|line| {
            let received = consumed(line.id(), &receipt_lines);
            ReceiptLineRemaining {
                line_item_id: line.id(),
                product_name: line.product_name().to_string(),
                ordered: line.quantity_ordered(),
                received,
                remaining_to_receive: line.quantity_ordered() - received,
            }
        })
        .collect();

    PurchaseOrderRemaining {
        purchase_order_id: snapshot.order.id(),
        lines,
    }
}

pub fn invoice_balance(snapshot: &InvoiceSnapshot, now: DateTime<Utc>) -> InvoiceBalance {
    let progress = invoice_payment_progress(&snapshot.invoice, &snapshot.payments);
    InvoiceBalance {
        invoice_id: snapshot.invoice.id(),
        total: snapshot.invoice.total(),
        paid: paid_total(&snapshot.invoice, &snapshot.payments),
        balance: balance(&snapshot.invoice, &snapshot.payments),
        progress,
        effective: effective_payment_status(progress, snapshot.invoice.due_date(), now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use tradebook_core::{DocumentId, DocumentKind, DocumentNumber, ProductId};
    use tradebook_documents::{
        FulfillmentLine, InvoiceId, LineItem, PaymentRecord, SalesOrder, SalesOrderId,
    };

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order_with_line(quantity: &str) -> SalesOrder {
        let line = LineItem::new(
            ProductId::new(),
            "Copper pipe 22mm",
            dec(quantity),
            dec("12.00"),
            dec("0"),
        )
        .unwrap();
        SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::SalesOrder, 2000),
            "Acme Industrial",
            vec![line],
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn remaining_view_subtracts_recorded_quantities() {
        let order = order_with_line("10");
        let line_id = order.lines()[0].id();
        let invoice = Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::Invoice, 3000),
            &order,
            vec![FulfillmentLine::new(line_id, dec("6"))],
            Utc::now(),
            None,
        )
        .unwrap();

        let snapshot = SalesOrderSnapshot {
            version: 2,
            order: order.clone(),
            invoices: vec![invoice],
            shipments: vec![],
            payments: vec![],
        };

        let view = sales_order_remaining(&snapshot);
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].invoiced, dec("6"));
        assert_eq!(view.lines[0].remaining_to_invoice, dec("4"));
        assert_eq!(view.lines[0].shipped, Decimal::ZERO);
        assert_eq!(view.lines[0].remaining_to_ship, dec("10"));
    }

    #[test]
    fn balance_view_reports_overdue_only_while_unpaid() {
        let order = order_with_line("1");
        let line_id = order.lines()[0].id();
        let issued = Utc::now() - Duration::days(60);
        let invoice = Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::Invoice, 3000),
            &order,
            vec![FulfillmentLine::new(line_id, dec("1"))],
            issued,
            Some(issued + Duration::days(30)),
        )
        .unwrap();
        let total = invoice.total();

        let unpaid = InvoiceSnapshot {
            version: 1,
            invoice: invoice.clone(),
            payments: vec![],
        };
        let view = invoice_balance(&unpaid, Utc::now());
        assert_eq!(view.effective, EffectivePaymentStatus::Overdue);
        assert_eq!(view.balance, total);

        let paid = InvoiceSnapshot {
            version: 2,
            invoice: invoice.clone(),
            payments: vec![PaymentRecord::new(invoice.id(), total, Utc::now()).unwrap()],
        };
        let view = invoice_balance(&paid, Utc::now());
        assert_eq!(view.effective, EffectivePaymentStatus::Paid);
        assert_eq!(view.balance, Decimal::ZERO);
    }
}
