//! In-memory ledger store.
//!
//! Backs tests and single-process deployments. All document families live
//! behind one `RwLock`, so every commit observes and mutates the whole ledger
//! atomically; reads clone out of the lock and never hold it across awaits.
//!
//! Not optimized: snapshot assembly clones child documents on every load.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use tradebook_core::ExpectedVersion;
use tradebook_documents::{
    Invoice, InvoiceId, PaymentRecord, PurchaseOrder, PurchaseOrderId, Quotation, QuotationId,
    Receipt, ReceiptId, SalesOrder, SalesOrderId, Shipment, ShipmentId,
};
use tradebook_reconcile::sales_order_payment_progress;

use super::checks::{self, check_version};
use super::r#trait::{
    InvoiceSnapshot, LedgerStore, LedgerStoreError, PurchaseOrderSnapshot, SalesOrderSnapshot,
    Versioned,
};

/// Thread-safe in-memory implementation of [`LedgerStore`].
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    quotations: HashMap<QuotationId, Versioned<Quotation>>,
    sales_orders: HashMap<SalesOrderId, Versioned<SalesOrder>>,
    purchase_orders: HashMap<PurchaseOrderId, Versioned<PurchaseOrder>>,
    invoices: HashMap<InvoiceId, Versioned<Invoice>>,
    shipments: HashMap<ShipmentId, Shipment>,
    receipts: HashMap<ReceiptId, Receipt>,
    payments: Vec<PaymentRecord>,
}

impl LedgerState {
    fn invoices_for(&self, order_id: SalesOrderId) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .values()
            .filter(|entry| entry.record.sales_order_id() == order_id)
            .map(|entry| entry.record.clone())
            .collect();
        invoices.sort_by_key(|invoice| invoice.number().sequence());
        invoices
    }

    fn shipments_for(&self, order_id: SalesOrderId) -> Vec<Shipment> {
        let mut shipments: Vec<Shipment> = self
            .shipments
            .values()
            .filter(|shipment| shipment.sales_order_id() == order_id)
            .cloned()
            .collect();
        shipments.sort_by_key(Shipment::shipped_at);
        shipments
    }

    fn receipts_for(&self, order_id: PurchaseOrderId) -> Vec<Receipt> {
        let mut receipts: Vec<Receipt> = self
            .receipts
            .values()
            .filter(|receipt| receipt.purchase_order_id() == order_id)
            .cloned()
            .collect();
        receipts.sort_by_key(Receipt::received_at);
        receipts
    }

    fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Vec<PaymentRecord> {
        self.payments
            .iter()
            .filter(|payment| payment.invoice_id == invoice_id)
            .cloned()
            .collect()
    }

    fn payments_for_invoices(&self, invoices: &[Invoice]) -> Vec<PaymentRecord> {
        self.payments
            .iter()
            .filter(|payment| invoices.iter().any(|i| i.id() == payment.invoice_id))
            .cloned()
            .collect()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerStoreError> {
        self.state.read().map_err(|_| {
            LedgerStoreError::Storage("ledger lock poisoned (a writer panicked)".to_string())
        })
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerStoreError> {
        self.state.write().map_err(|_| {
            LedgerStoreError::Storage("ledger lock poisoned (a writer panicked)".to_string())
        })
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_quotation(&self, quotation: Quotation) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;
        let id = quotation.id();
        if state.quotations.contains_key(&id) {
            return Err(LedgerStoreError::Duplicate(format!("quotation {id}")));
        }
        state.quotations.insert(
            id,
            Versioned {
                version: 1,
                record: quotation,
            },
        );
        Ok(())
    }

    async fn insert_sales_order(&self, order: SalesOrder) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;
        let id = order.id();
        if state.sales_orders.contains_key(&id) {
            return Err(LedgerStoreError::Duplicate(format!("sales order {id}")));
        }
        state.sales_orders.insert(
            id,
            Versioned {
                version: 1,
                record: order,
            },
        );
        Ok(())
    }

    async fn insert_purchase_order(&self, order: PurchaseOrder) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;
        let id = order.id();
        if state.purchase_orders.contains_key(&id) {
            return Err(LedgerStoreError::Duplicate(format!("purchase order {id}")));
        }
        state.purchase_orders.insert(
            id,
            Versioned {
                version: 1,
                record: order,
            },
        );
        Ok(())
    }

    async fn load_quotation(
        &self,
        id: QuotationId,
    ) -> Result<Versioned<Quotation>, LedgerStoreError> {
        let state = self.read_state()?;
        state
            .quotations
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerStoreError::NotFound(format!("quotation {id}")))
    }

    async fn load_sales_order(
        &self,
        id: SalesOrderId,
    ) -> Result<SalesOrderSnapshot, LedgerStoreError> {
        let state = self.read_state()?;
        let entry = state
            .sales_orders
            .get(&id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("sales order {id}")))?;
        let invoices = state.invoices_for(id);
        let payments = state.payments_for_invoices(&invoices);
        Ok(SalesOrderSnapshot {
            version: entry.version,
            order: entry.record.clone(),
            invoices,
            shipments: state.shipments_for(id),
            payments,
        })
    }

    async fn load_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<PurchaseOrderSnapshot, LedgerStoreError> {
        let state = self.read_state()?;
        let entry = state
            .purchase_orders
            .get(&id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("purchase order {id}")))?;
        Ok(PurchaseOrderSnapshot {
            version: entry.version,
            order: entry.record.clone(),
            receipts: state.receipts_for(id),
        })
    }

    async fn load_invoice(&self, id: InvoiceId) -> Result<InvoiceSnapshot, LedgerStoreError> {
        let state = self.read_state()?;
        let entry = state
            .invoices
            .get(&id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("invoice {id}")))?;
        Ok(InvoiceSnapshot {
            version: entry.version,
            invoice: entry.record.clone(),
            payments: state.payments_for_invoice(id),
        })
    }

    async fn list_quotations(&self) -> Result<Vec<Quotation>, LedgerStoreError> {
        let state = self.read_state()?;
        let mut quotations: Vec<Quotation> = state
            .quotations
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        quotations.sort_by_key(|q| q.number().sequence());
        Ok(quotations)
    }

    async fn list_sales_orders(&self) -> Result<Vec<SalesOrder>, LedgerStoreError> {
        let state = self.read_state()?;
        let mut orders: Vec<SalesOrder> = state
            .sales_orders
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        orders.sort_by_key(|o| o.number().sequence());
        Ok(orders)
    }

    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, LedgerStoreError> {
        let state = self.read_state()?;
        let mut orders: Vec<PurchaseOrder> = state
            .purchase_orders
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        orders.sort_by_key(|o| o.number().sequence());
        Ok(orders)
    }

    async fn commit_conversion(
        &self,
        expected: ExpectedVersion,
        quotation: Quotation,
        order: SalesOrder,
    ) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;

        let quotation_id = quotation.id();
        let order_id = order.id();
        let current = state
            .quotations
            .get(&quotation_id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("quotation {quotation_id}")))?;
        check_version("quotation", expected, current.version)?;
        if state.sales_orders.contains_key(&order_id) {
            return Err(LedgerStoreError::Duplicate(format!("sales order {order_id}")));
        }
        checks::verify_conversion_commit(&quotation, &order)?;

        state.sales_orders.insert(
            order_id,
            Versioned {
                version: 1,
                record: order,
            },
        );
        if let Some(entry) = state.quotations.get_mut(&quotation_id) {
            entry.version += 1;
            entry.record = quotation;
        }
        Ok(())
    }

    async fn commit_invoice(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        invoice: Invoice,
    ) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;

        let order_id = order.id();
        let invoice_id = invoice.id();
        let current = state
            .sales_orders
            .get(&order_id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("sales order {order_id}")))?;
        check_version("sales order", expected, current.version)?;
        if state.invoices.contains_key(&invoice_id) {
            return Err(LedgerStoreError::Duplicate(format!("invoice {invoice_id}")));
        }

        let siblings = state.invoices_for(order_id);
        let shipments = state.shipments_for(order_id);
        checks::verify_invoice_commit(&order, &invoice, &siblings, &shipments, &state.payments)?;

        if let Some(entry) = state.sales_orders.get_mut(&order_id) {
            entry.version += 1;
            entry.record = order;
        }
        state.invoices.insert(
            invoice_id,
            Versioned {
                version: 1,
                record: invoice,
            },
        );
        Ok(())
    }

    async fn commit_shipment(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        shipment: Shipment,
    ) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;

        let order_id = order.id();
        let shipment_id = shipment.id();
        let current = state
            .sales_orders
            .get(&order_id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("sales order {order_id}")))?;
        check_version("sales order", expected, current.version)?;
        if state.shipments.contains_key(&shipment_id) {
            return Err(LedgerStoreError::Duplicate(format!("shipment {shipment_id}")));
        }

        let invoices = state.invoices_for(order_id);
        let siblings = state.shipments_for(order_id);
        checks::verify_shipment_commit(&order, &shipment, &invoices, &siblings, &state.payments)?;

        if let Some(entry) = state.sales_orders.get_mut(&order_id) {
            entry.version += 1;
            entry.record = order;
        }
        state.shipments.insert(shipment_id, shipment);
        Ok(())
    }

    async fn commit_receipt(
        &self,
        expected: ExpectedVersion,
        order: PurchaseOrder,
        receipt: Receipt,
    ) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;

        let order_id = order.id();
        let receipt_id = receipt.id();
        let current = state
            .purchase_orders
            .get(&order_id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("purchase order {order_id}")))?;
        check_version("purchase order", expected, current.version)?;
        if state.receipts.contains_key(&receipt_id) {
            return Err(LedgerStoreError::Duplicate(format!("receipt {receipt_id}")));
        }

        let siblings = state.receipts_for(order_id);
        checks::verify_receipt_commit(&order, &receipt, &siblings)?;

        if let Some(entry) = state.purchase_orders.get_mut(&order_id) {
            entry.version += 1;
            entry.record = order;
        }
        state.receipts.insert(receipt_id, receipt);
        Ok(())
    }

    async fn commit_payment(
        &self,
        expected: ExpectedVersion,
        invoice: Invoice,
        payment: PaymentRecord,
    ) -> Result<(), LedgerStoreError> {
        let mut state = self.write_state()?;

        let invoice_id = invoice.id();
        let current = state
            .invoices
            .get(&invoice_id)
            .ok_or_else(|| LedgerStoreError::NotFound(format!("invoice {invoice_id}")))?;
        check_version("invoice", expected, current.version)?;

        let prior = state.payments_for_invoice(invoice_id);
        checks::verify_payment_commit(&invoice, &payment, &prior)?;

        // Re-derive the parent order's transitive payment progress from the
        // post-commit ledger. The order is not version-guarded on this path,
        // so the caller's view of sibling invoices may be stale; the state
        // under the write lock is not.
        let order_id = invoice.sales_order_id();
        let order_entry = state.sales_orders.get(&order_id).ok_or_else(|| {
            LedgerStoreError::Invariant(format!(
                "invoice {invoice_id} references missing sales order {order_id}"
            ))
        })?;
        let invoices_after: Vec<Invoice> = state
            .invoices_for(order_id)
            .into_iter()
            .map(|i| if i.id() == invoice_id { invoice.clone() } else { i })
            .collect();
        let mut payments_after = state.payments_for_invoices(&invoices_after);
        payments_after.push(payment.clone());
        let progress = sales_order_payment_progress(&invoices_after, &payments_after);
        let updated_order = order_entry.record.with_derived_statuses(
            order_entry.record.invoice_coverage(),
            order_entry.record.shipment_coverage(),
            progress,
        );

        if let Some(entry) = state.invoices.get_mut(&invoice_id) {
            entry.version += 1;
            entry.record = invoice;
        }
        state.payments.push(payment);
        // Bump the order version so in-flight order-level commits that loaded
        // the pre-payment progress retry instead of persisting a stale value.
        if let Some(entry) = state.sales_orders.get_mut(&order_id) {
            entry.version += 1;
            entry.record = updated_order;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use tradebook_core::{
        Coverage, DocumentId, DocumentKind, DocumentNumber, PaymentProgress, ProductId,
    };
    use tradebook_documents::{FulfillmentLine, LineItem};
    use tradebook_reconcile::{line_coverage, recorded_lines};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order_with_quantity(quantity: &str) -> SalesOrder {
        let line = LineItem::new(
            ProductId::new(),
            "Steel bolt M8".to_string(),
            dec(quantity),
            dec("4.50"),
            dec("0.2"),
        )
        .unwrap();
        SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::SalesOrder, 2000),
            "Acme Industrial".to_string(),
            vec![line],
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn invoice_for(order: &SalesOrder, quantity: &str, sequence: u64) -> Invoice {
        let line_item_id = order.lines()[0].id();
        Invoice::issue(
            InvoiceId::new(DocumentId::new()),
            DocumentNumber::new(DocumentKind::Invoice, sequence),
            order,
            vec![FulfillmentLine::new(line_item_id, dec(quantity))],
            Utc::now(),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_load_round_trips_with_version_one() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let snapshot = store.load_sales_order(order.id()).await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.order, order);
        assert!(snapshot.invoices.is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let err = store.insert_sales_order(order).await.unwrap_err();
        assert!(matches!(err, LedgerStoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn commit_with_stale_version_fails_concurrency_check() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let invoice = invoice_for(&order, "10", 3000);
        let recorded = recorded_lines([invoice.lines()]);
        let updated = order.with_derived_statuses(
            line_coverage(order.lines(), &recorded),
            Coverage::None,
            PaymentProgress::Unpaid,
        );

        let err = store
            .commit_invoice(ExpectedVersion::Exact(7), updated, invoice)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerStoreError::Concurrency(_)));

        // Nothing was written.
        let snapshot = store.load_sales_order(order.id()).await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.invoices.is_empty());
    }

    #[tokio::test]
    async fn commit_bumps_version_and_stores_the_invoice() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let invoice = invoice_for(&order, "4", 3000);
        let recorded = recorded_lines([invoice.lines()]);
        let updated = order.with_derived_statuses(
            line_coverage(order.lines(), &recorded),
            Coverage::None,
            PaymentProgress::Unpaid,
        );

        store
            .commit_invoice(ExpectedVersion::Exact(1), updated, invoice.clone())
            .await
            .unwrap();

        let snapshot = store.load_sales_order(order.id()).await.unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.order.invoice_coverage(), Coverage::Partial);
        assert_eq!(snapshot.invoices, vec![invoice]);
    }

    #[tokio::test]
    async fn commit_with_divergent_statuses_is_refused() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let invoice = invoice_for(&order, "4", 3000);
        // Claim full coverage for a partial fulfillment.
        let lying = order.with_derived_statuses(
            Coverage::Full,
            Coverage::None,
            PaymentProgress::Unpaid,
        );

        let err = store
            .commit_invoice(ExpectedVersion::Exact(1), lying, invoice)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerStoreError::Invariant(_)));
    }

    #[tokio::test]
    async fn over_consuming_commit_is_refused_even_with_matching_statuses() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let invoice = invoice_for(&order, "12", 3000);
        let recorded = recorded_lines([invoice.lines()]);
        let updated = order.with_derived_statuses(
            line_coverage(order.lines(), &recorded),
            Coverage::None,
            PaymentProgress::Unpaid,
        );

        let err = store
            .commit_invoice(ExpectedVersion::Exact(1), updated, invoice)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerStoreError::Invariant(_)));
    }

    #[tokio::test]
    async fn payment_commit_updates_invoice_and_order_progress() {
        let store = InMemoryLedgerStore::new();
        let order = order_with_quantity("10");
        store.insert_sales_order(order.clone()).await.unwrap();

        let invoice = invoice_for(&order, "10", 3000);
        let recorded = recorded_lines([invoice.lines()]);
        let updated = order.with_derived_statuses(
            line_coverage(order.lines(), &recorded),
            Coverage::None,
            PaymentProgress::Unpaid,
        );
        store
            .commit_invoice(ExpectedVersion::Exact(1), updated, invoice.clone())
            .await
            .unwrap();

        let payment =
            PaymentRecord::new(invoice.id(), invoice.total(), Utc::now()).unwrap();
        let paid_invoice = invoice.with_payment_progress(PaymentProgress::Paid);
        store
            .commit_payment(ExpectedVersion::Exact(1), paid_invoice, payment)
            .await
            .unwrap();

        let snapshot = store.load_invoice(invoice.id()).await.unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.invoice.payment_progress(), PaymentProgress::Paid);
        assert_eq!(snapshot.payments.len(), 1);

        let order_snapshot = store.load_sales_order(order.id()).await.unwrap();
        assert_eq!(order_snapshot.order.payment_progress(), PaymentProgress::Paid);
        // Payment commits bump the order version so order-level writers retry.
        assert_eq!(order_snapshot.version, 3);
    }
}
