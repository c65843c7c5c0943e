//! Fulfillment orchestration.
//!
//! Every write follows the same pipeline:
//!
//! 1. Load the parent document and its recorded fulfillments
//! 2. Validate the request against remaining capacity (pure reconciliation)
//! 3. Build the proposed documents with freshly derived statuses
//! 4. Allocate a document number (numbered kinds only, after validation)
//! 5. Commit atomically under an optimistic version check
//!
//! A commit that loses the version race is retried from step 1 against
//! fresh state, up to `max_retries` times; exhaustion surfaces as
//! [`DomainError::Busy`]. Validation failures return immediately and never
//! consume a document number; a number allocated for a commit that then
//! retries or fails is abandoned, leaving a gap in the sequence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use tradebook_core::{
    DocumentId, DocumentKind, DomainError, DomainResult, ExpectedVersion, ProductId, round_money,
};
use tradebook_documents::{
    FulfillmentLine, Invoice, InvoiceId, LineItem, PaymentRecord, PurchaseOrder, PurchaseOrderId,
    Quotation, QuotationId, Receipt, ReceiptId, SalesOrder, SalesOrderId, Shipment, ShipmentId,
};
use tradebook_reconcile::{
    fulfill_all_remaining, line_coverage, normalize_lines, paid_total, payment_progress,
    recorded_lines, sales_order_payment_progress, validate_batch, validate_payment,
};

use crate::ledger::{
    InvoiceSnapshot, LedgerStore, LedgerStoreError, PurchaseOrderSnapshot, SalesOrderSnapshot,
};
use crate::numbering::NumberAllocator;
use crate::projections::{
    self, InvoiceBalance, PurchaseOrderRemaining, SalesOrderRemaining,
};

/// Default number of commit retries before giving up with [`DomainError::Busy`].
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// One requested line item on a creation request.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
}

/// Request to create a quotation.
#[derive(Debug, Clone)]
pub struct NewQuotation {
    pub customer: String,
    pub lines: Vec<NewLineItem>,
}

/// Request to create a sales order directly (not via conversion).
#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub customer: String,
    pub lines: Vec<NewLineItem>,
}

/// Request to create a purchase order.
#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub supplier: String,
    pub lines: Vec<NewLineItem>,
}

/// Which parent lines a fulfillment request consumes.
#[derive(Debug, Clone)]
pub enum LineSelection {
    /// Consume everything still open on the parent.
    AllRemaining,
    /// Consume the given quantities; normalized before validation.
    Lines(Vec<FulfillmentLine>),
}

/// Request to invoice part or all of a sales order.
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub sales_order_id: SalesOrderId,
    pub lines: LineSelection,
    /// Defaults to the standard payment terms when absent.
    pub due_date: Option<DateTime<Utc>>,
}

/// Request to ship part or all of a sales order.
#[derive(Debug, Clone)]
pub struct ShipmentRequest {
    pub sales_order_id: SalesOrderId,
    pub lines: LineSelection,
    pub shipped_at: Option<DateTime<Utc>>,
}

/// Request to receive part or all of a purchase order.
#[derive(Debug, Clone)]
pub struct ReceiptRequest {
    pub purchase_order_id: PurchaseOrderId,
    pub lines: LineSelection,
    pub received_at: Option<DateTime<Utc>>,
}

/// Request to record a payment against an invoice.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Outcome of a fulfillment request.
///
/// `document` is `None` when the request normalized to zero lines: nothing
/// was written and `parent` is the unchanged stored document.
#[derive(Debug, Clone)]
pub struct FulfillmentCommit<D, P> {
    pub document: Option<D>,
    pub parent: P,
}

/// Outcome of a recorded payment.
#[derive(Debug, Clone)]
pub struct PaymentCommit {
    pub payment: PaymentRecord,
    pub invoice: Invoice,
}

/// Drives document creation, fulfillment, and payment against a ledger store.
pub struct FulfillmentOrchestrator<S, N> {
    store: S,
    numbers: N,
    max_retries: u32,
}

impl<S, N> FulfillmentOrchestrator<S, N> {
    pub fn new(store: S, numbers: N) -> Self {
        Self {
            store,
            numbers,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn into_parts(self) -> (S, N) {
        (self.store, self.numbers)
    }
}

impl<S, N> FulfillmentOrchestrator<S, N>
where
    S: LedgerStore,
    N: NumberAllocator,
{
    #[instrument(skip(self, request), fields(customer = %request.customer), err)]
    pub async fn create_quotation(&self, request: NewQuotation) -> DomainResult<Quotation> {
        // Validate before allocating so a rejected request never burns a number.
        validate_new_document("quotation", "customer", &request.customer, &request.lines)?;
        let lines = build_line_items(request.lines)?;

        let number = self.numbers.allocate(DocumentKind::Quotation).await?;
        let quotation = Quotation::new(
            QuotationId::new(DocumentId::new()),
            number,
            request.customer,
            lines,
            Utc::now(),
        )?;
        self.store.insert_quotation(quotation.clone()).await?;
        Ok(quotation)
    }

    #[instrument(skip(self, request), fields(customer = %request.customer), err)]
    pub async fn create_sales_order(&self, request: NewSalesOrder) -> DomainResult<SalesOrder> {
        validate_new_document("sales order", "customer", &request.customer, &request.lines)?;
        let lines = build_line_items(request.lines)?;

        let number = self.numbers.allocate(DocumentKind::SalesOrder).await?;
        let order = SalesOrder::new(
            SalesOrderId::new(DocumentId::new()),
            number,
            request.customer,
            lines,
            None,
            Utc::now(),
        )?;
        self.store.insert_sales_order(order.clone()).await?;
        Ok(order)
    }

    #[instrument(skip(self, request), fields(supplier = %request.supplier), err)]
    pub async fn create_purchase_order(
        &self,
        request: NewPurchaseOrder,
    ) -> DomainResult<PurchaseOrder> {
        validate_new_document("purchase order", "supplier", &request.supplier, &request.lines)?;
        let lines = build_line_items(request.lines)?;

        let number = self.numbers.allocate(DocumentKind::PurchaseOrder).await?;
        let order = PurchaseOrder::new(
            PurchaseOrderId::new(DocumentId::new()),
            number,
            request.supplier,
            lines,
            Utc::now(),
        )?;
        self.store.insert_purchase_order(order.clone()).await?;
        Ok(order)
    }

    /// Convert an open quotation into a sales order with blank statuses.
    #[instrument(skip(self), fields(quotation_id = %quotation_id), err)]
    pub async fn convert_quotation(&self, quotation_id: QuotationId) -> DomainResult<SalesOrder> {
        let mut attempt = 0;
        loop {
            let current = self.store.load_quotation(quotation_id).await?;
            // Refuse before allocating so a double conversion never burns a number.
            current.record.ensure_open()?;

            let number = self.numbers.allocate(DocumentKind::SalesOrder).await?;
            let (converted, order) = current.record.convert(
                SalesOrderId::new(DocumentId::new()),
                number,
                Utc::now(),
            )?;

            match self
                .store
                .commit_conversion(ExpectedVersion::Exact(current.version), converted, order.clone())
                .await
            {
                Ok(()) => return Ok(order),
                Err(LedgerStoreError::Concurrency(reason)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(DomainError::Busy);
                    }
                    warn!(attempt, %reason, "conversion lost a version race, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Invoice part or all of a sales order.
    #[instrument(skip(self, request), fields(sales_order_id = %request.sales_order_id), err)]
    pub async fn create_invoice(
        &self,
        request: InvoiceRequest,
    ) -> DomainResult<FulfillmentCommit<Invoice, SalesOrder>> {
        let mut attempt = 0;
        loop {
            let snapshot = self.store.load_sales_order(request.sales_order_id).await?;
            let recorded = recorded_lines(snapshot.invoices.iter().map(Invoice::lines));

            let Some(lines) = resolve_selection(&request.lines, snapshot.order.lines(), &recorded)?
            else {
                return Ok(FulfillmentCommit {
                    document: None,
                    parent: snapshot.order,
                });
            };
            validate_batch(snapshot.order.lines(), &recorded, &lines)?;

            let number = self.numbers.allocate(DocumentKind::Invoice).await?;
            let invoice = Invoice::issue(
                InvoiceId::new(DocumentId::new()),
                number,
                &snapshot.order,
                lines,
                Utc::now(),
                request.due_date,
            )?;
            let updated = order_with_invoice(&snapshot, &invoice);

            match self
                .store
                .commit_invoice(
                    ExpectedVersion::Exact(snapshot.version),
                    updated.clone(),
                    invoice.clone(),
                )
                .await
            {
                Ok(()) => {
                    return Ok(FulfillmentCommit {
                        document: Some(invoice),
                        parent: updated,
                    });
                }
                Err(LedgerStoreError::Concurrency(reason)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(DomainError::Busy);
                    }
                    warn!(attempt, %reason, "invoice commit lost a version race, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Ship part or all of a sales order. Shipments carry no document number.
    #[instrument(skip(self, request), fields(sales_order_id = %request.sales_order_id), err)]
    pub async fn create_shipment(
        &self,
        request: ShipmentRequest,
    ) -> DomainResult<FulfillmentCommit<Shipment, SalesOrder>> {
        let mut attempt = 0;
        loop {
            let snapshot = self.store.load_sales_order(request.sales_order_id).await?;
            let recorded = recorded_lines(snapshot.shipments.iter().map(Shipment::lines));

            let Some(lines) = resolve_selection(&request.lines, snapshot.order.lines(), &recorded)?
            else {
                return Ok(FulfillmentCommit {
                    document: None,
                    parent: snapshot.order,
                });
            };
            validate_batch(snapshot.order.lines(), &recorded, &lines)?;

            let shipment = Shipment::new(
                ShipmentId::new(DocumentId::new()),
                request.sales_order_id,
                lines,
                request.shipped_at.unwrap_or_else(Utc::now),
            )?;
            let updated = order_with_shipment(&snapshot, &shipment);

            match self
                .store
                .commit_shipment(
                    ExpectedVersion::Exact(snapshot.version),
                    updated.clone(),
                    shipment.clone(),
                )
                .await
            {
                Ok(()) => {
                    return Ok(FulfillmentCommit {
                        document: Some(shipment),
                        parent: updated,
                    });
                }
                Err(LedgerStoreError::Concurrency(reason)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(DomainError::Busy);
                    }
                    warn!(attempt, %reason, "shipment commit lost a version race, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Receive part or all of a purchase order.
    #[instrument(skip(self, request), fields(purchase_order_id = %request.purchase_order_id), err)]
    pub async fn create_receipt(
        &self,
        request: ReceiptRequest,
    ) -> DomainResult<FulfillmentCommit<Receipt, PurchaseOrder>> {
        let mut attempt = 0;
        loop {
            let snapshot = self
                .store
                .load_purchase_order(request.purchase_order_id)
                .await?;
            let recorded = recorded_lines(snapshot.receipts.iter().map(Receipt::lines));

            let Some(lines) = resolve_selection(&request.lines, snapshot.order.lines(), &recorded)?
            else {
                return Ok(FulfillmentCommit {
                    document: None,
                    parent: snapshot.order,
                });
            };
            validate_batch(snapshot.order.lines(), &recorded, &lines)?;

            let receipt = Receipt::new(
                ReceiptId::new(DocumentId::new()),
                request.purchase_order_id,
                lines,
                request.received_at.unwrap_or_else(Utc::now),
            )?;
            let mut receipt_lines = recorded.clone();
            receipt_lines.extend(receipt.lines().iter().cloned());
            let updated = snapshot
                .order
                .with_receipt_coverage(line_coverage(snapshot.order.lines(), &receipt_lines));

            match self
                .store
                .commit_receipt(
                    ExpectedVersion::Exact(snapshot.version),
                    updated.clone(),
                    receipt.clone(),
                )
                .await
            {
                Ok(()) => {
                    return Ok(FulfillmentCommit {
                        document: Some(receipt),
                        parent: updated,
                    });
                }
                Err(LedgerStoreError::Concurrency(reason)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(DomainError::Busy);
                    }
                    warn!(attempt, %reason, "receipt commit lost a version race, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Record a payment against an invoice.
    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id), err)]
    pub async fn record_payment(&self, request: PaymentRequest) -> DomainResult<PaymentCommit> {
        let amount = round_money(request.amount);
        let mut attempt = 0;
        loop {
            let snapshot = self.store.load_invoice(request.invoice_id).await?;
            validate_payment(&snapshot.invoice, &snapshot.payments, amount)?;

            let payment = PaymentRecord::new(
                request.invoice_id,
                amount,
                request.paid_at.unwrap_or_else(Utc::now),
            )?;
            let mut payments_after = snapshot.payments.clone();
            payments_after.push(payment.clone());
            let paid = paid_total(&snapshot.invoice, &payments_after);
            let updated = snapshot
                .invoice
                .with_payment_progress(payment_progress(paid, snapshot.invoice.total()));

            match self
                .store
                .commit_payment(
                    ExpectedVersion::Exact(snapshot.version),
                    updated.clone(),
                    payment.clone(),
                )
                .await
            {
                Ok(()) => {
                    return Ok(PaymentCommit {
                        payment,
                        invoice: updated,
                    });
                }
                Err(LedgerStoreError::Concurrency(reason)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(DomainError::Busy);
                    }
                    warn!(attempt, %reason, "payment commit lost a version race, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    pub async fn quotation(&self, id: QuotationId) -> DomainResult<Quotation> {
        Ok(self.store.load_quotation(id).await?.record)
    }

    pub async fn sales_order(&self, id: SalesOrderId) -> DomainResult<SalesOrderSnapshot> {
        Ok(self.store.load_sales_order(id).await?)
    }

    pub async fn purchase_order(&self, id: PurchaseOrderId) -> DomainResult<PurchaseOrderSnapshot> {
        Ok(self.store.load_purchase_order(id).await?)
    }

    pub async fn invoice(&self, id: InvoiceId) -> DomainResult<InvoiceSnapshot> {
        Ok(self.store.load_invoice(id).await?)
    }

    pub async fn list_quotations(&self) -> DomainResult<Vec<Quotation>> {
        Ok(self.store.list_quotations().await?)
    }

    pub async fn list_sales_orders(&self) -> DomainResult<Vec<SalesOrder>> {
        Ok(self.store.list_sales_orders().await?)
    }

    pub async fn list_purchase_orders(&self) -> DomainResult<Vec<PurchaseOrder>> {
        Ok(self.store.list_purchase_orders().await?)
    }

    /// Per-line invoiced/shipped quantities, recomputed from the records.
    pub async fn remaining_for_sales_order(
        &self,
        id: SalesOrderId,
    ) -> DomainResult<SalesOrderRemaining> {
        let snapshot = self.store.load_sales_order(id).await?;
        Ok(projections::sales_order_remaining(&snapshot))
    }

    /// Per-line received quantities, recomputed from the records.
    pub async fn remaining_for_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> DomainResult<PurchaseOrderRemaining> {
        let snapshot = self.store.load_purchase_order(id).await?;
        Ok(projections::purchase_order_remaining(&snapshot))
    }

    /// Paid/outstanding amounts plus the time-dependent effective status.
    pub async fn invoice_balance(
        &self,
        id: InvoiceId,
        now: DateTime<Utc>,
    ) -> DomainResult<InvoiceBalance> {
        let snapshot = self.store.load_invoice(id).await?;
        Ok(projections::invoice_balance(&snapshot, now))
    }
}

fn validate_new_document(
    kind_label: &str,
    party_label: &str,
    party: &str,
    lines: &[NewLineItem],
) -> DomainResult<()> {
    if party.trim().is_empty() {
        return Err(DomainError::validation(format!(
            "{party_label} must not be empty"
        )));
    }
    if lines.is_empty() {
        return Err(DomainError::validation(format!(
            "{kind_label} requires at least one line item"
        )));
    }
    Ok(())
}

fn build_line_items(lines: Vec<NewLineItem>) -> DomainResult<Vec<LineItem>> {
    lines
        .into_iter()
        .map(|line| {
            LineItem::new(
                line.product_id,
                line.product_name,
                line.quantity,
                line.unit_price,
                line.tax_rate,
            )
        })
        .collect()
}

/// Resolve a line selection into concrete normalized lines.
///
/// Returns `None` when the request is a no-op: the normalized explicit lines
/// are empty, or nothing remains open for an all-remaining request.
fn resolve_selection(
    selection: &LineSelection,
    parent_lines: &[LineItem],
    recorded: &[FulfillmentLine],
) -> DomainResult<Option<Vec<FulfillmentLine>>> {
    let lines = match selection {
        LineSelection::AllRemaining => fulfill_all_remaining(parent_lines, recorded),
        LineSelection::Lines(requested) => normalize_lines(requested.clone())?,
    };
    Ok(if lines.is_empty() { None } else { Some(lines) })
}

fn order_with_invoice(snapshot: &SalesOrderSnapshot, invoice: &Invoice) -> SalesOrder {
    let mut invoice_lines = recorded_lines(snapshot.invoices.iter().map(Invoice::lines));
    invoice_lines.extend(invoice.lines().iter().cloned());
    let shipment_lines = recorded_lines(snapshot.shipments.iter().map(Shipment::lines));

    let mut invoices_after = snapshot.invoices.clone();
    invoices_after.push(invoice.clone());

    snapshot.order.with_derived_statuses(
        line_coverage(snapshot.order.lines(), &invoice_lines),
        line_coverage(snapshot.order.lines(), &shipment_lines),
        sales_order_payment_progress(&invoices_after, &snapshot.payments),
    )
}

fn order_with_shipment(snapshot: &SalesOrderSnapshot, shipment: &Shipment) -> SalesOrder {
    let invoice_lines = recorded_lines(snapshot.invoices.iter().map(Invoice::lines));
    let mut shipment_lines = recorded_lines(snapshot.shipments.iter().map(Shipment::lines));
    shipment_lines.extend(shipment.lines().iter().cloned());

    snapshot.order.with_derived_statuses(
        line_coverage(snapshot.order.lines(), &invoice_lines),
        line_coverage(snapshot.order.lines(), &shipment_lines),
        sales_order_payment_progress(&snapshot.invoices, &snapshot.payments),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::ledger::{InMemoryLedgerStore, Versioned};
    use crate::numbering::AtomicNumberAllocator;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn new_line(name: &str, quantity: &str, price: &str) -> NewLineItem {
        NewLineItem {
            product_id: ProductId::new(),
            product_name: name.to_string(),
            quantity: dec(quantity),
            unit_price: dec(price),
            tax_rate: dec("0"),
        }
    }

    fn orchestrator() -> FulfillmentOrchestrator<Arc<InMemoryLedgerStore>, Arc<AtomicNumberAllocator>>
    {
        FulfillmentOrchestrator::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(AtomicNumberAllocator::new()),
        )
    }

    /// Store wrapper that injects a fixed number of commit conflicts.
    struct FlakyStore {
        inner: InMemoryLedgerStore,
        failures: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryLedgerStore::new(),
                failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for FlakyStore {
        async fn insert_quotation(&self, q: Quotation) -> Result<(), LedgerStoreError> {
            self.inner.insert_quotation(q).await
        }
        async fn insert_sales_order(&self, o: SalesOrder) -> Result<(), LedgerStoreError> {
            self.inner.insert_sales_order(o).await
        }
        async fn insert_purchase_order(&self, o: PurchaseOrder) -> Result<(), LedgerStoreError> {
            self.inner.insert_purchase_order(o).await
        }
        async fn load_quotation(
            &self,
            id: QuotationId,
        ) -> Result<Versioned<Quotation>, LedgerStoreError> {
            self.inner.load_quotation(id).await
        }
        async fn load_sales_order(
            &self,
            id: SalesOrderId,
        ) -> Result<SalesOrderSnapshot, LedgerStoreError> {
            self.inner.load_sales_order(id).await
        }
        async fn load_purchase_order(
            &self,
            id: PurchaseOrderId,
        ) -> Result<PurchaseOrderSnapshot, LedgerStoreError> {
            self.inner.load_purchase_order(id).await
        }
        async fn load_invoice(&self, id: InvoiceId) -> Result<InvoiceSnapshot, LedgerStoreError> {
            self.inner.load_invoice(id).await
        }
        async fn list_quotations(&self) -> Result<Vec<Quotation>, LedgerStoreError> {
            self.inner.list_quotations().await
        }
        async fn list_sales_orders(&self) -> Result<Vec<SalesOrder>, LedgerStoreError> {
            self.inner.list_sales_orders().await
        }
        async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, LedgerStoreError> {
            self.inner.list_purchase_orders().await
        }
        async fn commit_conversion(
            &self,
            expected: ExpectedVersion,
            q: Quotation,
            o: SalesOrder,
        ) -> Result<(), LedgerStoreError> {
            self.inner.commit_conversion(expected, q, o).await
        }
        async fn commit_invoice(
            &self,
            expected: ExpectedVersion,
            order: SalesOrder,
            invoice: Invoice,
        ) -> Result<(), LedgerStoreError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(LedgerStoreError::Concurrency("injected conflict".to_string()));
            }
            self.inner.commit_invoice(expected, order, invoice).await
        }
        async fn commit_shipment(
            &self,
            expected: ExpectedVersion,
            order: SalesOrder,
            shipment: Shipment,
        ) -> Result<(), LedgerStoreError> {
            self.inner.commit_shipment(expected, order, shipment).await
        }
        async fn commit_receipt(
            &self,
            expected: ExpectedVersion,
            order: PurchaseOrder,
            receipt: Receipt,
        ) -> Result<(), LedgerStoreError> {
            self.inner.commit_receipt(expected, order, receipt).await
        }
        async fn commit_payment(
            &self,
            expected: ExpectedVersion,
            invoice: Invoice,
            payment: PaymentRecord,
        ) -> Result<(), LedgerStoreError> {
            self.inner.commit_payment(expected, invoice, payment).await
        }
    }

    #[tokio::test]
    async fn exhausted_commit_retries_surface_as_busy() {
        let store = Arc::new(FlakyStore::new(u32::MAX));
        let orchestrator =
            FulfillmentOrchestrator::new(store, Arc::new(AtomicNumberAllocator::new()))
                .with_max_retries(2);

        let order = orchestrator
            .create_sales_order(NewSalesOrder {
                customer: "Acme Industrial".to_string(),
                lines: vec![new_line("Steel bolt M8", "10", "4.50")],
            })
            .await
            .unwrap();

        let err = orchestrator
            .create_invoice(InvoiceRequest {
                sales_order_id: order.id(),
                lines: LineSelection::AllRemaining,
                due_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Busy));
    }

    #[tokio::test]
    async fn transient_conflicts_are_retried_and_burn_numbers() {
        let store = Arc::new(FlakyStore::new(2));
        let orchestrator =
            FulfillmentOrchestrator::new(store, Arc::new(AtomicNumberAllocator::new()));

        let order = orchestrator
            .create_sales_order(NewSalesOrder {
                customer: "Acme Industrial".to_string(),
                lines: vec![new_line("Steel bolt M8", "10", "4.50")],
            })
            .await
            .unwrap();

        let commit = orchestrator
            .create_invoice(InvoiceRequest {
                sales_order_id: order.id(),
                lines: LineSelection::AllRemaining,
                due_date: None,
            })
            .await
            .unwrap();

        // Two conflicted attempts abandoned INV-3000 and INV-3001; the gap
        // is permanent and the committed invoice carries the third number.
        let invoice = commit.document.unwrap();
        assert_eq!(invoice.number().sequence(), 3002);
    }

    #[tokio::test]
    async fn request_normalizing_to_nothing_is_a_no_op() {
        let orchestrator = orchestrator();
        let order = orchestrator
            .create_sales_order(NewSalesOrder {
                customer: "Acme Industrial".to_string(),
                lines: vec![new_line("Steel bolt M8", "10", "4.50")],
            })
            .await
            .unwrap();
        let line_item_id = order.lines()[0].id();

        let commit = orchestrator
            .create_invoice(InvoiceRequest {
                sales_order_id: order.id(),
                lines: LineSelection::Lines(vec![FulfillmentLine::new(
                    line_item_id,
                    Decimal::ZERO,
                )]),
                due_date: None,
            })
            .await
            .unwrap();

        assert!(commit.document.is_none());
        assert_eq!(commit.parent, order);
        let snapshot = orchestrator.sales_order(order.id()).await.unwrap();
        assert!(snapshot.invoices.is_empty());
    }

    #[tokio::test]
    async fn all_remaining_on_a_consumed_order_is_a_no_op() {
        let orchestrator = orchestrator();
        let order = orchestrator
            .create_sales_order(NewSalesOrder {
                customer: "Acme Industrial".to_string(),
                lines: vec![new_line("Steel bolt M8", "10", "4.50")],
            })
            .await
            .unwrap();

        let first = orchestrator
            .create_invoice(InvoiceRequest {
                sales_order_id: order.id(),
                lines: LineSelection::AllRemaining,
                due_date: None,
            })
            .await
            .unwrap();
        assert!(first.document.is_some());

        let second = orchestrator
            .create_invoice(InvoiceRequest {
                sales_order_id: order.id(),
                lines: LineSelection::AllRemaining,
                due_date: None,
            })
            .await
            .unwrap();
        assert!(second.document.is_none());
    }

    #[tokio::test]
    async fn rejected_creation_requests_do_not_burn_numbers() {
        let orchestrator = orchestrator();

        let err = orchestrator
            .create_sales_order(NewSalesOrder {
                customer: "   ".to_string(),
                lines: vec![new_line("Steel bolt M8", "10", "4.50")],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let order = orchestrator
            .create_sales_order(NewSalesOrder {
                customer: "Acme Industrial".to_string(),
                lines: vec![new_line("Steel bolt M8", "10", "4.50")],
            })
            .await
            .unwrap();
        assert_eq!(order.number().to_string(), "SO-2000");
    }

    #[tokio::test]
    async fn unknown_parent_is_not_found() {
        let orchestrator = orchestrator();

        let err = orchestrator
            .create_invoice(InvoiceRequest {
                sales_order_id: SalesOrderId::new(DocumentId::new()),
                lines: LineSelection::AllRemaining,
                due_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }
}
