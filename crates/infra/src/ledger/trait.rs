//! Ledger store abstraction.
//!
//! The ledger is the system of record for commercial documents and the
//! fulfillment records written against them. Implementations must provide:
//!
//! - **Atomic commits**: a commit persists the fulfillment document and the
//!   updated parent statuses together, or not at all.
//! - **Optimistic concurrency**: commits against a parent carry the version
//!   the caller loaded; a mismatch fails with [`LedgerStoreError::Concurrency`]
//!   and the caller revalidates against fresh state.
//! - **Append-only fulfillments**: invoices, shipments, receipts, and payments
//!   are never updated in place or deleted.
//!
//! Every implementation re-runs the write-time consistency checks in
//! [`super::checks`] before persisting, so a buggy caller cannot push the
//! ledger into a state that disagrees with derivation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tradebook_core::{DomainError, ExpectedVersion};
use tradebook_documents::{
    Invoice, InvoiceId, PaymentRecord, PurchaseOrder, PurchaseOrderId, Quotation, QuotationId,
    Receipt, SalesOrder, SalesOrderId, Shipment,
};

/// Errors produced by ledger store implementations.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    /// The expected version did not match; another writer committed first.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A record with the same identifier already exists.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The proposed write disagrees with re-derivation or conservation.
    #[error("ledger invariant violated: {0}")]
    Invariant(String),

    /// The backing storage failed (I/O, pool, poisoned lock).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<LedgerStoreError> for DomainError {
    fn from(value: LedgerStoreError) -> Self {
        match value {
            LedgerStoreError::Concurrency(msg) => DomainError::Conflict(msg),
            LedgerStoreError::NotFound(_) => DomainError::NotFound,
            LedgerStoreError::Duplicate(msg) => DomainError::Conflict(msg),
            LedgerStoreError::Invariant(msg) => DomainError::InvariantViolation(msg),
            LedgerStoreError::Storage(msg) => {
                DomainError::InvariantViolation(format!("storage failure: {msg}"))
            }
        }
    }
}

/// A stored record together with its optimistic-concurrency version.
///
/// Versions start at 1 on insert and increase by 1 on every committed write
/// that touches the record.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// A sales order plus every fulfillment record written against it.
///
/// `payments` holds the payments of all of the order's invoices; callers
/// filter by invoice when deriving per-invoice state.
#[derive(Debug, Clone)]
pub struct SalesOrderSnapshot {
    pub version: u64,
    pub order: SalesOrder,
    pub invoices: Vec<Invoice>,
    pub shipments: Vec<Shipment>,
    pub payments: Vec<PaymentRecord>,
}

/// A purchase order plus the receipts recorded against it.
#[derive(Debug, Clone)]
pub struct PurchaseOrderSnapshot {
    pub version: u64,
    pub order: PurchaseOrder,
    pub receipts: Vec<Receipt>,
}

/// An invoice plus the payments recorded against it.
#[derive(Debug, Clone)]
pub struct InvoiceSnapshot {
    pub version: u64,
    pub invoice: Invoice,
    pub payments: Vec<PaymentRecord>,
}

/// Persistent store for documents and fulfillment records.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a freshly created quotation. Fails on duplicate id.
    async fn insert_quotation(&self, quotation: Quotation) -> Result<(), LedgerStoreError>;

    /// Insert a freshly created sales order. Fails on duplicate id.
    async fn insert_sales_order(&self, order: SalesOrder) -> Result<(), LedgerStoreError>;

    /// Insert a freshly created purchase order. Fails on duplicate id.
    async fn insert_purchase_order(&self, order: PurchaseOrder) -> Result<(), LedgerStoreError>;

    /// Load a quotation with its current version.
    async fn load_quotation(&self, id: QuotationId)
        -> Result<Versioned<Quotation>, LedgerStoreError>;

    /// Load a sales order and all fulfillment records written against it.
    async fn load_sales_order(
        &self,
        id: SalesOrderId,
    ) -> Result<SalesOrderSnapshot, LedgerStoreError>;

    /// Load a purchase order and the receipts written against it.
    async fn load_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<PurchaseOrderSnapshot, LedgerStoreError>;

    /// Load an invoice and the payments written against it.
    async fn load_invoice(&self, id: InvoiceId) -> Result<InvoiceSnapshot, LedgerStoreError>;

    /// List all quotations, ordered by document number.
    async fn list_quotations(&self) -> Result<Vec<Quotation>, LedgerStoreError>;

    /// List all sales orders, ordered by document number.
    async fn list_sales_orders(&self) -> Result<Vec<SalesOrder>, LedgerStoreError>;

    /// List all purchase orders, ordered by document number.
    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, LedgerStoreError>;

    /// Atomically freeze a converted quotation and insert the sales order
    /// produced from it. `expected` guards the quotation's version.
    async fn commit_conversion(
        &self,
        expected: ExpectedVersion,
        quotation: Quotation,
        order: SalesOrder,
    ) -> Result<(), LedgerStoreError>;

    /// Atomically insert an invoice and persist the updated parent order.
    /// `expected` guards the sales order's version.
    async fn commit_invoice(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        invoice: Invoice,
    ) -> Result<(), LedgerStoreError>;

    /// Atomically insert a shipment and persist the updated parent order.
    /// `expected` guards the sales order's version.
    async fn commit_shipment(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        shipment: Shipment,
    ) -> Result<(), LedgerStoreError>;

    /// Atomically insert a receipt and persist the updated purchase order.
    /// `expected` guards the purchase order's version.
    async fn commit_receipt(
        &self,
        expected: ExpectedVersion,
        order: PurchaseOrder,
        receipt: Receipt,
    ) -> Result<(), LedgerStoreError>;

    /// Atomically insert a payment and persist the updated invoice.
    ///
    /// `expected` guards the invoice's version; payment writes are serialized
    /// per invoice. The parent order's transitive payment progress is
    /// re-derived and persisted by the store inside the same commit, since the
    /// caller holds no version over the order here.
    async fn commit_payment(
        &self,
        expected: ExpectedVersion,
        invoice: Invoice,
        payment: PaymentRecord,
    ) -> Result<(), LedgerStoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn insert_quotation(&self, quotation: Quotation) -> Result<(), LedgerStoreError> {
        (**self).insert_quotation(quotation).await
    }

    async fn insert_sales_order(&self, order: SalesOrder) -> Result<(), LedgerStoreError> {
        (**self).insert_sales_order(order).await
    }

    async fn insert_purchase_order(&self, order: PurchaseOrder) -> Result<(), LedgerStoreError> {
        (**self).insert_purchase_order(order).await
    }

    async fn load_quotation(
        &self,
        id: QuotationId,
    ) -> Result<Versioned<Quotation>, LedgerStoreError> {
        (**self).load_quotation(id).await
    }

    async fn load_sales_order(
        &self,
        id: SalesOrderId,
    ) -> Result<SalesOrderSnapshot, LedgerStoreError> {
        (**self).load_sales_order(id).await
    }

    async fn load_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<PurchaseOrderSnapshot, LedgerStoreError> {
        (**self).load_purchase_order(id).await
    }

    async fn load_invoice(&self, id: InvoiceId) -> Result<InvoiceSnapshot, LedgerStoreError> {
        (**self).load_invoice(id).await
    }

    async fn list_quotations(&self) -> Result<Vec<Quotation>, LedgerStoreError> {
        (**self).list_quotations().await
    }

    async fn list_sales_orders(&self) -> Result<Vec<SalesOrder>, LedgerStoreError> {
        (**self).list_sales_orders().await
    }

    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, LedgerStoreError> {
        (**self).list_purchase_orders().await
    }

    async fn commit_conversion(
        &self,
        expected: ExpectedVersion,
        quotation: Quotation,
        order: SalesOrder,
    ) -> Result<(), LedgerStoreError> {
        (**self).commit_conversion(expected, quotation, order).await
    }

    async fn commit_invoice(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        invoice: Invoice,
    ) -> Result<(), LedgerStoreError> {
        (**self).commit_invoice(expected, order, invoice).await
    }

    async fn commit_shipment(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        shipment: Shipment,
    ) -> Result<(), LedgerStoreError> {
        (**self).commit_shipment(expected, order, shipment).await
    }

    async fn commit_receipt(
        &self,
        expected: ExpectedVersion,
        order: PurchaseOrder,
        receipt: Receipt,
    ) -> Result<(), LedgerStoreError> {
        (**self).commit_receipt(expected, order, receipt).await
    }

    async fn commit_payment(
        &self,
        expected: ExpectedVersion,
        invoice: Invoice,
        payment: PaymentRecord,
    ) -> Result<(), LedgerStoreError> {
        (**self).commit_payment(expected, invoice, payment).await
    }
}
