//! Postgres-backed ledger store.
//!
//! Documents are stored one row per record with the full document as JSONB
//! next to an explicit version column:
//!
//! ```sql
//! CREATE TABLE quotations       (id UUID PRIMARY KEY, version BIGINT NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE sales_orders     (id UUID PRIMARY KEY, version BIGINT NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE purchase_orders  (id UUID PRIMARY KEY, version BIGINT NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE invoices         (id UUID PRIMARY KEY, sales_order_id UUID NOT NULL, version BIGINT NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE shipments        (id UUID PRIMARY KEY, sales_order_id UUID NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE receipts         (id UUID PRIMARY KEY, purchase_order_id UUID NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE payments         (id UUID PRIMARY KEY, invoice_id UUID NOT NULL, record JSONB NOT NULL);
//! CREATE TABLE document_counters (kind TEXT PRIMARY KEY, next BIGINT NOT NULL);
//! ```
//!
//! [`PostgresLedgerStore::ensure_schema`] creates these tables if missing.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerStoreError | Scenario |
//! |------------|----------------------|------------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Insert with an id that already exists |
//! | Database (serialization / deadlock) | `40001`, `40P01` | `Concurrency` | Transactions collided; caller retries |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / RowNotFound / Other | N/A | `Storage` | Pool shutdown, network failures, decode errors |
//!
//! ## Concurrency
//!
//! Commits run in a transaction that locks the parent row with
//! `SELECT ... FOR UPDATE` before checking the expected version, so
//! concurrent committers serialize on the parent. Locks are always taken
//! parent-order first, then invoice, so the payment path cannot deadlock
//! against the order-level paths. An error on any step drops the
//! transaction, which rolls it back.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use tradebook_core::{DocumentKind, DocumentNumber, ExpectedVersion};
use tradebook_documents::{
    Invoice, InvoiceId, PaymentRecord, PurchaseOrder, PurchaseOrderId, Quotation, QuotationId,
    Receipt, SalesOrder, SalesOrderId, Shipment,
};
use tradebook_reconcile::sales_order_payment_progress;

use super::checks::{self, check_version};
use super::r#trait::{
    InvoiceSnapshot, LedgerStore, LedgerStoreError, PurchaseOrderSnapshot, SalesOrderSnapshot,
    Versioned,
};
use crate::numbering::NumberAllocator;

const SCHEMA: [&str; 8] = [
    "CREATE TABLE IF NOT EXISTS quotations (id UUID PRIMARY KEY, version BIGINT NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS sales_orders (id UUID PRIMARY KEY, version BIGINT NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS purchase_orders (id UUID PRIMARY KEY, version BIGINT NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS invoices (id UUID PRIMARY KEY, sales_order_id UUID NOT NULL, version BIGINT NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS shipments (id UUID PRIMARY KEY, sales_order_id UUID NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS receipts (id UUID PRIMARY KEY, purchase_order_id UUID NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS payments (id UUID PRIMARY KEY, invoice_id UUID NOT NULL, record JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS document_counters (kind TEXT PRIMARY KEY, next BIGINT NOT NULL)",
];

/// Postgres implementation of [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the ledger tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), LedgerStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Open a transaction with a consistent snapshot for multi-query reads.
    async fn read_tx(&self) -> Result<Transaction<'_, Postgres>, LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        Ok(tx)
    }
}

fn encode<T: Serialize>(what: &str, value: &T) -> Result<serde_json::Value, LedgerStoreError> {
    serde_json::to_value(value)
        .map_err(|e| LedgerStoreError::Storage(format!("failed to encode {what}: {e}")))
}

fn decode<T: DeserializeOwned>(
    what: &str,
    value: serde_json::Value,
) -> Result<T, LedgerStoreError> {
    serde_json::from_value(value)
        .map_err(|e| LedgerStoreError::Storage(format!("failed to decode {what}: {e}")))
}

fn decode_records<T: DeserializeOwned>(
    what: &str,
    rows: Vec<PgRow>,
) -> Result<Vec<T>, LedgerStoreError> {
    rows.into_iter()
        .map(|row| {
            let value: serde_json::Value = row
                .try_get("record")
                .map_err(|e| map_sqlx_error(what, e))?;
            decode(what, value)
        })
        .collect()
}

/// Map SQLx errors to [`LedgerStoreError`].
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => LedgerStoreError::Duplicate(msg),
                Some("40001") | Some("40P01") => LedgerStoreError::Concurrency(msg),
                _ => LedgerStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            LedgerStoreError::Storage(format!("unexpected missing row in {operation}"))
        }
        other => LedgerStoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

/// Lock a parent row and return its current version.
async fn lock_row(
    tx: &mut Transaction<'_, Postgres>,
    query: &'static str,
    what: &str,
    id: &uuid::Uuid,
) -> Result<u64, LedgerStoreError> {
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(what, e))?
        .ok_or_else(|| LedgerStoreError::NotFound(format!("{what} {id}")))?;
    let version: i64 = row.try_get("version").map_err(|e| map_sqlx_error(what, e))?;
    Ok(version as u64)
}

async fn invoices_of_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: SalesOrderId,
) -> Result<Vec<Invoice>, LedgerStoreError> {
    let rows = sqlx::query("SELECT record FROM invoices WHERE sales_order_id = $1")
        .bind(order_id.0.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_invoices", e))?;
    let mut invoices: Vec<Invoice> = decode_records("invoice", rows)?;
    invoices.sort_by_key(|invoice| invoice.number().sequence());
    Ok(invoices)
}

async fn shipments_of_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: SalesOrderId,
) -> Result<Vec<Shipment>, LedgerStoreError> {
    let rows = sqlx::query("SELECT record FROM shipments WHERE sales_order_id = $1")
        .bind(order_id.0.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_shipments", e))?;
    let mut shipments: Vec<Shipment> = decode_records("shipment", rows)?;
    shipments.sort_by_key(Shipment::shipped_at);
    Ok(shipments)
}

async fn payments_of_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: SalesOrderId,
) -> Result<Vec<PaymentRecord>, LedgerStoreError> {
    let rows = sqlx::query(
        "SELECT p.record FROM payments p \
         JOIN invoices i ON p.invoice_id = i.id \
         WHERE i.sales_order_id = $1",
    )
    .bind(order_id.0.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_payments", e))?;
    decode_records("payment", rows)
}

async fn payments_of_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: InvoiceId,
) -> Result<Vec<PaymentRecord>, LedgerStoreError> {
    let rows = sqlx::query("SELECT record FROM payments WHERE invoice_id = $1")
        .bind(invoice_id.0.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_payments", e))?;
    decode_records("payment", rows)
}

async fn receipts_of_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: PurchaseOrderId,
) -> Result<Vec<Receipt>, LedgerStoreError> {
    let rows = sqlx::query("SELECT record FROM receipts WHERE purchase_order_id = $1")
        .bind(order_id.0.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_receipts", e))?;
    let mut receipts: Vec<Receipt> = decode_records("receipt", rows)?;
    receipts.sort_by_key(Receipt::received_at);
    Ok(receipts)
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, quotation), fields(quotation_id = %quotation.id()), err)]
    async fn insert_quotation(&self, quotation: Quotation) -> Result<(), LedgerStoreError> {
        let record = encode("quotation", &quotation)?;
        sqlx::query("INSERT INTO quotations (id, version, record) VALUES ($1, 1, $2)")
            .bind(quotation.id().0.as_uuid())
            .bind(record)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_quotation", e))?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(sales_order_id = %order.id()), err)]
    async fn insert_sales_order(&self, order: SalesOrder) -> Result<(), LedgerStoreError> {
        let record = encode("sales order", &order)?;
        sqlx::query("INSERT INTO sales_orders (id, version, record) VALUES ($1, 1, $2)")
            .bind(order.id().0.as_uuid())
            .bind(record)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_sales_order", e))?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(purchase_order_id = %order.id()), err)]
    async fn insert_purchase_order(&self, order: PurchaseOrder) -> Result<(), LedgerStoreError> {
        let record = encode("purchase order", &order)?;
        sqlx::query("INSERT INTO purchase_orders (id, version, record) VALUES ($1, 1, $2)")
            .bind(order.id().0.as_uuid())
            .bind(record)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_purchase_order", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(quotation_id = %id), err)]
    async fn load_quotation(
        &self,
        id: QuotationId,
    ) -> Result<Versioned<Quotation>, LedgerStoreError> {
        let row = sqlx::query("SELECT version, record FROM quotations WHERE id = $1")
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_quotation", e))?
            .ok_or_else(|| LedgerStoreError::NotFound(format!("quotation {id}")))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("load_quotation", e))?;
        let record: serde_json::Value = row
            .try_get("record")
            .map_err(|e| map_sqlx_error("load_quotation", e))?;
        Ok(Versioned {
            version: version as u64,
            record: decode("quotation", record)?,
        })
    }

    #[instrument(skip(self), fields(sales_order_id = %id), err)]
    async fn load_sales_order(
        &self,
        id: SalesOrderId,
    ) -> Result<SalesOrderSnapshot, LedgerStoreError> {
        let mut tx = self.read_tx().await?;
        let row = sqlx::query("SELECT version, record FROM sales_orders WHERE id = $1")
            .bind(id.0.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_sales_order", e))?
            .ok_or_else(|| LedgerStoreError::NotFound(format!("sales order {id}")))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("load_sales_order", e))?;
        let record: serde_json::Value = row
            .try_get("record")
            .map_err(|e| map_sqlx_error("load_sales_order", e))?;

        let snapshot = SalesOrderSnapshot {
            version: version as u64,
            order: decode("sales order", record)?,
            invoices: invoices_of_order(&mut tx, id).await?,
            shipments: shipments_of_order(&mut tx, id).await?,
            payments: payments_of_order(&mut tx, id).await?,
        };
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(purchase_order_id = %id), err)]
    async fn load_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<PurchaseOrderSnapshot, LedgerStoreError> {
        let mut tx = self.read_tx().await?;
        let row = sqlx::query("SELECT version, record FROM purchase_orders WHERE id = $1")
            .bind(id.0.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_purchase_order", e))?
            .ok_or_else(|| LedgerStoreError::NotFound(format!("purchase order {id}")))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("load_purchase_order", e))?;
        let record: serde_json::Value = row
            .try_get("record")
            .map_err(|e| map_sqlx_error("load_purchase_order", e))?;

        let snapshot = PurchaseOrderSnapshot {
            version: version as u64,
            order: decode("purchase order", record)?,
            receipts: receipts_of_order(&mut tx, id).await?,
        };
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn load_invoice(&self, id: InvoiceId) -> Result<InvoiceSnapshot, LedgerStoreError> {
        let mut tx = self.read_tx().await?;
        let row = sqlx::query("SELECT version, record FROM invoices WHERE id = $1")
            .bind(id.0.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_invoice", e))?
            .ok_or_else(|| LedgerStoreError::NotFound(format!("invoice {id}")))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("load_invoice", e))?;
        let record: serde_json::Value = row
            .try_get("record")
            .map_err(|e| map_sqlx_error("load_invoice", e))?;

        let snapshot = InvoiceSnapshot {
            version: version as u64,
            invoice: decode("invoice", record)?,
            payments: payments_of_invoice(&mut tx, id).await?,
        };
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(snapshot)
    }

    #[instrument(skip(self), err)]
    async fn list_quotations(&self) -> Result<Vec<Quotation>, LedgerStoreError> {
        let rows = sqlx::query("SELECT record FROM quotations")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_quotations", e))?;
        let mut quotations: Vec<Quotation> = decode_records("quotation", rows)?;
        quotations.sort_by_key(|q| q.number().sequence());
        Ok(quotations)
    }

    #[instrument(skip(self), err)]
    async fn list_sales_orders(&self) -> Result<Vec<SalesOrder>, LedgerStoreError> {
        let rows = sqlx::query("SELECT record FROM sales_orders")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_sales_orders", e))?;
        let mut orders: Vec<SalesOrder> = decode_records("sales order", rows)?;
        orders.sort_by_key(|o| o.number().sequence());
        Ok(orders)
    }

    #[instrument(skip(self), err)]
    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, LedgerStoreError> {
        let rows = sqlx::query("SELECT record FROM purchase_orders")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_purchase_orders", e))?;
        let mut orders: Vec<PurchaseOrder> = decode_records("purchase order", rows)?;
        orders.sort_by_key(|o| o.number().sequence());
        Ok(orders)
    }

    #[instrument(
        skip(self, quotation, order),
        fields(quotation_id = %quotation.id(), sales_order_id = %order.id()),
        err
    )]
    async fn commit_conversion(
        &self,
        expected: ExpectedVersion,
        quotation: Quotation,
        order: SalesOrder,
    ) -> Result<(), LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let quotation_id = quotation.id();
        let current = lock_row(
            &mut tx,
            "SELECT version FROM quotations WHERE id = $1 FOR UPDATE",
            "quotation",
            quotation_id.0.as_uuid(),
        )
        .await?;
        check_version("quotation", expected, current)?;
        checks::verify_conversion_commit(&quotation, &order)?;

        let quotation_record = encode("quotation", &quotation)?;
        sqlx::query("UPDATE quotations SET version = version + 1, record = $2 WHERE id = $1")
            .bind(quotation_id.0.as_uuid())
            .bind(quotation_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_quotation", e))?;

        let order_record = encode("sales order", &order)?;
        sqlx::query("INSERT INTO sales_orders (id, version, record) VALUES ($1, 1, $2)")
            .bind(order.id().0.as_uuid())
            .bind(order_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_sales_order", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(
        skip(self, order, invoice),
        fields(sales_order_id = %order.id(), invoice_id = %invoice.id()),
        err
    )]
    async fn commit_invoice(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        invoice: Invoice,
    ) -> Result<(), LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let order_id = order.id();
        let current = lock_row(
            &mut tx,
            "SELECT version FROM sales_orders WHERE id = $1 FOR UPDATE",
            "sales order",
            order_id.0.as_uuid(),
        )
        .await?;
        check_version("sales order", expected, current)?;

        let siblings = invoices_of_order(&mut tx, order_id).await?;
        let shipments = shipments_of_order(&mut tx, order_id).await?;
        let payments = payments_of_order(&mut tx, order_id).await?;
        checks::verify_invoice_commit(&order, &invoice, &siblings, &shipments, &payments)?;

        let order_record = encode("sales order", &order)?;
        sqlx::query("UPDATE sales_orders SET version = version + 1, record = $2 WHERE id = $1")
            .bind(order_id.0.as_uuid())
            .bind(order_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_sales_order", e))?;

        let invoice_record = encode("invoice", &invoice)?;
        sqlx::query(
            "INSERT INTO invoices (id, sales_order_id, version, record) VALUES ($1, $2, 1, $3)",
        )
        .bind(invoice.id().0.as_uuid())
        .bind(order_id.0.as_uuid())
        .bind(invoice_record)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(
        skip(self, order, shipment),
        fields(sales_order_id = %order.id(), shipment_id = %shipment.id()),
        err
    )]
    async fn commit_shipment(
        &self,
        expected: ExpectedVersion,
        order: SalesOrder,
        shipment: Shipment,
    ) -> Result<(), LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let order_id = order.id();
        let current = lock_row(
            &mut tx,
            "SELECT version FROM sales_orders WHERE id = $1 FOR UPDATE",
            "sales order",
            order_id.0.as_uuid(),
        )
        .await?;
        check_version("sales order", expected, current)?;

        let invoices = invoices_of_order(&mut tx, order_id).await?;
        let siblings = shipments_of_order(&mut tx, order_id).await?;
        let payments = payments_of_order(&mut tx, order_id).await?;
        checks::verify_shipment_commit(&order, &shipment, &invoices, &siblings, &payments)?;

        let order_record = encode("sales order", &order)?;
        sqlx::query("UPDATE sales_orders SET version = version + 1, record = $2 WHERE id = $1")
            .bind(order_id.0.as_uuid())
            .bind(order_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_sales_order", e))?;

        let shipment_record = encode("shipment", &shipment)?;
        sqlx::query("INSERT INTO shipments (id, sales_order_id, record) VALUES ($1, $2, $3)")
            .bind(shipment.id().0.as_uuid())
            .bind(order_id.0.as_uuid())
            .bind(shipment_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_shipment", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(
        skip(self, order, receipt),
        fields(purchase_order_id = %order.id(), receipt_id = %receipt.id()),
        err
    )]
    async fn commit_receipt(
        &self,
        expected: ExpectedVersion,
        order: PurchaseOrder,
        receipt: Receipt,
    ) -> Result<(), LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let order_id = order.id();
        let current = lock_row(
            &mut tx,
            "SELECT version FROM purchase_orders WHERE id = $1 FOR UPDATE",
            "purchase order",
            order_id.0.as_uuid(),
        )
        .await?;
        check_version("purchase order", expected, current)?;

        let siblings = receipts_of_order(&mut tx, order_id).await?;
        checks::verify_receipt_commit(&order, &receipt, &siblings)?;

        let order_record = encode("purchase order", &order)?;
        sqlx::query("UPDATE purchase_orders SET version = version + 1, record = $2 WHERE id = $1")
            .bind(order_id.0.as_uuid())
            .bind(order_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_purchase_order", e))?;

        let receipt_record = encode("receipt", &receipt)?;
        sqlx::query("INSERT INTO receipts (id, purchase_order_id, record) VALUES ($1, $2, $3)")
            .bind(receipt.id().0.as_uuid())
            .bind(order_id.0.as_uuid())
            .bind(receipt_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_receipt", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(
        skip(self, invoice, payment),
        fields(invoice_id = %invoice.id(), payment_id = %payment.id),
        err
    )]
    async fn commit_payment(
        &self,
        expected: ExpectedVersion,
        invoice: Invoice,
        payment: PaymentRecord,
    ) -> Result<(), LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let invoice_id = invoice.id();
        let order_id = invoice.sales_order_id();

        // Lock the parent order first, then the invoice, matching the lock
        // order of the order-level commit paths.
        let order_row = sqlx::query("SELECT record FROM sales_orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.0.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_sales_order", e))?
            .ok_or_else(|| {
                LedgerStoreError::Invariant(format!(
                    "invoice {invoice_id} references missing sales order {order_id}"
                ))
            })?;
        let current = lock_row(
            &mut tx,
            "SELECT version FROM invoices WHERE id = $1 FOR UPDATE",
            "invoice",
            invoice_id.0.as_uuid(),
        )
        .await?;
        check_version("invoice", expected, current)?;

        let prior = payments_of_invoice(&mut tx, invoice_id).await?;
        checks::verify_payment_commit(&invoice, &payment, &prior)?;

        // Re-derive the order's transitive payment progress from the
        // post-commit ledger; the order is not version-guarded on this path.
        let order_value: serde_json::Value = order_row
            .try_get("record")
            .map_err(|e| map_sqlx_error("lock_sales_order", e))?;
        let stored_order: SalesOrder = decode("sales order", order_value)?;
        let invoices_after: Vec<Invoice> = invoices_of_order(&mut tx, order_id)
            .await?
            .into_iter()
            .map(|i| if i.id() == invoice_id { invoice.clone() } else { i })
            .collect();
        let mut payments_after = payments_of_order(&mut tx, order_id).await?;
        payments_after.push(payment.clone());
        let progress = sales_order_payment_progress(&invoices_after, &payments_after);
        let updated_order = stored_order.with_derived_statuses(
            stored_order.invoice_coverage(),
            stored_order.shipment_coverage(),
            progress,
        );

        let invoice_record = encode("invoice", &invoice)?;
        sqlx::query("UPDATE invoices SET version = version + 1, record = $2 WHERE id = $1")
            .bind(invoice_id.0.as_uuid())
            .bind(invoice_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_invoice", e))?;

        let payment_record = encode("payment", &payment)?;
        sqlx::query("INSERT INTO payments (id, invoice_id, record) VALUES ($1, $2, $3)")
            .bind(payment.id.as_uuid())
            .bind(invoice_id.0.as_uuid())
            .bind(payment_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", e))?;

        let order_record = encode("sales order", &updated_order)?;
        // Bump the order version so in-flight order-level commits retry
        // instead of persisting a stale payment status.
        sqlx::query("UPDATE sales_orders SET version = version + 1, record = $2 WHERE id = $1")
            .bind(order_id.0.as_uuid())
            .bind(order_record)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_sales_order", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

/// Postgres-backed number allocator.
///
/// One upsert per allocation: the counter row is created on first use seeded
/// at the kind's starting sequence, then incremented atomically. Numbers
/// handed to commits that never land are gaps, never reused.
#[derive(Debug, Clone)]
pub struct PostgresNumberAllocator {
    pool: Arc<PgPool>,
}

impl PostgresNumberAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl NumberAllocator for PostgresNumberAllocator {
    #[instrument(skip(self), err)]
    async fn allocate(&self, kind: DocumentKind) -> Result<DocumentNumber, LedgerStoreError> {
        let row = sqlx::query(
            "INSERT INTO document_counters (kind, next) VALUES ($1, $2) \
             ON CONFLICT (kind) DO UPDATE SET next = document_counters.next + 1 \
             RETURNING next - 1 AS sequence",
        )
        .bind(kind.prefix())
        .bind((kind.seed() + 1) as i64)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("allocate_number", e))?;
        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| map_sqlx_error("allocate_number", e))?;
        Ok(DocumentNumber::new(kind, sequence as u64))
    }
}
