//! Infrastructure layer: ledger storage, numbering, orchestration.

pub mod ledger;
pub mod numbering;
pub mod orchestrator;
pub mod projections;

pub use ledger::{
    InMemoryLedgerStore, InvoiceSnapshot, LedgerStore, LedgerStoreError, PostgresLedgerStore,
    PostgresNumberAllocator, PurchaseOrderSnapshot, SalesOrderSnapshot, Versioned,
};
pub use numbering::{AtomicNumberAllocator, NumberAllocator};
pub use orchestrator::{
    DEFAULT_MAX_RETRIES, FulfillmentCommit, FulfillmentOrchestrator, InvoiceRequest,
    LineSelection, NewLineItem, NewPurchaseOrder, NewQuotation, NewSalesOrder, PaymentCommit,
    PaymentRequest, ReceiptRequest, ShipmentRequest,
};
