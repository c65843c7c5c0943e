//! Transactional ledger storage boundary.
//!
//! This module defines the storage abstraction for linked commercial
//! documents without making any backend assumptions. Both backends enforce
//! the same commit-time invariants through [`checks`]: a version-guarded
//! parent update, quantity conservation, and stored statuses that match a
//! fresh derivation.

mod checks;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::{PostgresLedgerStore, PostgresNumberAllocator};
pub use r#trait::{
    InvoiceSnapshot, LedgerStore, LedgerStoreError, PurchaseOrderSnapshot, SalesOrderSnapshot,
    Versioned,
};
