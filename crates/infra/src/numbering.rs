//! Document number allocation.
//!
//! Numbers come from per-kind counters seeded at each kind's starting
//! sequence. Allocation is atomic and never hands the same number out twice,
//! but it sits on the commit path after validation: a commit that retries or
//! fails abandons its number, leaving a gap in the sequence. Gaps are
//! acceptable; duplicates are not.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use tradebook_core::{DocumentKind, DocumentNumber};

use crate::ledger::LedgerStoreError;

/// Allocator for the numbered document kinds.
#[async_trait]
pub trait NumberAllocator: Send + Sync {
    /// Allocate the next number for `kind`.
    async fn allocate(&self, kind: DocumentKind) -> Result<DocumentNumber, LedgerStoreError>;
}

#[async_trait]
impl<N> NumberAllocator for Arc<N>
where
    N: NumberAllocator + ?Sized,
{
    async fn allocate(&self, kind: DocumentKind) -> Result<DocumentNumber, LedgerStoreError> {
        (**self).allocate(kind).await
    }
}

/// Process-local allocator backed by one atomic counter per document kind.
#[derive(Debug)]
pub struct AtomicNumberAllocator {
    quotations: AtomicU64,
    sales_orders: AtomicU64,
    invoices: AtomicU64,
    purchase_orders: AtomicU64,
}

impl AtomicNumberAllocator {
    pub fn new() -> Self {
        Self {
            quotations: AtomicU64::new(DocumentKind::Quotation.seed()),
            sales_orders: AtomicU64::new(DocumentKind::SalesOrder.seed()),
            invoices: AtomicU64::new(DocumentKind::Invoice.seed()),
            purchase_orders: AtomicU64::new(DocumentKind::PurchaseOrder.seed()),
        }
    }

    fn counter(&self, kind: DocumentKind) -> &AtomicU64 {
        match kind {
            DocumentKind::Quotation => &self.quotations,
            DocumentKind::SalesOrder => &self.sales_orders,
            DocumentKind::Invoice => &self.invoices,
            DocumentKind::PurchaseOrder => &self.purchase_orders,
        }
    }
}

impl Default for AtomicNumberAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NumberAllocator for AtomicNumberAllocator {
    async fn allocate(&self, kind: DocumentKind) -> Result<DocumentNumber, LedgerStoreError> {
        let sequence = self.counter(kind).fetch_add(1, Ordering::Relaxed);
        Ok(DocumentNumber::new(kind, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_allocation_per_kind_starts_at_the_seed() {
        let allocator = AtomicNumberAllocator::new();

        for kind in DocumentKind::ALL {
            let number = allocator.allocate(kind).await.unwrap();
            assert_eq!(number.kind(), kind);
            assert_eq!(number.sequence(), kind.seed());
        }
    }

    #[tokio::test]
    async fn allocations_are_monotonic_per_kind() {
        let allocator = AtomicNumberAllocator::new();

        let first = allocator.allocate(DocumentKind::Invoice).await.unwrap();
        let second = allocator.allocate(DocumentKind::Invoice).await.unwrap();
        let third = allocator.allocate(DocumentKind::Invoice).await.unwrap();
        assert_eq!(first.sequence() + 1, second.sequence());
        assert_eq!(second.sequence() + 1, third.sequence());
    }

    #[tokio::test]
    async fn kinds_do_not_share_counters() {
        let allocator = AtomicNumberAllocator::new();

        allocator.allocate(DocumentKind::Invoice).await.unwrap();
        allocator.allocate(DocumentKind::Invoice).await.unwrap();
        let order = allocator.allocate(DocumentKind::SalesOrder).await.unwrap();
        assert_eq!(order.sequence(), DocumentKind::SalesOrder.seed());
    }

    #[tokio::test]
    async fn formatted_numbers_carry_prefix_and_padding() {
        let allocator = AtomicNumberAllocator::new();

        let number = allocator.allocate(DocumentKind::Quotation).await.unwrap();
        assert_eq!(number.to_string(), "QUO-1000");
    }
}
