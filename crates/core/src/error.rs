//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{DocumentId, LineItemId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A fulfillment request asked for more than a line item has left.
    ///
    /// Always identifies the offending line so callers can point at it.
    #[error("requested {requested} exceeds remaining {remaining} on line item {line_item_id}")]
    CapacityExceeded {
        line_item_id: LineItemId,
        requested: Decimal,
        remaining: Decimal,
    },

    /// A payment would push an invoice past its total.
    #[error("payment of {amount} exceeds outstanding balance {balance} on invoice {invoice_id}")]
    OverPayment {
        invoice_id: DocumentId,
        amount: Decimal,
        balance: Decimal,
    },

    /// Concurrent updates kept winning; the caller should retry.
    #[error("busy: concurrent updates exhausted retries")]
    Busy,

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn capacity_exceeded(
        line_item_id: LineItemId,
        requested: Decimal,
        remaining: Decimal,
    ) -> Self {
        Self::CapacityExceeded {
            line_item_id,
            requested,
            remaining,
        }
    }

    pub fn over_payment(invoice_id: DocumentId, amount: Decimal, balance: Decimal) -> Self {
        Self::OverPayment {
            invoice_id,
            amount,
            balance,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
