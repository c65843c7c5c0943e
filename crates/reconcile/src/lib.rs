//! `tradebook-reconcile` — pure quantity and status reconciliation.
//!
//! The single home for remaining-capacity arithmetic, fulfillment
//! validation, and status derivation. Every function takes snapshots and
//! returns values; persistence and locking live in `tradebook-infra`.

pub mod coverage;
pub mod payment;
pub mod quantity;

pub use coverage::line_coverage;
pub use payment::{
    balance, effective_payment_status, invoice_payment_progress, paid_total, payment_progress,
    sales_order_payment_progress, validate_payment,
};
pub use quantity::{
    check_conservation, consumed, fulfill_all_remaining, normalize_lines, recorded_lines,
    remaining, validate_batch, validate_fulfillment_request,
};
