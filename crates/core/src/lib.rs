//! `tradebook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;
pub mod number;
pub mod status;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{DocumentId, LineItemId, PaymentId, ProductId};
pub use money::{covers, round_money, MONEY_TOLERANCE};
pub use number::{DocumentKind, DocumentNumber};
pub use status::{Coverage, EffectivePaymentStatus, PaymentProgress};
pub use version::ExpectedVersion;
