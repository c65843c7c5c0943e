//! Document numbering: per-kind sequences rendered as `PREFIX-NNNN`.

use core::fmt;
use core::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// Document kinds that draw numbers from their own sequence.
///
/// Shipments and receipts are identified by id only and never carry a number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quotation,
    SalesOrder,
    Invoice,
    PurchaseOrder,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Quotation,
        DocumentKind::SalesOrder,
        DocumentKind::Invoice,
        DocumentKind::PurchaseOrder,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Quotation => "QUO",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::Invoice => "INV",
            DocumentKind::PurchaseOrder => "PO",
        }
    }

    /// First number issued for this kind.
    pub fn seed(self) -> u64 {
        match self {
            DocumentKind::Quotation => 1000,
            DocumentKind::SalesOrder => 2000,
            DocumentKind::Invoice => 3000,
            DocumentKind::PurchaseOrder => 4000,
        }
    }
}

/// A document number such as `SO-2041`.
///
/// Numbers are unique and monotonically increasing per kind. Serialized as
/// the formatted string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DocumentNumber {
    kind: DocumentKind,
    sequence: u64,
}

impl DocumentNumber {
    pub fn new(kind: DocumentKind, sequence: u64) -> Self {
        Self { kind, sequence }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}", self.kind.prefix(), self.sequence)
    }
}

impl FromStr for DocumentNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, digits) = s
            .split_once('-')
            .ok_or_else(|| DomainError::invalid_id(format!("DocumentNumber: {s}")))?;
        let kind = DocumentKind::ALL
            .into_iter()
            .find(|kind| kind.prefix() == prefix)
            .ok_or_else(|| DomainError::invalid_id(format!("DocumentNumber prefix: {prefix}")))?;
        let sequence = digits
            .parse::<u64>()
            .map_err(|e| DomainError::invalid_id(format!("DocumentNumber sequence: {e}")))?;
        Ok(Self { kind, sequence })
    }
}

impl Serialize for DocumentNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
