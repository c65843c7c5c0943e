use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebook_core::{
    Coverage, DocumentId, DocumentKind, DocumentNumber, DomainError, DomainResult, LineItemId,
};

use crate::line_item::LineItem;

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub DocumentId);

impl PurchaseOrderId {
    pub fn new(id: DocumentId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A purchase order: capacity source for goods receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    number: DocumentNumber,
    supplier: String,
    lines: Vec<LineItem>,
    receipt_coverage: Coverage,
    created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn new(
        id: PurchaseOrderId,
        number: DocumentNumber,
        supplier: impl Into<String>,
        lines: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if number.kind() != DocumentKind::PurchaseOrder {
            return Err(DomainError::invariant(format!(
                "purchase order cannot carry number {number}"
            )));
        }
        let supplier = supplier.into();
        if supplier.trim().is_empty() {
            return Err(DomainError::validation("supplier must not be empty"));
        }
        if lines.is_empty() {
            return Err(DomainError::validation(
                "purchase order requires at least one line item",
            ));
        }

        Ok(Self {
            id,
            number,
            supplier,
            lines,
            receipt_coverage: Coverage::None,
            created_at,
        })
    }

    pub fn id(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn number(&self) -> DocumentNumber {
        self.number
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn receipt_coverage(&self) -> Coverage {
        self.receipt_coverage
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn find_line(&self, line_item_id: LineItemId) -> Option<&LineItem> {
        self.lines.iter().find(|line| line.id() == line_item_id)
    }

    /// Propose a copy with a freshly derived receipt status.
    pub fn with_receipt_coverage(&self, receipt_coverage: Coverage) -> Self {
        let mut next = self.clone();
        next.receipt_coverage = receipt_coverage;
        next
    }
}
