use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradebook_core::{round_money, DomainError, DomainResult, LineItemId, ProductId};

/// A line of a parent document: product, ordered quantity, pricing.
///
/// Immutable once created; fulfillment consumes its capacity but never edits
/// it. Quantities and amounts are exact decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    id: LineItemId,
    product_id: ProductId,
    product_name: String,
    quantity_ordered: Decimal,
    unit_price: Decimal,
    tax_rate: Decimal,
}

impl LineItem {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity_ordered: Decimal,
        unit_price: Decimal,
        tax_rate: Decimal,
    ) -> DomainResult<Self> {
        let product_name = product_name.into();
        if product_name.trim().is_empty() {
            return Err(DomainError::validation("product_name must not be empty"));
        }
        if quantity_ordered < Decimal::ZERO {
            return Err(DomainError::validation(
                "quantity_ordered must not be negative",
            ));
        }
        if unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit_price must not be negative"));
        }
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(DomainError::validation(
                "tax_rate must be a fraction between 0 and 1",
            ));
        }

        Ok(Self {
            id: LineItemId::new(),
            product_id,
            product_name,
            quantity_ordered,
            unit_price,
            tax_rate,
        })
    }

    pub fn id(&self) -> LineItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity_ordered(&self) -> Decimal {
        self.quantity_ordered
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Net amount: `quantity_ordered × unit_price`, rounded to money precision.
    pub fn line_total(&self) -> DomainResult<Decimal> {
        let total = self
            .quantity_ordered
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::invariant("line total overflowed"))?;
        Ok(round_money(total))
    }

    /// Tax amount: `line_total × tax_rate`, rounded to money precision.
    pub fn line_tax(&self) -> DomainResult<Decimal> {
        let tax = self
            .line_total()?
            .checked_mul(self.tax_rate)
            .ok_or_else(|| DomainError::invariant("line tax overflowed"))?;
        Ok(round_money(tax))
    }
}
