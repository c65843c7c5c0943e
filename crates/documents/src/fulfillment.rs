use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradebook_core::LineItemId;

/// One quantity consumed from a parent line item.
///
/// The same shape serves as a request line (before validation) and as the
/// committed, append-only record stored inside an invoice, shipment, or
/// receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentLine {
    pub line_item_id: LineItemId,
    pub quantity: Decimal,
}

impl FulfillmentLine {
    pub fn new(line_item_id: LineItemId, quantity: Decimal) -> Self {
        Self {
            line_item_id,
            quantity,
        }
    }
}
