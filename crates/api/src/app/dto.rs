use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use tradebook_core::{
    Coverage, EffectivePaymentStatus, LineItemId, PaymentProgress, ProductId,
};
use tradebook_documents::{
    FulfillmentLine, Invoice, LineItem, PaymentRecord, PurchaseOrder, Quotation, QuotationStatus,
    Receipt, SalesOrder, Shipment,
};
use tradebook_infra::ledger::{InvoiceSnapshot, PurchaseOrderSnapshot, SalesOrderSnapshot};
use tradebook_infra::orchestrator::{LineSelection, NewLineItem};
use tradebook_infra::projections::{InvoiceBalance, PurchaseOrderRemaining, SalesOrderRemaining};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    /// Omit to mint a fresh product id (ad-hoc line).
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub customer: String,
    pub lines: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderRequest {
    pub customer: String,
    pub lines: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub supplier: String,
    pub lines: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentLineRequest {
    pub line_item_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    /// Omit to invoice everything still open on the order.
    pub lines: Option<Vec<FulfillmentLineRequest>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    /// Omit to ship everything still open on the order.
    pub lines: Option<Vec<FulfillmentLineRequest>>,
    pub shipped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReceiptRequest {
    /// Omit to receive everything still open on the order.
    pub lines: Option<Vec<FulfillmentLineRequest>>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

// -------------------------
// Request -> command helpers
// -------------------------

pub fn to_new_lines(
    req_lines: Vec<LineItemRequest>,
) -> Result<Vec<NewLineItem>, axum::response::Response> {
    let mut lines = Vec::with_capacity(req_lines.len());
    for l in req_lines {
        let product_id = match l.product_id {
            Some(raw) => match raw.parse::<ProductId>() {
                Ok(id) => id,
                Err(_) => {
                    return Err(errors::json_error(
                        axum::http::StatusCode::BAD_REQUEST,
                        "invalid_id",
                        "invalid product id",
                    ))
                }
            },
            None => ProductId::new(),
        };
        lines.push(NewLineItem {
            product_id,
            product_name: l.product_name,
            quantity: l.quantity,
            unit_price: l.unit_price,
            tax_rate: l.tax_rate,
        });
    }
    Ok(lines)
}

pub fn to_line_selection(
    req_lines: Option<Vec<FulfillmentLineRequest>>,
) -> Result<LineSelection, axum::response::Response> {
    let Some(req_lines) = req_lines else {
        return Ok(LineSelection::AllRemaining);
    };
    let mut lines = Vec::with_capacity(req_lines.len());
    for l in req_lines {
        let line_item_id = match l.line_item_id.parse::<LineItemId>() {
            Ok(id) => id,
            Err(_) => {
                return Err(errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid line item id",
                ))
            }
        };
        lines.push(FulfillmentLine::new(line_item_id, l.quantity));
    }
    Ok(LineSelection::Lines(lines))
}

// -------------------------
// Wire labels for derived statuses
// -------------------------

pub fn invoice_coverage_label(coverage: Coverage) -> &'static str {
    match coverage {
        Coverage::None => "not_invoiced",
        Coverage::Partial => "partially_invoiced",
        Coverage::Full => "invoiced",
    }
}

pub fn shipment_coverage_label(coverage: Coverage) -> &'static str {
    match coverage {
        Coverage::None => "not_shipped",
        Coverage::Partial => "partially_shipped",
        Coverage::Full => "shipped",
    }
}

pub fn receipt_coverage_label(coverage: Coverage) -> &'static str {
    match coverage {
        Coverage::None => "not_received",
        Coverage::Partial => "partially_received",
        Coverage::Full => "received",
    }
}

pub fn payment_progress_label(progress: PaymentProgress) -> &'static str {
    match progress {
        PaymentProgress::Unpaid => "unpaid",
        PaymentProgress::Partial => "partially_paid",
        PaymentProgress::Paid => "paid",
    }
}

pub fn effective_status_label(status: EffectivePaymentStatus) -> &'static str {
    match status {
        EffectivePaymentStatus::Unpaid => "unpaid",
        EffectivePaymentStatus::Partial => "partially_paid",
        EffectivePaymentStatus::Paid => "paid",
        EffectivePaymentStatus::Overdue => "overdue",
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn line_item_to_json(line: &LineItem) -> serde_json::Value {
    serde_json::json!({
        "id": line.id().to_string(),
        "product_id": line.product_id().to_string(),
        "product_name": line.product_name(),
        "quantity": line.quantity_ordered(),
        "unit_price": line.unit_price(),
        "tax_rate": line.tax_rate(),
        "line_total": line.line_total().ok(),
    })
}

pub fn fulfillment_line_to_json(line: &FulfillmentLine) -> serde_json::Value {
    serde_json::json!({
        "line_item_id": line.line_item_id.to_string(),
        "quantity": line.quantity,
    })
}

pub fn quotation_to_json(quotation: &Quotation) -> serde_json::Value {
    serde_json::json!({
        "id": quotation.id().to_string(),
        "number": quotation.number().to_string(),
        "customer": quotation.customer(),
        "status": match quotation.status() {
            QuotationStatus::Open => "open",
            QuotationStatus::Converted => "converted",
        },
        "converted_to": quotation.converted_to().map(|id| id.to_string()),
        "created_at": quotation.created_at(),
        "lines": quotation.lines().iter().map(line_item_to_json).collect::<Vec<_>>(),
    })
}

pub fn sales_order_to_json(order: &SalesOrder) -> serde_json::Value {
    serde_json::json!({
        "id": order.id().to_string(),
        "number": order.number().to_string(),
        "customer": order.customer(),
        "quotation_id": order.quotation_id().map(|id| id.to_string()),
        "invoice_status": invoice_coverage_label(order.invoice_coverage()),
        "shipment_status": shipment_coverage_label(order.shipment_coverage()),
        "payment_status": payment_progress_label(order.payment_progress()),
        "created_at": order.created_at(),
        "lines": order.lines().iter().map(line_item_to_json).collect::<Vec<_>>(),
    })
}

pub fn sales_order_detail_to_json(snapshot: &SalesOrderSnapshot) -> serde_json::Value {
    let mut body = sales_order_to_json(&snapshot.order);
    body["invoices"] = snapshot.invoices.iter().map(invoice_to_json).collect::<Vec<_>>().into();
    body["shipments"] = snapshot.shipments.iter().map(shipment_to_json).collect::<Vec<_>>().into();
    body["payments"] = snapshot.payments.iter().map(payment_to_json).collect::<Vec<_>>().into();
    body
}

pub fn purchase_order_to_json(order: &PurchaseOrder) -> serde_json::Value {
    serde_json::json!({
        "id": order.id().to_string(),
        "number": order.number().to_string(),
        "supplier": order.supplier(),
        "receipt_status": receipt_coverage_label(order.receipt_coverage()),
        "created_at": order.created_at(),
        "lines": order.lines().iter().map(line_item_to_json).collect::<Vec<_>>(),
    })
}

pub fn purchase_order_detail_to_json(snapshot: &PurchaseOrderSnapshot) -> serde_json::Value {
    let mut body = purchase_order_to_json(&snapshot.order);
    body["receipts"] = snapshot.receipts.iter().map(receipt_to_json).collect::<Vec<_>>().into();
    body
}

pub fn invoice_to_json(invoice: &Invoice) -> serde_json::Value {
    serde_json::json!({
        "id": invoice.id().to_string(),
        "number": invoice.number().to_string(),
        "sales_order_id": invoice.sales_order_id().to_string(),
        "total": invoice.total(),
        "issued_at": invoice.issued_at(),
        "due_date": invoice.due_date(),
        "payment_status": payment_progress_label(invoice.payment_progress()),
        "lines": invoice.lines().iter().map(fulfillment_line_to_json).collect::<Vec<_>>(),
    })
}

pub fn invoice_detail_to_json(snapshot: &InvoiceSnapshot) -> serde_json::Value {
    let mut body = invoice_to_json(&snapshot.invoice);
    body["payments"] = snapshot.payments.iter().map(payment_to_json).collect::<Vec<_>>().into();
    body
}

pub fn shipment_to_json(shipment: &Shipment) -> serde_json::Value {
    serde_json::json!({
        "id": shipment.id().to_string(),
        "sales_order_id": shipment.sales_order_id().to_string(),
        "shipped_at": shipment.shipped_at(),
        "lines": shipment.lines().iter().map(fulfillment_line_to_json).collect::<Vec<_>>(),
    })
}

pub fn receipt_to_json(receipt: &Receipt) -> serde_json::Value {
    serde_json::json!({
        "id": receipt.id().to_string(),
        "purchase_order_id": receipt.purchase_order_id().to_string(),
        "received_at": receipt.received_at(),
        "lines": receipt.lines().iter().map(fulfillment_line_to_json).collect::<Vec<_>>(),
    })
}

pub fn payment_to_json(payment: &PaymentRecord) -> serde_json::Value {
    serde_json::json!({
        "id": payment.id.to_string(),
        "invoice_id": payment.invoice_id.to_string(),
        "amount": payment.amount,
        "paid_at": payment.paid_at,
    })
}

pub fn sales_order_remaining_to_json(view: &SalesOrderRemaining) -> serde_json::Value {
    serde_json::json!({
        "sales_order_id": view.sales_order_id.to_string(),
        "lines": view.lines.iter().map(|l| serde_json::json!({
            "line_item_id": l.line_item_id.to_string(),
            "product_name": l.product_name,
            "ordered": l.ordered,
            "invoiced": l.invoiced,
            "shipped": l.shipped,
            "remaining_to_invoice": l.remaining_to_invoice,
            "remaining_to_ship": l.remaining_to_ship,
        })).collect::<Vec<_>>(),
    })
}

pub fn purchase_order_remaining_to_json(view: &PurchaseOrderRemaining) -> serde_json::Value {
    serde_json::json!({
        "purchase_order_id": view.purchase_order_id.to_string(),
        "lines": view.lines.iter().map(|l| serde_json::json!({
            "line_item_id": l.line_item_id.to_string(),
            "product_name": l.product_name,
            "ordered": l.ordered,
            "received": l.received,
            "remaining_to_receive": l.remaining_to_receive,
        })).collect::<Vec<_>>(),
    })
}

pub fn invoice_balance_to_json(view: &InvoiceBalance) -> serde_json::Value {
    serde_json::json!({
        "invoice_id": view.invoice_id.to_string(),
        "total": view.total,
        "paid": view.paid,
        "balance": view.balance,
        "payment_status": payment_progress_label(view.progress),
        "effective_status": effective_status_label(view.effective),
    })
}
