//! `tradebook-documents` — the commercial document records.
//!
//! Parent documents (quotation, sales order, purchase order) own line items;
//! fulfillment documents (invoice, shipment, receipt) and payments consume
//! their capacity. Everything here is plain data with constructor validation;
//! quantity arithmetic and status derivation live in `tradebook-reconcile`.

pub mod fulfillment;
pub mod invoice;
pub mod line_item;
pub mod payment;
pub mod purchase_order;
pub mod quotation;
pub mod receipt;
pub mod sales_order;
pub mod shipment;

pub use fulfillment::FulfillmentLine;
pub use invoice::{Invoice, InvoiceId};
pub use line_item::LineItem;
pub use payment::PaymentRecord;
pub use purchase_order::{PurchaseOrder, PurchaseOrderId};
pub use quotation::{Quotation, QuotationId, QuotationStatus};
pub use receipt::{Receipt, ReceiptId};
pub use sales_order::{SalesOrder, SalesOrderId};
pub use shipment::{Shipment, ShipmentId};
