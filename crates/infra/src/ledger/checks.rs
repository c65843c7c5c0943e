//! Write-time consistency checks shared by store implementations.
//!
//! Every commit re-runs conservation and re-derives the statuses the caller
//! proposes to persist, against the ledger state the store actually holds at
//! commit time. A divergence means a caller bug or a torn snapshot, so the
//! write is refused with [`LedgerStoreError::Invariant`] rather than letting
//! a stored status drift away from its derivation.

use rust_decimal::Decimal;

use tradebook_documents::{
    FulfillmentLine, Invoice, PaymentRecord, PurchaseOrder, Quotation, QuotationStatus, Receipt,
    SalesOrder, Shipment,
};
use tradebook_reconcile::{
    check_conservation, line_coverage, paid_total, payment_progress, recorded_lines,
    sales_order_payment_progress,
};

use tradebook_core::ExpectedVersion;

use super::r#trait::LedgerStoreError;

fn invariant(msg: impl Into<String>) -> LedgerStoreError {
    LedgerStoreError::Invariant(msg.into())
}

/// Compare a caller-supplied expected version against the stored one.
pub(crate) fn check_version(
    what: &str,
    expected: ExpectedVersion,
    current: u64,
) -> Result<(), LedgerStoreError> {
    if expected.matches(current) {
        Ok(())
    } else {
        Err(LedgerStoreError::Concurrency(format!(
            "{what}: expected {expected:?}, found {current}"
        )))
    }
}

/// Verify an invoice commit: conservation over all invoice lines including
/// the new document, and the proposed order statuses against re-derivation.
pub(crate) fn verify_invoice_commit(
    order: &SalesOrder,
    invoice: &Invoice,
    sibling_invoices: &[Invoice],
    shipments: &[Shipment],
    payments: &[PaymentRecord],
) -> Result<(), LedgerStoreError> {
    if invoice.sales_order_id() != order.id() {
        return Err(invariant(format!(
            "invoice {} does not reference sales order {}",
            invoice.id(),
            order.id()
        )));
    }

    let mut invoice_lines = recorded_lines(sibling_invoices.iter().map(Invoice::lines));
    invoice_lines.extend(invoice.lines().iter().cloned());
    check_conservation(order.lines(), &invoice_lines).map_err(|e| invariant(e.to_string()))?;

    let shipment_lines = recorded_lines(shipments.iter().map(Shipment::lines));
    let mut invoices_after = sibling_invoices.to_vec();
    invoices_after.push(invoice.clone());

    verify_order_statuses(
        order,
        &invoice_lines,
        &shipment_lines,
        &invoices_after,
        payments,
    )
}

/// Verify a shipment commit: conservation over all shipment lines including
/// the new document, and the proposed order statuses against re-derivation.
pub(crate) fn verify_shipment_commit(
    order: &SalesOrder,
    shipment: &Shipment,
    invoices: &[Invoice],
    sibling_shipments: &[Shipment],
    payments: &[PaymentRecord],
) -> Result<(), LedgerStoreError> {
    if shipment.sales_order_id() != order.id() {
        return Err(invariant(format!(
            "shipment {} does not reference sales order {}",
            shipment.id(),
            order.id()
        )));
    }

    let mut shipment_lines = recorded_lines(sibling_shipments.iter().map(Shipment::lines));
    shipment_lines.extend(shipment.lines().iter().cloned());
    check_conservation(order.lines(), &shipment_lines).map_err(|e| invariant(e.to_string()))?;

    let invoice_lines = recorded_lines(invoices.iter().map(Invoice::lines));

    verify_order_statuses(order, &invoice_lines, &shipment_lines, invoices, payments)
}

/// Verify a receipt commit against the purchase order's receipt ledger.
pub(crate) fn verify_receipt_commit(
    order: &PurchaseOrder,
    receipt: &Receipt,
    sibling_receipts: &[Receipt],
) -> Result<(), LedgerStoreError> {
    if receipt.purchase_order_id() != order.id() {
        return Err(invariant(format!(
            "receipt {} does not reference purchase order {}",
            receipt.id(),
            order.id()
        )));
    }

    let mut receipt_lines = recorded_lines(sibling_receipts.iter().map(Receipt::lines));
    receipt_lines.extend(receipt.lines().iter().cloned());
    check_conservation(order.lines(), &receipt_lines).map_err(|e| invariant(e.to_string()))?;

    let derived = line_coverage(order.lines(), &receipt_lines);
    if derived != order.receipt_coverage() {
        return Err(invariant(format!(
            "purchase order {} receipt status {:?} diverges from derivation {:?}",
            order.id(),
            order.receipt_coverage(),
            derived
        )));
    }
    Ok(())
}

/// Verify a payment commit: the payment must reference the invoice, must not
/// push paid past the invoice total, and the proposed invoice progress must
/// match re-derivation.
pub(crate) fn verify_payment_commit(
    invoice: &Invoice,
    payment: &PaymentRecord,
    prior_payments: &[PaymentRecord],
) -> Result<(), LedgerStoreError> {
    if payment.invoice_id != invoice.id() {
        return Err(invariant(format!(
            "payment {} does not reference invoice {}",
            payment.id,
            invoice.id()
        )));
    }
    if payment.amount <= Decimal::ZERO {
        return Err(invariant(format!(
            "payment {} carries a non-positive amount",
            payment.id
        )));
    }

    let mut payments_after = prior_payments.to_vec();
    payments_after.push(payment.clone());
    let paid = paid_total(invoice, &payments_after);
    if paid > invoice.total() {
        return Err(invariant(format!(
            "payments on invoice {} would exceed its total ({paid} of {})",
            invoice.id(),
            invoice.total()
        )));
    }

    let derived = payment_progress(paid, invoice.total());
    if derived != invoice.payment_progress() {
        return Err(invariant(format!(
            "invoice {} payment status {:?} diverges from derivation {:?}",
            invoice.id(),
            invoice.payment_progress(),
            derived
        )));
    }
    Ok(())
}

/// Verify a conversion commit: the quotation must be frozen onto exactly the
/// order being inserted, and the new order must carry blank statuses.
pub(crate) fn verify_conversion_commit(
    quotation: &Quotation,
    order: &SalesOrder,
) -> Result<(), LedgerStoreError> {
    if quotation.status() != QuotationStatus::Converted
        || quotation.converted_to() != Some(order.id())
    {
        return Err(invariant(format!(
            "quotation {} is not frozen onto sales order {}",
            quotation.id(),
            order.id()
        )));
    }
    if order.quotation_id() != Some(quotation.id()) {
        return Err(invariant(format!(
            "sales order {} does not link back to quotation {}",
            order.id(),
            quotation.id()
        )));
    }
    if order.lines().len() != quotation.lines().len() {
        return Err(invariant(format!(
            "converted order {} carries {} lines, quotation {} has {}",
            order.id(),
            order.lines().len(),
            quotation.id(),
            quotation.lines().len()
        )));
    }

    // A freshly converted order has no fulfillments of any type yet.
    verify_order_statuses(order, &[], &[], &[], &[])
}

fn verify_order_statuses(
    order: &SalesOrder,
    invoice_lines: &[FulfillmentLine],
    shipment_lines: &[FulfillmentLine],
    invoices: &[Invoice],
    payments: &[PaymentRecord],
) -> Result<(), LedgerStoreError> {
    let derived = (
        line_coverage(order.lines(), invoice_lines),
        line_coverage(order.lines(), shipment_lines),
        sales_order_payment_progress(invoices, payments),
    );
    let stored = (
        order.invoice_coverage(),
        order.shipment_coverage(),
        order.payment_progress(),
    );
    if derived != stored {
        return Err(invariant(format!(
            "sales order {} statuses {stored:?} diverge from derivation {derived:?}",
            order.id()
        )));
    }
    Ok(())
}
