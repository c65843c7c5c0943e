//! Payment progress derivation and payment validation.
//!
//! Amounts compare as exact decimals. Whether a total counts as settled
//! tolerates one cent of rounding drift ([`tradebook_core::MONEY_TOLERANCE`]);
//! the overpayment guard does not, the balance bound is exact.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use tradebook_core::{covers, DomainResult, DomainError, EffectivePaymentStatus, PaymentProgress};
use tradebook_documents::{Invoice, PaymentRecord};

/// Sum of payments applied to one invoice.
pub fn paid_total(invoice: &Invoice, payments: &[PaymentRecord]) -> Decimal {
    payments
        .iter()
        .filter(|payment| payment.invoice_id == invoice.id())
        .fold(Decimal::ZERO, |total, payment| total + payment.amount)
}

/// Outstanding balance of an invoice.
pub fn balance(invoice: &Invoice, payments: &[PaymentRecord]) -> Decimal {
    invoice.total() - paid_total(invoice, payments)
}

/// Validate a payment amount against the invoice's outstanding balance.
///
/// The amount must be positive and must not exceed the balance; exceeding it
/// is an [`DomainError::OverPayment`] carrying the amounts, so callers can
/// show what was left to pay.
pub fn validate_payment(
    invoice: &Invoice,
    payments: &[PaymentRecord],
    amount: Decimal,
) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation("payment amount must be positive"));
    }
    let balance = balance(invoice, payments);
    if amount > balance {
        return Err(DomainError::over_payment(invoice.id().0, amount, balance));
    }
    Ok(())
}

/// Derive payment progress from paid and total amounts.
///
/// `Unpaid` when nothing is paid, `Paid` when the total is settled within
/// the money tolerance, `Partial` otherwise.
pub fn payment_progress(paid: Decimal, total: Decimal) -> PaymentProgress {
    if paid == Decimal::ZERO {
        PaymentProgress::Unpaid
    } else if covers(paid, total) {
        PaymentProgress::Paid
    } else {
        PaymentProgress::Partial
    }
}

/// Derive an invoice's payment progress from its payment records.
pub fn invoice_payment_progress(invoice: &Invoice, payments: &[PaymentRecord]) -> PaymentProgress {
    payment_progress(paid_total(invoice, payments), invoice.total())
}

/// Derive a sales order's payment progress transitively across its invoices.
///
/// Paid amounts and totals are summed over every invoice linked to the
/// order; an order with no invoices yet is `Unpaid`.
pub fn sales_order_payment_progress(
    invoices: &[Invoice],
    payments: &[PaymentRecord],
) -> PaymentProgress {
    let mut total = Decimal::ZERO;
    let mut paid = Decimal::ZERO;
    for invoice in invoices {
        total += invoice.total();
        paid += paid_total(invoice, payments);
    }
    if invoices.is_empty() {
        return PaymentProgress::Unpaid;
    }
    payment_progress(paid, total)
}

/// Apply the time-derived overdue overlay.
///
/// An invoice that is not fully paid and past its due date reads as
/// `Overdue`; the stored unpaid/partial fact stays untouched underneath.
pub fn effective_payment_status(
    progress: PaymentProgress,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EffectivePaymentStatus {
    if progress != PaymentProgress::Paid && now > due_date {
        EffectivePaymentStatus::Overdue
    } else {
        progress.into()
    }
}
