//! Remaining-quantity arithmetic and fulfillment-request validation.
//!
//! Everything here is pure: callers pass the parent's line items and the
//! existing fulfillment records of one type, and get back values or typed
//! rejections. Nothing is persisted at this layer.

use rust_decimal::Decimal;

use tradebook_core::{DomainError, DomainResult, LineItemId};
use tradebook_documents::{FulfillmentLine, LineItem};

/// Total quantity the given records consume from one line item.
pub fn consumed(line_item_id: LineItemId, fulfillments: &[FulfillmentLine]) -> Decimal {
    fulfillments
        .iter()
        .filter(|record| record.line_item_id == line_item_id)
        .fold(Decimal::ZERO, |total, record| total + record.quantity)
}

/// Flatten the lines of several fulfillment documents into one ledger slice.
pub fn recorded_lines<'a, I>(documents: I) -> Vec<FulfillmentLine>
where
    I: IntoIterator<Item = &'a [FulfillmentLine]>,
{
    documents
        .into_iter()
        .flat_map(|lines| lines.iter().cloned())
        .collect()
}

/// Capacity left on a line item for one fulfillment type.
///
/// `quantity_ordered − Σ consumed`. Non-negative for any ledger that honors
/// the conservation invariant.
pub fn remaining(line_item: &LineItem, fulfillments: &[FulfillmentLine]) -> Decimal {
    line_item.quantity_ordered() - consumed(line_item.id(), fulfillments)
}

/// Validate one requested quantity against a line item's remaining capacity.
///
/// The requested quantity must be positive and must not exceed
/// [`remaining`]; over-requesting is a [`DomainError::CapacityExceeded`]
/// naming the line, never a silent clamp.
pub fn validate_fulfillment_request(
    line_item: &LineItem,
    fulfillments: &[FulfillmentLine],
    requested: Decimal,
) -> DomainResult<()> {
    if requested <= Decimal::ZERO {
        return Err(DomainError::validation(
            "requested quantity must be positive",
        ));
    }
    let remaining = remaining(line_item, fulfillments);
    if requested > remaining {
        return Err(DomainError::capacity_exceeded(
            line_item.id(),
            requested,
            remaining,
        ));
    }
    Ok(())
}

/// Normalize request lines before validation.
///
/// Zero-quantity lines are dropped (an empty result is a no-op for the
/// caller, not an error), duplicate line-item ids are coalesced by summing,
/// and negative quantities are rejected. First-seen line order is kept.
pub fn normalize_lines(lines: Vec<FulfillmentLine>) -> DomainResult<Vec<FulfillmentLine>> {
    let mut normalized: Vec<FulfillmentLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "requested quantity for line item {} must not be negative",
                line.line_item_id
            )));
        }
        if line.quantity == Decimal::ZERO {
            continue;
        }
        match normalized
            .iter_mut()
            .find(|existing| existing.line_item_id == line.line_item_id)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => normalized.push(line),
        }
    }
    Ok(normalized)
}

/// Validate a whole multi-line request against the parent's ledger.
///
/// All-or-nothing: the first failing line fails the batch. Lines must be
/// normalized ([`normalize_lines`]) so each line item appears at most once.
/// A line naming an id outside the parent is rejected with the id.
pub fn validate_batch(
    parent_lines: &[LineItem],
    fulfillments: &[FulfillmentLine],
    requested: &[FulfillmentLine],
) -> DomainResult<()> {
    for request in requested {
        let line_item = parent_lines
            .iter()
            .find(|line| line.id() == request.line_item_id)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "line item {} does not belong to the parent document",
                    request.line_item_id
                ))
            })?;
        validate_fulfillment_request(line_item, fulfillments, request.quantity)?;
    }
    Ok(())
}

/// Build the request that consumes everything still open.
///
/// One line per line item with remaining capacity; fully consumed (and
/// zero-quantity) lines are excluded. "Fulfill all remaining" is exactly
/// this request, not a special code path.
pub fn fulfill_all_remaining(
    parent_lines: &[LineItem],
    fulfillments: &[FulfillmentLine],
) -> Vec<FulfillmentLine> {
    parent_lines
        .iter()
        .filter_map(|line| {
            let open = remaining(line, fulfillments);
            (open > Decimal::ZERO).then(|| FulfillmentLine::new(line.id(), open))
        })
        .collect()
}

/// Re-check the conservation invariant over a full ledger slice.
///
/// Run by the store at commit time; a violation here means a bug upstream,
/// so it reports as [`DomainError::InvariantViolation`].
pub fn check_conservation(
    parent_lines: &[LineItem],
    fulfillments: &[FulfillmentLine],
) -> DomainResult<()> {
    for record in fulfillments {
        if !parent_lines
            .iter()
            .any(|line| line.id() == record.line_item_id)
        {
            return Err(DomainError::invariant(format!(
                "fulfillment references unknown line item {}",
                record.line_item_id
            )));
        }
    }
    for line in parent_lines {
        let mut total = Decimal::ZERO;
        for record in fulfillments
            .iter()
            .filter(|record| record.line_item_id == line.id())
        {
            total = total
                .checked_add(record.quantity)
                .ok_or_else(|| DomainError::invariant("fulfillment total overflowed"))?;
        }
        if total > line.quantity_ordered() {
            return Err(DomainError::invariant(format!(
                "line item {} is over-consumed ({} of {})",
                line.id(),
                total,
                line.quantity_ordered()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tradebook_core::ProductId;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(quantity: &str) -> LineItem {
        LineItem::new(ProductId::new(), "Widget", dec(quantity), dec("1"), dec("0")).unwrap()
    }

    #[test]
    fn remaining_subtracts_only_matching_records() {
        let a = line("10");
        let b = line("4");
        let ledger = vec![
            FulfillmentLine::new(a.id(), dec("3")),
            FulfillmentLine::new(b.id(), dec("4")),
            FulfillmentLine::new(a.id(), dec("2.5")),
        ];

        assert_eq!(remaining(&a, &ledger), dec("4.5"));
        assert_eq!(remaining(&b, &ledger), dec("0"));
    }

    #[test]
    fn sequential_over_request_is_rejected_then_corrected() {
        // shipment flow: 6 committed, 5 rejected (4 left), 4 committed
        let item = line("10");
        let mut ledger = Vec::new();

        validate_fulfillment_request(&item, &ledger, dec("6")).unwrap();
        ledger.push(FulfillmentLine::new(item.id(), dec("6")));

        let err = validate_fulfillment_request(&item, &ledger, dec("5")).unwrap_err();
        match err {
            DomainError::CapacityExceeded {
                line_item_id,
                requested,
                remaining,
            } => {
                assert_eq!(line_item_id, item.id());
                assert_eq!(requested, dec("5"));
                assert_eq!(remaining, dec("4"));
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }

        validate_fulfillment_request(&item, &ledger, dec("4")).unwrap();
        ledger.push(FulfillmentLine::new(item.id(), dec("4")));
        assert_eq!(remaining(&item, &ledger), dec("0"));
    }

    #[test]
    fn zero_and_negative_requests_never_reach_capacity_checks() {
        let item = line("1");
        assert!(matches!(
            validate_fulfillment_request(&item, &[], Decimal::ZERO),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            validate_fulfillment_request(&item, &[], dec("-2")),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn normalize_drops_zeros_and_coalesces_duplicates() {
        let a = LineItemId::new();
        let b = LineItemId::new();
        let normalized = normalize_lines(vec![
            FulfillmentLine::new(a, dec("2")),
            FulfillmentLine::new(b, dec("0")),
            FulfillmentLine::new(a, dec("3")),
        ])
        .unwrap();

        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].line_item_id, a);
        assert_eq!(normalized[0].quantity, dec("5"));
    }

    #[test]
    fn normalize_rejects_negative_quantities() {
        let err = normalize_lines(vec![FulfillmentLine::new(LineItemId::new(), dec("-1"))])
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn batch_fails_as_a_whole_when_any_line_fails() {
        let a = line("10");
        let b = line("2");
        let parent = vec![a.clone(), b.clone()];
        let ledger = Vec::new();

        let err = validate_batch(
            &parent,
            &ledger,
            &[
                FulfillmentLine::new(a.id(), dec("1")),
                FulfillmentLine::new(b.id(), dec("3")),
            ],
        )
        .unwrap_err();
        match err {
            DomainError::CapacityExceeded { line_item_id, .. } => {
                assert_eq!(line_item_id, b.id());
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[test]
    fn batch_rejects_lines_foreign_to_the_parent() {
        let a = line("10");
        let parent = vec![a.clone()];
        let foreign = LineItemId::new();

        let err = validate_batch(
            &parent,
            &[],
            &[FulfillmentLine::new(foreign, dec("1"))],
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains(&foreign.to_string()) => {}
            other => panic!("expected validation naming the line, got {other:?}"),
        }
    }

    #[test]
    fn fulfill_all_remaining_skips_consumed_and_zero_lines() {
        let a = line("10");
        let b = line("4");
        let zero = line("0");
        let parent = vec![a.clone(), b.clone(), zero.clone()];
        let ledger = vec![FulfillmentLine::new(b.id(), dec("4"))];

        let request = fulfill_all_remaining(&parent, &ledger);
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].line_item_id, a.id());
        assert_eq!(request[0].quantity, dec("10"));
    }

    #[test]
    fn conservation_check_flags_over_consumption_and_unknown_lines() {
        let a = line("5");
        let parent = vec![a.clone()];

        assert!(check_conservation(&parent, &[FulfillmentLine::new(a.id(), dec("5"))]).is_ok());
        assert!(matches!(
            check_conservation(&parent, &[FulfillmentLine::new(a.id(), dec("5.001"))]),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            check_conservation(&parent, &[FulfillmentLine::new(LineItemId::new(), dec("1"))]),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: however callers sequence their requests, the ledger that
        /// accepts only validated requests never over-consumes a line item,
        /// and every rejection really was an over-request.
        #[test]
        fn validated_ledgers_conserve_ordered_quantity(
            ordered in 0u64..500,
            requests in prop::collection::vec(1u64..200, 0..40),
        ) {
            let item = LineItem::new(
                ProductId::new(),
                "Widget",
                Decimal::from(ordered),
                Decimal::ONE,
                Decimal::ZERO,
            ).unwrap();
            let mut ledger: Vec<FulfillmentLine> = Vec::new();

            for quantity in requests {
                let requested = Decimal::from(quantity);
                match validate_fulfillment_request(&item, &ledger, requested) {
                    Ok(()) => ledger.push(FulfillmentLine::new(item.id(), requested)),
                    Err(DomainError::CapacityExceeded { remaining, .. }) => {
                        prop_assert!(requested > remaining);
                    }
                    Err(other) => panic!("unexpected error: {other:?}"),
                }

                prop_assert!(consumed(item.id(), &ledger) <= item.quantity_ordered());
                prop_assert!(remaining(&item, &ledger) >= Decimal::ZERO);
            }

            check_conservation(core::slice::from_ref(&item), &ledger).unwrap();
        }

        /// Property: "fulfill all remaining" consumes a parent exactly.
        #[test]
        fn fulfill_all_remaining_closes_every_line(
            quantities in prop::collection::vec(0u64..50, 1..8),
        ) {
            let lines: Vec<LineItem> = quantities
                .iter()
                .map(|q| {
                    LineItem::new(
                        ProductId::new(),
                        "Widget",
                        Decimal::from(*q),
                        Decimal::ONE,
                        Decimal::ZERO,
                    ).unwrap()
                })
                .collect();

            let request = fulfill_all_remaining(&lines, &[]);
            validate_batch(&lines, &[], &request).unwrap();

            let ledger: Vec<FulfillmentLine> = request;
            for line in &lines {
                prop_assert_eq!(remaining(line, &ledger), Decimal::ZERO);
            }
            prop_assert!(fulfill_all_remaining(&lines, &ledger).is_empty());
        }
    }
}
