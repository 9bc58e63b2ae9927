//! # Validation Module
//!
//! Draft validation runs before the coordinator opens a transaction, so a
//! malformed draft never touches the database.
//!
//! ## Validation Strategy
//! ```text
//! Layer 1: THIS MODULE - business rule validation on the draft
//! Layer 2: SQLite      - NOT NULL / UNIQUE / CHECK (quantity >= 0) / FKs
//! Layer 3: Coordinator - conditional decrement (stock sufficiency is only
//!                        decidable inside the transaction)
//! ```

use crate::error::ValidationError;
use crate::types::InvoiceDraft;
use crate::{MAX_DRAFT_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an invoice draft.
///
/// ## Rules
/// - At least one line item, at most [`MAX_DRAFT_ITEMS`]
/// - Every quantity strictly positive and at most [`MAX_ITEM_QUANTITY`]
/// - No negative unit prices
/// - Payment method must not be empty
///
/// Stock sufficiency is deliberately NOT checked here - only the
/// conditional decrement inside the transaction can decide that without a
/// read-then-write race.
pub fn validate_draft(draft: &InvoiceDraft) -> ValidationResult<()> {
    if draft.items.is_empty() {
        return Err(ValidationError::EmptyDraft);
    }

    if draft.items.len() > MAX_DRAFT_ITEMS {
        return Err(ValidationError::TooManyItems {
            max: MAX_DRAFT_ITEMS,
        });
    }

    if draft.payment_method.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "payment_method",
        });
    }

    for item in &draft.items {
        if item.quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        if item.quantity > MAX_ITEM_QUANTITY {
            return Err(ValidationError::QuantityTooLarge {
                product_id: item.product_id,
                quantity: item.quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        if item.unit_price_cents < 0 {
            return Err(ValidationError::NegativeUnitPrice {
                product_id: item.product_id,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DraftItem;

    fn draft_with(items: Vec<DraftItem>) -> InvoiceDraft {
        InvoiceDraft {
            items,
            customer_id: None,
            customer_name: None,
            subtotal_cents: 0,
            tax_cents: 0,
            discount_bps: 0,
            discount_cents: 0,
            surcharge_bps: 0,
            surcharge_cents: 0,
            total_cents: 0,
            payment_method: "CASH".into(),
            notes: None,
        }
    }

    fn line(product_id: i64, quantity: i64, unit_price_cents: i64) -> DraftItem {
        DraftItem {
            product_id,
            product_name: format!("product-{product_id}"),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn accepts_a_well_formed_draft() {
        let draft = draft_with(vec![line(1, 2, 100), line(2, 1, 50)]);
        assert!(validate_draft(&draft).is_ok());
    }

    #[test]
    fn rejects_empty_draft() {
        let draft = draft_with(vec![]);
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::EmptyDraft)
        ));
    }

    #[test]
    fn rejects_zero_and_negative_quantities() {
        for qty in [0, -1] {
            let draft = draft_with(vec![line(1, qty, 100)]);
            assert!(matches!(
                validate_draft(&draft),
                Err(ValidationError::NonPositiveQuantity { product_id: 1, .. })
            ));
        }
    }

    #[test]
    fn rejects_negative_unit_price() {
        let draft = draft_with(vec![line(3, 1, -5)]);
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::NegativeUnitPrice { product_id: 3 })
        ));
    }

    #[test]
    fn rejects_blank_payment_method() {
        let mut draft = draft_with(vec![line(1, 1, 100)]);
        draft.payment_method = "  ".into();
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::Required { .. })
        ));
    }
}
