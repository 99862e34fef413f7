//! Invoice monetary computation.
//!
//! Totals are a pure function of the line items, tax rate, and discount
//! configuration. Create, edit, document assembly, and the dashboard all
//! call the same function; stored totals columns are only ever a cache of
//! its output.

use anyhow::anyhow;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use faktur_core::error::AppError;

use crate::domain::money::round2;
use crate::models::{DiscountType, ItemInput};

/// Derived monetary figures for one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Amount of a single line: `round2(quantity * rate)`.
///
/// Rejects non-positive quantities and negative rates outright; bad numbers
/// are a caller bug to surface, not something to clamp quietly.
pub fn item_amount(quantity: Decimal, rate: Decimal) -> Result<Decimal, AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::Validation(anyhow!(
            "item quantity must be positive, got {}",
            quantity
        )));
    }
    if rate < Decimal::ZERO {
        return Err(AppError::Validation(anyhow!(
            "item rate must be non-negative, got {}",
            rate
        )));
    }
    Ok(round2(quantity * rate))
}

/// Compute subtotal, discount, tax, and total for an invoice.
///
/// Every intermediate value is rounded to 2 decimal places, and a discount
/// that would exceed the subtotal is clamped to it, so the taxable base and
/// the grand total can never go negative.
pub fn compute_invoice_totals(
    items: &[ItemInput],
    tax_rate: Decimal,
    discount_type: DiscountType,
    discount_value: Decimal,
) -> Result<InvoiceTotals, AppError> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(anyhow!(
            "tax rate must be between 0 and 100, got {}",
            tax_rate
        )));
    }
    if discount_value < Decimal::ZERO {
        return Err(AppError::Validation(anyhow!(
            "discount value must be non-negative, got {}",
            discount_value
        )));
    }
    if discount_type == DiscountType::Percentage && discount_value > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(anyhow!(
            "percentage discount must be between 0 and 100, got {}",
            discount_value
        )));
    }

    let mut subtotal = Decimal::ZERO;
    for item in items {
        subtotal += item_amount(item.quantity, item.rate)?;
    }
    let subtotal = round2(subtotal);

    let discount_amount = match discount_type {
        DiscountType::None => Decimal::ZERO,
        DiscountType::Percentage => round2(subtotal * discount_value / Decimal::ONE_HUNDRED),
        DiscountType::Fixed => round2(discount_value),
    };
    // Discount never drives the taxable base negative.
    let discount_amount = discount_amount.min(subtotal);

    let taxable_base = subtotal - discount_amount;
    let tax_amount = round2(taxable_base * tax_rate / Decimal::ONE_HUNDRED);
    let total = round2(taxable_base + tax_amount);

    Ok(InvoiceTotals {
        subtotal,
        discount_amount,
        tax_amount,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(quantity: &str, rate: &str) -> ItemInput {
        ItemInput {
            description: "test item".to_string(),
            quantity: dec(quantity),
            rate: dec(rate),
        }
    }

    #[test]
    fn item_amounts_round_at_the_line_level() {
        assert_eq!(item_amount(dec("2"), dec("50.00")).unwrap(), dec("100.00"));
        assert_eq!(item_amount(dec("1"), dec("25.005")).unwrap(), dec("25.01"));
    }

    #[test]
    fn subtotal_sums_rounded_line_amounts() {
        let totals = compute_invoice_totals(
            &[item("2", "50.00"), item("1", "25.005")],
            Decimal::ZERO,
            DiscountType::None,
            Decimal::ZERO,
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec("125.01"));
        assert_eq!(totals.discount_amount, dec("0.00"));
        assert_eq!(totals.tax_amount, dec("0.00"));
        assert_eq!(totals.total, dec("125.01"));
    }

    #[test]
    fn percentage_discount_then_tax() {
        // 125.01 @ 10% discount -> 12.50 off, taxable 112.51; 8% tax -> 9.00.
        let totals = compute_invoice_totals(
            &[item("2", "50.00"), item("1", "25.005")],
            dec("8"),
            DiscountType::Percentage,
            dec("10"),
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec("125.01"));
        assert_eq!(totals.discount_amount, dec("12.50"));
        assert_eq!(totals.tax_amount, dec("9.00"));
        assert_eq!(totals.total, dec("121.51"));
    }

    #[test]
    fn subtotal_is_invariant_under_item_reordering() {
        let forward = [item("3", "19.99"), item("1", "0.005"), item("7", "1.01")];
        let reversed = [item("7", "1.01"), item("1", "0.005"), item("3", "19.99")];
        let a = compute_invoice_totals(&forward, dec("21"), DiscountType::None, Decimal::ZERO)
            .unwrap();
        let b = compute_invoice_totals(&reversed, dec("21"), DiscountType::None, Decimal::ZERO)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn computation_is_idempotent() {
        let items = [item("2", "50.00"), item("1", "25.005")];
        let a = compute_invoice_totals(&items, dec("8"), DiscountType::Percentage, dec("10"))
            .unwrap();
        let b = compute_invoice_totals(&items, dec("8"), DiscountType::Percentage, dec("10"))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_discount_is_clamped_to_subtotal() {
        let totals = compute_invoice_totals(
            &[item("1", "40.00")],
            dec("8"),
            DiscountType::Fixed,
            dec("100.00"),
        )
        .unwrap();
        assert_eq!(totals.discount_amount, dec("40.00"));
        assert_eq!(totals.tax_amount, dec("0.00"));
        assert_eq!(totals.total, dec("0.00"));
    }

    #[test]
    fn hundred_percent_discount_yields_zero_total() {
        let totals = compute_invoice_totals(
            &[item("2", "50.00")],
            dec("15"),
            DiscountType::Percentage,
            dec("100"),
        )
        .unwrap();
        assert_eq!(totals.discount_amount, dec("100.00"));
        assert_eq!(totals.total, dec("0.00"));
    }

    #[test]
    fn no_items_yields_zero_totals() {
        let totals =
            compute_invoice_totals(&[], dec("8"), DiscountType::Fixed, dec("5.00")).unwrap();
        assert_eq!(totals.subtotal, dec("0"));
        assert_eq!(totals.discount_amount, dec("0"));
        assert_eq!(totals.total, dec("0"));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        for qty in ["0", "-1"] {
            let err = compute_invoice_totals(
                &[item(qty, "10.00")],
                Decimal::ZERO,
                DiscountType::None,
                Decimal::ZERO,
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "qty {}: {:?}", qty, err);
        }
    }

    #[test]
    fn negative_rate_is_rejected() {
        let err = compute_invoice_totals(
            &[item("1", "-0.01")],
            Decimal::ZERO,
            DiscountType::None,
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn out_of_range_tax_rate_is_rejected() {
        for rate in ["-1", "100.01"] {
            let err = compute_invoice_totals(
                &[item("1", "10.00")],
                dec(rate),
                DiscountType::None,
                Decimal::ZERO,
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "rate {}", rate);
        }
    }

    #[test]
    fn out_of_range_discount_is_rejected() {
        let err = compute_invoice_totals(
            &[item("1", "10.00")],
            Decimal::ZERO,
            DiscountType::Percentage,
            dec("100.5"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = compute_invoice_totals(
            &[item("1", "10.00")],
            Decimal::ZERO,
            DiscountType::Fixed,
            dec("-5"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
