//! Money calculation utilities using rust_decimal for precision
//!
//! Prices travel and are stored as `f64`; every sum and product is computed
//! in `Decimal` and rounded to 2 decimal places only when converted back.

use rust_decimal::prelude::*;
use shared::error::AppError;
use shared::order::OptionSelection;

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed quantity per line
pub const MAX_QUANTITY: i32 = 9999;

/// Convert f64 to Decimal for calculation
///
/// Non-finite input never reaches here through option normalization; if it
/// does it is logged and counted as zero.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Round to 2 decimal places, half away from zero
#[inline]
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round(value).to_f64().unwrap_or_default()
}

/// Base price plus every submitted numeric delta, rounded to 2 decimal places
///
/// The rounded value is the stored unit price and the one line totals are
/// computed from. Negative deltas may take the result below the base price,
/// or below zero; nothing is clamped.
pub fn unit_price(base_price: f64, selection: &OptionSelection) -> Decimal {
    round(
        selection
            .price_deltas()
            .map(to_decimal)
            .fold(to_decimal(base_price), |acc, delta| acc + delta),
    )
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Σ unit price × quantity over all lines
pub fn order_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(unit, qty)| line_total(unit, qty))
        .sum()
}

/// Quantities are positive and bounded
pub fn validate_quantity(quantity: i32, item_name: &str) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::validation(format!(
            "Quantity of {} must be at least 1, got {}",
            item_name, quantity
        ))
        .with_detail("field", "quantity"));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::validation(format!(
            "Quantity of {} exceeds maximum allowed ({}), got {}",
            item_name, MAX_QUANTITY, quantity
        ))
        .with_detail("field", "quantity"));
    }
    Ok(())
}
