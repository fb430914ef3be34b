//! Money helpers shared by the order engine, catalog and payments

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

/// Tolerance for price and total comparisons (one cent)
pub const PRICE_TOLERANCE: Decimal = dec!(0.01);

/// Round to cents and fix the scale at two decimal places.
///
/// Backends that store decimals as floats hand back `20` for `20.00`; this
/// keeps serialized amounts uniform.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded
}

/// True when two amounts differ by no more than [`PRICE_TOLERANCE`]
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= PRICE_TOLERANCE
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    money(unit_price * Decimal::from(quantity))
}

/// Convert a USD amount to platform points, rounding up to the next point
pub fn points_for_usd(amount_usd: Decimal, points_per_usd: Decimal) -> i64 {
    (amount_usd * points_per_usd).ceil().to_i64().unwrap_or(i64::MAX)
}

/// Stable textual form used inside hashes (no trailing zeros)
pub fn canonical(value: Decimal) -> String {
    value.round_dp(2).normalize().to_string()
}
