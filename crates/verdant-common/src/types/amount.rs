//! Fixed-point helpers
//!
//! Amounts, tons, rates, and percentages are all `Decimal`. Rates and
//! percentages live on a 0-100 scale.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::LedgerError;

/// Seconds in a (non-leap) year, used to annualize rates
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Decimal places retained on accrued amounts
pub const AMOUNT_SCALE: u32 = 18;

/// 100%, the percentage denominator
pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Reject zero and negative amounts
pub fn require_positive(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// `value × pct / 100`, `None` on overflow
pub fn percent_of(value: Decimal, pct: Decimal) -> Option<Decimal> {
    value.checked_mul(pct)?.checked_div(HUNDRED)
}

/// Drop digits beyond [`AMOUNT_SCALE`], rounding toward zero
#[inline]
pub fn truncate(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero)
}

pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_add(b).ok_or(LedgerError::InvalidAmount(b))
}

pub fn checked_sub(a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_sub(b).ok_or(LedgerError::InvalidAmount(b))
}
