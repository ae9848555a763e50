//! UserAccount - per-user lending position
//!
//! Created lazily on the first transition and never deleted; zero balances
//! persist. Only [`Ledger`](super::book::Ledger) transitions mutate it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use verdant_common::{amount, LedgerError, HUNDRED, SECONDS_PER_YEAR};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Supplied collateral
    pub deposited: Decimal,
    /// Outstanding principal
    pub borrowed: Decimal,
    /// Interest accrued but not yet repaid
    pub accrued_interest: Decimal,
    /// Unix seconds of the last accrual pass
    pub last_accrual_time: i64,
    /// Unix seconds
    pub created_at: i64,
    /// Bumped on every committed transition
    pub version: u64,
}

impl UserAccount {
    pub fn new(now: i64) -> Self {
        Self {
            deposited: Decimal::ZERO,
            borrowed: Decimal::ZERO,
            accrued_interest: Decimal::ZERO,
            last_accrual_time: now,
            created_at: now,
            version: 0,
        }
    }

    /// Principal plus accrued interest.
    ///
    /// `accrue` refuses interest that would push this sum past `Decimal::MAX`.
    #[inline]
    pub fn debt(&self) -> Decimal {
        self.borrowed.saturating_add(self.accrued_interest)
    }

    /// Maximum debt the current collateral supports
    pub fn borrow_capacity(&self, max_borrow_ratio: Decimal) -> Result<Decimal, LedgerError> {
        // ratio / 100 is at most one, so the product never outgrows the deposit
        self.deposited
            .checked_mul(max_borrow_ratio / HUNDRED)
            .ok_or(LedgerError::InvalidAmount(self.deposited))
    }

    /// Collateral that must stay deposited to cover the current debt
    pub fn required_collateral(&self, max_borrow_ratio: Decimal) -> Result<Decimal, LedgerError> {
        let debt = self.debt();
        if debt.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let required = debt
            .checked_div(max_borrow_ratio / HUNDRED)
            .ok_or(LedgerError::InvalidAmount(debt))?;
        Ok(required.round_dp_with_strategy(
            amount::AMOUNT_SCALE,
            rust_decimal::RoundingStrategy::AwayFromZero,
        ))
    }

    /// Accrue interest at `effective_rate` (annual percent) up to `now`.
    ///
    /// Returns the interest added. Without principal the clock is simply
    /// moved forward. A clock that runs backwards accrues nothing.
    pub fn accrue(&mut self, now: i64, effective_rate: Decimal) -> Option<Decimal> {
        let elapsed = now.saturating_sub(self.last_accrual_time);
        if elapsed <= 0 {
            return Some(Decimal::ZERO);
        }
        self.last_accrual_time = now;
        if self.borrowed.is_zero() {
            return Some(Decimal::ZERO);
        }

        let year_fraction = Decimal::from(elapsed) / Decimal::from(SECONDS_PER_YEAR);
        let interest = amount::truncate(
            self.borrowed
                .checked_mul(effective_rate / HUNDRED)?
                .checked_mul(year_fraction)?,
        );
        let accrued = self.accrued_interest.checked_add(interest)?;
        self.borrowed.checked_add(accrued)?;
        self.accrued_interest = accrued;
        Some(interest)
    }

    /// Health factor: capacity / debt. `None` without debt.
    ///
    /// A ratio too large to represent saturates at `Decimal::MAX`.
    pub fn health_factor(&self, max_borrow_ratio: Decimal) -> Result<Option<Decimal>, LedgerError> {
        let debt = self.debt();
        if debt.is_zero() {
            return Ok(None);
        }
        let capacity = self.borrow_capacity(max_borrow_ratio)?;
        Ok(Some(capacity.checked_div(debt).unwrap_or(Decimal::MAX)))
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }
}
