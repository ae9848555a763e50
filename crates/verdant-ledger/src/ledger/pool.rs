//! PoolState - global pool totals
//!
//! Invariants held after every committed transition:
//! - `total_deposits = Σ account.deposited`
//! - `total_borrows = Σ account.borrowed`
//! - `reserve_balance ≤ cash`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub total_deposits: Decimal,
    pub total_borrows: Decimal,
    /// Protocol share of repaid interest, not lendable
    pub reserve_balance: Decimal,
    /// Assets physically held by the pool
    pub cash: Decimal,
}

impl PoolState {
    /// Cash that can leave the pool through borrows and withdrawals
    #[inline]
    pub fn available_liquidity(&self) -> Decimal {
        (self.cash - self.reserve_balance).max(Decimal::ZERO)
    }
}

/// Point-in-time pool summary for queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_deposits: Decimal,
    pub total_borrows: Decimal,
    pub reserve_balance: Decimal,
    pub cash: Decimal,
    pub available_liquidity: Decimal,
    /// Percent
    pub utilization: Decimal,
    /// Annual percent, before any offset discount
    pub borrow_rate: Decimal,
    /// Annual percent
    pub supply_rate: Decimal,
    pub reserve_factor: Decimal,
    pub max_borrow_ratio: Decimal,
    pub accounts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_available_liquidity_excludes_reserve() {
        let pool = PoolState {
            total_deposits: dec!(1000),
            total_borrows: dec!(400),
            reserve_balance: dec!(5),
            cash: dec!(650),
        };
        assert_eq!(pool.available_liquidity(), dec!(645));
    }
}
