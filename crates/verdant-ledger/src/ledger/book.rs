//! Ledger - the per-user lending state machine
//!
//! Each transition runs accrue-then-mutate against a working copy of the
//! account and pool. The copy is written back only after every check has
//! passed, so a rejected call leaves all balances untouched.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use verdant_common::{
    amount::{self, checked_add, checked_sub, require_positive},
    LedgerError, Result, UserId, VerdantError, HUNDRED,
};

use super::account::UserAccount;
use super::pool::{PoolState, PoolStats};
use crate::rates::model::{RateModel, RateModelParams};

/// Supplies the borrow-rate reduction for a user
pub trait DiscountSource {
    /// Reduction in percent, 0-100
    fn discount_percent(&self, user: &UserId) -> Decimal;
}

/// Discount source that never discounts
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiscount;

impl DiscountSource for NoDiscount {
    fn discount_percent(&self, _user: &UserId) -> Decimal {
        Decimal::ZERO
    }
}

/// Collateral and reserve configuration (percent values)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Debt may not exceed this share of deposits, in (0, 100]
    pub max_borrow_ratio: Decimal,
    /// Share of repaid interest routed to reserves, in [0, 100]
    pub reserve_factor: Decimal,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            max_borrow_ratio: Decimal::from(75),
            reserve_factor: Decimal::TEN,
        }
    }
}

impl LedgerParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_borrow_ratio <= Decimal::ZERO || self.max_borrow_ratio > HUNDRED {
            return Err(VerdantError::InvalidConfiguration(format!(
                "max_borrow_ratio must lie in (0, 100], got {}",
                self.max_borrow_ratio
            )));
        }
        if self.reserve_factor < Decimal::ZERO || self.reserve_factor > HUNDRED {
            return Err(VerdantError::InvalidConfiguration(format!(
                "reserve_factor must lie in [0, 100], got {}",
                self.reserve_factor
            )));
        }
        Ok(())
    }
}

/// How a repayment was applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepayReceipt {
    pub interest_paid: Decimal,
    pub principal_paid: Decimal,
    /// Portion of `interest_paid` moved into reserves
    pub reserve_added: Decimal,
    /// Overpayment returned to the caller
    pub refunded: Decimal,
}

/// Account book plus pool totals
#[derive(Debug, Clone)]
pub struct Ledger {
    params: LedgerParams,
    rate_model: RateModel,
    accounts: HashMap<UserId, UserAccount>,
    pool: PoolState,
}

impl Ledger {
    pub fn new(params: LedgerParams, rate_model: RateModel) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            rate_model,
            accounts: HashMap::new(),
            pool: PoolState::default(),
        })
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn rate_model(&self) -> &RateModel {
        &self.rate_model
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    pub fn account(&self, user: &UserId) -> Option<&UserAccount> {
        self.accounts.get(user)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&UserId, &UserAccount)> {
        self.accounts.iter()
    }

    // ============ TRANSITIONS ============

    /// Supply collateral
    #[instrument(skip(self, discounts), fields(user = %user))]
    pub fn deposit(
        &mut self,
        user: &UserId,
        amount: Decimal,
        now: i64,
        discounts: &dyn DiscountSource,
    ) -> Result<UserAccount> {
        require_positive(amount)?;
        let mut account = self.accrued(user, now, discounts)?;
        let mut pool = self.pool.clone();

        account.deposited = checked_add(account.deposited, amount)?;
        pool.total_deposits = checked_add(pool.total_deposits, amount)?;
        pool.cash = checked_add(pool.cash, amount)?;

        debug!(%amount, deposited = %account.deposited, "Deposit applied");
        Ok(self.commit(user, account, pool))
    }

    /// Borrow against deposited collateral; returns the amount transferred out
    #[instrument(skip(self, discounts), fields(user = %user))]
    pub fn borrow(
        &mut self,
        user: &UserId,
        amount: Decimal,
        now: i64,
        discounts: &dyn DiscountSource,
    ) -> Result<Decimal> {
        require_positive(amount)?;
        let mut account = self.accrued(user, now, discounts)?;
        let mut pool = self.pool.clone();

        let capacity = account.borrow_capacity(self.params.max_borrow_ratio)?;
        let new_debt = checked_add(account.debt(), amount)?;
        if new_debt > capacity {
            return Err(LedgerError::ExceedsBorrowCapacity {
                requested: amount,
                capacity: (capacity - account.debt()).max(Decimal::ZERO),
            }
            .into());
        }

        let available = pool.available_liquidity();
        if amount > available {
            return Err(LedgerError::InsufficientLiquidity {
                requested: amount,
                available,
            }
            .into());
        }

        account.borrowed += amount;
        pool.total_borrows = checked_add(pool.total_borrows, amount)?;
        pool.cash -= amount;

        debug_assert!(account
            .borrow_capacity(self.params.max_borrow_ratio)
            .map_or(false, |capacity| account.debt() <= capacity));
        debug!(%amount, borrowed = %account.borrowed, "Borrow applied");
        self.commit(user, account, pool);
        Ok(amount)
    }

    /// Repay debt, interest first; overpayment is refunded
    #[instrument(skip(self, discounts), fields(user = %user))]
    pub fn repay(
        &mut self,
        user: &UserId,
        amount: Decimal,
        now: i64,
        discounts: &dyn DiscountSource,
    ) -> Result<RepayReceipt> {
        require_positive(amount)?;
        let mut account = self.accrued(user, now, discounts)?;
        let mut pool = self.pool.clone();

        let debt = account.debt();
        if debt.is_zero() {
            return Err(LedgerError::NoOutstandingDebt.into());
        }

        let payment = amount.min(debt);
        let interest_paid = payment.min(account.accrued_interest);
        let principal_paid = payment - interest_paid;
        let reserve_added = amount::truncate(
            amount::percent_of(interest_paid, self.params.reserve_factor)
                .ok_or(LedgerError::InvalidAmount(amount))?,
        );

        account.accrued_interest -= interest_paid;
        account.borrowed -= principal_paid;
        pool.total_borrows = checked_sub(pool.total_borrows, principal_paid)?;
        pool.cash = checked_add(pool.cash, payment)?;
        pool.reserve_balance = checked_add(pool.reserve_balance, reserve_added)?;

        let receipt = RepayReceipt {
            interest_paid,
            principal_paid,
            reserve_added,
            refunded: amount - payment,
        };
        debug!(?receipt, "Repayment applied");
        self.commit(user, account, pool);
        Ok(receipt)
    }

    /// Withdraw collateral not needed to cover outstanding debt
    #[instrument(skip(self, discounts), fields(user = %user))]
    pub fn withdraw(
        &mut self,
        user: &UserId,
        amount: Decimal,
        now: i64,
        discounts: &dyn DiscountSource,
    ) -> Result<Decimal> {
        require_positive(amount)?;
        let mut account = self.accrued(user, now, discounts)?;
        let mut pool = self.pool.clone();

        if amount > account.deposited {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                deposited: account.deposited,
            }
            .into());
        }

        let ceiling = self.withdraw_ceiling(&account)?;
        if amount > ceiling {
            return Err(LedgerError::ExceedsBorrowCapacity {
                requested: amount,
                capacity: ceiling,
            }
            .into());
        }

        let available = pool.available_liquidity();
        if amount > available {
            return Err(LedgerError::InsufficientLiquidity {
                requested: amount,
                available,
            }
            .into());
        }

        account.deposited -= amount;
        pool.total_deposits = checked_sub(pool.total_deposits, amount)?;
        pool.cash -= amount;

        debug_assert!(account
            .borrow_capacity(self.params.max_borrow_ratio)
            .map_or(false, |capacity| account.debt() <= capacity));
        debug!(%amount, deposited = %account.deposited, "Withdrawal applied");
        self.commit(user, account, pool);
        Ok(amount)
    }

    /// Move protocol reserves out of the pool
    pub fn withdraw_reserves(&mut self, amount: Decimal) -> Result<Decimal> {
        require_positive(amount)?;
        if amount > self.pool.reserve_balance {
            return Err(LedgerError::InsufficientLiquidity {
                requested: amount,
                available: self.pool.reserve_balance,
            }
            .into());
        }
        self.pool.reserve_balance -= amount;
        self.pool.cash -= amount;
        Ok(amount)
    }

    // ============ CONFIGURATION ============

    pub fn update_params(&mut self, params: LedgerParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn update_rate_model(&mut self, params: RateModelParams) -> Result<()> {
        self.rate_model.update(params)
    }

    // ============ QUERIES ============

    /// Debt projected to `now` without committing the accrual
    pub fn user_debt(&self, user: &UserId, now: i64, discounts: &dyn DiscountSource) -> Result<Decimal> {
        Ok(self.accrued(user, now, discounts)?.debt())
    }

    /// Largest amount `borrow` would currently accept
    pub fn max_borrowable(&self, user: &UserId, now: i64, discounts: &dyn DiscountSource) -> Result<Decimal> {
        let account = self.accrued(user, now, discounts)?;
        let headroom = account.borrow_capacity(self.params.max_borrow_ratio)? - account.debt();
        Ok(headroom.max(Decimal::ZERO).min(self.pool.available_liquidity()))
    }

    /// Largest amount `withdraw` would currently accept
    pub fn max_withdrawable(&self, user: &UserId, now: i64, discounts: &dyn DiscountSource) -> Result<Decimal> {
        let account = self.accrued(user, now, discounts)?;
        Ok(self
            .withdraw_ceiling(&account)?
            .min(self.pool.available_liquidity()))
    }

    pub fn health_factor(&self, user: &UserId, now: i64, discounts: &dyn DiscountSource) -> Result<Option<Decimal>> {
        let account = self.accrued(user, now, discounts)?;
        Ok(account.health_factor(self.params.max_borrow_ratio)?)
    }

    /// Pool utilization in percent
    pub fn utilization_rate(&self) -> Decimal {
        RateModel::utilization(self.pool.total_deposits, self.pool.total_borrows)
    }

    /// Undiscounted annual borrow rate at current utilization
    pub fn borrow_rate(&self) -> Decimal {
        self.rate_model
            .borrow_rate(self.pool.total_deposits, self.pool.total_borrows)
    }

    pub fn supply_rate(&self) -> Decimal {
        self.rate_model.supply_rate(
            self.pool.total_deposits,
            self.pool.total_borrows,
            self.params.reserve_factor,
        )
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            total_deposits: self.pool.total_deposits,
            total_borrows: self.pool.total_borrows,
            reserve_balance: self.pool.reserve_balance,
            cash: self.pool.cash,
            available_liquidity: self.pool.available_liquidity(),
            utilization: self.utilization_rate(),
            borrow_rate: self.borrow_rate(),
            supply_rate: self.supply_rate(),
            reserve_factor: self.params.reserve_factor,
            max_borrow_ratio: self.params.max_borrow_ratio,
            accounts: self.accounts.len(),
        }
    }

    // ============ INTERNALS ============

    /// Working copy of `user`'s account with interest accrued to `now`,
    /// priced on the pre-mutation pool totals
    fn accrued(&self, user: &UserId, now: i64, discounts: &dyn DiscountSource) -> Result<UserAccount> {
        let mut account = self
            .accounts
            .get(user)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(now));

        let discount = discounts
            .discount_percent(user)
            .clamp(Decimal::ZERO, HUNDRED);
        let effective_rate = amount::percent_of(self.borrow_rate(), HUNDRED - discount)
            .ok_or(LedgerError::InvalidAmount(discount))?;

        account
            .accrue(now, effective_rate)
            .ok_or(LedgerError::InvalidAmount(account.borrowed))?;
        Ok(account)
    }

    fn withdraw_ceiling(&self, account: &UserAccount) -> Result<Decimal> {
        let required = account.required_collateral(self.params.max_borrow_ratio)?;
        Ok((account.deposited - required).max(Decimal::ZERO))
    }

    fn commit(&mut self, user: &UserId, mut account: UserAccount, pool: PoolState) -> UserAccount {
        account.touch();
        self.accounts.insert(user.clone(), account.clone());
        self.pool = pool;
        debug_assert!(self.pool.reserve_balance <= self.pool.cash);
        account
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            params: LedgerParams::default(),
            rate_model: RateModel::default(),
            accounts: HashMap::new(),
            pool: PoolState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use verdant_common::{ErrorKind, SECONDS_PER_YEAR};

    struct FixedDiscount(Decimal);

    impl DiscountSource for FixedDiscount {
        fn discount_percent(&self, _user: &UserId) -> Decimal {
            self.0
        }
    }

    fn user(name: &str) -> UserId {
        UserId::from(name)
    }

    #[test]
    fn test_deposit_creates_account() {
        let mut ledger = Ledger::default();
        let account = ledger.deposit(&user("alice"), dec!(100), 10, &NoDiscount).unwrap();

        assert_eq!(account.deposited, dec!(100));
        assert_eq!(account.created_at, 10);
        assert_eq!(account.version, 1);
        assert_eq!(ledger.pool().total_deposits, dec!(100));
        assert_eq!(ledger.pool().cash, dec!(100));
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        for result in [
            ledger.deposit(&alice, Decimal::ZERO, 0, &NoDiscount).map(|_| ()),
            ledger.borrow(&alice, dec!(-1), 0, &NoDiscount).map(|_| ()),
            ledger.repay(&alice, Decimal::ZERO, 0, &NoDiscount).map(|_| ()),
            ledger.withdraw(&alice, Decimal::ZERO, 0, &NoDiscount).map(|_| ()),
        ] {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidAmount);
        }
        assert!(ledger.account(&alice).is_none());
    }

    #[test]
    fn test_borrow_capacity_enforced() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();

        let err = ledger.borrow(&alice, dec!(751), 0, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceedsBorrowCapacity);

        assert_eq!(ledger.borrow(&alice, dec!(750), 0, &NoDiscount).unwrap(), dec!(750));
        assert_eq!(ledger.pool().total_borrows, dec!(750));
        assert_eq!(ledger.pool().cash, dec!(250));
    }

    #[test]
    fn test_borrow_without_collateral_creates_nothing() {
        let mut ledger = Ledger::default();
        let (alice, bob) = (user("alice"), user("bob"));
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();

        let err = ledger.borrow(&bob, dec!(1), 0, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceedsBorrowCapacity);
        assert!(ledger.account(&bob).is_none());
        assert_eq!(ledger.pool().total_borrows, Decimal::ZERO);
    }

    #[test]
    fn test_reserves_are_not_lendable() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.pool.reserve_balance = dec!(900);

        let err = ledger.borrow(&alice, dec!(200), 0, &NoDiscount).unwrap_err();
        assert_eq!(
            err,
            VerdantError::Ledger(LedgerError::InsufficientLiquidity {
                requested: dec!(200),
                available: dec!(100),
            })
        );

        let err = ledger.withdraw(&alice, dec!(150), 0, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientLiquidity);
        assert_eq!(ledger.account(&alice).unwrap().deposited, dec!(1000));
        assert_eq!(ledger.pool().cash, dec!(1000));
    }

    #[test]
    fn test_interest_accrues_on_next_transition() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1250), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(500), 0, &NoDiscount).unwrap();
        // utilization 40% -> rate 6%
        assert_eq!(ledger.borrow_rate(), dec!(6));

        let debt = ledger.user_debt(&alice, SECONDS_PER_YEAR, &NoDiscount).unwrap();
        assert_eq!(debt, dec!(530));
        // projection does not commit
        assert_eq!(ledger.account(&alice).unwrap().accrued_interest, Decimal::ZERO);

        ledger.deposit(&alice, dec!(1), SECONDS_PER_YEAR, &NoDiscount).unwrap();
        assert_eq!(ledger.account(&alice).unwrap().accrued_interest, dec!(30));
    }

    #[test]
    fn test_discount_reduces_accrual() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(500), 0, &NoDiscount).unwrap();
        // 50% utilization -> 7%; 50% discount -> 3.5%
        let debt = ledger
            .user_debt(&alice, SECONDS_PER_YEAR, &FixedDiscount(dec!(50)))
            .unwrap();
        assert_eq!(debt, dec!(517.5));
    }

    #[test]
    fn test_repay_interest_first_with_reserve_and_refund() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(500), 0, &NoDiscount).unwrap();

        // 7% on 500 for a year = 35 interest
        let receipt = ledger
            .repay(&alice, dec!(600), SECONDS_PER_YEAR, &NoDiscount)
            .unwrap();
        assert_eq!(receipt.interest_paid, dec!(35));
        assert_eq!(receipt.principal_paid, dec!(500));
        assert_eq!(receipt.reserve_added, dec!(3.5));
        assert_eq!(receipt.refunded, dec!(65));

        let account = ledger.account(&alice).unwrap();
        assert_eq!(account.debt(), Decimal::ZERO);
        assert_eq!(ledger.pool().total_borrows, Decimal::ZERO);
        assert_eq!(ledger.pool().reserve_balance, dec!(3.5));
        assert_eq!(ledger.pool().cash, dec!(1035));
    }

    #[test]
    fn test_partial_repay_goes_to_interest() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(500), 0, &NoDiscount).unwrap();

        let receipt = ledger
            .repay(&alice, dec!(20), SECONDS_PER_YEAR, &NoDiscount)
            .unwrap();
        assert_eq!(receipt.interest_paid, dec!(20));
        assert_eq!(receipt.principal_paid, Decimal::ZERO);
        let account = ledger.account(&alice).unwrap();
        assert_eq!(account.accrued_interest, dec!(15));
        assert_eq!(account.borrowed, dec!(500));
    }

    #[test]
    fn test_repay_without_debt() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(100), 0, &NoDiscount).unwrap();
        let err = ledger.repay(&alice, dec!(10), 5, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoOutstandingDebt);
        assert_eq!(ledger.account(&alice).unwrap().version, 1);
    }

    #[test]
    fn test_withdraw_keeps_collateral_for_debt() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(300), 0, &NoDiscount).unwrap();

        // debt 300 needs 400 collateral at 75%
        assert_eq!(ledger.max_withdrawable(&alice, 0, &NoDiscount).unwrap(), dec!(600));
        let err = ledger.withdraw(&alice, dec!(601), 0, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceedsBorrowCapacity);
        ledger.withdraw(&alice, dec!(600), 0, &NoDiscount).unwrap();
        assert_eq!(ledger.account(&alice).unwrap().deposited, dec!(400));
    }

    #[test]
    fn test_withdraw_more_than_deposited() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(10), 0, &NoDiscount).unwrap();
        let err = ledger.withdraw(&alice, dec!(11), 0, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_failed_transition_does_not_commit_accrual() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(500), 0, &NoDiscount).unwrap();
        let before = ledger.account(&alice).cloned();

        ledger
            .borrow(&alice, dec!(10000), SECONDS_PER_YEAR, &NoDiscount)
            .unwrap_err();
        assert_eq!(ledger.account(&alice).cloned(), before);
    }

    #[test]
    fn test_withdraw_reserves() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(500), 0, &NoDiscount).unwrap();
        ledger.repay(&alice, dec!(535), SECONDS_PER_YEAR, &NoDiscount).unwrap();

        assert!(ledger.withdraw_reserves(dec!(4)).is_err());
        assert_eq!(ledger.withdraw_reserves(dec!(3.5)).unwrap(), dec!(3.5));
        assert_eq!(ledger.pool().reserve_balance, Decimal::ZERO);
        assert_eq!(ledger.pool().cash, dec!(1031.5));
    }

    #[test]
    fn test_pool_stats() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(750), 0, &NoDiscount).unwrap();

        let stats = ledger.pool_stats();
        assert_eq!(stats.utilization, dec!(75));
        assert_eq!(stats.borrow_rate, dec!(9.5));
        assert_eq!(stats.available_liquidity, dec!(250));
        assert_eq!(stats.accounts, 1);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut ledger = Ledger::default();
        let params = LedgerParams {
            max_borrow_ratio: Decimal::ZERO,
            ..Default::default()
        };
        assert_eq!(
            ledger.update_params(params).unwrap_err().kind(),
            ErrorKind::InvalidConfiguration
        );
        assert_eq!(ledger.params(), &LedgerParams::default());
    }

    #[test]
    fn test_accrual_past_ceiling_blocks_borrow_and_withdraw() {
        let mut ledger = Ledger::default();
        let alice = user("alice");
        ledger.deposit(&alice, dec!(1000), 0, &NoDiscount).unwrap();
        ledger.borrow(&alice, dec!(750), 0, &NoDiscount).unwrap();

        // a year at 9.5% on 750 adds 71.25
        ledger.deposit(&alice, dec!(1), SECONDS_PER_YEAR, &NoDiscount).unwrap();
        let account = ledger.account(&alice).unwrap().clone();
        assert_eq!(account.debt(), dec!(821.25));
        assert_eq!(account.borrow_capacity(dec!(75)), Ok(dec!(750.75)));
        let health = ledger
            .health_factor(&alice, SECONDS_PER_YEAR, &NoDiscount)
            .unwrap()
            .unwrap();
        assert!(health < Decimal::ONE);
        assert_eq!(
            ledger.max_borrowable(&alice, SECONDS_PER_YEAR, &NoDiscount).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            ledger.max_withdrawable(&alice, SECONDS_PER_YEAR, &NoDiscount).unwrap(),
            Decimal::ZERO
        );

        let err = ledger
            .borrow(&alice, dec!(0.01), SECONDS_PER_YEAR, &NoDiscount)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceedsBorrowCapacity);
        let err = ledger
            .withdraw(&alice, dec!(0.01), SECONDS_PER_YEAR, &NoDiscount)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceedsBorrowCapacity);
        assert_eq!(ledger.account(&alice), Some(&account));

        // repaying the interest brings the position back under the ceiling
        let receipt = ledger
            .repay(&alice, dec!(71.25), SECONDS_PER_YEAR, &NoDiscount)
            .unwrap();
        assert_eq!(receipt.interest_paid, dec!(71.25));
        assert_eq!(
            ledger.max_borrowable(&alice, SECONDS_PER_YEAR, &NoDiscount).unwrap(),
            dec!(0.75)
        );
    }

    #[test]
    fn test_huge_deposit_does_not_overflow() {
        let mut ledger = Ledger::default();
        let (alice, bob) = (user("alice"), user("bob"));
        ledger.deposit(&alice, dec!(2e27), 0, &NoDiscount).unwrap();
        assert_eq!(ledger.borrow(&alice, dec!(1), 0, &NoDiscount).unwrap(), dec!(1));
        assert!(ledger.max_withdrawable(&alice, 0, &NoDiscount).is_ok());
        assert!(ledger.health_factor(&alice, 0, &NoDiscount).unwrap().is_some());

        ledger.deposit(&bob, Decimal::MAX - dec!(2e27), 0, &NoDiscount).unwrap();
        let err = ledger.deposit(&bob, dec!(1), 0, &NoDiscount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let borrowable = ledger.max_borrowable(&bob, 0, &NoDiscount).unwrap();
        ledger.borrow(&bob, borrowable, 0, &NoDiscount).unwrap();
        // a century of interest on a near-maximal loan cannot be represented
        let err = ledger
            .user_debt(&bob, 100 * SECONDS_PER_YEAR, &NoDiscount)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        let err = ledger
            .repay(&bob, dec!(1), 100 * SECONDS_PER_YEAR, &NoDiscount)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(ledger.pool().total_deposits, Decimal::MAX);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(u8, u32),
        Borrow(u8, u32),
        Repay(u8, u32),
        Withdraw(u8, u32),
        /// Seconds
        Advance(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 1u32..5_000).prop_map(|(u, a)| Op::Deposit(u, a)),
            (0u8..4, 1u32..5_000).prop_map(|(u, a)| Op::Borrow(u, a)),
            (0u8..4, 1u32..5_000).prop_map(|(u, a)| Op::Repay(u, a)),
            (0u8..4, 1u32..5_000).prop_map(|(u, a)| Op::Withdraw(u, a)),
            (1u32..31_536_000).prop_map(Op::Advance),
        ]
    }

    /// Projected debt above the collateral ceiling
    fn over_ceiling(ledger: &Ledger, id: &UserId, now: i64, discounts: &dyn DiscountSource) -> bool {
        let ratio = ledger.params().max_borrow_ratio;
        ledger.account(id).is_some_and(|account| {
            ledger.user_debt(id, now, discounts).unwrap() > account.borrow_capacity(ratio).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_conservation_and_ceiling(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut ledger = Ledger::default();
            let discount = FixedDiscount(dec!(20));
            let ratio = ledger.params().max_borrow_ratio;
            let mut now = 0i64;

            for op in ops {
                // rejections are expected; the invariants must hold either way
                match op {
                    Op::Advance(secs) => now += i64::from(secs),
                    Op::Deposit(u, a) => {
                        let _ = ledger.deposit(&user(&u.to_string()), Decimal::from(a), now, &discount);
                    }
                    Op::Repay(u, a) => {
                        let _ = ledger.repay(&user(&u.to_string()), Decimal::from(a), now, &discount);
                    }
                    Op::Borrow(u, a) => {
                        let id = user(&u.to_string());
                        let over = over_ceiling(&ledger, &id, now, &discount);
                        let result = ledger.borrow(&id, Decimal::from(a), now, &discount);
                        prop_assert!(!(over && result.is_ok()));
                        if result.is_ok() {
                            let account = ledger.account(&id).unwrap();
                            prop_assert!(account.debt() <= account.borrow_capacity(ratio).unwrap());
                        }
                    }
                    Op::Withdraw(u, a) => {
                        let id = user(&u.to_string());
                        let over = over_ceiling(&ledger, &id, now, &discount);
                        let result = ledger.withdraw(&id, Decimal::from(a), now, &discount);
                        prop_assert!(!(over && result.is_ok()));
                        if result.is_ok() {
                            let account = ledger.account(&id).unwrap();
                            prop_assert!(account.debt() <= account.borrow_capacity(ratio).unwrap());
                        }
                    }
                }

                let deposits: Decimal = ledger.accounts().map(|(_, a)| a.deposited).sum();
                let borrows: Decimal = ledger.accounts().map(|(_, a)| a.borrowed).sum();
                prop_assert_eq!(ledger.pool().total_deposits, deposits);
                prop_assert_eq!(ledger.pool().total_borrows, borrows);
                prop_assert!(ledger.pool().reserve_balance <= ledger.pool().cash);
                for (_, account) in ledger.accounts() {
                    let capacity = account.borrow_capacity(ratio).unwrap();
                    // principal alone never exceeds the ceiling; only accrued interest can
                    prop_assert!(account.borrowed <= capacity);
                    prop_assert!(account.debt() <= capacity || account.accrued_interest > Decimal::ZERO);
                    prop_assert!(account.deposited >= Decimal::ZERO);
                    prop_assert!(account.borrowed >= Decimal::ZERO);
                }
            }
        }
    }
}
