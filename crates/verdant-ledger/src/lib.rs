//! # Verdant Ledger
//!
//! Deposit/borrow accounting with continuously accruing, utilization-priced
//! interest.
//!
//! ## Rate Model
//!
//! ```text
//! u < kink:  rate = base + u × slope_below / 100
//! u ≥ kink:  rate = base + kink × slope_below / 100 + (u − kink) × slope_above / 100
//! ```
//!
//! ## Accrual
//!
//! Every transition first accrues interest on the pre-mutation state:
//!
//! ```text
//! effective = rate × (100 − discount) / 100
//! interest  = borrowed × effective × elapsed / (SECONDS_PER_YEAR × 100)
//! ```
//!
//! The discount comes from a [`DiscountSource`], normally the offset registry.

pub mod ledger;
pub mod rates;

pub use ledger::{
    account::UserAccount,
    book::{DiscountSource, Ledger, LedgerParams, NoDiscount, RepayReceipt},
    pool::{PoolState, PoolStats},
};
pub use rates::model::{RateModel, RateModelParams, MAX_RATE};
