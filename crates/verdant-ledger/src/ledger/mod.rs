//! Account ledger and pool accounting

pub mod account;
pub mod book;
pub mod pool;

pub use account::UserAccount;
pub use book::{DiscountSource, Ledger, LedgerParams, NoDiscount, RepayReceipt};
pub use pool::{PoolState, PoolStats};
