//! # Verdant Common
//!
//! Shared types, errors, and authority primitives for the Verdant carbon-linked
//! lending ledger.
//!
//! ## Core Types
//!
//! - [`UserId`]: Opaque, already-authenticated user identity
//! - [`DomainEvent`]: Events emitted after every committed mutation
//! - [`amount`]: Fixed-point helpers shared by the ledger and offset engines
//!
//! ## Security
//!
//! - [`security::authority`]: Capability tokens gating credential intake and
//!   administrative operations
//!
//! ## Time
//!
//! - [`clock`]: Injected clock source used for interest accrual

pub mod clock;
pub mod error;
pub mod security;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, ErrorKind, LedgerError, OffsetError, Result, VerdantError};
pub use security::authority::{AccessToken, AuthorityRegistry, Capability};
pub use types::{
    amount::{self, AMOUNT_SCALE, HUNDRED, SECONDS_PER_YEAR},
    events::DomainEvent,
    user_id::UserId,
};

/// Verdant version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
