//! Offset credential intake and discount calculation

pub mod profile;
pub mod registry;

pub use profile::{OffsetCredit, OffsetProfile};
pub use registry::{CreditSubmission, DiscountParams, MultiplierTier, OffsetRegistry};
