//! # Verdant Offsets
//!
//! Carbon-offset credentials turned into borrowing discounts and standings.
//!
//! ## Discount Formula
//!
//! ```text
//! discount = min(active_credits × per_credit_reduction, max_reduction)
//! ```
//!
//! Retiring a credit lowers `active_credits` only; total tons and the reward
//! multiplier never go down.
//!
//! ## Leaderboard
//!
//! Users are ordered by total offset tons, descending. Among equal scores the
//! user who reached the score first ranks higher. Only the first `capacity`
//! positions hold a rank.

pub mod discount;
pub mod leaderboard;

pub use discount::{
    profile::{OffsetCredit, OffsetProfile},
    registry::{CreditSubmission, DiscountParams, MultiplierTier, OffsetRegistry},
};
pub use leaderboard::{
    badge::{Badge, BadgeThresholds},
    board::{
        Leaderboard, LeaderboardEntry, LeaderboardParams, LeaderboardStats, RankChange,
        ScoreUpdate, UserStanding,
    },
};
