//! Contributor ranking and badges

pub mod badge;
pub mod board;

pub use badge::{Badge, BadgeThresholds};
pub use board::{
    Leaderboard, LeaderboardEntry, LeaderboardParams, LeaderboardStats, RankChange, ScoreUpdate,
    UserStanding,
};
