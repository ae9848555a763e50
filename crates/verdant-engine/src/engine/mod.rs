//! Serialized engine over the ledger, offset registry, and leaderboard

pub mod service;
pub mod state;

pub use service::{Bootstrap, LendingEngine};
pub use state::{EngineSnapshot, EngineState};
