//! Engine state and snapshots

use serde::{Deserialize, Serialize};
use verdant_common::{Result, UserId};
use verdant_ledger::{Ledger, PoolStats, RateModel, UserAccount};
use verdant_offsets::{Leaderboard, LeaderboardEntry, LeaderboardStats, OffsetProfile, OffsetRegistry};

use crate::config::EngineConfig;

/// Everything guarded by the engine's write lock
#[derive(Debug, Clone)]
pub struct EngineState {
    pub ledger: Ledger,
    pub offsets: OffsetRegistry,
    pub leaderboard: Leaderboard,
}

impl EngineState {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger: Ledger::new(
                config.ledger.clone(),
                RateModel::new(config.rate_model.clone())?,
            )?,
            offsets: OffsetRegistry::new(config.discount.clone())?,
            leaderboard: Leaderboard::new(config.leaderboard.clone())?,
        })
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            rate_model: self.ledger.rate_model().params().clone(),
            ledger: self.ledger.params().clone(),
            discount: self.offsets.params().clone(),
            leaderboard: self.leaderboard.params().clone(),
        }
    }
}

/// Committed state as pulled by the external read cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Unix seconds
    pub taken_at: i64,
    pub pool: PoolStats,
    /// Sorted by user id
    pub accounts: Vec<(UserId, UserAccount)>,
    /// Sorted by user id
    pub profiles: Vec<OffsetProfile>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub leaderboard_stats: LeaderboardStats,
    pub config: EngineConfig,
}

impl EngineSnapshot {
    pub(crate) fn capture(state: &EngineState, taken_at: i64) -> Self {
        let mut accounts: Vec<_> = state
            .ledger
            .accounts()
            .map(|(user, account)| (user.clone(), account.clone()))
            .collect();
        accounts.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let mut profiles: Vec<_> = state.offsets.profiles().cloned().collect();
        profiles.sort_by(|a, b| a.user.as_str().cmp(b.user.as_str()));

        Self {
            taken_at,
            pool: state.ledger.pool_stats(),
            accounts,
            profiles,
            leaderboard: state.leaderboard.top_n(state.leaderboard.capacity()),
            leaderboard_stats: state.leaderboard.stats(),
            config: state.config(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
