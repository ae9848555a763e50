//! Engine configuration
//!
//! Sources, lowest precedence first:
//! - Built-in defaults
//! - An optional TOML/JSON file
//! - `VERDANT__`-prefixed environment variables, `__` between sections
//!   (e.g. `VERDANT__LEDGER__MAX_BORROW_RATIO=70`)

use serde::{Deserialize, Serialize};
use tracing::info;
use verdant_common::{Result, VerdantError};
use verdant_ledger::{LedgerParams, RateModelParams};
use verdant_offsets::{DiscountParams, LeaderboardParams};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VERDANT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rate_model: RateModelParams,
    pub ledger: LedgerParams,
    pub discount: DiscountParams,
    pub leaderboard: LeaderboardParams,
}

impl EngineConfig {
    /// Load configuration from `.env`, an optional file, and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let cfg: EngineConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| VerdantError::Config(e.to_string()))?;
        cfg.validate()?;

        info!(
            kink = %cfg.rate_model.kink_utilization,
            max_borrow_ratio = %cfg.ledger.max_borrow_ratio,
            capacity = cfg.leaderboard.capacity,
            "Loaded engine configuration"
        );
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.rate_model.validate()?;
        self.ledger.validate()?;
        self.discount.validate()?;
        self.leaderboard.validate()
    }
}
