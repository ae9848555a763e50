//! Badge tiers derived from cumulative offset tons

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use verdant_common::{Result, VerdantError};

/// Ordered badge tiers, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    None,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Badge {
    /// 0 for [`Badge::None`] up to 4 for [`Badge::Platinum`]
    pub fn tier(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::None => "none",
            Badge::Bronze => "bronze",
            Badge::Silver => "silver",
            Badge::Gold => "gold",
            Badge::Platinum => "platinum",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum tons for each named tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeThresholds {
    pub bronze: Decimal,
    pub silver: Decimal,
    pub gold: Decimal,
    pub platinum: Decimal,
}

impl Default for BadgeThresholds {
    fn default() -> Self {
        Self {
            bronze: Decimal::ONE,
            silver: Decimal::TEN,
            gold: Decimal::from(50),
            platinum: Decimal::ONE_HUNDRED,
        }
    }
}

impl BadgeThresholds {
    pub fn validate(&self) -> Result<()> {
        let ladder = [self.bronze, self.silver, self.gold, self.platinum];
        if self.bronze <= Decimal::ZERO || ladder.windows(2).any(|w| w[1] <= w[0]) {
            return Err(VerdantError::InvalidConfiguration(format!(
                "badge thresholds must be positive and strictly rising, got {}/{}/{}/{}",
                self.bronze, self.silver, self.gold, self.platinum
            )));
        }
        Ok(())
    }

    pub fn badge_for(&self, tons: Decimal) -> Badge {
        if tons >= self.platinum {
            Badge::Platinum
        } else if tons >= self.gold {
            Badge::Gold
        } else if tons >= self.silver {
            Badge::Silver
        } else if tons >= self.bronze {
            Badge::Bronze
        } else {
            Badge::None
        }
    }
}
