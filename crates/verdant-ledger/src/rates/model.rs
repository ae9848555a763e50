//! Kinked utilization rate model
//!
//! Rates are annualized percentages. The curve is continuous at the kink and
//! non-decreasing in utilization for non-negative slopes. Utilization is
//! clamped to [0, 100] and every rate term is capped at [`MAX_RATE`], so the
//! curve arithmetic cannot overflow.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use verdant_common::{Result, VerdantError, HUNDRED};

/// Upper bound for `base_rate` and both slopes, in percent
pub const MAX_RATE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Rate curve configuration (all values in percent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateModelParams {
    /// Rate at zero utilization
    pub base_rate: Decimal,
    /// Rate added per 100% utilization below the kink
    pub slope_below_kink: Decimal,
    /// Rate added per 100% utilization above the kink
    pub slope_above_kink: Decimal,
    /// Utilization where the slope steepens, in [0, 100]
    pub kink_utilization: Decimal,
}

impl Default for RateModelParams {
    fn default() -> Self {
        Self {
            base_rate: Decimal::TWO,
            slope_below_kink: Decimal::TEN,
            slope_above_kink: Decimal::ONE_HUNDRED,
            kink_utilization: Decimal::from(80),
        }
    }
}

impl RateModelParams {
    pub fn validate(&self) -> Result<()> {
        if self.kink_utilization < Decimal::ZERO || self.kink_utilization > HUNDRED {
            return Err(VerdantError::InvalidConfiguration(format!(
                "kink_utilization must lie in [0, 100], got {}",
                self.kink_utilization
            )));
        }
        for (name, value) in [
            ("base_rate", self.base_rate),
            ("slope_below_kink", self.slope_below_kink),
            ("slope_above_kink", self.slope_above_kink),
        ] {
            if value < Decimal::ZERO || value > MAX_RATE {
                return Err(VerdantError::InvalidConfiguration(format!(
                    "{name} must lie in [0, {MAX_RATE}], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Utilization-driven borrow/supply rate calculator
#[derive(Debug, Clone, PartialEq)]
pub struct RateModel {
    params: RateModelParams,
}

impl RateModel {
    pub fn new(params: RateModelParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RateModelParams {
        &self.params
    }

    /// Replace the curve; malformed parameters leave the old curve in place
    pub fn update(&mut self, params: RateModelParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Borrowed / deposited, in percent, capped at 100. Zero for an empty pool.
    pub fn utilization(deposits: Decimal, borrows: Decimal) -> Decimal {
        if deposits <= Decimal::ZERO || borrows <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        borrows
            .checked_div(deposits)
            .and_then(|ratio| ratio.checked_mul(HUNDRED))
            .map_or(HUNDRED, |u| u.min(HUNDRED))
    }

    /// Annualized borrow rate for the given pool totals
    pub fn borrow_rate(&self, deposits: Decimal, borrows: Decimal) -> Decimal {
        self.borrow_rate_at(Self::utilization(deposits, borrows))
    }

    /// Annualized borrow rate at utilization `u` (percent)
    pub fn borrow_rate_at(&self, u: Decimal) -> Decimal {
        let p = &self.params;
        let u = u.clamp(Decimal::ZERO, HUNDRED);
        if u < p.kink_utilization {
            p.base_rate + u * p.slope_below_kink / HUNDRED
        } else {
            p.base_rate
                + p.kink_utilization * p.slope_below_kink / HUNDRED
                + (u - p.kink_utilization) * p.slope_above_kink / HUNDRED
        }
    }

    /// Rate earned by depositors: borrow rate net of reserves, scaled by utilization
    pub fn supply_rate(&self, deposits: Decimal, borrows: Decimal, reserve_factor: Decimal) -> Decimal {
        let u = Self::utilization(deposits, borrows);
        let reserve_factor = reserve_factor.clamp(Decimal::ZERO, HUNDRED);
        self.borrow_rate_at(u) * (HUNDRED - reserve_factor) / HUNDRED * u / HUNDRED
    }
}

impl Default for RateModel {
    fn default() -> Self {
        Self {
            params: RateModelParams::default(),
        }
    }
}
