//! Offset registry - credential intake and discount engine
//!
//! Credential ids are unique across all users. A rejected intake leaves the
//! registry exactly as it was.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use verdant_common::{amount, OffsetError, Result, UserId, VerdantError, HUNDRED};
use verdant_ledger::DiscountSource;

use super::profile::{OffsetCredit, OffsetProfile};

/// Reward multiplier applied from `min_tons` of cumulative offset upward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierTier {
    pub min_tons: Decimal,
    pub multiplier: Decimal,
}

impl MultiplierTier {
    pub fn new(min_tons: Decimal, multiplier: Decimal) -> Self {
        Self { min_tons, multiplier }
    }
}

/// Discount configuration (percent values)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountParams {
    /// Rate reduction per active credit
    pub per_credit_reduction: Decimal,
    /// Cap on the total reduction, in [0, 100]
    pub max_reduction: Decimal,
    /// Smallest accepted credential, in tons
    pub min_tons: Decimal,
    /// Ascending by `min_tons`, first tier at zero
    pub multiplier_tiers: Vec<MultiplierTier>,
}

impl Default for DiscountParams {
    fn default() -> Self {
        Self {
            per_credit_reduction: Decimal::TEN,
            max_reduction: Decimal::from(50),
            min_tons: Decimal::new(1, 1),
            multiplier_tiers: vec![
                MultiplierTier::new(Decimal::ZERO, Decimal::ONE),
                MultiplierTier::new(Decimal::TEN, Decimal::new(110, 2)),
                MultiplierTier::new(Decimal::from(50), Decimal::new(125, 2)),
                MultiplierTier::new(Decimal::ONE_HUNDRED, Decimal::new(150, 2)),
                MultiplierTier::new(Decimal::from(500), Decimal::TWO),
            ],
        }
    }
}

impl DiscountParams {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(VerdantError::InvalidConfiguration(msg));

        if self.per_credit_reduction < Decimal::ZERO || self.per_credit_reduction > HUNDRED {
            return invalid(format!(
                "per_credit_reduction must lie in [0, 100], got {}",
                self.per_credit_reduction
            ));
        }
        if self.max_reduction < Decimal::ZERO || self.max_reduction > HUNDRED {
            return invalid(format!(
                "max_reduction must lie in [0, 100], got {}",
                self.max_reduction
            ));
        }
        if self.min_tons <= Decimal::ZERO {
            return invalid(format!("min_tons must be positive, got {}", self.min_tons));
        }

        match self.multiplier_tiers.first() {
            Some(first) if first.min_tons.is_zero() => {}
            _ => return invalid("multiplier_tiers must start at 0 tons".to_string()),
        }
        for pair in self.multiplier_tiers.windows(2) {
            if pair[1].min_tons <= pair[0].min_tons || pair[1].multiplier < pair[0].multiplier {
                return invalid(format!(
                    "multiplier_tiers must rise monotonically: {} tons -> {}x after {} tons -> {}x",
                    pair[1].min_tons, pair[1].multiplier, pair[0].min_tons, pair[0].multiplier
                ));
            }
        }
        Ok(())
    }

    /// Multiplier for a cumulative offset total
    pub fn multiplier_for(&self, total_tons: Decimal) -> Decimal {
        self.multiplier_tiers
            .iter()
            .rev()
            .find(|tier| total_tons >= tier.min_tons)
            .map(|tier| tier.multiplier)
            .unwrap_or(Decimal::ONE)
    }

    /// Reduction for a number of active credits
    pub fn discount_for(&self, active_credits: u32) -> Decimal {
        Decimal::from(active_credits)
            .checked_mul(self.per_credit_reduction)
            .map_or(self.max_reduction, |reduction| reduction.min(self.max_reduction))
    }
}

/// A verified credential as delivered by the credential source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSubmission {
    pub recipient: UserId,
    pub tons: Decimal,
    pub credential_id: String,
    pub issuer: String,
    pub project_id: String,
}

/// Per-user offset profiles and the global credential index
#[derive(Debug, Clone, Default)]
pub struct OffsetRegistry {
    params: DiscountParams,
    profiles: HashMap<UserId, OffsetProfile>,
    /// credential id -> owner
    owners: HashMap<String, UserId>,
}

impl OffsetRegistry {
    pub fn new(params: DiscountParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            profiles: HashMap::new(),
            owners: HashMap::new(),
        })
    }

    pub fn params(&self) -> &DiscountParams {
        &self.params
    }

    /// Record a verified credential for its recipient
    pub fn record_credit(&mut self, submission: CreditSubmission, now: i64) -> Result<OffsetProfile> {
        if self.owners.contains_key(&submission.credential_id) {
            debug!(credential_id = %submission.credential_id, "Duplicate credential rejected");
            return Err(OffsetError::DuplicateCredential {
                credential_id: submission.credential_id,
            }
            .into());
        }
        if submission.tons < self.params.min_tons {
            return Err(OffsetError::BelowMinimumOffset {
                tons: submission.tons,
                minimum: self.params.min_tons,
            }
            .into());
        }

        let CreditSubmission {
            recipient,
            tons,
            credential_id,
            issuer,
            project_id,
        } = submission;

        let total = amount::checked_add(
            self.profiles
                .get(&recipient)
                .map_or(Decimal::ZERO, |p| p.total_offset_tons),
            tons,
        )?;
        let multiplier = self.params.multiplier_for(total);

        let profile = self
            .profiles
            .entry(recipient.clone())
            .or_insert_with(|| OffsetProfile::new(recipient.clone(), now));
        profile.credits.push(OffsetCredit {
            credential_id: credential_id.clone(),
            tons,
            issuer,
            project_id,
            recorded_at: now,
            retired_at: None,
        });
        profile.total_offset_tons = total;
        profile.active_credit_count += 1;
        profile.reward_multiplier = multiplier;
        profile.last_credited_at = now;

        info!(
            user = %recipient,
            %credential_id,
            %tons,
            total = %total,
            active = profile.active_credit_count,
            "Recorded offset credit"
        );
        let snapshot = profile.clone();
        self.owners.insert(credential_id, recipient);
        Ok(snapshot)
    }

    /// Mark a credit as retired. Only the active count changes.
    pub fn retire_credit(&mut self, user: &UserId, credential_id: &str, now: i64) -> Result<OffsetProfile> {
        let not_owner = || OffsetError::NotCreditOwner {
            credential_id: credential_id.to_string(),
        };

        if self.owners.get(credential_id) != Some(user) {
            return Err(not_owner().into());
        }
        let profile = self.profiles.get_mut(user).ok_or_else(not_owner)?;
        let credit = profile.credit_mut(credential_id).ok_or_else(not_owner)?;
        if !credit.is_active() {
            return Err(OffsetError::AlreadyRetired {
                credential_id: credential_id.to_string(),
            }
            .into());
        }

        credit.retired_at = Some(now);
        profile.active_credit_count -= 1;
        info!(
            user = %user,
            credential_id,
            active = profile.active_credit_count,
            "Retired offset credit"
        );
        Ok(profile.clone())
    }

    /// Borrow-rate reduction in percent; zero without a profile
    pub fn effective_discount(&self, user: &UserId) -> Decimal {
        self.profiles
            .get(user)
            .map_or(Decimal::ZERO, |p| self.params.discount_for(p.active_credit_count))
    }

    pub fn profile(&self, user: &UserId) -> Option<&OffsetProfile> {
        self.profiles.get(user)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &OffsetProfile> {
        self.profiles.values()
    }

    /// Owner of a recorded credential
    pub fn owner_of(&self, credential_id: &str) -> Option<&UserId> {
        self.owners.get(credential_id)
    }

    /// Swap parameters and re-derive every multiplier from its total
    pub fn update_params(&mut self, params: DiscountParams) -> Result<()> {
        params.validate()?;
        for profile in self.profiles.values_mut() {
            profile.reward_multiplier = params.multiplier_for(profile.total_offset_tons);
        }
        self.params = params;
        Ok(())
    }
}

impl DiscountSource for OffsetRegistry {
    fn discount_percent(&self, user: &UserId) -> Decimal {
        self.effective_discount(user)
    }
}
