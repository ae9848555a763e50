//! OffsetProfile - a user's credential history
//!
//! Created lazily on the first recorded credit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use verdant_common::UserId;

/// One verified offset credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetCredit {
    /// Globally unique, usable exactly once
    pub credential_id: String,
    pub tons: Decimal,
    /// Registry or verifier that issued the credential
    pub issuer: String,
    pub project_id: String,
    /// Unix seconds
    pub recorded_at: i64,
    /// Unix seconds; `Some` once retired
    pub retired_at: Option<i64>,
}

impl OffsetCredit {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetProfile {
    pub user: UserId,
    /// Credits in recording order
    pub credits: Vec<OffsetCredit>,
    /// Never decreases
    pub total_offset_tons: Decimal,
    /// Decreases only on explicit retirement
    pub active_credit_count: u32,
    pub reward_multiplier: Decimal,
    pub first_credited_at: i64,
    pub last_credited_at: i64,
}

impl OffsetProfile {
    pub(crate) fn new(user: UserId, now: i64) -> Self {
        Self {
            user,
            credits: Vec::new(),
            total_offset_tons: Decimal::ZERO,
            active_credit_count: 0,
            reward_multiplier: Decimal::ONE,
            first_credited_at: now,
            last_credited_at: now,
        }
    }

    pub fn credit(&self, credential_id: &str) -> Option<&OffsetCredit> {
        self.credits.iter().find(|c| c.credential_id == credential_id)
    }

    pub(crate) fn credit_mut(&mut self, credential_id: &str) -> Option<&mut OffsetCredit> {
        self.credits
            .iter_mut()
            .find(|c| c.credential_id == credential_id)
    }

    /// Credential ids held by this user, active or retired
    pub fn credit_ids(&self) -> impl Iterator<Item = &str> {
        self.credits.iter().map(|c| c.credential_id.as_str())
    }
}
