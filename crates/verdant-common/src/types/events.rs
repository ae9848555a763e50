//! Domain events
//!
//! Emitted after a mutation commits. Delivery is fire-and-forget: no sink
//! outcome can roll back the state that produced the event.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::user_id::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Deposited {
        user: UserId,
        amount: Decimal,
        at: i64,
    },
    Borrowed {
        user: UserId,
        amount: Decimal,
        at: i64,
    },
    Repaid {
        user: UserId,
        interest_paid: Decimal,
        principal_paid: Decimal,
        refunded: Decimal,
        at: i64,
    },
    Withdrawn {
        user: UserId,
        amount: Decimal,
        at: i64,
    },
    CreditRecorded {
        user: UserId,
        credential_id: String,
        tons: Decimal,
        issuer: String,
        project_id: String,
        total_offset_tons: Decimal,
        at: i64,
    },
    CreditRetired {
        user: UserId,
        credential_id: String,
        active_credit_count: u32,
        at: i64,
    },
    /// Pool borrow rate moved (utilization change or rate-model update)
    RateAdjusted {
        previous_rate: Decimal,
        borrow_rate: Decimal,
        supply_rate: Decimal,
        utilization: Decimal,
        at: i64,
    },
    ScoreUpdated {
        user: UserId,
        score: Decimal,
        badge: String,
        at: i64,
    },
    /// `None` means unranked
    RankChanged {
        user: UserId,
        old_rank: Option<u32>,
        new_rank: Option<u32>,
        at: i64,
    },
    ConfigUpdated {
        section: String,
        at: i64,
    },
}

impl DomainEvent {
    /// Short event name for logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Deposited { .. } => "deposited",
            DomainEvent::Borrowed { .. } => "borrowed",
            DomainEvent::Repaid { .. } => "repaid",
            DomainEvent::Withdrawn { .. } => "withdrawn",
            DomainEvent::CreditRecorded { .. } => "credit_recorded",
            DomainEvent::CreditRetired { .. } => "credit_retired",
            DomainEvent::RateAdjusted { .. } => "rate_adjusted",
            DomainEvent::ScoreUpdated { .. } => "score_updated",
            DomainEvent::RankChanged { .. } => "rank_changed",
            DomainEvent::ConfigUpdated { .. } => "config_updated",
        }
    }

    /// User the event concerns, if any
    pub fn user(&self) -> Option<&UserId> {
        match self {
            DomainEvent::Deposited { user, .. }
            | DomainEvent::Borrowed { user, .. }
            | DomainEvent::Repaid { user, .. }
            | DomainEvent::Withdrawn { user, .. }
            | DomainEvent::CreditRecorded { user, .. }
            | DomainEvent::CreditRetired { user, .. }
            | DomainEvent::ScoreUpdated { user, .. }
            | DomainEvent::RankChanged { user, .. } => Some(user),
            DomainEvent::RateAdjusted { .. } | DomainEvent::ConfigUpdated { .. } => None,
        }
    }
}
