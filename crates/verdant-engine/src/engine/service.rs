//! LendingEngine - serialized entry point for every operation
//!
//! Mutations take the write lock for the whole accrue-then-mutate step and
//! either commit completely or leave state untouched. Events gathered during
//! a mutation are queued only after the lock is released.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use verdant_common::{
    AccessToken, AuthorityRegistry, Capability, Clock, DomainEvent, Result, UserId, VerdantError,
};
use verdant_ledger::{LedgerParams, PoolStats, RateModelParams, RepayReceipt, UserAccount};
use verdant_offsets::{
    CreditSubmission, DiscountParams, LeaderboardEntry, LeaderboardParams, LeaderboardStats,
    OffsetProfile, RankChange, ScoreUpdate, UserStanding,
};

use super::state::{EngineSnapshot, EngineState};
use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;

/// Result of [`LendingEngine::bootstrap`]
pub struct Bootstrap {
    pub engine: Arc<LendingEngine>,
    /// Initial admin token, shown once
    pub admin_token: AccessToken,
    /// Committed events, to be drained by an
    /// [`EventDispatcher`](crate::notify::EventDispatcher)
    pub events: mpsc::UnboundedReceiver<DomainEvent>,
}

pub struct LendingEngine {
    state: RwLock<EngineState>,
    authority: AuthorityRegistry,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<DomainEvent>,
    metrics: EngineMetrics,
}

impl LendingEngine {
    /// Build the engine and issue the initial admin token
    pub fn bootstrap(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Bootstrap> {
        let state = EngineState::from_config(&config)?;
        let metrics = EngineMetrics::new().map_err(|e| VerdantError::Config(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let authority = AuthorityRegistry::new();
        let admin_token = authority.issue("bootstrap-admin", &[Capability::Admin]);

        metrics.observe_pool(&state.ledger.pool_stats());
        info!(version = verdant_common::VERSION, "Lending engine bootstrapped");

        Ok(Bootstrap {
            engine: Arc::new(Self {
                state: RwLock::new(state),
                authority,
                clock,
                events: tx,
                metrics,
            }),
            admin_token,
            events: rx,
        })
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    // ============ LEDGER ============

    #[instrument(skip(self), fields(user = %user))]
    pub fn deposit(&self, user: &UserId, amount: Decimal) -> Result<UserAccount> {
        self.mutate("deposit", |state, now, events| {
            let account = state.ledger.deposit(user, amount, now, &state.offsets)?;
            events.push(DomainEvent::Deposited {
                user: user.clone(),
                amount,
                at: now,
            });
            Ok(account)
        })
    }

    #[instrument(skip(self), fields(user = %user))]
    pub fn borrow(&self, user: &UserId, amount: Decimal) -> Result<Decimal> {
        self.mutate("borrow", |state, now, events| {
            let sent = state.ledger.borrow(user, amount, now, &state.offsets)?;
            events.push(DomainEvent::Borrowed {
                user: user.clone(),
                amount: sent,
                at: now,
            });
            Ok(sent)
        })
    }

    #[instrument(skip(self), fields(user = %user))]
    pub fn repay(&self, user: &UserId, amount: Decimal) -> Result<RepayReceipt> {
        self.mutate("repay", |state, now, events| {
            let receipt = state.ledger.repay(user, amount, now, &state.offsets)?;
            events.push(DomainEvent::Repaid {
                user: user.clone(),
                interest_paid: receipt.interest_paid,
                principal_paid: receipt.principal_paid,
                refunded: receipt.refunded,
                at: now,
            });
            Ok(receipt)
        })
    }

    #[instrument(skip(self), fields(user = %user))]
    pub fn withdraw(&self, user: &UserId, amount: Decimal) -> Result<Decimal> {
        self.mutate("withdraw", |state, now, events| {
            let sent = state.ledger.withdraw(user, amount, now, &state.offsets)?;
            events.push(DomainEvent::Withdrawn {
                user: user.clone(),
                amount: sent,
                at: now,
            });
            Ok(sent)
        })
    }

    /// Debt projected to now, not committed
    pub fn user_debt(&self, user: &UserId) -> Result<Decimal> {
        let state = self.state.read();
        state.ledger.user_debt(user, self.now(), &state.offsets)
    }

    /// Committed account, without projected interest
    pub fn account(&self, user: &UserId) -> Option<UserAccount> {
        self.state.read().ledger.account(user).cloned()
    }

    pub fn max_borrowable(&self, user: &UserId) -> Result<Decimal> {
        let state = self.state.read();
        state.ledger.max_borrowable(user, self.now(), &state.offsets)
    }

    pub fn max_withdrawable(&self, user: &UserId) -> Result<Decimal> {
        let state = self.state.read();
        state.ledger.max_withdrawable(user, self.now(), &state.offsets)
    }

    pub fn health_factor(&self, user: &UserId) -> Result<Option<Decimal>> {
        let state = self.state.read();
        state.ledger.health_factor(user, self.now(), &state.offsets)
    }

    pub fn utilization_rate(&self) -> Decimal {
        self.state.read().ledger.utilization_rate()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.state.read().ledger.pool_stats()
    }

    // ============ OFFSETS ============

    /// Record a verified credential; requires [`Capability::CredentialIntake`]
    #[instrument(skip(self, token, submission), fields(user = %submission.recipient, credential_id = %submission.credential_id))]
    pub fn record_credit(&self, token: &AccessToken, submission: CreditSubmission) -> Result<OffsetProfile> {
        let outcome = self.mutate("record_credit", |state, now, events| {
            self.authority.authorize(token, Capability::CredentialIntake)?;

            let CreditSubmission {
                recipient,
                tons,
                credential_id,
                issuer,
                project_id,
            } = submission.clone();
            let profile = state.offsets.record_credit(submission, now)?;
            let update = state
                .leaderboard
                .update_score(&recipient, profile.total_offset_tons, now);

            events.push(DomainEvent::CreditRecorded {
                user: recipient,
                credential_id,
                tons,
                issuer,
                project_id,
                total_offset_tons: profile.total_offset_tons,
                at: now,
            });
            push_score_events(events, &update, now);
            Ok(profile)
        });
        if outcome.is_ok() {
            self.metrics.credits_recorded_total.inc();
        }
        outcome
    }

    #[instrument(skip(self), fields(user = %user))]
    pub fn retire_credit(&self, user: &UserId, credential_id: &str) -> Result<OffsetProfile> {
        self.mutate("retire_credit", |state, now, events| {
            let profile = state.offsets.retire_credit(user, credential_id, now)?;
            events.push(DomainEvent::CreditRetired {
                user: user.clone(),
                credential_id: credential_id.to_string(),
                active_credit_count: profile.active_credit_count,
                at: now,
            });
            Ok(profile)
        })
    }

    pub fn effective_discount(&self, user: &UserId) -> Decimal {
        self.state.read().offsets.effective_discount(user)
    }

    pub fn profile(&self, user: &UserId) -> Option<OffsetProfile> {
        self.state.read().offsets.profile(user).cloned()
    }

    /// Tier multiplier from cumulative offset; 1 without a profile
    pub fn reward_multiplier(&self, user: &UserId) -> Decimal {
        self.state
            .read()
            .offsets
            .profile(user)
            .map_or(Decimal::ONE, |p| p.reward_multiplier)
    }

    // ============ LEADERBOARD ============

    pub fn top_n(&self, n: usize) -> Vec<LeaderboardEntry> {
        self.state.read().leaderboard.top_n(n)
    }

    pub fn user_score(&self, user: &UserId) -> Option<UserStanding> {
        self.state.read().leaderboard.user_score(user)
    }

    pub fn leaderboard_stats(&self) -> LeaderboardStats {
        self.state.read().leaderboard.stats()
    }

    pub fn is_top_contributor(&self, user: &UserId, n: u32) -> bool {
        self.state.read().leaderboard.is_top_contributor(user, n)
    }

    pub fn rank_multiplier(&self, user: &UserId) -> Decimal {
        self.state.read().leaderboard.rank_multiplier(user)
    }

    // ============ ADMIN ============

    pub fn update_rate_model(&self, token: &AccessToken, params: RateModelParams) -> Result<()> {
        self.admin("update_rate_model", token, |state, now, events| {
            state.ledger.update_rate_model(params)?;
            events.push(config_updated("rate_model", now));
            Ok(())
        })
    }

    pub fn update_ledger_params(&self, token: &AccessToken, params: LedgerParams) -> Result<()> {
        self.admin("update_ledger_params", token, |state, now, events| {
            state.ledger.update_params(params)?;
            events.push(config_updated("ledger", now));
            Ok(())
        })
    }

    /// Discounts apply from each user's next accrual pass
    pub fn update_discount_params(&self, token: &AccessToken, params: DiscountParams) -> Result<()> {
        self.admin("update_discount_params", token, |state, now, events| {
            state.offsets.update_params(params)?;
            events.push(config_updated("discount", now));
            Ok(())
        })
    }

    pub fn update_leaderboard_params(&self, token: &AccessToken, params: LeaderboardParams) -> Result<()> {
        self.admin("update_leaderboard_params", token, |state, now, events| {
            let changes = state.leaderboard.update_params(params)?;
            events.extend(changes.into_iter().map(|c| rank_changed(c, now)));
            events.push(config_updated("leaderboard", now));
            Ok(())
        })
    }

    pub fn withdraw_reserves(&self, token: &AccessToken, amount: Decimal) -> Result<Decimal> {
        self.admin("withdraw_reserves", token, |state, _now, _events| {
            let sent = state.ledger.withdraw_reserves(amount)?;
            info!(%sent, "Reserves withdrawn");
            Ok(sent)
        })
    }

    pub fn issue_token(&self, token: &AccessToken, label: &str, capabilities: &[Capability]) -> Result<AccessToken> {
        self.authorized("issue_token", token, Capability::Admin)?;
        Ok(self.authority.issue(label, capabilities))
    }

    /// Returns whether `target` existed
    pub fn revoke_token(&self, token: &AccessToken, target: &AccessToken) -> Result<bool> {
        self.authorized("revoke_token", token, Capability::Admin)?;
        Ok(self.authority.revoke(target))
    }

    pub fn config(&self) -> EngineConfig {
        self.state.read().config()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(&self.state.read(), self.now())
    }

    // ============ INTERNALS ============

    fn authorized(&self, operation: &str, token: &AccessToken, capability: Capability) -> Result<()> {
        self.authority.authorize(token, capability).map_err(|e| {
            let err = VerdantError::from(e);
            self.metrics.record_rejection(operation, err.kind());
            err
        })
    }

    fn admin<T>(
        &self,
        operation: &'static str,
        token: &AccessToken,
        f: impl FnOnce(&mut EngineState, i64, &mut Vec<DomainEvent>) -> Result<T>,
    ) -> Result<T> {
        self.mutate(operation, |state, now, events| {
            self.authority.authorize(token, Capability::Admin)?;
            f(state, now, events)
        })
    }

    /// Run one serialized transition and queue its events once it committed
    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut EngineState, i64, &mut Vec<DomainEvent>) -> Result<T>,
    ) -> Result<T> {
        let mut events = Vec::new();
        let outcome = {
            let mut state = self.state.write();
            let now = self.clock.now();
            let previous_rate = state.ledger.borrow_rate();

            let outcome = f(&mut *state, now, &mut events);
            if outcome.is_ok() {
                let stats = state.ledger.pool_stats();
                if stats.borrow_rate != previous_rate {
                    events.push(DomainEvent::RateAdjusted {
                        previous_rate,
                        borrow_rate: stats.borrow_rate,
                        supply_rate: stats.supply_rate,
                        utilization: stats.utilization,
                        at: now,
                    });
                }
                self.metrics.observe_pool(&stats);
            }
            outcome
        };

        match &outcome {
            Ok(_) => {
                info!(operation, events = events.len(), "Operation committed");
                self.metrics.record_success(operation);
                self.publish(events);
            }
            Err(e) => {
                debug!(operation, error = %e, "Operation rejected");
                self.metrics.record_rejection(operation, e.kind());
            }
        }
        outcome
    }

    fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.metrics.events_emitted_total.inc();
            if self.events.send(event).is_err() {
                warn!("Event receiver dropped; notification skipped");
                break;
            }
        }
    }
}

fn push_score_events(events: &mut Vec<DomainEvent>, update: &ScoreUpdate, now: i64) {
    events.push(DomainEvent::ScoreUpdated {
        user: update.user.clone(),
        score: update.score,
        badge: update.badge.to_string(),
        at: now,
    });
    events.extend(update.rank_changes().into_iter().map(|c| rank_changed(c, now)));
}

fn rank_changed(change: RankChange, now: i64) -> DomainEvent {
    DomainEvent::RankChanged {
        user: change.user,
        old_rank: change.old_rank,
        new_rank: change.new_rank,
        at: now,
    }
}

fn config_updated(section: &str, now: i64) -> DomainEvent {
    DomainEvent::ConfigUpdated {
        section: section.to_string(),
        at: now,
    }
}
