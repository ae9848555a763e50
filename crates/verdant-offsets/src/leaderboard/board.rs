//! Leaderboard - users ordered by cumulative offset tons
//!
//! Every participant sits in one ordered index; the first `capacity`
//! positions hold a rank. Each score change takes a fresh sequence number, so
//! among equal scores whoever reached the score first stays ahead.
//!
//! Insert and remove are logarithmic. Rank lookups walk at most `capacity`
//! entries of the index, so they cost O(capacity) no matter how many users
//! sit below the ranked window.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use verdant_common::{Result, UserId, VerdantError};

use super::badge::{Badge, BadgeThresholds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardParams {
    /// Number of ranked positions
    pub capacity: usize,
    pub badges: BadgeThresholds,
}

impl Default for LeaderboardParams {
    fn default() -> Self {
        Self {
            capacity: 100,
            badges: BadgeThresholds::default(),
        }
    }
}

impl LeaderboardParams {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(VerdantError::InvalidConfiguration(
                "leaderboard capacity must be at least 1".to_string(),
            ));
        }
        self.badges.validate()
    }
}

/// Ranked row returned by [`Leaderboard::top_n`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: u32,
    pub user: UserId,
    pub score: Decimal,
    pub badge: Badge,
    /// Unix seconds when the current score was reached
    pub reached_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStanding {
    pub user: UserId,
    pub score: Decimal,
    pub badge: Badge,
    pub rank: Option<u32>,
    pub rank_multiplier: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub participants: usize,
    pub ranked: usize,
    /// Sum over every participant, saturating at `Decimal::MAX`
    pub total_tons: Decimal,
    pub top_score: Option<Decimal>,
    pub capacity: usize,
}

/// A rank transition of some user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    pub user: UserId,
    pub old_rank: Option<u32>,
    pub new_rank: Option<u32>,
}

/// Outcome of [`Leaderboard::update_score`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub user: UserId,
    pub score: Decimal,
    pub old_badge: Badge,
    pub badge: Badge,
    pub old_rank: Option<u32>,
    pub new_rank: Option<u32>,
    /// Pushed out of the ranked positions by this update
    pub displaced: Option<RankChange>,
    /// Pulled into the ranked positions by this update
    pub promoted: Option<RankChange>,
}

impl ScoreUpdate {
    pub fn rank_changed(&self) -> bool {
        self.old_rank != self.new_rank
    }

    /// Every rank transition caused by the update, the updated user first
    pub fn rank_changes(&self) -> Vec<RankChange> {
        let mut changes = Vec::with_capacity(3);
        if self.rank_changed() {
            changes.push(RankChange {
                user: self.user.clone(),
                old_rank: self.old_rank,
                new_rank: self.new_rank,
            });
        }
        changes.extend(self.displaced.iter().cloned());
        changes.extend(self.promoted.iter().cloned());
        changes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    score: Reverse<Decimal>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct Record {
    key: RankKey,
    badge: Badge,
    reached_at: i64,
}

impl Record {
    fn score(&self) -> Decimal {
        self.key.score.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    params: LeaderboardParams,
    /// Users with a positive score, best first
    order: BTreeMap<RankKey, UserId>,
    records: HashMap<UserId, Record>,
    next_seq: u64,
}

impl Leaderboard {
    pub fn new(params: LeaderboardParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &LeaderboardParams {
        &self.params
    }

    pub fn capacity(&self) -> usize {
        self.params.capacity
    }

    /// Set a user's cumulative offset. Scores at or below zero hold no rank.
    #[instrument(skip(self), fields(user = %user))]
    pub fn update_score(&mut self, user: &UserId, score: Decimal, now: i64) -> ScoreUpdate {
        let score = score.max(Decimal::ZERO);
        let previous = self.records.get(user).cloned();
        let old_badge = previous.as_ref().map_or(Badge::None, |r| r.badge);
        let old_rank = previous.as_ref().and_then(|r| self.rank_of(&r.key));
        let badge = self.params.badges.badge_for(score);

        if let Some(prev) = previous.as_ref().filter(|r| r.score() == score) {
            // same score keeps its place in the order
            self.records.insert(user.clone(), Record { badge, ..prev.clone() });
            return ScoreUpdate {
                user: user.clone(),
                score,
                old_badge,
                badge,
                old_rank,
                new_rank: old_rank,
                displaced: None,
                promoted: None,
            };
        }

        let cap = self.params.capacity;
        // only the boundary user can cross it
        let (last_ranked, first_unranked) = match old_rank {
            None => (self.user_at(cap - 1), None),
            Some(_) => (None, self.user_at(cap)),
        };

        if let Some(prev) = &previous {
            self.order.remove(&prev.key);
        }
        let key = RankKey {
            score: Reverse(score),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        if score > Decimal::ZERO {
            self.order.insert(key, user.clone());
        }
        self.records.insert(
            user.clone(),
            Record {
                key,
                badge,
                reached_at: now,
            },
        );
        let new_rank = self.ranked_key(user).and_then(|k| self.rank_of(&k));

        let displaced = last_ranked
            .filter(|other| self.rank_of_user(other).is_none())
            .map(|other| RankChange {
                user: other,
                old_rank: u32::try_from(cap).ok(),
                new_rank: None,
            });
        let promoted = first_unranked.and_then(|other| {
            self.rank_of_user(&other).map(|rank| RankChange {
                user: other,
                old_rank: None,
                new_rank: Some(rank),
            })
        });

        debug!(
            %score,
            badge = %badge,
            ?old_rank,
            ?new_rank,
            "Leaderboard updated"
        );

        ScoreUpdate {
            user: user.clone(),
            score,
            old_badge,
            badge,
            old_rank,
            new_rank,
            displaced,
            promoted,
        }
    }

    /// Up to `n` ranked entries, best first
    pub fn top_n(&self, n: usize) -> Vec<LeaderboardEntry> {
        self.order
            .iter()
            .take(n.min(self.params.capacity))
            .zip(1u32..)
            .filter_map(|((key, user), rank)| {
                let record = self.records.get(user)?;
                Some(LeaderboardEntry {
                    rank,
                    user: user.clone(),
                    score: key.score.0,
                    badge: record.badge,
                    reached_at: record.reached_at,
                })
            })
            .collect()
    }

    pub fn user_score(&self, user: &UserId) -> Option<UserStanding> {
        let record = self.records.get(user)?;
        let rank = self.rank_of_user(user);
        Some(UserStanding {
            user: user.clone(),
            score: record.score(),
            badge: record.badge,
            rank,
            rank_multiplier: Self::multiplier_for_rank(rank),
        })
    }

    pub fn stats(&self) -> LeaderboardStats {
        LeaderboardStats {
            participants: self.records.len(),
            ranked: self.order.len().min(self.params.capacity),
            total_tons: self
                .records
                .values()
                .fold(Decimal::ZERO, |total, record| total.saturating_add(record.score())),
            top_score: self.order.keys().next().map(|k| k.score.0),
            capacity: self.params.capacity,
        }
    }

    pub fn is_top_contributor(&self, user: &UserId, n: u32) -> bool {
        self.rank_of_user(user).is_some_and(|rank| rank <= n)
    }

    pub fn rank_multiplier(&self, user: &UserId) -> Decimal {
        Self::multiplier_for_rank(self.rank_of_user(user))
    }

    pub fn multiplier_for_rank(rank: Option<u32>) -> Decimal {
        match rank {
            Some(1) => Decimal::TWO,
            Some(2..=10) => Decimal::new(150, 2),
            Some(11..=50) => Decimal::new(125, 2),
            Some(_) => Decimal::new(110, 2),
            None => Decimal::ONE,
        }
    }

    pub fn rank_of_user(&self, user: &UserId) -> Option<u32> {
        self.ranked_key(user).and_then(|k| self.rank_of(&k))
    }

    /// Swap parameters, re-deriving badges. Returns users whose rank moved
    /// across the capacity boundary.
    pub fn update_params(&mut self, params: LeaderboardParams) -> Result<Vec<RankChange>> {
        params.validate()?;
        let (old_cap, new_cap) = (self.params.capacity, params.capacity);

        let changes = self
            .order
            .values()
            .enumerate()
            .skip(old_cap.min(new_cap))
            .take(old_cap.max(new_cap) - old_cap.min(new_cap))
            .map(|(pos, user)| {
                let rank = u32::try_from(pos + 1).ok();
                let (old_rank, new_rank) = if pos < old_cap { (rank, None) } else { (None, rank) };
                RankChange {
                    user: user.clone(),
                    old_rank,
                    new_rank,
                }
            })
            .collect();

        for record in self.records.values_mut() {
            record.badge = params.badges.badge_for(record.score());
        }
        self.params = params;
        Ok(changes)
    }

    fn ranked_key(&self, user: &UserId) -> Option<RankKey> {
        self.records
            .get(user)
            .map(|r| r.key)
            .filter(|k| self.order.contains_key(k))
    }

    fn rank_of(&self, key: &RankKey) -> Option<u32> {
        let cap = self.params.capacity;
        if !self.order.contains_key(key) {
            return None;
        }
        let ahead = self.order.range(..*key).take(cap).count();
        if ahead < cap {
            u32::try_from(ahead + 1).ok()
        } else {
            None
        }
    }

    /// User at 0-based `pos` in the full order
    fn user_at(&self, pos: usize) -> Option<UserId> {
        self.order.values().nth(pos).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn board(capacity: usize) -> Leaderboard {
        Leaderboard::new(LeaderboardParams {
            capacity,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_three_contributors() {
        let mut lb = Leaderboard::default();
        let a = lb.update_score(&UserId::from("a"), dec!(5), 1);
        let b = lb.update_score(&UserId::from("b"), dec!(50), 2);
        let c = lb.update_score(&UserId::from("c"), dec!(120), 3);

        assert_eq!(a.badge, Badge::Bronze);
        assert_eq!(b.badge, Badge::Gold);
        assert_eq!(c.badge, Badge::Platinum);
        assert_eq!(c.new_rank, Some(1));

        let top: Vec<_> = lb.top_n(10).into_iter().map(|e| (e.user, e.rank)).collect();
        assert_eq!(
            top,
            vec![
                (UserId::from("c"), 1),
                (UserId::from("b"), 2),
                (UserId::from("a"), 3)
            ]
        );
        assert_eq!(lb.rank_multiplier(&UserId::from("c")), dec!(2));
        assert_eq!(lb.rank_multiplier(&UserId::from("a")), dec!(1.50));
        assert!(lb.is_top_contributor(&UserId::from("b"), 2));
        assert!(!lb.is_top_contributor(&UserId::from("a"), 2));
    }

    #[test]
    fn test_ties_favor_first_to_reach() {
        let mut lb = Leaderboard::default();
        lb.update_score(&UserId::from("early"), dec!(10), 1);
        lb.update_score(&UserId::from("late"), dec!(5), 2);
        lb.update_score(&UserId::from("late"), dec!(10), 3);

        assert_eq!(lb.rank_of_user(&UserId::from("early")), Some(1));
        assert_eq!(lb.rank_of_user(&UserId::from("late")), Some(2));

        // re-reporting the same score keeps the position
        let update = lb.update_score(&UserId::from("early"), dec!(10), 4);
        assert!(!update.rank_changed());
        assert_eq!(lb.rank_of_user(&UserId::from("early")), Some(1));
    }

    #[test]
    fn test_capacity_displaces_lowest() {
        let mut lb = board(2);
        lb.update_score(&UserId::from("a"), dec!(30), 1);
        lb.update_score(&UserId::from("b"), dec!(20), 2);

        let update = lb.update_score(&UserId::from("c"), dec!(25), 3);
        assert_eq!(update.old_rank, None);
        assert_eq!(update.new_rank, Some(2));
        assert_eq!(
            update.displaced,
            Some(RankChange {
                user: UserId::from("b"),
                old_rank: Some(2),
                new_rank: None,
            })
        );
        assert_eq!(update.rank_changes().len(), 2);

        let standing = lb.user_score(&UserId::from("b")).unwrap();
        assert_eq!(standing.rank, None);
        assert_eq!(standing.rank_multiplier, dec!(1));
        assert_eq!(standing.badge, Badge::Silver);

        // below the lowest ranked score nobody moves
        let update = lb.update_score(&UserId::from("d"), dec!(1), 4);
        assert_eq!(update.new_rank, None);
        assert!(update.displaced.is_none());
    }

    #[test]
    fn test_lowered_score_promotes_next() {
        let mut lb = board(1);
        lb.update_score(&UserId::from("a"), dec!(30), 1);
        lb.update_score(&UserId::from("b"), dec!(20), 2);

        let update = lb.update_score(&UserId::from("a"), dec!(10), 3);
        assert_eq!(update.new_rank, None);
        assert_eq!(
            update.promoted,
            Some(RankChange {
                user: UserId::from("b"),
                old_rank: None,
                new_rank: Some(1),
            })
        );
    }

    #[test]
    fn test_stats() {
        let mut lb = board(2);
        assert_eq!(lb.stats().top_score, None);
        lb.update_score(&UserId::from("a"), dec!(3), 1);
        lb.update_score(&UserId::from("b"), dec!(7), 1);
        lb.update_score(&UserId::from("c"), dec!(1.5), 1);

        let stats = lb.stats();
        assert_eq!(stats.participants, 3);
        assert_eq!(stats.ranked, 2);
        assert_eq!(stats.total_tons, dec!(11.5));
        assert_eq!(stats.top_score, Some(dec!(7)));
    }

    #[test]
    fn test_stats_total_saturates() {
        let mut lb = board(2);
        lb.update_score(&UserId::from("a"), Decimal::MAX, 1);
        lb.update_score(&UserId::from("b"), Decimal::MAX, 1);
        assert_eq!(lb.stats().total_tons, Decimal::MAX);
    }

    #[test]
    fn test_rank_lookup_with_long_tail() {
        let mut lb = board(3);
        for i in 1..=2_000u32 {
            lb.update_score(&UserId::from(format!("u{i}")), Decimal::from(i), 1);
        }
        assert_eq!(lb.rank_of_user(&UserId::from("u2000")), Some(1));
        assert_eq!(lb.rank_of_user(&UserId::from("u1998")), Some(3));
        assert_eq!(lb.rank_of_user(&UserId::from("u1997")), None);
        assert_eq!(lb.rank_of_user(&UserId::from("u1")), None);

        // the tail user jumps straight to the top and pushes out the old third
        let update = lb.update_score(&UserId::from("u1"), dec!(5000), 2);
        assert_eq!(update.new_rank, Some(1));
        assert_eq!(
            update.displaced,
            Some(RankChange {
                user: UserId::from("u1998"),
                old_rank: Some(3),
                new_rank: None,
            })
        );
    }

    #[test]
    fn test_capacity_growth_ranks_waiting_users() {
        let mut lb = board(1);
        lb.update_score(&UserId::from("a"), dec!(9), 1);
        lb.update_score(&UserId::from("b"), dec!(8), 1);

        let changes = lb
            .update_params(LeaderboardParams {
                capacity: 5,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            changes,
            vec![RankChange {
                user: UserId::from("b"),
                old_rank: None,
                new_rank: Some(2),
            }]
        );
        assert_eq!(lb.rank_of_user(&UserId::from("b")), Some(2));
    }

    #[test]
    fn test_threshold_change_rebadges() {
        let mut lb = Leaderboard::default();
        lb.update_score(&UserId::from("a"), dec!(20), 1);
        lb.update_params(LeaderboardParams {
            badges: BadgeThresholds {
                bronze: dec!(1),
                silver: dec!(5),
                gold: dec!(15),
                platinum: dec!(40),
            },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(lb.user_score(&UserId::from("a")).unwrap().badge, Badge::Gold);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(Leaderboard::new(LeaderboardParams {
            capacity: 0,
            ..Default::default()
        })
        .is_err());
    }

    proptest! {
        #[test]
        fn prop_ranked_entries_descend(
            updates in prop::collection::vec((0u8..12, 1u32..500), 1..80),
            capacity in 1usize..8,
        ) {
            let mut lb = board(capacity);
            for (i, (user, score)) in updates.iter().enumerate() {
                lb.update_score(&UserId::from(format!("u{user}")), Decimal::from(*score), i as i64);
            }

            let top = lb.top_n(usize::MAX);
            prop_assert!(top.len() <= capacity);
            for pair in top.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                prop_assert_eq!(pair[0].rank + 1, pair[1].rank);
            }

            if top.len() == capacity {
                let lowest = top[capacity - 1].score;
                for u in 0u8..12 {
                    let id = UserId::from(format!("u{u}"));
                    if let Some(standing) = lb.user_score(&id) {
                        if standing.rank.is_none() {
                            prop_assert!(standing.score <= lowest);
                        }
                    }
                }
            }
        }
    }
}
