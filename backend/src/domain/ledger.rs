//! XP ledger types: the running per-user total, append-only transaction
//! entries, and immutable completion records.
//!
//! ## Invariants
//! - `UserXp.total_xp` and every tier count are additive: no operation ever
//!   decreases them.
//! - A `CompletionRecord` is created exactly once per successful completion
//!   and never mutated; the breakdown it carries is sufficient to replay the
//!   award.

use std::num::NonZeroU64;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChallengeId, UserId};
use super::reward::{BonusBreakdown, QualityRating, RewardBreakdown};
use super::tier::{Tier, TierCounts};

/// Derive the level for an XP total.
///
/// Levels start at 1 and advance every `xp_per_level` XP. The divisor is
/// configuration; the spec leaves the level curve open.
#[must_use]
pub fn level_for_xp(total_xp: u64, xp_per_level: NonZeroU64) -> u32 {
    let levels = total_xp.checked_div(xp_per_level.get()).unwrap_or(0);
    u32::try_from(levels).map_or(u32::MAX, |value| value.saturating_add(1))
}

/// Per-user XP ledger head.
///
/// Mutated only by the completion coordinator, and only additively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UserXp {
    /// Owning user.
    pub user_id: UserId,
    /// Lifetime XP.
    pub total_xp: u64,
    /// Derived level, stored for audit and cheap reads.
    pub level: u32,
    /// Completions per progression tier.
    pub tier_counts: TierCounts,
}

impl UserXp {
    /// Ledger head for a user with no XP yet.
    #[must_use]
    pub fn fresh(user_id: UserId, xp_per_level: NonZeroU64) -> Self {
        Self {
            user_id,
            total_xp: 0,
            level: level_for_xp(0, xp_per_level),
            tier_counts: TierCounts::default(),
        }
    }

    /// Copy with XP credited and, for tiered challenges, the tier counter
    /// incremented.
    #[must_use]
    pub fn credited(mut self, amount: u32, tier: Option<Tier>, xp_per_level: NonZeroU64) -> Self {
        self.total_xp = self.total_xp.saturating_add(u64::from(amount));
        self.level = level_for_xp(self.total_xp, xp_per_level);
        if let Some(tier) = tier {
            self.tier_counts = self.tier_counts.incremented(tier);
        }
        self
    }
}

/// Source of an XP ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum XpSource {
    /// Awarded by the completion coordinator.
    ChallengeCompletion,
}

/// Append-only XP ledger entry, kept for audit and leaderboard
/// recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct XpTransaction {
    /// Credited user.
    pub user_id: UserId,
    /// Where the XP came from.
    pub source: XpSource,
    /// Credited amount.
    pub amount: u32,
    /// Challenge that produced the credit; explicit null for future
    /// non-challenge sources.
    pub challenge_id: Option<ChallengeId>,
    /// Ledger timestamp.
    pub recorded_at: DateTime<Utc>,
}

/// Immutable audit record of one successful completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CompletionRecord {
    /// Completing user.
    pub user_id: UserId,
    /// Completed challenge.
    pub challenge_id: ChallengeId,
    /// Commit timestamp.
    pub completed_at: DateTime<Utc>,
    /// Total XP awarded.
    pub xp_awarded: u32,
    /// Per-bonus XP amounts.
    pub bonus_breakdown: BonusBreakdown,
    /// Base XP at award time.
    pub base_xp: u32,
    /// The user's quality self-rating; explicit null when not supplied.
    pub difficulty_rating: Option<QualityRating>,
}

impl CompletionRecord {
    /// Build the audit record for a computed reward.
    #[must_use]
    pub const fn from_reward(
        user_id: UserId,
        challenge_id: ChallengeId,
        completed_at: DateTime<Utc>,
        reward: &RewardBreakdown,
        difficulty_rating: Option<QualityRating>,
    ) -> Self {
        Self {
            user_id,
            challenge_id,
            completed_at,
            xp_awarded: reward.total_xp,
            bonus_breakdown: reward.bonuses,
            base_xp: reward.base_xp,
            difficulty_rating,
        }
    }

    /// Reconstruct the reward breakdown this record captured.
    #[must_use]
    pub const fn reward(&self) -> RewardBreakdown {
        RewardBreakdown {
            base_xp: self.base_xp,
            bonuses: self.bonus_breakdown,
            total_xp: self.xp_awarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn per_level(value: u64) -> NonZeroU64 {
        NonZeroU64::new(value).expect("non-zero divisor")
    }

    #[rstest]
    #[case(0, 1)]
    #[case(999, 1)]
    #[case(1_000, 2)]
    #[case(4_500, 5)]
    fn level_advances_every_divisor(#[case] total: u64, #[case] expected: u32) {
        assert_eq!(level_for_xp(total, per_level(1_000)), expected);
    }

    #[rstest]
    fn credits_are_additive_and_monotonic() {
        let divisor = per_level(1_000);
        let mut ledger = UserXp::fresh(UserId::random(), divisor);
        let mut previous_total = ledger.total_xp;
        let mut previous_solo = ledger.tier_counts.solo;

        for amount in [190u32, 500, 115, 0, 230] {
            ledger = ledger.credited(amount, Some(Tier::Solo), divisor);
            assert!(ledger.total_xp >= previous_total, "total XP never decreases");
            assert!(ledger.tier_counts.solo >= previous_solo);
            previous_total = ledger.total_xp;
            previous_solo = ledger.tier_counts.solo;
        }

        assert_eq!(ledger.total_xp, 1_035);
        assert_eq!(ledger.level, 2);
        assert_eq!(ledger.tier_counts.solo, 5);
    }

    #[rstest]
    fn tier_free_credit_leaves_counts_alone() {
        let divisor = per_level(1_000);
        let ledger = UserXp::fresh(UserId::random(), divisor).credited(100, None, divisor);
        assert_eq!(ledger.tier_counts, TierCounts::default());
        assert_eq!(ledger.total_xp, 100);
    }

    #[rstest]
    fn completion_record_round_trips_the_reward() {
        let reward = RewardBreakdown {
            base_xp: 100,
            bonuses: BonusBreakdown {
                quality: 50,
                early_completion: 25,
                first_attempt: 15,
            },
            total_xp: 190,
        };
        let record = CompletionRecord::from_reward(
            UserId::random(),
            ChallengeId::random(),
            Utc::now(),
            &reward,
            QualityRating::new(5).ok(),
        );
        assert_eq!(record.reward(), reward);
    }

    #[rstest]
    fn absent_rating_serialises_as_explicit_null() {
        let record = CompletionRecord::from_reward(
            UserId::random(),
            ChallengeId::random(),
            Utc::now(),
            &RewardBreakdown {
                base_xp: 500,
                bonuses: BonusBreakdown::default(),
                total_xp: 500,
            },
            None,
        );
        let doc = serde_json::to_value(&record).expect("serialises");
        assert_eq!(doc.get("difficultyRating"), Some(&serde_json::Value::Null));
    }
}
