//! Progression domain events.
//!
//! Emitted after a completion transaction commits, for consumption by the
//! external notification-delivery subsystem. Emission is best-effort: a
//! lost event never affects the committed transaction.

use serde::{Deserialize, Serialize};

use super::ids::{ChallengeId, UserId};
use super::reward::RewardBreakdown;
use super::tier::Tier;

/// Events describing the outcome of a committed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ProgressionEvent {
    /// XP was credited to a user.
    XpAwarded {
        /// Credited user.
        user_id: UserId,
        /// Completed challenge.
        challenge_id: ChallengeId,
        /// The full award breakdown.
        reward: RewardBreakdown,
    },
    /// A tier transitioned from locked to unlocked; fired at most once per
    /// (user, tier).
    TierUnlocked {
        /// The user who unlocked the tier.
        user_id: UserId,
        /// The newly accessible tier.
        tier: Tier,
    },
    /// A streak milestone length was reached.
    StreakMilestone {
        /// The user on a streak.
        user_id: UserId,
        /// The milestone length crossed.
        length: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn events_tag_by_type() {
        let event = ProgressionEvent::TierUnlocked {
            user_id: UserId::random(),
            tier: Tier::Trade,
        };
        let doc = serde_json::to_value(&event).expect("serialises");
        assert_eq!(doc.get("type").and_then(|v| v.as_str()), Some("tier_unlocked"));
        assert_eq!(
            doc.get("payload")
                .and_then(|p| p.get("tier"))
                .and_then(|v| v.as_str()),
            Some("trade")
        );
    }
}
