//! Tier progression rules.
//!
//! Challenges in the solo, trade, and collaboration categories form an
//! ordered ladder: completions in one tier unlock the next. The evaluation
//! here is a pure function over completion counts so unlock notifications
//! can be replayed and audited deterministically.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Challenge tier in unlock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Self-directed challenges; always unlocked.
    Solo,
    /// One-to-one skill trades; unlocked by solo completions.
    Trade,
    /// Group collaborations; unlocked by trade completions.
    Collaboration,
}

impl Tier {
    /// All tiers in unlock order.
    pub const ALL: [Self; 3] = [Self::Solo, Self::Trade, Self::Collaboration];

    /// The tier immediately below, whose completions gate this one.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Solo => None,
            Self::Trade => Some(Self::Solo),
            Self::Collaboration => Some(Self::Trade),
        }
    }

    /// Stable snake_case name used in documents and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Trade => "trade",
            Self::Collaboration => "collaboration",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier completion counters carried on the user's XP ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct TierCounts {
    /// Completed solo-tier challenges.
    pub solo: u64,
    /// Completed trade-tier challenges.
    pub trade: u64,
    /// Completed collaboration-tier challenges.
    pub collaboration: u64,
}

impl TierCounts {
    /// Completion count for one tier.
    #[must_use]
    pub const fn get(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Solo => self.solo,
            Tier::Trade => self.trade,
            Tier::Collaboration => self.collaboration,
        }
    }

    /// Copy with one tier's count incremented.
    #[must_use]
    pub const fn incremented(mut self, tier: Tier) -> Self {
        match tier {
            Tier::Solo => self.solo += 1,
            Tier::Trade => self.trade += 1,
            Tier::Collaboration => self.collaboration += 1,
        }
        self
    }
}

/// Configured unlock thresholds.
///
/// A tier unlocks when the tier immediately below it reaches the threshold.
/// Solo has no threshold and is always unlocked. These are deliberately
/// configuration rather than constants baked into the rules; product tunes
/// the difficulty curve without code changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct TierThresholds {
    /// Solo completions required to unlock trade.
    pub trade: u32,
    /// Trade completions required to unlock collaboration.
    pub collaboration: u32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            trade: 3,
            collaboration: 3,
        }
    }
}

impl TierThresholds {
    /// The threshold gating a tier, if it has one.
    #[must_use]
    pub const fn for_tier(&self, tier: Tier) -> Option<u32> {
        match tier {
            Tier::Solo => None,
            Tier::Trade => Some(self.trade),
            Tier::Collaboration => Some(self.collaboration),
        }
    }
}

/// Result of evaluating unlocks around a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierUnlockEvaluation {
    /// Tiers unlocked after the update.
    pub unlocked: BTreeSet<Tier>,
    /// Tiers that transitioned from locked to unlocked by this update.
    /// Drives one-shot unlock notifications; never re-fired once granted.
    pub newly_unlocked: BTreeSet<Tier>,
}

/// Tiers unlocked for the given completion counts.
#[must_use]
pub fn unlocked_tiers(counts: &TierCounts, thresholds: &TierThresholds) -> BTreeSet<Tier> {
    Tier::ALL
        .into_iter()
        .filter(|tier| is_unlocked(*tier, counts, thresholds))
        .collect()
}

fn is_unlocked(tier: Tier, counts: &TierCounts, thresholds: &TierThresholds) -> bool {
    match (tier.previous(), thresholds.for_tier(tier)) {
        (Some(below), Some(threshold)) => counts.get(below) >= u64::from(threshold),
        // Solo has no gate.
        _ => true,
    }
}

/// Whether a tier is accessible for joining, honouring a per-challenge
/// threshold override.
#[must_use]
pub fn is_accessible(
    tier: Tier,
    counts: &TierCounts,
    thresholds: &TierThresholds,
    requirement_override: Option<u32>,
) -> bool {
    match tier.previous() {
        None => true,
        Some(below) => {
            let required = requirement_override
                .or_else(|| thresholds.for_tier(tier))
                .unwrap_or(0);
            counts.get(below) >= u64::from(required)
        }
    }
}

/// Evaluate unlocked tiers before and after a counter update.
///
/// `newly_unlocked` is the set difference between the post-update and
/// pre-update unlocked sets.
///
/// # Examples
/// ```
/// use skilltrade_backend::domain::tier::{
///     evaluate_tier_unlocks, Tier, TierCounts, TierThresholds,
/// };
///
/// let before = TierCounts { solo: 2, ..TierCounts::default() };
/// let after = before.incremented(Tier::Solo);
/// let eval = evaluate_tier_unlocks(&before, &after, &TierThresholds::default());
/// assert!(eval.newly_unlocked.contains(&Tier::Trade));
/// ```
#[must_use]
pub fn evaluate_tier_unlocks(
    before: &TierCounts,
    after: &TierCounts,
    thresholds: &TierThresholds,
) -> TierUnlockEvaluation {
    let previously = unlocked_tiers(before, thresholds);
    let unlocked = unlocked_tiers(after, thresholds);
    let newly_unlocked = unlocked.difference(&previously).copied().collect();
    TierUnlockEvaluation {
        unlocked,
        newly_unlocked,
    }
}
