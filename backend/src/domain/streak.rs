//! Daily engagement streak tracking.
//!
//! A pure state machine over [`UserStreak`]: each completion advances the
//! streak by calendar day, with a consumable "freeze" absorbing exactly one
//! missed day. Optional fields that have never been set are explicit
//! `None`, which serialises to explicit `null` — the persistence layer
//! rejects documents with missing optional keys.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Streak configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct StreakConfig {
    /// Freezes granted to a brand-new streak.
    pub initial_freezes: u32,
    /// Streak lengths that trigger a milestone event, ascending.
    pub milestones: Vec<u32>,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            initial_freezes: 1,
            milestones: vec![3, 7, 14, 30, 60, 100],
        }
    }
}

/// Per-user engagement streak state.
///
/// ## Invariants
/// - `current_streak >= 0` and `longest_streak >= current_streak` after
///   every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UserStreak {
    /// Consecutive-day count; 0 until the first completion.
    pub current_streak: u32,
    /// High-water mark of `current_streak`.
    pub longest_streak: u32,
    /// Date of the last counted activity; explicit null before any.
    pub last_activity_date: Option<NaiveDate>,
    /// Remaining freeze tokens.
    pub freezes_available: u32,
    /// When a freeze last absorbed a missed day; explicit null if never.
    pub last_freeze_at: Option<NaiveDate>,
}

impl UserStreak {
    /// Initial state for a user with no prior activity.
    #[must_use]
    pub const fn fresh(config: &StreakConfig) -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            freezes_available: config.initial_freezes,
            last_freeze_at: None,
        }
    }
}

/// What a transition did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOutcome {
    /// Activity already counted for today.
    AlreadyCounted,
    /// First activity ever recorded.
    Started,
    /// Consecutive day; streak extended.
    Extended,
    /// One missed day absorbed by a freeze; streak preserved.
    FrozenPreserved,
    /// Chain broken; streak reset to 1.
    Reset,
}

/// Result of advancing the streak for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakTransition {
    /// The updated streak state.
    pub streak: UserStreak,
    /// Classification of the transition.
    pub outcome: StreakOutcome,
    /// Milestone length crossed by this transition, if any.
    pub milestone_reached: Option<u32>,
}

/// Advance the streak for activity on `today`.
///
/// Transition rules:
/// - same day → no-op;
/// - consecutive day → extend;
/// - a gap of exactly one missed day with a freeze in reserve → consume the
///   freeze and preserve the current streak;
/// - any longer gap (or no freeze) → reset to 1.
///
/// The `longest_streak` high-water mark and `last_activity_date` are
/// maintained unconditionally.
#[must_use]
pub fn advance(streak: &UserStreak, today: NaiveDate, config: &StreakConfig) -> StreakTransition {
    let (current, freezes_available, last_freeze_at, outcome) = match streak.last_activity_date {
        None => (1, streak.freezes_available, streak.last_freeze_at, StreakOutcome::Started),
        Some(last) if last == today => {
            return StreakTransition {
                streak: streak.clone(),
                outcome: StreakOutcome::AlreadyCounted,
                milestone_reached: None,
            };
        }
        Some(last) => {
            let gap = (today - last).num_days();
            if gap == 1 {
                (
                    streak.current_streak + 1,
                    streak.freezes_available,
                    streak.last_freeze_at,
                    StreakOutcome::Extended,
                )
            } else if gap == 2 && streak.freezes_available > 0 {
                // The freeze absorbs the single missed day; the streak is
                // preserved, not extended.
                (
                    streak.current_streak,
                    streak.freezes_available - 1,
                    Some(today),
                    StreakOutcome::FrozenPreserved,
                )
            } else {
                (1, streak.freezes_available, streak.last_freeze_at, StreakOutcome::Reset)
            }
        }
    };

    let updated = UserStreak {
        current_streak: current,
        longest_streak: streak.longest_streak.max(current),
        last_activity_date: Some(today),
        freezes_available,
        last_freeze_at,
    };

    let milestone_reached = (current > streak.current_streak
        && config.milestones.contains(&current))
    .then_some(current);

    StreakTransition {
        streak: updated,
        outcome,
        milestone_reached,
    }
}
