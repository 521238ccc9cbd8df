//! Challenge entity and its classification enums.
//!
//! Challenges are authored outside the engine and are read-only to the core
//! except for their participation counters, which only the completion
//! coordinator may increment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ChallengeId;
use super::tier::Tier;

/// Challenge category determining how (and whether) it counts towards tier
/// progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    /// Daily engagement challenge; tier-free.
    Daily,
    /// Weekly engagement challenge; tier-free.
    Weekly,
    /// Skill-building exercise; tier-free.
    Skill,
    /// Community-wide event; tier-free.
    Community,
    /// Solo-tier challenge.
    Solo,
    /// Trade-tier challenge (one-to-one skill swap).
    Trade,
    /// Collaboration-tier challenge (group project).
    Collaboration,
    /// Personal goal; tier-free.
    Personal,
    /// Limited-run special event; tier-free.
    SpecialEvent,
}

impl ChallengeType {
    /// The progression tier this challenge type belongs to, if any.
    ///
    /// Only the three tiered categories feed the unlock ladder; everything
    /// else is always joinable and never mutates tier counts.
    #[must_use]
    pub const fn tier(self) -> Option<Tier> {
        match self {
            Self::Solo => Some(Tier::Solo),
            Self::Trade => Some(Tier::Trade),
            Self::Collaboration => Some(Tier::Collaboration),
            _ => None,
        }
    }
}

/// Challenge difficulty; fixes the base XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Entry level.
    Beginner,
    /// Some prior practice expected.
    Intermediate,
    /// Substantial prior practice expected.
    Advanced,
    /// Top difficulty band.
    Expert,
}

impl Difficulty {
    /// Base XP awarded for completing a challenge of this difficulty.
    ///
    /// Stored on the challenge document as well so historic awards stay
    /// auditable if this table ever changes.
    #[must_use]
    pub const fn base_xp(self) -> u32 {
        match self {
            Self::Beginner => 100,
            Self::Intermediate => 200,
            Self::Advanced => 350,
            Self::Expert => 500,
        }
    }
}

/// Scheduling lifecycle of a challenge, driven externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    /// Authored but not yet published.
    Draft,
    /// Published, not yet open.
    Upcoming,
    /// Open for joining and completion.
    Active,
    /// Past its window.
    Completed,
    /// Retired from listings.
    Archived,
    /// Withdrawn before or during its window.
    Cancelled,
}

/// The scheduled time window of a challenge.
///
/// ## Invariants
/// - `end` is strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ChallengeWindow {
    /// Construct a window, rejecting empty or inverted ranges.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ChallengeValidationError> {
        if end <= start {
            return Err(ChallengeValidationError::EmptyWindow);
        }
        Ok(Self { start, end })
    }

    /// Window opening instant.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window closing instant.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `instant` falls within the first `cutoff_percent` of the
    /// window. Instants before the window count as within; instants past the
    /// cutoff (or the whole window) do not.
    #[must_use]
    pub fn within_first_share(&self, instant: DateTime<Utc>, cutoff_percent: u32) -> bool {
        let elapsed = (instant - self.start).num_seconds().max(0);
        let total = (self.end - self.start).num_seconds();
        // Integer cross-multiplication; avoids float ratios entirely.
        elapsed.saturating_mul(100) < total.saturating_mul(i64::from(cutoff_percent))
    }
}

/// Reward parameters stored on the challenge for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct RewardSpec {
    /// Base XP, derived from the difficulty at authoring time.
    pub base_xp: u32,
}

/// Validation errors raised by [`Challenge::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeValidationError {
    /// Title was empty after trimming.
    EmptyTitle,
    /// The end date was not after the start date.
    EmptyWindow,
    /// Stored base XP disagrees with the difficulty table.
    BaseXpMismatch {
        /// XP expected for the difficulty.
        expected: u32,
        /// XP found on the document.
        actual: u32,
    },
}

impl fmt::Display for ChallengeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "challenge title must not be empty"),
            Self::EmptyWindow => write!(f, "challenge end date must be after its start date"),
            Self::BaseXpMismatch { expected, actual } => write!(
                f,
                "challenge base XP {actual} does not match difficulty base {expected}"
            ),
        }
    }
}

impl std::error::Error for ChallengeValidationError {}

/// Unvalidated challenge fields, as decoded from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct ChallengeDraft {
    /// Challenge identifier.
    pub id: ChallengeId,
    /// Display title.
    pub title: String,
    /// Longer description shown on the detail page.
    pub description: String,
    /// Free-form category label (e.g. "music", "carpentry").
    pub category: String,
    /// Progression classification.
    pub challenge_type: ChallengeType,
    /// Difficulty band.
    pub difficulty: Difficulty,
    /// Scheduling status.
    pub status: ChallengeStatus,
    /// Window opening instant.
    pub start_date: DateTime<Utc>,
    /// Window closing instant.
    pub end_date: DateTime<Utc>,
    /// Stored reward parameters.
    pub rewards: RewardSpec,
    /// Users who have joined; coordinator-only counter.
    pub participant_count: u64,
    /// Successful completions; coordinator-only counter.
    pub completion_count: u64,
    /// Optional per-challenge override of the tier unlock threshold.
    pub tier_requirement: Option<u32>,
}

/// A definable unit of work a user can attempt.
///
/// Immutable value type; counter updates return a new instance so stale
/// copies can never be written back accidentally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    draft: ChallengeDraft,
}

impl Challenge {
    /// Validate a draft into a challenge.
    pub fn new(draft: ChallengeDraft) -> Result<Self, ChallengeValidationError> {
        if draft.title.trim().is_empty() {
            return Err(ChallengeValidationError::EmptyTitle);
        }
        ChallengeWindow::new(draft.start_date, draft.end_date)?;
        let expected = draft.difficulty.base_xp();
        if draft.rewards.base_xp != expected {
            return Err(ChallengeValidationError::BaseXpMismatch {
                expected,
                actual: draft.rewards.base_xp,
            });
        }
        Ok(Self { draft })
    }

    /// Author a challenge with the base XP derived from its difficulty.
    pub fn authored(mut draft: ChallengeDraft) -> Result<Self, ChallengeValidationError> {
        draft.rewards = RewardSpec {
            base_xp: draft.difficulty.base_xp(),
        };
        Self::new(draft)
    }

    /// Challenge identifier.
    #[must_use]
    pub fn id(&self) -> &ChallengeId {
        &self.draft.id
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.draft.title.as_str()
    }

    /// Progression classification.
    #[must_use]
    pub const fn challenge_type(&self) -> ChallengeType {
        self.draft.challenge_type
    }

    /// Difficulty band.
    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.draft.difficulty
    }

    /// Scheduling status.
    #[must_use]
    pub const fn status(&self) -> ChallengeStatus {
        self.draft.status
    }

    /// The progression tier this challenge counts towards, if any.
    #[must_use]
    pub const fn tier(&self) -> Option<Tier> {
        self.draft.challenge_type.tier()
    }

    /// Stored base XP.
    #[must_use]
    pub const fn base_xp(&self) -> u32 {
        self.draft.rewards.base_xp
    }

    /// Users who have joined.
    #[must_use]
    pub const fn participant_count(&self) -> u64 {
        self.draft.participant_count
    }

    /// Successful completions.
    #[must_use]
    pub const fn completion_count(&self) -> u64 {
        self.draft.completion_count
    }

    /// Optional per-challenge override of the tier unlock threshold.
    #[must_use]
    pub const fn tier_requirement(&self) -> Option<u32> {
        self.draft.tier_requirement
    }

    /// The scheduled window.
    ///
    /// # Panics
    ///
    /// Never panics: the window was validated at construction.
    #[must_use]
    pub fn window(&self) -> ChallengeWindow {
        ChallengeWindow {
            start: self.draft.start_date,
            end: self.draft.end_date,
        }
    }

    /// Whether new participants may join.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.draft.status, ChallengeStatus::Active)
    }

    /// Copy with the participant counter incremented.
    #[must_use]
    pub fn with_participant_recorded(mut self) -> Self {
        self.draft.participant_count += 1;
        self
    }

    /// Copy with the completion counter incremented.
    #[must_use]
    pub fn with_completion_recorded(mut self) -> Self {
        self.draft.completion_count += 1;
        self
    }

    /// Borrow the raw draft for serialisation at the persistence boundary.
    #[must_use]
    pub const fn as_draft(&self) -> &ChallengeDraft {
        &self.draft
    }
}
