//! Reward calculation.
//!
//! Pure and deterministic: identical inputs always produce the identical
//! breakdown, so awards can be replayed for audit. All arithmetic is
//! integer basis points over the base XP; no floats anywhere near the
//! ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::challenge::{ChallengeWindow, Difficulty};

/// Basis points in a whole (100%).
const BPS_SCALE: u32 = 10_000;

/// Validated self-rated quality signal (1–5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QualityRating(u8);

/// Validation errors for reward inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardInputError {
    /// Quality rating outside the 1–5 scale.
    RatingOutOfRange {
        /// The rejected value.
        value: u8,
    },
    /// Attempt numbers start at 1.
    ZeroAttempt,
}

impl fmt::Display for RewardInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RatingOutOfRange { value } => {
                write!(f, "quality rating must be between 1 and 5, got {value}")
            }
            Self::ZeroAttempt => write!(f, "attempt number must be at least 1"),
        }
    }
}

impl std::error::Error for RewardInputError {}

impl QualityRating {
    /// Validate a raw rating.
    pub const fn new(value: u8) -> Result<Self, RewardInputError> {
        if value < 1 || value > 5 {
            return Err(RewardInputError::RatingOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// The raw 1–5 value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for QualityRating {
    type Error = RewardInputError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QualityRating> for u8 {
    fn from(value: QualityRating) -> Self {
        value.0
    }
}

/// Configured bonus magnitudes, in basis points of the base XP.
///
/// The percentages were chosen empirically by product, so they live in
/// configuration rather than in the rules (spec open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct RewardConfig {
    /// Bonus for submitting early (default 25%).
    pub early_completion_bps: u32,
    /// Bonus for completing on the first attempt (default 15%).
    pub first_attempt_bps: u32,
    /// Bonus per quality-rating step above 1 (default 12.5%, so a rating of
    /// 5 yields 50%).
    pub quality_step_bps: u32,
    /// Share of the window (percent) inside which a submission counts as
    /// early (default 75).
    pub early_window_percent: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            early_completion_bps: 2_500,
            first_attempt_bps: 1_500,
            quality_step_bps: 1_250,
            early_window_percent: 75,
        }
    }
}

/// XP amounts contributed by each bonus.
///
/// Stored verbatim on the completion record, so the breakdown always sums:
/// `total_xp == base_xp + quality + early_completion + first_attempt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct BonusBreakdown {
    /// XP from the quality self-rating.
    pub quality: u32,
    /// XP from submitting within the early share of the window.
    pub early_completion: u32,
    /// XP from completing on the first attempt.
    pub first_attempt: u32,
}

impl BonusBreakdown {
    /// Sum of all bonus XP.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.quality + self.early_completion + self.first_attempt
    }
}

/// The computed award for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct RewardBreakdown {
    /// Base XP from the difficulty table.
    pub base_xp: u32,
    /// Per-bonus XP amounts.
    pub bonuses: BonusBreakdown,
    /// Total XP awarded.
    pub total_xp: u32,
}

/// Round `base * bps / 10_000` to the nearest whole XP.
fn bonus_amount(base: u32, bps: u32) -> u32 {
    let scaled = u64::from(base) * u64::from(bps) + u64::from(BPS_SCALE) / 2;
    #[expect(
        clippy::integer_division,
        reason = "basis-point scaling rounds to nearest by construction"
    )]
    let amount = scaled / u64::from(BPS_SCALE);
    u32::try_from(amount).unwrap_or(u32::MAX)
}

/// Compute the XP award for a completion.
///
/// - Base XP is fixed by difficulty (beginner 100, intermediate 200,
///   advanced 350, expert 500).
/// - Early-completion bonus applies when `submitted_at` falls within the
///   first `early_window_percent` of the challenge window.
/// - First-attempt bonus applies when `attempt_number == 1`.
/// - Quality bonus scales linearly with the optional 1–5 self-rating and is
///   absent without one.
///
/// # Examples
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use skilltrade_backend::domain::challenge::{ChallengeWindow, Difficulty};
/// use skilltrade_backend::domain::reward::{compute_reward, QualityRating, RewardConfig};
///
/// let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().expect("valid");
/// let window = ChallengeWindow::new(start, start + Duration::days(10)).expect("valid");
/// let reward = compute_reward(
///     Difficulty::Beginner,
///     start + Duration::days(5),
///     &window,
///     1,
///     Some(QualityRating::new(5).expect("valid")),
///     &RewardConfig::default(),
/// )
/// .expect("valid inputs");
/// assert_eq!(reward.total_xp, 190);
/// ```
pub fn compute_reward(
    difficulty: Difficulty,
    submitted_at: DateTime<Utc>,
    window: &ChallengeWindow,
    attempt_number: u32,
    quality: Option<QualityRating>,
    config: &RewardConfig,
) -> Result<RewardBreakdown, RewardInputError> {
    if attempt_number == 0 {
        return Err(RewardInputError::ZeroAttempt);
    }

    let base_xp = difficulty.base_xp();

    let early_completion = if window.within_first_share(submitted_at, config.early_window_percent)
    {
        bonus_amount(base_xp, config.early_completion_bps)
    } else {
        0
    };

    let first_attempt = if attempt_number == 1 {
        bonus_amount(base_xp, config.first_attempt_bps)
    } else {
        0
    };

    let quality = quality.map_or(0, |rating| {
        let steps = u32::from(rating.value()) - 1;
        bonus_amount(base_xp, steps * config.quality_step_bps)
    });

    let bonuses = BonusBreakdown {
        quality,
        early_completion,
        first_attempt,
    };

    Ok(RewardBreakdown {
        base_xp,
        bonuses,
        total_xp: base_xp + bonuses.total(),
    })
}
