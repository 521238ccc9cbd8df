//! Request and response schemas for the progression endpoints.
//!
//! Request bodies are strict: unknown keys are rejected so client typos
//! surface as 400s instead of silently dropped fields. Validation of raw
//! values happens here, at the boundary, producing `invalid_request` errors
//! with machine-readable details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{
    CompletionOutcome, Error, Progress, ProgressionSummary, QualityRating, RewardBreakdown, Tier,
    UserChallenge, UserChallengeStatus, UserStreak,
};

/// Body of `POST /api/challenges/{id}/progress`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct ProgressUpdateBody {
    /// New progress percentage (0–100).
    pub progress: u8,
    /// Evidence references to append to the attempt.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl ProgressUpdateBody {
    /// Validate the raw percentage.
    pub fn validated_progress(&self) -> Result<Progress, Error> {
        Progress::new(self.progress).map_err(|_| {
            Error::invalid_request("progress must be between 0 and 100")
                .with_details(json!({ "code": "progress_out_of_range", "value": self.progress }))
        })
    }
}

/// Body of `POST /api/challenges/{id}/complete`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CompleteChallengeBody {
    /// Optional 1–5 quality self-rating.
    #[serde(default)]
    pub quality_rating: Option<u8>,
}

impl CompleteChallengeBody {
    /// Validate the optional rating.
    pub fn validated_rating(&self) -> Result<Option<QualityRating>, Error> {
        self.quality_rating
            .map(|raw| {
                QualityRating::new(raw).map_err(|_| {
                    Error::invalid_request("quality rating must be between 1 and 5")
                        .with_details(json!({ "code": "rating_out_of_range", "value": raw }))
                })
            })
            .transpose()
    }
}

/// An attempt as returned by the join, progress, and abandon endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    /// Attempted challenge.
    pub challenge_id: String,
    /// Lifecycle state.
    pub status: UserChallengeStatus,
    /// Progress percentage.
    pub progress: u8,
    /// Attempt ordinal.
    pub attempts: u32,
    /// Join timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp; explicit null until completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Evidence references recorded so far.
    pub submissions: Vec<String>,
}

impl From<UserChallenge> for AttemptResponse {
    fn from(attempt: UserChallenge) -> Self {
        Self {
            challenge_id: attempt.challenge_id.to_string(),
            status: attempt.status,
            progress: attempt.progress.value(),
            attempts: attempt.attempts,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            submissions: attempt.submissions,
        }
    }
}

/// Response of `POST /api/challenges/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    /// Total XP awarded.
    pub xp_awarded: u32,
    /// Full award breakdown.
    pub reward: RewardBreakdown,
    /// Tiers unlocked by this completion, in unlock order.
    pub newly_unlocked_tiers: Vec<Tier>,
    /// Streak state after the completion.
    pub streak: UserStreak,
    /// Whether this response replays an earlier completion.
    pub replayed: bool,
}

impl From<CompletionOutcome> for CompletionResponse {
    fn from(outcome: CompletionOutcome) -> Self {
        Self {
            xp_awarded: outcome.xp_awarded,
            reward: outcome.reward,
            newly_unlocked_tiers: outcome.newly_unlocked_tiers,
            streak: outcome.streak,
            replayed: outcome.replayed,
        }
    }
}

/// Response of `GET /api/users/{id}/progression`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionSummaryResponse {
    /// Lifetime XP.
    pub total_xp: u64,
    /// Current level.
    pub level: u32,
    /// Completions per tier.
    pub tier_counts: crate::domain::TierCounts,
    /// Currently unlocked tiers, in unlock order.
    pub unlocked_tiers: Vec<Tier>,
    /// Streak state.
    pub streak: UserStreak,
}

impl From<ProgressionSummary> for ProgressionSummaryResponse {
    fn from(summary: ProgressionSummary) -> Self {
        Self {
            total_xp: summary.xp.total_xp,
            level: summary.xp.level,
            tier_counts: summary.xp.tier_counts,
            unlocked_tiers: summary.unlocked_tiers,
            streak: summary.streak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, from_value};

    #[rstest]
    fn progress_body_rejects_unknown_keys() {
        let raw = json!({ "progress": 50, "evidenc": [] });
        let result: Result<ProgressUpdateBody, _> = from_value(raw);
        assert!(result.is_err(), "typoed key must be rejected");
    }

    #[rstest]
    fn progress_body_defaults_evidence() {
        let body: ProgressUpdateBody = from_value(json!({ "progress": 50 })).expect("parses");
        assert!(body.evidence.is_empty());
        assert_eq!(
            body.validated_progress().expect("valid").value(),
            50
        );
    }

    #[rstest]
    fn out_of_range_progress_is_invalid_request() {
        let body: ProgressUpdateBody = from_value(json!({ "progress": 101 })).expect("parses");
        let err = body.validated_progress().expect_err("rejected");
        assert_eq!(
            err.details().and_then(|d| d.get("code")).and_then(Value::as_str),
            Some("progress_out_of_range")
        );
    }

    #[rstest]
    #[case(0)]
    #[case(6)]
    fn out_of_range_rating_is_invalid_request(#[case] raw: u8) {
        let body = CompleteChallengeBody {
            quality_rating: Some(raw),
        };
        assert!(body.validated_rating().is_err());
    }

    #[rstest]
    fn absent_rating_validates_to_none() {
        let body = CompleteChallengeBody::default();
        assert_eq!(body.validated_rating().expect("valid"), None);
    }
}
