//! A user's attempt at a challenge.
//!
//! ## Invariants
//! - At most one attempt exists per (user, challenge) pair; the store keys
//!   documents by that pair.
//! - `Completed` is terminal: no transition out of it exists, and no field
//!   affecting the recorded reward may change once it is set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChallengeId, UserId};

/// Attempt lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChallengeStatus {
    /// In progress.
    Active,
    /// Successfully completed; terminal.
    Completed,
    /// Given up; may be reactivated by re-joining.
    Abandoned,
}

/// Validated progress percentage (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Progress(u8);

/// Validation errors for attempt state transitions and fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChallengeError {
    /// Progress outside 0–100.
    ProgressOutOfRange {
        /// The rejected value.
        value: u8,
    },
    /// A mutation was attempted on a completed (terminal) attempt.
    AlreadyCompleted,
    /// A mutation requiring an active attempt found an abandoned one.
    NotActive,
}

impl fmt::Display for UserChallengeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgressOutOfRange { value } => {
                write!(f, "progress must be between 0 and 100, got {value}")
            }
            Self::AlreadyCompleted => write!(f, "attempt is completed and immutable"),
            Self::NotActive => write!(f, "attempt is not active"),
        }
    }
}

impl std::error::Error for UserChallengeError {}

impl Progress {
    /// Zero progress.
    pub const NONE: Self = Self(0);
    /// Full progress.
    pub const COMPLETE: Self = Self(100);

    /// Validate a raw percentage.
    pub const fn new(value: u8) -> Result<Self, UserChallengeError> {
        if value > 100 {
            return Err(UserChallengeError::ProgressOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// The raw percentage.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Progress {
    type Error = UserChallengeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Progress> for u8 {
    fn from(value: Progress) -> Self {
        value.0
    }
}

/// A user's attempt at a challenge.
///
/// Created on join, mutated by progress updates and the completion
/// transaction, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UserChallenge {
    /// Owning user.
    pub user_id: UserId,
    /// Attempted challenge.
    pub challenge_id: ChallengeId,
    /// Lifecycle state.
    pub status: UserChallengeStatus,
    /// Self-reported progress.
    pub progress: Progress,
    /// Attempt ordinal; starts at 1 and grows only by abandon + re-join.
    pub attempts: u32,
    /// When the user first joined.
    pub started_at: DateTime<Utc>,
    /// When the attempt completed; explicit null until then.
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque evidence references supplied by the upload service.
    pub submissions: Vec<String>,
}

impl UserChallenge {
    /// A fresh attempt, created when a user joins a challenge.
    #[must_use]
    pub fn joined(user_id: UserId, challenge_id: ChallengeId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            challenge_id,
            status: UserChallengeStatus::Active,
            progress: Progress::NONE,
            attempts: 1,
            started_at: now,
            completed_at: None,
            submissions: Vec::new(),
        }
    }

    /// Whether the attempt is currently active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, UserChallengeStatus::Active)
    }

    /// Whether the attempt has completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, UserChallengeStatus::Completed)
    }

    /// Record a progress update with accompanying evidence.
    pub fn with_progress(
        mut self,
        progress: Progress,
        evidence: Vec<String>,
    ) -> Result<Self, UserChallengeError> {
        self.require_active()?;
        self.progress = progress;
        self.submissions.extend(evidence);
        Ok(self)
    }

    /// Transition to the terminal completed state.
    pub fn completed(mut self, now: DateTime<Utc>) -> Result<Self, UserChallengeError> {
        self.require_active()?;
        self.status = UserChallengeStatus::Completed;
        self.progress = Progress::COMPLETE;
        self.completed_at = Some(now);
        Ok(self)
    }

    /// Give up on the attempt.
    pub fn abandoned(mut self) -> Result<Self, UserChallengeError> {
        self.require_active()?;
        self.status = UserChallengeStatus::Abandoned;
        Ok(self)
    }

    /// Reactivate an abandoned attempt, counting a new attempt.
    pub fn rejoined(mut self) -> Result<Self, UserChallengeError> {
        match self.status {
            UserChallengeStatus::Abandoned => {
                self.status = UserChallengeStatus::Active;
                self.attempts += 1;
                Ok(self)
            }
            UserChallengeStatus::Completed => Err(UserChallengeError::AlreadyCompleted),
            UserChallengeStatus::Active => Ok(self),
        }
    }

    const fn require_active(&self) -> Result<(), UserChallengeError> {
        match self.status {
            UserChallengeStatus::Active => Ok(()),
            UserChallengeStatus::Completed => Err(UserChallengeError::AlreadyCompleted),
            UserChallengeStatus::Abandoned => Err(UserChallengeError::NotActive),
        }
    }
}
