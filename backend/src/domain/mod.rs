//! Domain primitives, aggregates, and services for the progression engine.
//!
//! Purpose: Define strongly typed entities, the pure rules (rewards, tiers,
//! streaks), and the transactional completion coordinator. Keep types
//! immutable and document invariants and serialisation contracts (serde) in
//! each type's Rustdoc.
//!
//! Layering: entities and rules know nothing about storage; the coordinator
//! in [`progression_service`] talks to the outside world exclusively through
//! the ports in [`ports`].

pub mod challenge;
pub mod error;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod ports;
pub mod progression_service;
pub mod reward;
pub mod streak;
pub mod tier;
pub mod user_challenge;

pub use self::challenge::{
    Challenge, ChallengeDraft, ChallengeStatus, ChallengeType, ChallengeValidationError,
    ChallengeWindow, Difficulty, RewardSpec,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::events::ProgressionEvent;
pub use self::ids::{ChallengeId, IdValidationError, UserId};
pub use self::ledger::{CompletionRecord, UserXp, XpSource, XpTransaction, level_for_xp};
pub use self::ports::{
    CommitError, CompleteChallengeRequest, CompletionOutcome, DocumentVersion, DocumentWrite,
    EventSink, EventSinkError, ProgressionCommand, ProgressionQuery, ProgressionStore,
    ProgressionSummary, StoreError, SubmitProgressRequest, Versioned, VersionedWrite, WriteBatch,
};
pub use self::progression_service::{EngineConfig, ProgressionService};
pub use self::reward::{
    BonusBreakdown, QualityRating, RewardBreakdown, RewardConfig, RewardInputError, compute_reward,
};
pub use self::streak::{StreakConfig, StreakOutcome, StreakTransition, UserStreak, advance};
pub use self::tier::{
    Tier, TierCounts, TierThresholds, TierUnlockEvaluation, evaluate_tier_unlocks, is_accessible,
    unlocked_tiers,
};
pub use self::user_challenge::{Progress, UserChallenge, UserChallengeError, UserChallengeStatus};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use skilltrade_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
