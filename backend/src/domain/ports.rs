//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (the document store and the event sink) and what driving adapters (HTTP
//! handlers, tests) may ask of it. Each trait exposes strongly typed errors
//! so adapters map their failures into predictable variants instead of
//! returning `anyhow::Result`.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use super::challenge::Challenge;
use super::error::Error;
use super::events::ProgressionEvent;
use super::ids::{ChallengeId, UserId};
use super::ledger::{CompletionRecord, UserXp, XpTransaction};
use super::reward::{QualityRating, RewardBreakdown};
use super::streak::UserStreak;
use super::tier::Tier;
use super::user_challenge::{Progress, UserChallenge};

// ---------------------------------------------------------------------------
// Versioned documents
// ---------------------------------------------------------------------------

/// Optimistic-concurrency version of a stored document.
///
/// Version 0 means "not yet created"; a commit against it asserts the
/// document still does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocumentVersion(u64);

impl DocumentVersion {
    /// Version asserting the document does not exist yet.
    pub const NEW: Self = Self(0);

    /// Wrap a raw version counter.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version a successful write produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The decoded document.
    pub value: T,
    /// Version observed at read time.
    pub version: DocumentVersion,
}

impl<T> Versioned<T> {
    /// Pair a value with its version.
    pub const fn new(value: T, version: DocumentVersion) -> Self {
        Self { value, version }
    }

    /// A write that replaces this exact revision with `value`.
    pub fn write(self, value: T) -> VersionedWrite<T> {
        VersionedWrite {
            expected: self.version,
            value,
        }
    }
}

/// A conditional write: applied only if the stored version still matches
/// `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedWrite<T> {
    /// Version the document must still have for the write to apply.
    pub expected: DocumentVersion,
    /// Replacement value.
    pub value: T,
}

impl<T> VersionedWrite<T> {
    /// A write asserting the document does not exist yet.
    pub const fn create(value: T) -> Self {
        Self {
            expected: DocumentVersion::NEW,
            value,
        }
    }
}

/// One document mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    /// Conditional write of a user's attempt.
    UserChallenge(VersionedWrite<UserChallenge>),
    /// Conditional write of a challenge (counter updates only).
    Challenge(VersionedWrite<Challenge>),
    /// Conditional write of a user's XP ledger head.
    UserXp(VersionedWrite<UserXp>),
    /// Conditional write of a user's streak state. Streak documents carry
    /// no owner field, so the key travels with the write.
    UserStreak {
        /// Owning user; the document key.
        user_id: UserId,
        /// The conditional write.
        write: VersionedWrite<UserStreak>,
    },
    /// Insert of an immutable completion record; never overwrites.
    CompletionRecord(CompletionRecord),
    /// Append of an XP ledger entry; never overwrites.
    XpTransaction(XpTransaction),
}

/// An atomic set of document writes.
///
/// The store applies either every write or none. All version preconditions
/// are checked against the same snapshot before any write lands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<DocumentWrite>,
}

impl WriteBatch {
    /// An empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Add a conditional attempt write.
    #[must_use]
    pub fn user_challenge(mut self, write: VersionedWrite<UserChallenge>) -> Self {
        self.writes.push(DocumentWrite::UserChallenge(write));
        self
    }

    /// Add a conditional challenge write.
    #[must_use]
    pub fn challenge(mut self, write: VersionedWrite<Challenge>) -> Self {
        self.writes.push(DocumentWrite::Challenge(write));
        self
    }

    /// Add a conditional XP ledger head write.
    #[must_use]
    pub fn user_xp(mut self, write: VersionedWrite<UserXp>) -> Self {
        self.writes.push(DocumentWrite::UserXp(write));
        self
    }

    /// Add a conditional streak write keyed by its owning user.
    #[must_use]
    pub fn user_streak(mut self, user_id: UserId, write: VersionedWrite<UserStreak>) -> Self {
        self.writes.push(DocumentWrite::UserStreak { user_id, write });
        self
    }

    /// Add a completion record insert.
    #[must_use]
    pub fn completion_record(mut self, record: CompletionRecord) -> Self {
        self.writes.push(DocumentWrite::CompletionRecord(record));
        self
    }

    /// Add an XP ledger append.
    #[must_use]
    pub fn xp_transaction(mut self, entry: XpTransaction) -> Self {
        self.writes.push(DocumentWrite::XpTransaction(entry));
        self
    }

    /// The writes in insertion order.
    #[must_use]
    pub fn writes(&self) -> &[DocumentWrite] {
        self.writes.as_slice()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Driven port errors
// ---------------------------------------------------------------------------

/// Errors surfaced by store reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store connectivity failure.
    #[error("document store connection failed: {message}")]
    Connection {
        /// Adapter-provided context.
        message: String,
    },
    /// Query execution failure.
    #[error("document store query failed: {message}")]
    Query {
        /// Adapter-provided context.
        message: String,
    },
    /// A stored document failed to decode into its domain type.
    #[error("document decode failed: {message}")]
    Decode {
        /// Adapter-provided context.
        message: String,
    },
}

impl StoreError {
    /// Helper for connection related adapter errors.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for query failures.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Helper for decode failures.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Errors surfaced when committing a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// A version precondition was stale; the caller should re-read and
    /// retry the whole transaction.
    #[error("optimistic conflict on {collection}/{key}")]
    Conflict {
        /// Collection of the stale document.
        collection: String,
        /// Key of the stale document.
        key: String,
    },
    /// An insert targeted an append-only collection entry that already
    /// exists. Programming defect, not a retryable condition.
    #[error("immutable document {collection}/{key} already exists")]
    ImmutableOverwrite {
        /// Collection of the existing document.
        collection: String,
        /// Key of the existing document.
        key: String,
    },
    /// A document reached the boundary with an unset field the schema
    /// declares. Programming defect: sanitisation runs unconditionally.
    #[error("sanitisation violation: {message}")]
    Sanitization {
        /// What the sanitiser rejected.
        message: String,
    },
    /// The store backend failed.
    #[error("document store commit failed: {message}")]
    Backend {
        /// Adapter-provided context.
        message: String,
    },
}

impl CommitError {
    /// Helper for optimistic conflicts.
    pub fn conflict(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Helper for append-only violations.
    pub fn immutable_overwrite(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ImmutableOverwrite {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Helper for sanitiser rejections.
    pub fn sanitization(message: impl Into<String>) -> Self {
        Self::Sanitization {
            message: message.into(),
        }
    }

    /// Helper for backend failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the event sink adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventSinkError {
    /// The sink cannot accept events right now.
    #[error("event sink unavailable: {message}")]
    Unavailable {
        /// Adapter-provided context.
        message: String,
    },
}

impl EventSinkError {
    /// Helper for sink outages.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Driven ports
// ---------------------------------------------------------------------------

/// Persistence port over the transactional document store.
///
/// Reads return the version each document was observed at; the coordinator
/// threads those versions back into [`WriteBatch`] preconditions so a
/// concurrent mutation of any involved document fails the commit.
#[async_trait]
pub trait ProgressionStore: Send + Sync {
    /// Fetch a challenge by identifier.
    async fn load_challenge(
        &self,
        id: &ChallengeId,
    ) -> Result<Option<Versioned<Challenge>>, StoreError>;

    /// Fetch a user's attempt at a challenge.
    async fn load_user_challenge(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<Option<Versioned<UserChallenge>>, StoreError>;

    /// Fetch a user's XP ledger head.
    async fn load_user_xp(&self, user_id: &UserId)
    -> Result<Option<Versioned<UserXp>>, StoreError>;

    /// Fetch a user's streak state.
    async fn load_user_streak(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<UserStreak>>, StoreError>;

    /// Fetch the completion record for a (user, challenge) pair.
    async fn find_completion_record(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<Option<CompletionRecord>, StoreError>;

    /// Atomically apply a write batch; consumed only by the coordinator.
    async fn commit(&self, batch: WriteBatch) -> Result<(), CommitError>;

    /// Insert a freshly authored challenge. Used by seeding and tests; the
    /// authoring workflow itself is outside the engine.
    async fn insert_challenge(&self, challenge: Challenge) -> Result<(), CommitError>;
}

/// Boundary to the external notification subsystem.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Enqueue one event. Best-effort; the caller bounds the wait and only
    /// logs failures.
    async fn emit(&self, event: ProgressionEvent) -> Result<(), EventSinkError>;
}

// ---------------------------------------------------------------------------
// Driving ports
// ---------------------------------------------------------------------------

/// Request to record progress against a joined challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitProgressRequest {
    /// Authenticated user.
    pub user_id: UserId,
    /// Target challenge.
    pub challenge_id: ChallengeId,
    /// New progress percentage.
    pub progress: Progress,
    /// Evidence references to append.
    pub evidence: Vec<String>,
}

/// Request to complete a joined challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteChallengeRequest {
    /// Authenticated user.
    pub user_id: UserId,
    /// Target challenge.
    pub challenge_id: ChallengeId,
    /// Optional quality self-rating.
    pub quality_rating: Option<QualityRating>,
}

/// Result of a (possibly replayed) completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// Total XP awarded for this completion.
    pub xp_awarded: u32,
    /// Full award breakdown.
    pub reward: RewardBreakdown,
    /// Tiers unlocked by this completion, in unlock order.
    pub newly_unlocked_tiers: Vec<Tier>,
    /// Streak state after the completion.
    pub streak: UserStreak,
    /// Whether this call replayed an earlier completion instead of
    /// committing a new one.
    pub replayed: bool,
}

/// Snapshot of a user's progression state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionSummary {
    /// XP ledger head (fresh defaults if the user has none yet).
    pub xp: UserXp,
    /// Streak state (fresh defaults if the user has none yet).
    pub streak: UserStreak,
    /// Currently unlocked tiers, in unlock order.
    pub unlocked_tiers: Vec<Tier>,
}

/// Driving port for attempt lifecycle commands.
#[async_trait]
pub trait ProgressionCommand: Send + Sync {
    /// Join a challenge, creating (or reactivating) the user's attempt.
    async fn join_challenge(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<UserChallenge, Error>;

    /// Record progress and evidence against an active attempt.
    async fn submit_progress(
        &self,
        request: SubmitProgressRequest,
    ) -> Result<UserChallenge, Error>;

    /// Abandon an active attempt.
    async fn abandon_challenge(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<UserChallenge, Error>;

    /// Complete an active attempt, committing the reward atomically.
    async fn complete_challenge(
        &self,
        request: CompleteChallengeRequest,
    ) -> Result<CompletionOutcome, Error>;
}

/// Driving port for progression queries.
#[async_trait]
pub trait ProgressionQuery: Send + Sync {
    /// A user's XP, streak, and unlocked tiers.
    async fn progression_summary(&self, user_id: UserId) -> Result<ProgressionSummary, Error>;
}
