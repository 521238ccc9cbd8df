//! Test utilities for the backend crate.
//!
//! Shared doubles and fixtures for both unit tests (in `src/`) and
//! integration tests (in `tests/`): a settable clock, a store wrapper that
//! injects commit conflicts, an event sink that records emissions, and a
//! sample challenge builder.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::challenge::{
    Challenge, ChallengeDraft, ChallengeStatus, ChallengeType, Difficulty, RewardSpec,
};
use crate::domain::events::ProgressionEvent;
use crate::domain::ids::{ChallengeId, UserId};
use crate::domain::ledger::{CompletionRecord, UserXp};
use crate::domain::ports::{
    CommitError, EventSink, EventSinkError, ProgressionStore, StoreError, Versioned, WriteBatch,
};
use crate::domain::streak::UserStreak;
use crate::domain::user_challenge::UserChallenge;

/// A clock whose current instant tests can set and advance.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// A clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: Duration) {
        *self.lock_clock() += delta;
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        *self.lock_clock() += TimeDelta::days(days);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// A store wrapper that fails the next `n` commits with a conflict before
/// delegating, for exercising the coordinator's retry loop.
pub struct ConflictingStore<S> {
    inner: Arc<S>,
    conflicts_remaining: AtomicU32,
}

impl<S> ConflictingStore<S> {
    /// Wrap `inner`, failing the first `conflicts` commits.
    pub fn new(inner: Arc<S>, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts_remaining: AtomicU32::new(conflicts),
        }
    }

    /// Arm another round of injected conflicts.
    pub fn inject_conflicts(&self, conflicts: u32) {
        self.conflicts_remaining.store(conflicts, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S> ProgressionStore for ConflictingStore<S>
where
    S: ProgressionStore,
{
    async fn load_challenge(
        &self,
        id: &ChallengeId,
    ) -> Result<Option<Versioned<Challenge>>, StoreError> {
        self.inner.load_challenge(id).await
    }

    async fn load_user_challenge(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<Option<Versioned<UserChallenge>>, StoreError> {
        self.inner.load_user_challenge(user_id, challenge_id).await
    }

    async fn load_user_xp(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<UserXp>>, StoreError> {
        self.inner.load_user_xp(user_id).await
    }

    async fn load_user_streak(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<UserStreak>>, StoreError> {
        self.inner.load_user_streak(user_id).await
    }

    async fn find_completion_record(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<Option<CompletionRecord>, StoreError> {
        self.inner.find_completion_record(user_id, challenge_id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), CommitError> {
        let remaining = self.conflicts_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(CommitError::conflict("injected", "injected"));
        }
        self.inner.commit(batch).await
    }

    async fn insert_challenge(&self, challenge: Challenge) -> Result<(), CommitError> {
        self.inner.insert_challenge(challenge).await
    }
}

/// An event sink recording every emission, optionally failing all of them.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ProgressionEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingEventSink {
    /// A sink accepting and recording all events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent emit fail.
    pub fn fail_emissions(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Events recorded so far, in emission order.
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    #[must_use]
    pub fn recorded(&self) -> Vec<ProgressionEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => panic!("event sink mutex"),
        }
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: ProgressionEvent) -> Result<(), EventSinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EventSinkError::unavailable("sink failing for test"));
        }
        match self.events.lock() {
            Ok(mut guard) => {
                guard.push(event);
                Ok(())
            }
            Err(_) => Err(EventSinkError::unavailable("sink mutex poisoned")),
        }
    }
}

/// A fixed instant well inside a challenge window.
///
/// # Panics
///
/// Never panics: the components are valid by construction.
#[must_use]
pub fn fixed_instant() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single() {
        Some(instant) => instant,
        None => panic!("valid timestamp"),
    }
}

/// Builder for challenge fixtures.
#[derive(Debug, Clone)]
pub struct ChallengeFixture {
    challenge_type: ChallengeType,
    difficulty: Difficulty,
    status: ChallengeStatus,
    start: DateTime<Utc>,
    window_days: i64,
    tier_requirement: Option<u32>,
}

impl Default for ChallengeFixture {
    fn default() -> Self {
        Self {
            challenge_type: ChallengeType::Solo,
            difficulty: Difficulty::Beginner,
            status: ChallengeStatus::Active,
            start: fixed_instant(),
            window_days: 10,
            tier_requirement: None,
        }
    }
}

impl ChallengeFixture {
    /// Fixture with default shape: an active beginner solo challenge whose
    /// ten-day window opens at [`fixed_instant`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the challenge type.
    #[must_use]
    pub fn challenge_type(mut self, challenge_type: ChallengeType) -> Self {
        self.challenge_type = challenge_type;
        self
    }

    /// Set the difficulty band.
    #[must_use]
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the scheduling status.
    #[must_use]
    pub fn status(mut self, status: ChallengeStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the window opening instant.
    #[must_use]
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Set the window length in days.
    #[must_use]
    pub fn window_days(mut self, days: i64) -> Self {
        self.window_days = days;
        self
    }

    /// Set a per-challenge tier requirement override.
    #[must_use]
    pub fn tier_requirement(mut self, requirement: u32) -> Self {
        self.tier_requirement = Some(requirement);
        self
    }

    /// Build the challenge.
    ///
    /// # Panics
    ///
    /// Panics if the fixture parameters produce an invalid challenge; tests
    /// construct fixtures with literal, valid values.
    #[must_use]
    pub fn build(self) -> Challenge {
        let draft = ChallengeDraft {
            id: ChallengeId::random(),
            title: "Learn three chords".to_owned(),
            description: "Basic guitar chords, practised daily".to_owned(),
            category: "music".to_owned(),
            challenge_type: self.challenge_type,
            difficulty: self.difficulty,
            status: self.status,
            start_date: self.start,
            end_date: self.start + Duration::days(self.window_days),
            rewards: RewardSpec {
                base_xp: self.difficulty.base_xp(),
            },
            participant_count: 0,
            completion_count: 0,
            tier_requirement: self.tier_requirement,
        };
        match Challenge::new(draft) {
            Ok(challenge) => challenge,
            Err(err) => panic!("fixture challenge must validate: {err}"),
        }
    }
}
