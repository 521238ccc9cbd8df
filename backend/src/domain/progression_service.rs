//! Progression engine services implementing the command and query ports.
//!
//! The completion coordinator is the only writer of XP ledgers, streaks,
//! completion records, and challenge counters. Every mutation goes through
//! an optimistically versioned [`WriteBatch`]; on contention the whole
//! transaction is re-read and re-derived from fresh state, up to a bounded
//! retry budget.

use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::challenge::Challenge;
use crate::domain::error::Error;
use crate::domain::events::ProgressionEvent;
use crate::domain::ids::{ChallengeId, UserId};
use crate::domain::ledger::{CompletionRecord, UserXp, XpSource, XpTransaction};
use crate::domain::ports::{
    CommitError, CompleteChallengeRequest, CompletionOutcome, EventSink, ProgressionCommand,
    ProgressionQuery, ProgressionStore, ProgressionSummary, StoreError, SubmitProgressRequest,
    Versioned, VersionedWrite, WriteBatch,
};
use crate::domain::reward::{RewardConfig, compute_reward};
use crate::domain::streak::{StreakConfig, UserStreak, advance};
use crate::domain::tier::{TierThresholds, evaluate_tier_unlocks, is_accessible, unlocked_tiers};
use crate::domain::user_challenge::{UserChallenge, UserChallengeError};

/// Tunable parameters of the progression engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bonus magnitudes and the early-completion window share.
    pub reward: RewardConfig,
    /// Tier unlock thresholds.
    pub tiers: TierThresholds,
    /// Streak freezes and milestone lengths.
    pub streak: StreakConfig,
    /// XP required per level.
    pub xp_per_level: NonZeroU64,
    /// Commit attempts before a transaction gives up with a conflict.
    pub retry_budget: u32,
    /// Base backoff between commit attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Upper bound of the random jitter added to each backoff.
    pub retry_jitter_ms: u64,
    /// How long to wait for the event sink before abandoning an emit.
    pub emit_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reward: RewardConfig::default(),
            tiers: TierThresholds::default(),
            streak: StreakConfig::default(),
            xp_per_level: NonZeroU64::new(1_000).unwrap_or(NonZeroU64::MIN),
            retry_budget: 5,
            retry_backoff_ms: 25,
            retry_jitter_ms: 25,
            emit_timeout_ms: 250,
        }
    }
}

/// Progression service implementing the command and query driving ports.
pub struct ProgressionService<S, E> {
    store: Arc<S>,
    events: Arc<E>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

// Manual impl: the derive would require `S: Clone` and `E: Clone`, but only
// the handles are cloned.
impl<S, E> Clone for ProgressionService<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S, E> ProgressionService<S, E> {
    /// Create a service over a store and event sink.
    pub fn new(store: Arc<S>, events: Arc<E>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            events,
            clock,
            config,
        }
    }

    /// The engine configuration in force.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn map_store_error(err: StoreError) -> Error {
    match err {
        StoreError::Connection { .. } | StoreError::Query { .. } => {
            Error::service_unavailable("document store unavailable")
        }
        StoreError::Decode { message } => {
            warn!(%message, "stored document failed to decode");
            Error::internal("stored document failed to decode")
        }
    }
}

fn map_attempt_error(err: &UserChallengeError) -> Error {
    match err {
        UserChallengeError::AlreadyCompleted => Error::conflict("challenge already completed")
            .with_details(json!({ "code": "already_completed" })),
        UserChallengeError::NotActive => Error::conflict("challenge attempt is not active")
            .with_details(json!({ "code": "not_active" })),
        UserChallengeError::ProgressOutOfRange { value } => {
            Error::invalid_request("progress must be between 0 and 100")
                .with_details(json!({ "code": "progress_out_of_range", "value": value }))
        }
    }
}

fn not_joined() -> Error {
    Error::not_found("user has not joined this challenge")
        .with_details(json!({ "code": "not_joined" }))
}

fn contention_exhausted() -> Error {
    Error::conflict("completion contention; please retry")
        .with_details(json!({ "code": "contention" }))
}

impl<S, E> ProgressionService<S, E>
where
    S: ProgressionStore,
    E: EventSink,
{
    async fn load_challenge_required(
        &self,
        id: &ChallengeId,
    ) -> Result<Versioned<Challenge>, Error> {
        self.store
            .load_challenge(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found("challenge not found"))
    }

    /// Ledger head and its write precondition; fresh defaults when absent.
    async fn load_xp_or_fresh(
        &self,
        user_id: &UserId,
    ) -> Result<Versioned<UserXp>, Error> {
        let loaded = self
            .store
            .load_user_xp(user_id)
            .await
            .map_err(map_store_error)?;
        Ok(loaded.unwrap_or_else(|| {
            Versioned::new(
                UserXp::fresh(user_id.clone(), self.config.xp_per_level),
                crate::domain::ports::DocumentVersion::NEW,
            )
        }))
    }

    async fn load_streak_or_fresh(
        &self,
        user_id: &UserId,
    ) -> Result<Versioned<UserStreak>, Error> {
        let loaded = self
            .store
            .load_user_streak(user_id)
            .await
            .map_err(map_store_error)?;
        Ok(loaded.unwrap_or_else(|| {
            Versioned::new(
                UserStreak::fresh(&self.config.streak),
                crate::domain::ports::DocumentVersion::NEW,
            )
        }))
    }

    /// Sleep before the next commit attempt: linear backoff plus jitter so
    /// contending writers spread out instead of colliding again in lockstep.
    async fn backoff(&self, attempt: u32) {
        let base = self
            .config
            .retry_backoff_ms
            .saturating_mul(u64::from(attempt.saturating_add(1)));
        let jitter = if self.config.retry_jitter_ms == 0 {
            0
        } else {
            SmallRng::from_entropy().gen_range(0..=self.config.retry_jitter_ms)
        };
        tokio::time::sleep(Duration::from_millis(base.saturating_add(jitter))).await;
    }

    /// Emit one event, bounded by the configured timeout. Emission is
    /// best-effort: the transaction has already committed, so a failure is
    /// logged and swallowed.
    async fn emit_best_effort(&self, event: ProgressionEvent) {
        let timeout = Duration::from_millis(self.config.emit_timeout_ms);
        match tokio::time::timeout(timeout, self.events.emit(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "progression event emission failed"),
            Err(_) => warn!(timeout_ms = self.config.emit_timeout_ms, "progression event emission timed out"),
        }
    }

    async fn replay_completion(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<CompletionOutcome, Error> {
        let record = self
            .store
            .find_completion_record(user_id, challenge_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| {
                warn!(user = %user_id, challenge = %challenge_id, "completed attempt has no completion record");
                Error::internal("completion record missing for completed attempt")
            })?;
        let streak = self.load_streak_or_fresh(user_id).await?.value;
        Ok(CompletionOutcome {
            xp_awarded: record.xp_awarded,
            reward: record.reward(),
            newly_unlocked_tiers: Vec::new(),
            streak,
            replayed: true,
        })
    }
}

#[async_trait]
impl<S, E> ProgressionCommand for ProgressionService<S, E>
where
    S: ProgressionStore,
    E: EventSink,
{
    async fn join_challenge(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<UserChallenge, Error> {
        for attempt in 0..self.config.retry_budget {
            let challenge = self.load_challenge_required(&challenge_id).await?;
            if !challenge.value.is_open() {
                return Err(Error::conflict("challenge is not open for joining")
                    .with_details(json!({ "code": "challenge_not_open" })));
            }

            if let Some(tier) = challenge.value.tier() {
                let ledger = self.load_xp_or_fresh(&user_id).await?;
                if !is_accessible(
                    tier,
                    &ledger.value.tier_counts,
                    &self.config.tiers,
                    challenge.value.tier_requirement(),
                ) {
                    return Err(Error::forbidden("tier is locked for this user")
                        .with_details(json!({ "code": "tier_locked", "tier": tier.as_str() })));
                }
            }

            let existing = self
                .store
                .load_user_challenge(&user_id, &challenge_id)
                .await
                .map_err(map_store_error)?;

            let batch = match existing {
                // Re-joining an active attempt is an idempotent no-op.
                Some(current) if current.value.is_active() => return Ok(current.value),
                Some(current) if current.value.is_completed() => {
                    return Err(map_attempt_error(&UserChallengeError::AlreadyCompleted));
                }
                Some(abandoned) => {
                    let version = abandoned.version;
                    let reactivated = abandoned
                        .value
                        .rejoined()
                        .map_err(|err| map_attempt_error(&err))?;
                    WriteBatch::new().user_challenge(VersionedWrite {
                        expected: version,
                        value: reactivated,
                    })
                }
                None => {
                    let fresh =
                        UserChallenge::joined(user_id.clone(), challenge_id.clone(), self.clock.utc());
                    let counted = challenge.value.clone().with_participant_recorded();
                    WriteBatch::new()
                        .user_challenge(VersionedWrite::create(fresh))
                        .challenge(VersionedWrite {
                            expected: challenge.version,
                            value: counted,
                        })
                }
            };

            match self.store.commit(batch).await {
                Ok(()) => {
                    let joined = self
                        .store
                        .load_user_challenge(&user_id, &challenge_id)
                        .await
                        .map_err(map_store_error)?
                        .ok_or_else(|| Error::internal("joined attempt vanished after commit"))?;
                    return Ok(joined.value);
                }
                Err(CommitError::Conflict { .. } | CommitError::ImmutableOverwrite { .. }) => {
                    debug!(attempt, challenge = %challenge_id, "join conflicted; retrying");
                    self.backoff(attempt).await;
                }
                Err(CommitError::Sanitization { message }) => {
                    warn!(%message, "join batch failed sanitisation");
                    return Err(Error::internal("persistence rejected the join"));
                }
                Err(CommitError::Backend { .. }) => {
                    return Err(Error::service_unavailable("document store unavailable"));
                }
            }
        }
        Err(contention_exhausted())
    }

    async fn submit_progress(
        &self,
        request: SubmitProgressRequest,
    ) -> Result<UserChallenge, Error> {
        for attempt in 0..self.config.retry_budget {
            let current = self
                .store
                .load_user_challenge(&request.user_id, &request.challenge_id)
                .await
                .map_err(map_store_error)?
                .ok_or_else(not_joined)?;

            let version = current.version;
            let updated = current
                .value
                .with_progress(request.progress, request.evidence.clone())
                .map_err(|err| map_attempt_error(&err))?;

            let batch = WriteBatch::new().user_challenge(VersionedWrite {
                expected: version,
                value: updated.clone(),
            });
            match self.store.commit(batch).await {
                Ok(()) => return Ok(updated),
                Err(CommitError::Conflict { .. }) => {
                    debug!(attempt, "progress update conflicted; retrying");
                    self.backoff(attempt).await;
                }
                Err(CommitError::Sanitization { message }) => {
                    warn!(%message, "progress batch failed sanitisation");
                    return Err(Error::internal("persistence rejected the update"));
                }
                Err(CommitError::ImmutableOverwrite { .. }) => {
                    return Err(Error::internal("progress update targeted an immutable document"));
                }
                Err(CommitError::Backend { .. }) => {
                    return Err(Error::service_unavailable("document store unavailable"));
                }
            }
        }
        Err(contention_exhausted())
    }

    async fn abandon_challenge(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<UserChallenge, Error> {
        for attempt in 0..self.config.retry_budget {
            let current = self
                .store
                .load_user_challenge(&user_id, &challenge_id)
                .await
                .map_err(map_store_error)?
                .ok_or_else(not_joined)?;

            let version = current.version;
            let updated = current
                .value
                .abandoned()
                .map_err(|err| map_attempt_error(&err))?;

            let batch = WriteBatch::new().user_challenge(VersionedWrite {
                expected: version,
                value: updated.clone(),
            });
            match self.store.commit(batch).await {
                Ok(()) => return Ok(updated),
                Err(CommitError::Conflict { .. }) => {
                    debug!(attempt, "abandon conflicted; retrying");
                    self.backoff(attempt).await;
                }
                Err(CommitError::Sanitization { message }) => {
                    warn!(%message, "abandon batch failed sanitisation");
                    return Err(Error::internal("persistence rejected the update"));
                }
                Err(CommitError::ImmutableOverwrite { .. }) => {
                    return Err(Error::internal("abandon targeted an immutable document"));
                }
                Err(CommitError::Backend { .. }) => {
                    return Err(Error::service_unavailable("document store unavailable"));
                }
            }
        }
        Err(contention_exhausted())
    }

    async fn complete_challenge(
        &self,
        request: CompleteChallengeRequest,
    ) -> Result<CompletionOutcome, Error> {
        let CompleteChallengeRequest {
            user_id,
            challenge_id,
            quality_rating,
        } = request;

        for attempt in 0..self.config.retry_budget {
            let challenge = self.load_challenge_required(&challenge_id).await?;

            let current = self
                .store
                .load_user_challenge(&user_id, &challenge_id)
                .await
                .map_err(map_store_error)?
                .ok_or_else(not_joined)?;

            // A repeated completion replays the original award instead of
            // crediting twice.
            if current.value.is_completed() {
                return self.replay_completion(&user_id, &challenge_id).await;
            }

            let now = self.clock.utc();
            let attempt_version = current.version;
            let attempt_number = current.value.attempts;
            let completed = current
                .value
                .completed(now)
                .map_err(|err| map_attempt_error(&err))?;

            let reward = compute_reward(
                challenge.value.difficulty(),
                now,
                &challenge.value.window(),
                attempt_number,
                quality_rating,
                &self.config.reward,
            )
            .map_err(|err| Error::invalid_request(err.to_string()))?;

            let ledger = self.load_xp_or_fresh(&user_id).await?;
            let counts_before = ledger.value.tier_counts;
            let tier = challenge.value.tier();
            let credited =
                ledger
                    .value
                    .credited(reward.total_xp, tier, self.config.xp_per_level);
            let unlocks =
                evaluate_tier_unlocks(&counts_before, &credited.tier_counts, &self.config.tiers);

            let streak = self.load_streak_or_fresh(&user_id).await?;
            let transition = advance(&streak.value, now.date_naive(), &self.config.streak);

            let record = CompletionRecord::from_reward(
                user_id.clone(),
                challenge_id.clone(),
                now,
                &reward,
                quality_rating,
            );
            let entry = XpTransaction {
                user_id: user_id.clone(),
                source: XpSource::ChallengeCompletion,
                amount: reward.total_xp,
                challenge_id: Some(challenge_id.clone()),
                recorded_at: now,
            };

            let batch = WriteBatch::new()
                .user_challenge(VersionedWrite {
                    expected: attempt_version,
                    value: completed,
                })
                .challenge(VersionedWrite {
                    expected: challenge.version,
                    value: challenge.value.clone().with_completion_recorded(),
                })
                .user_xp(VersionedWrite {
                    expected: ledger.version,
                    value: credited,
                })
                .user_streak(
                    user_id.clone(),
                    VersionedWrite {
                        expected: streak.version,
                        value: transition.streak.clone(),
                    },
                )
                .completion_record(record)
                .xp_transaction(entry);

            match self.store.commit(batch).await {
                Ok(()) => {
                    self.emit_best_effort(ProgressionEvent::XpAwarded {
                        user_id: user_id.clone(),
                        challenge_id: challenge_id.clone(),
                        reward,
                    })
                    .await;
                    for tier in &unlocks.newly_unlocked {
                        self.emit_best_effort(ProgressionEvent::TierUnlocked {
                            user_id: user_id.clone(),
                            tier: *tier,
                        })
                        .await;
                    }
                    if let Some(length) = transition.milestone_reached {
                        self.emit_best_effort(ProgressionEvent::StreakMilestone {
                            user_id: user_id.clone(),
                            length,
                        })
                        .await;
                    }

                    return Ok(CompletionOutcome {
                        xp_awarded: reward.total_xp,
                        reward,
                        newly_unlocked_tiers: unlocks.newly_unlocked.into_iter().collect(),
                        streak: transition.streak,
                        replayed: false,
                    });
                }
                Err(CommitError::Conflict { collection, key }) => {
                    debug!(attempt, %collection, %key, "completion conflicted; retrying");
                    self.backoff(attempt).await;
                }
                // A record insert lost a race with another completion of the
                // same attempt; re-reading will take the replay path.
                Err(CommitError::ImmutableOverwrite { .. }) => {
                    debug!(attempt, "completion record already present; re-reading");
                    self.backoff(attempt).await;
                }
                Err(CommitError::Sanitization { message }) => {
                    warn!(%message, "completion batch failed sanitisation");
                    return Err(Error::internal("persistence rejected the completion"));
                }
                Err(CommitError::Backend { .. }) => {
                    return Err(Error::service_unavailable("document store unavailable"));
                }
            }
        }
        Err(contention_exhausted())
    }
}

#[async_trait]
impl<S, E> ProgressionQuery for ProgressionService<S, E>
where
    S: ProgressionStore,
    E: EventSink,
{
    async fn progression_summary(&self, user_id: UserId) -> Result<ProgressionSummary, Error> {
        let xp = self.load_xp_or_fresh(&user_id).await?.value;
        let streak = self.load_streak_or_fresh(&user_id).await?.value;
        let unlocked_tiers = unlocked_tiers(&xp.tier_counts, &self.config.tiers)
            .into_iter()
            .collect();
        Ok(ProgressionSummary {
            xp,
            streak,
            unlocked_tiers,
        })
    }
}

#[cfg(test)]
#[path = "progression_service_tests.rs"]
mod tests;
