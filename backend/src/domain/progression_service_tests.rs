//! Behavioural tests for the progression coordinator.

use std::sync::Arc;

use chrono::Duration;
use mockable::Clock;
use rstest::{fixture, rstest};
use serde_json::Value;

use crate::domain::challenge::{ChallengeType, Difficulty};
use crate::domain::error::ErrorCode;
use crate::domain::events::ProgressionEvent;
use crate::domain::ids::{ChallengeId, UserId};
use crate::domain::ports::{
    CompleteChallengeRequest, CompletionOutcome, ProgressionCommand, ProgressionQuery,
    ProgressionStore, SubmitProgressRequest,
};
use crate::domain::progression_service::{EngineConfig, ProgressionService};
use crate::domain::reward::QualityRating;
use crate::domain::tier::Tier;
use crate::domain::user_challenge::Progress;
use crate::outbound::persistence::MemoryStore;
use crate::test_support::{
    ChallengeFixture, ConflictingStore, MutableClock, RecordingEventSink, fixed_instant,
};

struct Harness {
    store: Arc<ConflictingStore<MemoryStore>>,
    sink: Arc<RecordingEventSink>,
    clock: Arc<MutableClock>,
    service: ProgressionService<ConflictingStore<MemoryStore>, RecordingEventSink>,
    user_id: UserId,
}

fn test_config() -> EngineConfig {
    EngineConfig {
        // No backoff in tests; the retry loop is exercised, the sleeps are
        // not interesting.
        retry_backoff_ms: 0,
        retry_jitter_ms: 0,
        ..EngineConfig::default()
    }
}

#[fixture]
fn harness() -> Harness {
    let store = Arc::new(ConflictingStore::new(Arc::new(MemoryStore::new()), 0));
    let sink = Arc::new(RecordingEventSink::new());
    let clock = Arc::new(MutableClock::new(fixed_instant()));
    let service = ProgressionService::new(
        Arc::clone(&store),
        Arc::clone(&sink),
        clock.clone(),
        test_config(),
    );
    Harness {
        store,
        sink,
        clock,
        service,
        user_id: UserId::random(),
    }
}

fn details_code(error: &crate::domain::Error) -> Option<&str> {
    error
        .details()
        .and_then(|details| details.get("code"))
        .and_then(Value::as_str)
}

fn rating(value: u8) -> QualityRating {
    QualityRating::new(value).expect("valid rating")
}

/// Seed an active solo challenge whose window opens at the current clock.
async fn seed_challenge(harness: &Harness, fixture: ChallengeFixture) -> ChallengeId {
    let challenge = fixture.starting_at(harness.clock.utc()).build();
    let id = challenge.id().clone();
    harness
        .store
        .insert_challenge(challenge)
        .await
        .expect("seeds");
    id
}

/// Join and complete a fresh solo challenge at the current clock instant.
async fn complete_fresh_solo(harness: &Harness) -> CompletionOutcome {
    let challenge_id = seed_challenge(harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");
    harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id,
            quality_rating: None,
        })
        .await
        .expect("completes")
}

#[rstest]
#[tokio::test]
async fn join_creates_an_attempt_and_counts_the_participant(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;

    let attempt = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");
    assert!(attempt.is_active());
    assert_eq!(attempt.attempts, 1);

    let challenge = harness
        .store
        .load_challenge(&challenge_id)
        .await
        .expect("loads")
        .expect("present");
    assert_eq!(challenge.value.participant_count(), 1);
}

#[rstest]
#[tokio::test]
async fn joining_twice_is_idempotent(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;

    let first = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");
    let second = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("idempotent join");
    assert_eq!(first, second);

    let challenge = harness
        .store
        .load_challenge(&challenge_id)
        .await
        .expect("loads")
        .expect("present");
    assert_eq!(
        challenge.value.participant_count(),
        1,
        "re-join must not double count"
    );
}

#[rstest]
#[tokio::test]
async fn joining_an_unknown_challenge_is_not_found(harness: Harness) {
    let err = harness
        .service
        .join_challenge(harness.user_id.clone(), ChallengeId::random())
        .await
        .expect_err("unknown challenge");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn joining_a_closed_challenge_conflicts(harness: Harness) {
    let challenge_id = seed_challenge(
        &harness,
        ChallengeFixture::new().status(crate::domain::challenge::ChallengeStatus::Completed),
    )
    .await;

    let err = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id)
        .await
        .expect_err("closed challenge");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(details_code(&err), Some("challenge_not_open"));
}

/// A user with no solo completions may not join a trade-tier challenge.
#[rstest]
#[tokio::test]
async fn locked_tier_join_is_forbidden(harness: Harness) {
    let challenge_id = seed_challenge(
        &harness,
        ChallengeFixture::new().challenge_type(ChallengeType::Trade),
    )
    .await;

    let err = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id)
        .await
        .expect_err("locked tier");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(details_code(&err), Some("tier_locked"));
}

#[rstest]
#[tokio::test]
async fn per_challenge_override_relaxes_the_tier_gate(harness: Harness) {
    let challenge_id = seed_challenge(
        &harness,
        ChallengeFixture::new()
            .challenge_type(ChallengeType::Trade)
            .tier_requirement(0),
    )
    .await;

    let attempt = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id)
        .await
        .expect("override admits the user");
    assert!(attempt.is_active());
}

/// A beginner challenge completed halfway through its window, on the first
/// attempt, with a quality rating of 5: 100 base + 25 early + 15 first
/// attempt + 50 quality.
#[rstest]
#[tokio::test]
async fn completion_awards_base_and_all_bonuses(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");
    harness.clock.advance(Duration::days(5));

    let outcome = harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id: challenge_id.clone(),
            quality_rating: Some(rating(5)),
        })
        .await
        .expect("completes");

    assert!(!outcome.replayed);
    assert_eq!(outcome.xp_awarded, 190);
    assert_eq!(outcome.reward.bonuses.early_completion, 25);
    assert_eq!(outcome.reward.bonuses.first_attempt, 15);
    assert_eq!(outcome.reward.bonuses.quality, 50);

    let ledger = harness
        .store
        .load_user_xp(&harness.user_id)
        .await
        .expect("loads")
        .expect("present");
    assert_eq!(ledger.value.total_xp, 190);
    assert_eq!(ledger.value.tier_counts.solo, 1);

    let record = harness
        .store
        .find_completion_record(&harness.user_id, &challenge_id)
        .await
        .expect("loads")
        .expect("recorded");
    assert_eq!(record.xp_awarded, 190);

    let challenge = harness
        .store
        .load_challenge(&challenge_id)
        .await
        .expect("loads")
        .expect("present");
    assert_eq!(challenge.value.completion_count(), 1);

    let events = harness.sink.recorded();
    assert!(matches!(
        events.first(),
        Some(ProgressionEvent::XpAwarded { reward, .. }) if reward.total_xp == 190
    ));
}

/// An expert challenge completed at 90% of its window on a second attempt
/// with no rating earns exactly the 500 base.
#[rstest]
#[tokio::test]
async fn late_second_attempt_earns_base_only(harness: Harness) {
    let challenge_id = seed_challenge(
        &harness,
        ChallengeFixture::new().difficulty(Difficulty::Expert),
    )
    .await;

    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");
    harness
        .service
        .abandon_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("abandons");
    let rejoined = harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("re-joins");
    assert_eq!(rejoined.attempts, 2);

    harness.clock.advance(Duration::days(9));
    let outcome = harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id,
            quality_rating: None,
        })
        .await
        .expect("completes");

    assert_eq!(outcome.xp_awarded, 500);
    assert_eq!(outcome.reward.bonuses.total(), 0);
}

#[rstest]
#[tokio::test]
async fn repeated_completion_replays_without_recrediting(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");

    let request = CompleteChallengeRequest {
        user_id: harness.user_id.clone(),
        challenge_id: challenge_id.clone(),
        quality_rating: Some(rating(4)),
    };
    let first = harness
        .service
        .complete_challenge(request.clone())
        .await
        .expect("completes");
    let second = harness
        .service
        .complete_challenge(request)
        .await
        .expect("replays");

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.xp_awarded, first.xp_awarded);
    assert_eq!(second.reward, first.reward);
    assert!(second.newly_unlocked_tiers.is_empty());

    let ledger = harness
        .store
        .load_user_xp(&harness.user_id)
        .await
        .expect("loads")
        .expect("present");
    assert_eq!(ledger.value.total_xp, u64::from(first.xp_awarded));
    assert_eq!(ledger.value.tier_counts.solo, 1, "credited exactly once");

    // The replay emits nothing; only the original award is on the sink.
    let awarded = harness
        .sink
        .recorded()
        .into_iter()
        .filter(|event| matches!(event, ProgressionEvent::XpAwarded { .. }))
        .count();
    assert_eq!(awarded, 1);
}

#[rstest]
#[tokio::test]
async fn third_solo_completion_unlocks_trade_exactly_once(harness: Harness) {
    let mut unlock_events = 0;
    for _ in 0..4 {
        let outcome = complete_fresh_solo(&harness).await;
        if outcome.newly_unlocked_tiers.contains(&Tier::Trade) {
            unlock_events += 1;
        }
    }
    assert_eq!(unlock_events, 1, "unlock fires on the threshold crossing only");

    let tier_unlocks = harness
        .sink
        .recorded()
        .into_iter()
        .filter(|event| {
            matches!(event, ProgressionEvent::TierUnlocked { tier: Tier::Trade, .. })
        })
        .count();
    assert_eq!(tier_unlocks, 1);

    // Trade is now joinable.
    let challenge_id = seed_challenge(
        &harness,
        ChallengeFixture::new().challenge_type(ChallengeType::Trade),
    )
    .await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id)
        .await
        .expect("trade unlocked");
}

#[rstest]
#[tokio::test]
async fn streaks_extend_daily_and_a_freeze_absorbs_one_missed_day(harness: Harness) {
    // Day 1 and day 2 extend normally.
    let outcome = complete_fresh_solo(&harness).await;
    assert_eq!(outcome.streak.current_streak, 1);
    harness.clock.advance_days(1);
    let outcome = complete_fresh_solo(&harness).await;
    assert_eq!(outcome.streak.current_streak, 2);

    // Day 3 is missed; day 4 consumes the freeze and preserves the streak.
    harness.clock.advance_days(2);
    let outcome = complete_fresh_solo(&harness).await;
    assert_eq!(outcome.streak.current_streak, 2, "frozen, not extended");
    assert_eq!(outcome.streak.freezes_available, 0);

    // Day 5 extends to 3 and crosses the first milestone.
    harness.clock.advance_days(1);
    let outcome = complete_fresh_solo(&harness).await;
    assert_eq!(outcome.streak.current_streak, 3);
    assert!(
        harness
            .sink
            .recorded()
            .iter()
            .any(|event| matches!(event, ProgressionEvent::StreakMilestone { length: 3, .. }))
    );

    // Another missed day with no freeze left resets to 1.
    harness.clock.advance_days(2);
    let outcome = complete_fresh_solo(&harness).await;
    assert_eq!(outcome.streak.current_streak, 1);
    assert_eq!(outcome.streak.longest_streak, 3);
}

#[rstest]
#[tokio::test]
async fn same_day_completions_count_the_streak_once(harness: Harness) {
    let first = complete_fresh_solo(&harness).await;
    let second = complete_fresh_solo(&harness).await;
    assert_eq!(first.streak.current_streak, 1);
    assert_eq!(second.streak.current_streak, 1);
}

#[rstest]
#[tokio::test]
async fn contention_is_retried_within_budget(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");

    harness.store.inject_conflicts(2);
    let outcome = harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id,
            quality_rating: None,
        })
        .await
        .expect("succeeds after retries");
    assert!(!outcome.replayed);
}

#[rstest]
#[tokio::test]
async fn exhausted_retry_budget_surfaces_contention(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");

    harness.store.inject_conflicts(u32::MAX);
    let err = harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id: challenge_id.clone(),
            quality_rating: None,
        })
        .await
        .expect_err("budget exhausted");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(details_code(&err), Some("contention"));

    // Nothing was credited.
    harness.store.inject_conflicts(0);
    let ledger = harness
        .store
        .load_user_xp(&harness.user_id)
        .await
        .expect("loads");
    assert!(ledger.is_none(), "failed transaction must leave no ledger");
}

#[rstest]
#[tokio::test]
async fn progress_requires_a_joined_challenge(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;

    let err = harness
        .service
        .submit_progress(SubmitProgressRequest {
            user_id: harness.user_id.clone(),
            challenge_id,
            progress: Progress::new(40).expect("valid"),
            evidence: vec!["clip-1".to_owned()],
        })
        .await
        .expect_err("not joined");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(details_code(&err), Some("not_joined"));
}

#[rstest]
#[tokio::test]
async fn completing_requires_a_joined_challenge(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;

    let err = harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id,
            quality_rating: None,
        })
        .await
        .expect_err("not joined");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(details_code(&err), Some("not_joined"));
}

#[rstest]
#[tokio::test]
async fn progress_updates_accumulate(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");

    harness
        .service
        .submit_progress(SubmitProgressRequest {
            user_id: harness.user_id.clone(),
            challenge_id: challenge_id.clone(),
            progress: Progress::new(40).expect("valid"),
            evidence: vec!["clip-1".to_owned()],
        })
        .await
        .expect("first update");
    let updated = harness
        .service
        .submit_progress(SubmitProgressRequest {
            user_id: harness.user_id.clone(),
            challenge_id,
            progress: Progress::new(70).expect("valid"),
            evidence: vec!["clip-2".to_owned()],
        })
        .await
        .expect("second update");

    assert_eq!(updated.progress.value(), 70);
    assert_eq!(updated.submissions, vec!["clip-1", "clip-2"]);
}

#[rstest]
#[tokio::test]
async fn event_sink_failure_does_not_fail_the_completion(harness: Harness) {
    let challenge_id = seed_challenge(&harness, ChallengeFixture::new()).await;
    harness
        .service
        .join_challenge(harness.user_id.clone(), challenge_id.clone())
        .await
        .expect("joins");

    harness.sink.fail_emissions();
    let outcome = harness
        .service
        .complete_challenge(CompleteChallengeRequest {
            user_id: harness.user_id.clone(),
            challenge_id: challenge_id.clone(),
            quality_rating: None,
        })
        .await
        .expect("commit stands even when emission fails");
    assert!(!outcome.replayed);

    let record = harness
        .store
        .find_completion_record(&harness.user_id, &challenge_id)
        .await
        .expect("loads");
    assert!(record.is_some());
}

#[rstest]
#[tokio::test]
async fn summary_defaults_for_an_unseen_user(harness: Harness) {
    let summary = harness
        .service
        .progression_summary(harness.user_id.clone())
        .await
        .expect("summarises");
    assert_eq!(summary.xp.total_xp, 0);
    assert_eq!(summary.xp.level, 1);
    assert_eq!(summary.streak.current_streak, 0);
    assert_eq!(summary.streak.freezes_available, 1);
    assert_eq!(summary.unlocked_tiers, vec![Tier::Solo]);
}

#[rstest]
#[tokio::test]
async fn summary_reflects_committed_progress(harness: Harness) {
    let outcome = complete_fresh_solo(&harness).await;

    let summary = harness
        .service
        .progression_summary(harness.user_id.clone())
        .await
        .expect("summarises");
    assert_eq!(summary.xp.total_xp, u64::from(outcome.xp_awarded));
    assert_eq!(summary.xp.tier_counts.solo, 1);
    assert_eq!(summary.streak.current_streak, 1);
}
