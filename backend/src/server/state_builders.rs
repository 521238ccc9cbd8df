//! Builders wiring ports to their adapters for the HTTP server.

use std::sync::Arc;

use chrono::Duration;
use mockable::DefaultClock;
use tokio::sync::mpsc;
use tracing::info;

use skilltrade_backend::domain::challenge::{
    Challenge, ChallengeDraft, ChallengeStatus, ChallengeType, Difficulty, RewardSpec,
};
use skilltrade_backend::domain::ids::ChallengeId;
use skilltrade_backend::domain::{ProgressionEvent, ProgressionService, ProgressionStore};
use skilltrade_backend::inbound::http::state::HttpState;
use skilltrade_backend::outbound::events::ChannelEventSink;
use skilltrade_backend::outbound::persistence::MemoryStore;

use super::ServerConfig;

/// Wire the progression service over the in-memory store and the bounded
/// event channel, seeding demo data when configured.
pub(crate) async fn build_http_state(
    config: &ServerConfig,
) -> std::io::Result<(HttpState, mpsc::Receiver<ProgressionEvent>)> {
    let store = Arc::new(MemoryStore::new());
    if config.seed_demo_data {
        seed_demo_challenges(&store).await?;
    }

    let (sink, receiver) = ChannelEventSink::pair(config.event_channel_capacity);
    let service = ProgressionService::new(
        store,
        Arc::new(sink),
        Arc::new(DefaultClock),
        config.engine.clone(),
    );

    let state = HttpState::new(Arc::new(service.clone()), Arc::new(service));
    Ok((state, receiver))
}

/// Log and discard progression events until a delivery pipeline exists.
pub(crate) async fn drain_events(mut receiver: mpsc::Receiver<ProgressionEvent>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "progression event");
    }
}

fn demo_challenge(
    title: &str,
    category: &str,
    challenge_type: ChallengeType,
    difficulty: Difficulty,
) -> Result<Challenge, std::io::Error> {
    let now = chrono::Utc::now();
    Challenge::authored(ChallengeDraft {
        id: ChallengeId::random(),
        title: title.to_owned(),
        description: format!("Demo challenge: {title}"),
        category: category.to_owned(),
        challenge_type,
        difficulty,
        status: ChallengeStatus::Active,
        start_date: now,
        end_date: now + Duration::days(14),
        rewards: RewardSpec { base_xp: 0 },
        participant_count: 0,
        completion_count: 0,
        tier_requirement: None,
    })
    .map_err(|err| std::io::Error::other(format!("demo challenge invalid: {err}")))
}

async fn seed_demo_challenges(store: &Arc<MemoryStore>) -> std::io::Result<()> {
    let challenges = [
        demo_challenge(
            "Learn three guitar chords",
            "music",
            ChallengeType::Solo,
            Difficulty::Beginner,
        )?,
        demo_challenge(
            "Sketch a local landmark",
            "drawing",
            ChallengeType::Solo,
            Difficulty::Intermediate,
        )?,
        demo_challenge(
            "Swap an hour of tutoring",
            "teaching",
            ChallengeType::Trade,
            Difficulty::Intermediate,
        )?,
        demo_challenge(
            "Build a street-library together",
            "carpentry",
            ChallengeType::Collaboration,
            Difficulty::Advanced,
        )?,
    ];

    for challenge in challenges {
        info!(id = %challenge.id(), title = challenge.title(), "seeding demo challenge");
        store
            .insert_challenge(challenge)
            .await
            .map_err(|err| std::io::Error::other(format!("demo seed failed: {err}")))?;
    }
    Ok(())
}
