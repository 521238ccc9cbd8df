//! HTTP-level tests for the progression endpoints, wired over the in-memory
//! store.

use std::sync::Arc;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, http::StatusCode, test, web};
use rstest::rstest;
use serde_json::{Value, json};

use crate::domain::ids::UserId;
use crate::domain::ports::ProgressionStore;
use crate::domain::progression_service::{EngineConfig, ProgressionService};
use crate::inbound::http::auth::USER_ID_HEADER;
use crate::inbound::http::challenges;
use crate::inbound::http::state::HttpState;
use crate::outbound::persistence::MemoryStore;
use crate::test_support::{ChallengeFixture, MutableClock, RecordingEventSink, fixed_instant};

struct TestContext {
    store: Arc<MemoryStore>,
    user_id: UserId,
}

async fn spawn_app() -> (
    impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
    TestContext,
) {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingEventSink::new());
    let clock = Arc::new(MutableClock::new(fixed_instant()));
    let service = ProgressionService::new(
        Arc::clone(&store),
        sink,
        clock,
        EngineConfig::default(),
    );
    let state = HttpState::new(Arc::new(service.clone()), Arc::new(service));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .service(web::scope("/api").configure(challenges::configure)),
    )
    .await;

    (
        app,
        TestContext {
            store,
            user_id: UserId::random(),
        },
    )
}

async fn seed_active_solo(context: &TestContext) -> String {
    let challenge = ChallengeFixture::new().starting_at(fixed_instant()).build();
    let id = challenge.id().to_string();
    context
        .store
        .insert_challenge(challenge)
        .await
        .expect("seeds");
    id
}

#[rstest]
#[tokio::test]
async fn join_and_complete_flow_awards_xp() {
    let (app, context) = spawn_app().await;
    let challenge_id = seed_active_solo(&context).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/join"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let attempt: Value = test::read_body_json(response).await;
    assert_eq!(attempt.get("status").and_then(Value::as_str), Some("active"));
    assert_eq!(attempt.get("attempts").and_then(Value::as_u64), Some(1));

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/complete"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .set_json(json!({ "qualityRating": 5 }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let completion: Value = test::read_body_json(response).await;
    assert_eq!(completion.get("xpAwarded").and_then(Value::as_u64), Some(190));
    assert_eq!(completion.get("replayed").and_then(Value::as_bool), Some(false));
    assert_eq!(
        completion
            .pointer("/reward/bonuses/quality")
            .and_then(Value::as_u64),
        Some(50)
    );
    assert_eq!(
        completion
            .pointer("/streak/currentStreak")
            .and_then(Value::as_u64),
        Some(1)
    );
}

#[rstest]
#[tokio::test]
async fn repeat_completion_is_flagged_as_replayed() {
    let (app, context) = spawn_app().await;
    let challenge_id = seed_active_solo(&context).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/join"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/complete"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .set_json(json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first: Value = test::read_body_json(response).await;
    assert_eq!(first.get("replayed").and_then(Value::as_bool), Some(false));

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/complete"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .set_json(json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let completion: Value = test::read_body_json(response).await;
    assert_eq!(completion.get("replayed").and_then(Value::as_bool), Some(true));
}

#[rstest]
#[tokio::test]
async fn missing_identity_header_is_unauthorised() {
    let (app, context) = spawn_app().await;
    let challenge_id = seed_active_solo(&context).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/join"))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[tokio::test]
async fn unknown_challenge_is_not_found() {
    let (app, context) = spawn_app().await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!(
                "/api/challenges/{}/join",
                uuid::Uuid::new_v4()
            ))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body.get("code").and_then(Value::as_str), Some("not_found"));
}

#[rstest]
#[tokio::test]
async fn malformed_challenge_id_is_a_bad_request() {
    let (app, context) = spawn_app().await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/challenges/not-a-uuid/join")
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn out_of_range_progress_is_a_bad_request() {
    let (app, context) = spawn_app().await;
    let challenge_id = seed_active_solo(&context).await;

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/join"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/progress"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .set_json(json!({ "progress": 101 }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(
        body.pointer("/details/code").and_then(Value::as_str),
        Some("progress_out_of_range")
    );
}

#[rstest]
#[tokio::test]
async fn progression_is_readable_by_its_owner_only() {
    let (app, context) = spawn_app().await;

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/users/{}/progression", context.user_id))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = test::read_body_json(response).await;
    assert_eq!(summary.get("totalXp").and_then(Value::as_u64), Some(0));
    assert_eq!(summary.get("level").and_then(Value::as_u64), Some(1));
    assert_eq!(
        summary.get("unlockedTiers"),
        Some(&json!(["solo"]))
    );

    let other = UserId::random();
    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/users/{other}/progression"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[rstest]
#[tokio::test]
async fn locked_tier_join_maps_to_forbidden() {
    let (app, context) = spawn_app().await;
    let challenge = ChallengeFixture::new()
        .challenge_type(crate::domain::ChallengeType::Trade)
        .starting_at(fixed_instant())
        .build();
    let challenge_id = challenge.id().to_string();
    context
        .store
        .insert_challenge(challenge)
        .await
        .expect("seeds");

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/challenges/{challenge_id}/join"))
            .insert_header((USER_ID_HEADER, context.user_id.as_ref()))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(
        body.pointer("/details/code").and_then(Value::as_str),
        Some("tier_locked")
    );
}
