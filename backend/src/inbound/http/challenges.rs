//! Challenge progression handlers.
//!
//! ```text
//! POST /api/challenges/{id}/join      Join (or re-join) a challenge
//! POST /api/challenges/{id}/progress  Record progress and evidence
//! POST /api/challenges/{id}/abandon   Give up on an attempt
//! POST /api/challenges/{id}/complete  Complete and collect the reward
//! GET  /api/users/{id}/progression    XP, streak, and unlocked tiers
//! ```
//!
//! All endpoints authenticate via the gateway-supplied `X-User-Id` header.

use actix_web::{HttpResponse, get, post, web};

use crate::domain::ports::{CompleteChallengeRequest, SubmitProgressRequest};
use crate::domain::{ChallengeId, Error, UserId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::schemas::{
    AttemptResponse, CompleteChallengeBody, CompletionResponse, ProgressUpdateBody,
    ProgressionSummaryResponse,
};
use crate::inbound::http::state::HttpState;

fn parse_challenge_id(raw: &str) -> Result<ChallengeId, Error> {
    ChallengeId::new(raw)
        .map_err(|_| Error::invalid_request("challenge id must be a valid UUID"))
}

/// Join a challenge. Idempotent for an attempt that is already active.
#[post("/challenges/{id}/join")]
pub async fn join_challenge(
    user: AuthenticatedUser,
    path: web::Path<String>,
    state: web::Data<HttpState>,
) -> ApiResult<HttpResponse> {
    let challenge_id = parse_challenge_id(&path)?;
    let attempt = state
        .progression
        .join_challenge(user.into_user_id(), challenge_id)
        .await?;
    Ok(HttpResponse::Ok().json(AttemptResponse::from(attempt)))
}

/// Record progress and evidence against an active attempt.
#[post("/challenges/{id}/progress")]
pub async fn submit_progress(
    user: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<ProgressUpdateBody>,
    state: web::Data<HttpState>,
) -> ApiResult<HttpResponse> {
    let challenge_id = parse_challenge_id(&path)?;
    let progress = body.validated_progress()?;
    let attempt = state
        .progression
        .submit_progress(SubmitProgressRequest {
            user_id: user.into_user_id(),
            challenge_id,
            progress,
            evidence: body.into_inner().evidence,
        })
        .await?;
    Ok(HttpResponse::Ok().json(AttemptResponse::from(attempt)))
}

/// Abandon an active attempt. The challenge can be re-joined later.
#[post("/challenges/{id}/abandon")]
pub async fn abandon_challenge(
    user: AuthenticatedUser,
    path: web::Path<String>,
    state: web::Data<HttpState>,
) -> ApiResult<HttpResponse> {
    let challenge_id = parse_challenge_id(&path)?;
    let attempt = state
        .progression
        .abandon_challenge(user.into_user_id(), challenge_id)
        .await?;
    Ok(HttpResponse::Ok().json(AttemptResponse::from(attempt)))
}

/// Complete an active attempt, committing the reward transaction.
///
/// Completing an already-completed challenge replays the original award
/// with `replayed: true` instead of crediting twice.
#[post("/challenges/{id}/complete")]
pub async fn complete_challenge(
    user: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<CompleteChallengeBody>,
    state: web::Data<HttpState>,
) -> ApiResult<HttpResponse> {
    let challenge_id = parse_challenge_id(&path)?;
    let quality_rating = body.validated_rating()?;
    let outcome = state
        .progression
        .complete_challenge(CompleteChallengeRequest {
            user_id: user.into_user_id(),
            challenge_id,
            quality_rating,
        })
        .await?;
    Ok(HttpResponse::Ok().json(CompletionResponse::from(outcome)))
}

/// A user's progression summary. Users may only read their own.
#[get("/users/{id}/progression")]
pub async fn progression_summary(
    user: AuthenticatedUser,
    path: web::Path<String>,
    state: web::Data<HttpState>,
) -> ApiResult<HttpResponse> {
    let requested = UserId::new(path.as_str())
        .map_err(|_| Error::invalid_request("user id must be a valid UUID"))?;
    let caller = user.into_user_id();
    if requested != caller {
        return Err(Error::forbidden("cannot view another user's progression"));
    }
    let summary = state.progression_query.progression_summary(caller).await?;
    Ok(HttpResponse::Ok().json(ProgressionSummaryResponse::from(summary)))
}

/// Register the progression endpoints under the caller's scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(join_challenge)
        .service(submit_progress)
        .service(abandon_challenge)
        .service(complete_challenge)
        .service(progression_summary);
}

#[cfg(test)]
#[path = "challenges_tests.rs"]
mod tests;
