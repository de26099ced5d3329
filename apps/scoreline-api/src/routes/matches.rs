//! Scoring endpoints. Bodies normalize to the same `ScoreEvent` the socket
//! produces; the match id always comes from the path.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::auth::middleware::AuthUser;
use crate::engine::cricket::CricketAction;
use crate::engine::football::FootballAction;
use crate::error::{ApiError, ApiErrorBody};
use crate::scoring::{self, Outcome, ScoreEvent, ScoreUpdate, SettleReport, Submission};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/matches/{match_id}/cricket", post(submit_cricket))
        .route("/matches/{match_id}/football", post(submit_football))
        .route("/matches/{match_id}/settle", post(settle))
        .route("/matches/{match_id}/score", get(score))
}

// ---------------------------------------------------------------------------
// POST /api/v1/matches/{match_id}/cricket
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/matches/{match_id}/cricket",
    tag = "Scoring",
    security(("bearer" = [])),
    params(("match_id" = String, Path, description = "Fixture ID")),
    request_body = Submission<CricketAction>,
    responses(
        (status = 200, description = "Event committed", body = Outcome),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Match not found", body = ApiErrorBody),
        (status = 409, description = "Not allowed in the current match state", body = ApiErrorBody),
    ),
)]
pub async fn submit_cricket(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(body): Json<Submission<CricketAction>>,
) -> Result<Json<Outcome>, ApiError> {
    submit(&state, &user_id, body.into_event(Some(&match_id), &user_id)).await
}

// ---------------------------------------------------------------------------
// POST /api/v1/matches/{match_id}/football
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/matches/{match_id}/football",
    tag = "Scoring",
    security(("bearer" = [])),
    params(("match_id" = String, Path, description = "Fixture ID")),
    request_body = Submission<FootballAction>,
    responses(
        (status = 200, description = "Event committed", body = Outcome),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Match not found", body = ApiErrorBody),
        (status = 409, description = "Not allowed in the current match state", body = ApiErrorBody),
    ),
)]
pub async fn submit_football(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(body): Json<Submission<FootballAction>>,
) -> Result<Json<Outcome>, ApiError> {
    submit(&state, &user_id, body.into_event(Some(&match_id), &user_id)).await
}

async fn submit(state: &AppState, user_id: &str, event: ScoreEvent) -> Result<Json<Outcome>, ApiError> {
    tracing::debug!(user_id = %user_id, match_id = %event.match_id(), "scoring event received");
    let outcome = scoring::process(state, event).await?;
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// POST /api/v1/matches/{match_id}/settle
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/matches/{match_id}/settle",
    tag = "Scoring",
    security(("bearer" = [])),
    params(("match_id" = String, Path, description = "Fixture ID")),
    responses(
        (status = 200, description = "Settled, or already settled", body = SettleReport),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Match not found", body = ApiErrorBody),
        (status = 409, description = "Match not finished", body = ApiErrorBody),
    ),
)]
pub async fn settle(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<SettleReport>, ApiError> {
    tracing::debug!(user_id = %user_id, match_id = %match_id, "manual settlement requested");
    let report = scoring::settle_and_publish(&state, &match_id).await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// GET /api/v1/matches/{match_id}/score
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/matches/{match_id}/score",
    tag = "Scoring",
    params(("match_id" = String, Path, description = "Fixture ID")),
    responses(
        (status = 200, description = "Current public result", body = ScoreUpdate),
        (status = 404, description = "Match not found", body = ApiErrorBody),
    ),
)]
pub async fn score(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<ScoreUpdate>, ApiError> {
    let update = state.coordinator.snapshot(&match_id).await?;
    Ok(Json(update))
}
