mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use common::*;
use scoreline_api::models::fixture::Sport;

const MATCH: &str = "mat_rest";

async fn setup() -> (TestApp, TestServer, String) {
    let app = TestApp::new().await;
    app.seed_fixture(MATCH, Sport::Cricket, "t20").await;
    let token = app.login("usr_scorer").await;
    let server = TestServer::new(app.router()).unwrap();
    (app, server, token)
}

async fn post_cricket(server: &TestServer, token: &str, actions: Vec<Value>) -> axum_test::TestResponse {
    server
        .post(&format!("/api/v1/matches/{MATCH}/cricket"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "team_id": HOME, "actions": actions }))
        .await
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cricket_event_returns_the_update() {
    let (_app, server, token) = setup().await;

    let resp = post_cricket(&server, &token, vec![toss("bat")]).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["update"]["match_id"], MATCH);
    assert_eq!(body["update"]["innings"][0]["batting_team_id"], HOME);
    assert!(body.get("standings").is_none());

    let resp = post_cricket(
        &server,
        &token,
        vec![batter_in("home_1"), batter_in("home_2"), change_bowler("away_1"), ball("away_1", 6)],
    )
    .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["update"]["innings"][0]["runs"], 6);
    assert_eq!(body["update"]["submitted_by"], "usr_scorer");
    assert_eq!(body["update"]["last_ball"]["submitted_by"], "usr_scorer");
}

#[tokio::test]
async fn submitter_comes_from_the_token_not_the_body() {
    let (app, server, token) = setup().await;

    let resp = server
        .post(&format!("/api/v1/matches/{MATCH}/cricket"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({
            "team_id": HOME,
            "submitted_by": "usr_someone_else",
            "actions": [toss("bat"), batter_in("home_1"), batter_in("home_2"), change_bowler("away_1"), ball("away_1", 1)],
        }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["update"]["submitted_by"], "usr_scorer");

    let state = app.db.dump().await;
    let ball = state.balls.values().next().unwrap();
    assert_eq!(ball.submitted_by.as_deref(), Some("usr_scorer"));
}

#[tokio::test]
async fn scoring_requires_a_token() {
    let (_app, server, _token) = setup().await;

    let resp = server
        .post(&format!("/api/v1/matches/{MATCH}/cricket"))
        .json(&json!({ "team_id": HOME, "actions": [toss("bat")] }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = post_cricket(&server, "tok_nobody", vec![toss("bat")]).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn impossible_event_is_a_conflict() {
    let (_app, server, token) = setup().await;

    // No toss yet, so nobody can bowl.
    let resp = post_cricket(&server, &token, vec![ball("away_1", 1)]).await;
    resp.assert_status(StatusCode::CONFLICT);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn empty_actions_fail_validation() {
    let (_app, server, token) = setup().await;

    let resp = post_cricket(&server, &token, vec![]).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["field"], "actions");
}

#[tokio::test]
async fn unknown_match_is_not_found() {
    let (_app, server, token) = setup().await;

    let resp = server
        .post("/api/v1/matches/mat_nope/cricket")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "team_id": HOME, "actions": [toss("bat")] }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let resp = server.get("/api/v1/matches/mat_nope/score").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn score_snapshot_is_public() {
    let (_app, server, token) = setup().await;
    post_cricket(&server, &token, vec![toss("bowl")]).await.assert_status_ok();

    let resp = server.get(&format!("/api/v1/matches/{MATCH}/score")).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["match_id"], MATCH);
    // Home chose to bowl.
    assert_eq!(body["innings"][0]["batting_team_id"], AWAY);
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settle_rejects_unfinished_then_reports_already_settled() {
    let (app, server, token) = setup().await;
    app.seed_fixture("mat_ftb", Sport::Football, "league").await;

    let resp = server
        .post(&format!("/api/v1/matches/{MATCH}/settle"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    server
        .post("/api/v1/matches/mat_ftb/football")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({
            "team_id": AWAY,
            "actions": [
                start_period("first_half"),
                end_period("first_half"),
                start_period("second_half"),
                end_period("second_half"),
                end_match(),
            ],
        }))
        .await
        .assert_status_ok();

    let resp = server
        .post("/api/v1/matches/mat_ftb/settle")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["settled"], false);

    let table = app.standings().await;
    assert!(table.iter().all(|s| s.played == 1 && s.drawn == 1 && s.points == 1));
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_participants_can_post_messages() {
    let (app, server, token) = setup().await;

    let resp = server
        .post("/api/v1/conversations/cnv_1/messages")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "content": "hello" }))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);

    app.db.add_participant("cnv_1", "usr_scorer").await;
    let resp = server
        .post("/api/v1/conversations/cnv_1/messages")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "content": "  hello  " }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    assert_eq!(body["content"], "hello");
    assert_eq!(body["sender_id"], "usr_scorer");

    let state = app.db.dump().await;
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn blank_message_fails_validation() {
    let (app, server, token) = setup().await;
    app.db.add_participant("cnv_1", "usr_scorer").await;

    let resp = server
        .post("/api/v1/conversations/cnv_1/messages")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "content": "   " }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_hub_metrics() {
    use tower::ServiceExt;

    let app = TestApp::new().await;
    let resp = app
        .router()
        .oneshot(http::Request::get("/health").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let server = TestServer::new(app.router()).unwrap();
    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["relay"], false);
    assert_eq!(body["hub"]["clients"], 0);
    assert!(body["hub"]["categories"]["cricket"].is_object());
}
