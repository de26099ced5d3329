mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use common::*;
use scoreline_api::models::fixture::Sport;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: start an actual TCP server for WebSocket testing.
async fn start_ws_server() -> (SocketAddr, TestApp) {
    let app = TestApp::new().await;
    let router = app.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, app)
}

async fn open(addr: SocketAddr) -> Socket {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    ws
}

async fn send(ws: &mut Socket, frame: Value) {
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Next message of any kind, skipping keepalive pings.
async fn next_message(ws: &mut Socket) -> tungstenite::Message {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout")
            .expect("stream ended")
            .expect("read error");
        match msg {
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_frame(ws: &mut Socket) -> Value {
    let text = next_message(ws).await.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

/// Reads until a frame of `frame_type` arrives. Replies and broadcasts use
/// separate queues, so their relative order is not fixed.
async fn frame_of_type(ws: &mut Socket, frame_type: &str) -> Value {
    for _ in 0..8 {
        let frame = next_frame(ws).await;
        if frame["type"] == frame_type {
            return frame;
        }
    }
    panic!("no {frame_type} frame received");
}

async fn authenticate(ws: &mut Socket, token: &str) -> Value {
    send(ws, json!({ "type": "AUTHENTICATE", "payload": { "token": token } })).await;
    let frame = next_frame(ws).await;
    assert_eq!(frame["type"], "AUTHENTICATED");
    frame
}

async fn connect_as(addr: SocketAddr, app: &TestApp, user_id: &str) -> Socket {
    let token = app.login(user_id).await;
    let mut ws = open(addr).await;
    authenticate(&mut ws, &token).await;
    ws
}

fn assert_closed_with(msg: tungstenite::Message, code: u16) {
    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(
                frame.code,
                tungstenite::protocol::frame::coding::CloseCode::from(code)
            );
        }
        tungstenite::Message::Close(None) => {}
        other => panic!("Expected Close frame, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authenticate_returns_client_id() {
    let (addr, app) = start_ws_server().await;
    let token = app.login("usr_fan").await;

    let mut ws = open(addr).await;
    let frame = authenticate(&mut ws, &token).await;
    assert!(frame["payload"]["client_id"].as_str().unwrap().starts_with("cli_"));
    assert_eq!(frame["payload"]["user_id"], "usr_fan");
}

#[tokio::test]
async fn bad_token_closes_the_socket() {
    let (addr, _app) = start_ws_server().await;

    let mut ws = open(addr).await;
    send(&mut ws, json!({ "type": "AUTHENTICATE", "payload": { "token": "tok_bogus" } })).await;
    assert_closed_with(next_message(&mut ws).await, 4004);
}

#[tokio::test]
async fn first_frame_must_be_authenticate() {
    let (addr, _app) = start_ws_server().await;

    let mut ws = open(addr).await;
    send(&mut ws, json!({ "type": "SUBSCRIBE", "payload": { "topic": "match:mat_1" } })).await;
    assert_closed_with(next_message(&mut ws).await, 4003);
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribe_and_unsubscribe_are_acknowledged() {
    let (addr, app) = start_ws_server().await;
    let mut ws = connect_as(addr, &app, "usr_fan").await;

    send(&mut ws, json!({ "type": "SUBSCRIBE", "payload": { "topic": "match:mat_1" } })).await;
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["type"], "SUBSCRIBED");
    assert_eq!(frame["payload"]["topic"], "match:mat_1");

    send(&mut ws, json!({ "type": "UNSUBSCRIBE", "payload": { "topic": "match:mat_1" } })).await;
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["type"], "UNSUBSCRIBED");
}

#[tokio::test]
async fn malformed_topic_is_an_error_frame() {
    let (addr, app) = start_ws_server().await;
    let mut ws = connect_as(addr, &app, "usr_fan").await;

    send(&mut ws, json!({ "type": "SUBSCRIBE", "payload": { "topic": "team:abc" } })).await;
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["type"], "ERROR");
    assert_eq!(frame["payload"]["code"], "INVALID_TOPIC");

    // The connection survives the error.
    send(&mut ws, json!({ "type": "NOPE" })).await;
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["payload"]["code"], "UNKNOWN_FRAME_TYPE");
}

#[tokio::test]
async fn conversation_topics_need_participation() {
    let (addr, app) = start_ws_server().await;
    let mut ws = connect_as(addr, &app, "usr_fan").await;

    send(&mut ws, json!({ "type": "SUBSCRIBE", "payload": { "topic": "conversation:cnv_1" } })).await;
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["type"], "ERROR");
    assert_eq!(frame["payload"]["code"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Scoring and chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cricket_event_is_accepted_and_broadcast() {
    let (addr, app) = start_ws_server().await;
    app.seed_fixture("mat_ws", Sport::Cricket, "t20").await;

    let mut scorer = connect_as(addr, &app, "usr_scorer").await;
    let mut viewer = connect_as(addr, &app, "usr_viewer").await;

    send(
        &mut scorer,
        json!({
            "type": "CRICKET_EVENT",
            "payload": { "match_id": "mat_ws", "team_id": HOME, "actions": [toss("bat")] },
        }),
    )
    .await;

    let accepted = frame_of_type(&mut scorer, "EVENT_ACCEPTED").await;
    assert_eq!(accepted["payload"]["match_id"], "mat_ws");

    let update = frame_of_type(&mut viewer, "CRICKET_SCORE_UPDATED").await;
    assert_eq!(update["payload"]["match_id"], "mat_ws");
    assert_eq!(update["payload"]["innings"][0]["batting_team_id"], HOME);
    assert_eq!(update["payload"]["submitted_by"], "usr_scorer");
}

#[tokio::test]
async fn rejected_event_gets_an_error_reply() {
    let (addr, app) = start_ws_server().await;
    app.seed_fixture("mat_ws", Sport::Cricket, "t20").await;
    let mut scorer = connect_as(addr, &app, "usr_scorer").await;

    send(
        &mut scorer,
        json!({
            "type": "CRICKET_EVENT",
            "payload": { "match_id": "mat_ws", "team_id": HOME, "actions": [ball("away_1", 4)] },
        }),
    )
    .await;
    let frame = next_frame(&mut scorer).await;
    assert_eq!(frame["type"], "ERROR");
    assert_eq!(frame["payload"]["error"]["code"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn chat_message_reaches_conversation_subscribers() {
    let (addr, app) = start_ws_server().await;
    app.db.add_participant("cnv_1", "usr_a").await;
    app.db.add_participant("cnv_1", "usr_b").await;

    let mut a = connect_as(addr, &app, "usr_a").await;
    let mut b = connect_as(addr, &app, "usr_b").await;

    send(&mut b, json!({ "type": "SUBSCRIBE", "payload": { "topic": "conversation:cnv_1" } })).await;
    assert_eq!(next_frame(&mut b).await["type"], "SUBSCRIBED");

    send(
        &mut a,
        json!({
            "type": "CREATE_MESSAGE",
            "payload": { "conversation_id": "cnv_1", "content": "what a catch" },
        }),
    )
    .await;
    let accepted = frame_of_type(&mut a, "MESSAGE_ACCEPTED").await;
    assert_eq!(accepted["payload"]["sender_id"], "usr_a");

    let created = frame_of_type(&mut b, "MESSAGE_CREATED").await;
    assert_eq!(created["payload"]["content"], "what a catch");
    assert_eq!(created["payload"]["conversation_id"], "cnv_1");
}

#[tokio::test]
async fn health_counts_connected_clients() {
    let (addr, app) = start_ws_server().await;
    let _ws = connect_as(addr, &app, "usr_fan").await;

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("health request")
        .json()
        .await
        .expect("parse health");
    assert_eq!(body["hub"]["clients"], 1);
}
