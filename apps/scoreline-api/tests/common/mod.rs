#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{TimeZone, Utc};

use scoreline_api::auth::tokens::{self, TokenData, TOKEN_TTL_SECS};
use scoreline_api::config::Config;
use scoreline_api::db::kv::{KeyValueStore, MemoryStore};
use scoreline_api::hub::{BroadcastHub, HubConfig};
use scoreline_api::models::fixture::{Fixture, MatchStatus, Player, Sport};
use scoreline_api::models::standing::Standing;
use scoreline_api::relay::{MemoryRelay, Relay, RelayLink};
use scoreline_api::scoring::Coordinator;
use scoreline_api::store::MemoryDatabase;
use scoreline_api::AppState;
use scoreline_common::SnowflakeGenerator;

pub const HOME: &str = "team_home";
pub const AWAY: &str = "team_away";
pub const TOURNAMENT: &str = "trn_cup";
pub const SCORER: &str = "usr_scorer";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        db_pool_size: 1,
        port: 0,
        worker_id: 0,
        redis_url: None,
        relay_queue_prefix: "test".to_string(),
        hub: HubConfig::default(),
        auth_timeout: Duration::from_secs(2),
    }
}

/// An AppState over in-memory stores, optionally linked to a shared relay.
pub struct TestApp {
    pub state: AppState,
    pub db: MemoryDatabase,
    pub kv: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(MemoryDatabase::new(), None, 0).await
    }

    /// A second "process" sharing the database and broker of another.
    pub async fn build(db: MemoryDatabase, relay: Option<Arc<dyn Relay>>, worker_id: u16) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let snowflake = Arc::new(SnowflakeGenerator::new(worker_id));
        let hub = BroadcastHub::start(HubConfig::default());

        let relay = match relay {
            Some(broker) => {
                let link = RelayLink::new(broker, format!("proc_test_{worker_id}"), "test");
                link.spawn_consumers(hub.clone()).await.expect("relay consumers");
                Some(Arc::new(link))
            }
            None => None,
        };

        let state = AppState {
            kv: kv.clone(),
            chat: Arc::new(db.clone()),
            config: Arc::new(test_config()),
            snowflake: snowflake.clone(),
            coordinator: Arc::new(Coordinator::new(Arc::new(db.clone()), snowflake)),
            hub,
            relay,
        };
        Self { state, db, kv }
    }

    pub fn router(&self) -> Router {
        scoreline_api::routes::router().with_state(self.state.clone())
    }

    /// Issues a bearer token for `user_id`.
    pub async fn login(&self, user_id: &str) -> String {
        let token = format!("tok_{user_id}");
        let data = TokenData {
            user_id: user_id.to_string(),
        };
        tokens::store_token(self.kv.as_ref() as &dyn KeyValueStore, &token, &data, TOKEN_TTL_SECS)
            .await
            .expect("store token");
        token
    }

    /// Seeds both squads and a fixture in the shared tournament.
    pub async fn seed_fixture(&self, id: &str, sport: Sport, format: &str) {
        let fixture = fixture(id, sport, format);
        self.db
            .seed(|s| {
                for player in squads() {
                    s.players.insert(player.id.clone(), player);
                }
                s.fixtures.insert(fixture.id.clone(), fixture);
            })
            .await;
    }

    pub async fn standings(&self) -> Vec<Standing> {
        self.db.dump().await.standings.into_values().collect()
    }
}

pub fn fixture(id: &str, sport: Sport, format: &str) -> Fixture {
    Fixture {
        id: id.to_string(),
        tournament_id: Some(TOURNAMENT.to_string()),
        sport,
        home_team_id: HOME.to_string(),
        away_team_id: AWAY.to_string(),
        scheduled_at: Utc.with_ymd_and_hms(2026, 3, 14, 14, 0, 0).unwrap(),
        status: MatchStatus::NotStarted,
        format: format.to_string(),
        toss_winner_id: None,
        toss_decision: None,
        winner_team_id: None,
        result: None,
        settled_at: None,
    }
}

/// Eleven players a side, `home_1..home_11` and `away_1..away_11`.
pub fn squads() -> Vec<Player> {
    ["home", "away"]
        .into_iter()
        .flat_map(|side| {
            (1..=11).map(move |n| Player {
                id: format!("{side}_{n}"),
                team_id: format!("team_{side}"),
                name: format!("{side} player {n}"),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Action builders
// ---------------------------------------------------------------------------

pub fn toss(decision: &str) -> serde_json::Value {
    serde_json::json!({ "action": "toss", "decision": decision })
}

pub fn batter_in(player_id: &str) -> serde_json::Value {
    serde_json::json!({ "action": "batter_in", "player_id": player_id })
}

pub fn change_bowler(player_id: &str) -> serde_json::Value {
    serde_json::json!({ "action": "change_bowler", "player_id": player_id })
}

pub fn ball(bowler_id: &str, runs: i32) -> serde_json::Value {
    serde_json::json!({ "action": "ball", "bowler_id": bowler_id, "runs": runs })
}

pub fn wide(bowler_id: &str, runs: i32) -> serde_json::Value {
    serde_json::json!({ "action": "wide", "bowler_id": bowler_id, "runs": runs })
}

pub fn bowled(bowler_id: &str) -> serde_json::Value {
    serde_json::json!({ "action": "wicket", "bowler_id": bowler_id, "kind": "bowled" })
}

pub fn start_period(period: &str) -> serde_json::Value {
    serde_json::json!({ "action": "start_period", "period": period })
}

pub fn end_period(period: &str) -> serde_json::Value {
    serde_json::json!({ "action": "end_period", "period": period })
}

pub fn goal(player_id: &str, minute: i32) -> serde_json::Value {
    serde_json::json!({ "action": "incident", "kind": "goal", "player_id": player_id, "minute": minute })
}

pub fn end_match() -> serde_json::Value {
    serde_json::json!({ "action": "end_match" })
}

/// A `ScoreEvent` from JSON, attributed to [`SCORER`].
pub fn cricket_event(match_id: &str, team_id: &str, actions: Vec<serde_json::Value>) -> scoreline_api::scoring::ScoreEvent {
    serde_json::from_value(serde_json::json!({
        "sport": "cricket",
        "match_id": match_id,
        "team_id": team_id,
        "actions": actions,
        "submitted_by": SCORER,
    }))
    .expect("cricket event")
}

pub fn football_event(match_id: &str, team_id: &str, actions: Vec<serde_json::Value>) -> scoreline_api::scoring::ScoreEvent {
    serde_json::from_value(serde_json::json!({
        "sport": "football",
        "match_id": match_id,
        "team_id": team_id,
        "actions": actions,
        "submitted_by": SCORER,
    }))
    .expect("football event")
}
