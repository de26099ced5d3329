pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod models;
pub mod relay;
pub mod routes;
pub mod scoring;
pub mod store;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use hub::BroadcastHub;
use relay::RelayLink;
use scoreline_common::SnowflakeGenerator;
use scoring::Coordinator;
use store::ChatStore;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KeyValueStore>,
    pub chat: Arc<dyn ChatStore>,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub coordinator: Arc<Coordinator>,
    pub hub: Arc<BroadcastHub>,
    /// Absent in single-process deployments.
    pub relay: Option<Arc<RelayLink>>,
}
