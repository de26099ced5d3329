pub mod conversations;
pub mod health;
pub mod matches;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            matches::router().merge(conversations::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        matches::submit_cricket,
        matches::submit_football,
        matches::settle,
        matches::score,
        conversations::send_message,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            crate::models::chat::ChatMessage,
            crate::models::standing::Standing,
            crate::scoring::Outcome,
            crate::scoring::ScoreUpdate,
            crate::scoring::SettleReport,
            crate::engine::cricket::CricketAction,
            crate::engine::football::FootballAction,
            health::HealthResponse,
            conversations::SendMessageRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Scoring", description = "Live cricket and football scoring"),
        (name = "Chat", description = "Conversation messages"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_rest_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/matches/{match_id}/cricket",
            "/api/v1/matches/{match_id}/football",
            "/api/v1/matches/{match_id}/settle",
            "/api/v1/matches/{match_id}/score",
            "/api/v1/conversations/{conversation_id}/messages",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("Outcome"));
        assert!(schemas.contains_key("ApiErrorBody"));
    }
}
