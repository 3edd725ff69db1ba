//! Rutas HTTP
//!
//! `/routing` (route packets, estadísticas, previews y borradores del
//! builder) requiere sesión; `/health` es público.

pub mod draft_routes;
pub mod routing_routes;

use axum::{middleware::from_fn_with_state, response::Json, routing::get, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::{auth_middleware, cors_middleware};
use crate::state::AppState;

/// Construir la aplicación completa
pub fn create_app(state: AppState) -> Router {
    let routing = routing_routes::create_routing_router()
        .nest("/drafts", draft_routes::create_draft_router())
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/routing", routing)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_middleware(&state.config.cors_origins)),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
