use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::state::AppState;

/// GET / - service banner
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "FamilySphere API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "calendar": "/api/calendar/* (protected)",
                "events": "/api/events/* (protected)",
                "reminders": "/api/reminders/* (protected)",
                "connections": "/api/connections/* (protected)",
                "polls": "/api/polls/:chat_id/vote (protected)",
                "health": "/health (public)",
            }
        }
    }))
}

/// GET /health - store connectivity
pub async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "store": backend }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Health check failed on {} store: {}", backend, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "Store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "timestamp": now, "store": backend }
                })),
            )
                .into_response()
        }
    }
}
