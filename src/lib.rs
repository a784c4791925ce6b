pub mod auth;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod sharing;
pub mod state;
pub mod testing;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};
use crate::state::AppState;

/// Open the store and serve the API until the process is stopped
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let store = database::open_store(&config.database).await?;
    let port = config.api.port;
    let app = app(AppState::new(store, config));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("FamilySphere API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Full application router
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let mut router = Router::new()
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .merge(protected_routes(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security));
    }
    router.with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(calendar_routes())
        .merge(event_routes())
        .merge(reminder_routes())
        .merge(connection_routes())
        .route("/api/polls/:chat_id/vote", post(handlers::protected::polls::vote))
        // Layers run bottom-up: the token is checked before the user row
        .layer(from_fn_with_state(state.clone(), validate_user_middleware))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn calendar_routes() -> Router<AppState> {
    use handlers::protected::{calendar, templates};

    Router::new()
        .route("/api/calendar/events", get(calendar::feed))
        .route("/api/calendar/agenda", get(calendar::agenda))
        .route("/api/calendar/export", get(calendar::export))
        .route("/api/calendar/import", post(calendar::import))
        .route("/api/calendar/templates", get(templates::list).post(templates::create))
        .route("/api/calendar/templates/:id", put(templates::update).delete(templates::delete))
        .route("/api/calendar/templates/:id/apply", get(templates::apply))
}

fn event_routes() -> Router<AppState> {
    use handlers::protected::events;

    Router::new()
        .route("/api/events", post(events::create))
        .route("/api/events/dates", post(events::move_dates))
        .route("/api/events/rsvp", post(events::rsvp))
        .route("/api/events/:id", get(events::detail).put(events::update).delete(events::delete))
}

fn reminder_routes() -> Router<AppState> {
    use handlers::protected::reminders;

    Router::new()
        .route("/api/reminders", get(reminders::upcoming))
        .route("/api/reminders/due", get(reminders::due))
        .route("/api/reminders/preferences", post(reminders::preferences))
}

fn connection_routes() -> Router<AppState> {
    use handlers::protected::{connections, sharing};

    Router::new()
        .route("/api/connections", get(connections::overview))
        .route("/api/connections/request", post(connections::request))
        .route("/api/connections/requests/:id/accept", post(connections::accept))
        .route("/api/connections/requests/:id/reject", post(connections::reject))
        .route("/api/connections/requests/:id/cancel", post(connections::cancel))
        .route("/api/connections/families/:family_id", axum::routing::delete(connections::disconnect))
        .route(
            "/api/connections/families/:family_id/settings",
            get(connections::settings_get).put(connections::settings_put),
        )
        .route("/api/connections/share/:item_type/:item_id", post(sharing::share).delete(sharing::unshare))
        .route("/api/connections/shared/:item_type", get(sharing::shared_with_me))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if security.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
