//! Goaltracker REST API
//!
//! HTTP API layer for Goaltracker, built with Axum. The server acts for one
//! signed-in user at a time.
//!
//! # Endpoints
//!
//! ## Auth
//! - `POST /api/v1/auth/sign-up` - Create an account
//! - `POST /api/v1/auth/sign-in` - Sign in
//! - `POST /api/v1/auth/sign-out` - Sign out
//! - `GET /api/v1/auth/session` - Current session
//!
//! ## Goals
//! - `GET /api/v1/goals` - List goals
//! - `POST /api/v1/goals` - Create a goal
//! - `PATCH /api/v1/goals/:id` - Update a goal
//! - `DELETE /api/v1/goals/:id` - Delete a goal
//! - `GET /api/v1/goals/stats` - Goal counters and login streak
//!
//! ## Calendar
//! - `GET /api/v1/calendar` - 42-day month grid
//! - `GET /api/v1/notes?date=` - Notes of a day
//! - `POST /api/v1/notes` - Add a note
//! - `PATCH /api/v1/notes/:id` - Edit a note
//! - `DELETE /api/v1/notes/:id` - Delete a note
//!
//! ## Social
//! - `GET /api/v1/users/search` - Debounced username search
//! - `GET /api/v1/friends` - Friend list
//! - `POST /api/v1/friends/requests` - Send a friend request
//! - `GET /api/v1/friends/requests` - Pending incoming requests
//! - `POST /api/v1/friends/requests/:id/accept` - Accept
//! - `POST /api/v1/friends/requests/:id/reject` - Reject
//! - `PUT /api/v1/presence` - Online flag
//!
//! ## Profile & activity
//! - `GET /api/v1/profile` - Own profile
//! - `PUT /api/v1/profile/avatar` - Upload an avatar
//! - `GET /api/v1/activity` - Visit streak and weekly visits
//! - `POST /api/v1/activity` - Record a visit
//! - `GET /api/v1/dashboard` - Summary view
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use goaltracker::api::{serve, ApiConfig, AppState};
//! use goaltracker::backend::MemoryBackend;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::new(Arc::new(MemoryBackend::new()), config.clone());
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Auth routes
        .route("/auth/sign-up", post(routes::auth::sign_up))
        .route("/auth/sign-in", post(routes::auth::sign_in))
        .route("/auth/sign-out", post(routes::auth::sign_out))
        .route("/auth/session", get(routes::auth::current_session))
        // Goal routes
        .route(
            "/goals",
            get(routes::goals::list_goals).post(routes::goals::create_goal),
        )
        .route("/goals/stats", get(routes::goals::goal_stats))
        .route(
            "/goals/:id",
            patch(routes::goals::update_goal).delete(routes::goals::delete_goal),
        )
        // Calendar routes
        .route("/calendar", get(routes::calendar::month_view))
        .route(
            "/notes",
            get(routes::notes::list_notes).post(routes::notes::create_note),
        )
        .route(
            "/notes/:id",
            patch(routes::notes::update_note).delete(routes::notes::delete_note),
        )
        // Social routes
        .route("/users/search", get(routes::users::search_users))
        .route("/friends", get(routes::friends::list_friends))
        .route(
            "/friends/requests",
            get(routes::friends::pending_requests).post(routes::friends::send_request),
        )
        .route(
            "/friends/requests/:id/accept",
            post(routes::friends::accept_request),
        )
        .route(
            "/friends/requests/:id/reject",
            post(routes::friends::reject_request),
        )
        .route("/presence", put(routes::friends::set_presence))
        // Profile and activity routes
        .route("/profile", get(routes::profile::get_profile))
        .route("/profile/avatar", put(routes::profile::upload_avatar))
        .route(
            "/activity",
            get(routes::activity::get_activity).post(routes::activity::track_activity),
        )
        .route("/dashboard", get(routes::dashboard::dashboard))
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// CORS for the configured origins; no origins means any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Goaltracker API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Goaltracker API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
