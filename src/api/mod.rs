pub mod auth;
pub mod error;
pub mod extract;
mod invites;
pub mod rate_limit;
mod trips;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub use error::{ApiError, ErrorCode};

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public user routes, on the stricter auth rate limit
    let public_user_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/check-email", post(auth::check_email))
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/reset-password", post(auth::reset_password))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let user_routes = Router::new()
        .route("/me", get(auth::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .merge(public_user_routes);

    // Everything under /api/trips needs a session
    let trip_routes = Router::new()
        .route("/", post(trips::create_trip))
        .route("/my", get(trips::my_trips))
        // Invites
        .route("/invites/my", get(invites::my_invites))
        .route("/invites/:invite_id/accept", post(invites::accept_invite))
        .route("/invites/:invite_id/decline", post(invites::decline_invite))
        // Single trip
        .route("/:id", get(trips::get_trip))
        .route("/:id/invite", post(invites::invite_to_trip))
        .route(
            "/:id/day/:day_index/activity/:activity_index/react",
            post(trips::react_to_activity),
        )
        .route(
            "/:id/day/:day_index/hotel/:hotel_index/react",
            post(trips::react_to_hotel),
        )
        .route("/:id/expenses", post(trips::add_expense))
        .route("/:id/chat", post(trips::add_chat_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/users", user_routes)
        .nest("/api/trips", trip_routes)
        .layer(cors_layer(&state.config.server.client_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allow the configured web client to call the API with bearer tokens
fn cors_layer(client_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match HeaderValue::from_str(client_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(client_url = %client_url, "Invalid client_url, CORS disabled");
            layer
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
