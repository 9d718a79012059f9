pub mod auth;
pub mod error;
pub mod identity;
mod validation;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub use error::{ApiError, ErrorCode};
pub use identity::{resolve_identity, CurrentUser, IdentityError};

pub fn create_router(state: Arc<AppState>) -> Router {
    // Protected by bearer access token
    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity::require_identity,
        ));

    let auth_routes = Router::new()
        .route("/signup", post(auth::sign_up))
        .route("/signin", post(auth::sign_in))
        .route("/logout", get(auth::log_out).delete(auth::log_out))
        .route("/refresh", post(auth::refresh))
        .route("/genpassresetcode", post(auth::request_password_reset))
        .route("/passreset/verify", post(auth::verify_password_reset))
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/auth", auth_routes)
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured origins; unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

async fn health_check() -> &'static str {
    "OK"
}
