use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::messages;
use crate::middleware::require_auth;
use crate::state::AppState;

/// Full HTTP surface. Viewer routes are public; owner routes need a bearer
/// token from the identity provider.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(messages::health))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/access", post(messages::check_access))
        .route("/messages/{id}/reveal", post(messages::reveal_message))
        .route("/messages/{id}/expire", post(messages::expire_message))
        .with_state(state.clone());

    let owner_routes = Router::new()
        .route("/messages", post(messages::create_message))
        .route("/messages/{id}", delete(messages::delete_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(owner_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
