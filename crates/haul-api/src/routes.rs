use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::{health, loads, messages};

/// All HTTP routes. Cross-cutting layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Loads (collection answers with or without the trailing slash)
        .route("/api/loads", get(loads::list_loads).post(loads::create_load))
        .route("/api/loads/", get(loads::list_loads).post(loads::create_load))
        .route("/api/loads/my-loads", get(loads::my_loads))
        .route(
            "/api/loads/{load_id}",
            get(loads::get_load).put(loads::update_load).delete(loads::delete_load),
        )
        .route("/api/loads/{load_id}/claim", post(loads::claim_load))
        .route("/api/loads/{load_id}/accept", post(loads::accept_load))
        .route("/api/loads/{load_id}/start", post(loads::start_load))
        .route("/api/loads/{load_id}/deliver", post(loads::deliver_load))
        // Messages
        .route("/api/messages", post(messages::send_message))
        .route("/api/messages/", post(messages::send_message))
        .route("/api/messages/load/{load_id}", get(messages::get_messages))
        .with_state(state)
}
