//! API routes module

pub mod discord;
pub mod events;

use std::sync::Arc;

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<AppState>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Event commands: create, cancel, delete and votes
        .nest("/events", events::router())
        // Button clicks forwarded by Discord
        .nest("/discord", discord::router())
}
