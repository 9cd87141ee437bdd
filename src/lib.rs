pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use crate::core::*;
pub use errors::app_error::{AppError, AppResult};
pub use state::AppState;

use std::sync::Arc;

/// Assemble the application router (health, call-setup webhook, media stream).
///
/// Transport-level layers such as CORS and rate limiting are added by the binary.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    routes::api::create_api_router()
        .merge(routes::media_stream::create_media_stream_router(
            state.clone(),
        ))
        .with_state(state)
}
