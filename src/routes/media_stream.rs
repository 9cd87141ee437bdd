//! Media Stream WebSocket route configuration

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::core::telephony::MEDIA_STREAM_PATH;
use crate::handlers::media_stream::media_stream_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the Media Stream WebSocket router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for a Twilio Media Stream
///
/// # Protocol
///
/// Twilio sends JSON text frames (`connected`, `start`, `media`, `mark`,
/// `stop`). The server answers with `media`, `mark` and `clear` frames
/// carrying the assistant's audio and barge-in control.
pub fn create_media_stream_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
