//! Session admission middleware for the media stream endpoint
//!
//! Rejects WebSocket upgrades with 503 while the session registry is full,
//! before the upgrade is accepted.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use callbridge_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media-stream", get(media_stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::state::AppState;

/// Middleware that refuses new media streams when `max_sessions` is reached.
///
/// Only WebSocket upgrade requests are checked. The registry enforces the
/// limit again when the session is created.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    if let Some(limit) = state.sessions.max_sessions()
        && state.sessions.at_capacity()
    {
        tracing::warn!(
            active = state.sessions.active_sessions(),
            limit,
            "Rejecting media stream: session limit reached"
        );
        return AppError::AtCapacity { limit }.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{Router, http::StatusCode, middleware, routing::get};
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/media-stream", get(|| async { "upgraded" }))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state)
    }

    fn upgrade_request() -> Request<Body> {
        Request::builder()
            .uri("/media-stream")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap()
    }

    fn limited_config(limit: usize) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.openai_api_key = Some("sk-test".to_string());
        config.max_sessions = Some(limit);
        config
    }

    #[tokio::test]
    async fn test_upgrade_allowed_below_limit() {
        let state = AppState::new(limited_config(1)).await;
        let response = app(state).oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upgrade_rejected_at_limit() {
        let state = AppState::new(limited_config(1)).await;
        let (tx, _rx) = mpsc::channel(1);
        let _session = state.sessions.create_session(tx).unwrap();

        let response = app(state.clone()).oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // Plain requests are not limited
        let plain = Request::builder()
            .uri("/media-stream")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(plain).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
