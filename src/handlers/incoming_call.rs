//! Call-setup webhook.
//!
//! Twilio requests `/incoming-call` when a call arrives and expects TwiML
//! telling it to connect the call audio to `/media-stream`.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;

use crate::core::telephony::{connect_stream_twiml, media_stream_url};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Answer an incoming call with TwiML connecting it to the media stream.
///
/// Served for both GET and POST; the Twilio form body is not used.
pub async fn incoming_call_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let host = stream_host(state.config.public_host.as_deref(), &headers)?;
    let stream_url = media_stream_url(&host);
    info!(stream_url = %stream_url, "Answering incoming call");

    let twiml = connect_stream_twiml(&state.config.call_script(), &stream_url);
    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        )],
        twiml,
    )
        .into_response())
}

/// Host advertised in the stream URL: configured public host, else the request `Host`.
pub(crate) fn stream_host(public_host: Option<&str>, headers: &HeaderMap) -> AppResult<String> {
    if let Some(host) = public_host.filter(|h| !h.is_empty()) {
        return Ok(host.to_string());
    }

    let raw = headers
        .get(header::HOST)
        .ok_or(AppError::MissingHost)?
        .to_str()
        .map_err(|e| AppError::InvalidHost(e.to_string()))?
        .trim();
    if raw.is_empty() {
        return Err(AppError::MissingHost);
    }

    let authority = raw
        .parse::<http::uri::Authority>()
        .map_err(|e| AppError::InvalidHost(e.to_string()))?;
    Ok(authority.as_str().to_string())
}
