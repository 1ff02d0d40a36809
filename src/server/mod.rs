//! 入站 HTTP 接口：`POST /api` 流式问诊、`GET /health` 健康检查。
//!
//! Inbound HTTP surface.
//!
//! - `POST /api`: decode a [`Visit`], commit `200 text/event-stream` headers, then
//!   run the relay on its own task, feeding the response body through a channel.
//! - `GET /health`: liveness plus the configured provider.
//! - CORS preflight is answered by `tower-http`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::drivers::ProviderKind;
use crate::relay::{ChannelSink, StreamRelay};
use crate::types::{ConsultRequest, Visit};
use crate::Result;

/// Largest accepted consultation body.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Events buffered between the relay task and the response body.
const CHANNEL_CAPACITY: usize = 32;

/// Shared, read-only handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    relay: StreamRelay,
}

impl AppState {
    pub fn new(config: RelayConfig, relay: StreamRelay) -> Self {
        Self {
            config: Arc::new(config),
            relay,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api", post(consultation))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .with_state(state)
}

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let relay = StreamRelay::from_config(&config)?;
    let addr = config.bind_addr;

    // Misconfiguration is reported per request; warn early so operators notice.
    match ProviderKind::resolve(&config.provider) {
        Ok(kind) => {
            let settings = kind.settings(&config);
            if settings.api_key.is_none() {
                warn!(provider = kind.id(), "{} is not set", settings.api_key_var);
            }
        }
        Err(e) => warn!(error = %e, "requests will fail until LLM_PROVIDER is fixed"),
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, provider = config.effective_provider(), "consult-relay listening");

    axum::serve(listener, router(AppState::new(config, relay)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

async fn consultation(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Visit>, JsonRejection>,
) -> Response {
    let Json(visit) = match payload {
        Ok(visit) => visit,
        Err(rejection) => {
            debug!(error = %rejection, "rejecting consultation body");
            return (StatusCode::BAD_REQUEST, "Invalid request").into_response();
        }
    };

    let request = ConsultRequest::from_visit(&visit);
    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        let outcome = state.relay.consult(&state.config, &request, &mut sink).await;
        debug!(fragments = outcome.fragments, status = ?outcome.status, "consultation finished");
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<Bytes, Infallible>));
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.config.effective_provider(),
    }))
}
