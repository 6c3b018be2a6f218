//! HTTP/WebSocket facade.
//!
//! One listener serves both surfaces: the WebSocket upgrade at `/ws` that
//! carries the transfer protocol, and a handful of read-only JSON
//! endpoints for the browser shell (QR code, hub info, usage stats,
//! feedback intake).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use protocol::framing::FILE_ID_WIDTH;
use protocol::ids::normalize_session_code;

use crate::hub::Hub;
use crate::net::{connection, info};
use crate::qr;
use crate::stats::UsageStats;

/// Shared state handed to every route handler.
#[derive(Clone)]
struct AppState {
    hub: Arc<Hub>,
    /// The actually bound port, for building reachable URLs.
    port: u16,
}

/// The bound but not yet running server.
///
/// Binding and serving are split so callers (the binary, the tests) can
/// learn the real address before any traffic flows, including when the
/// configured port is 0.
pub struct Server {
    listener: tokio::net::TcpListener,
    hub: Arc<Hub>,
}

impl Server {
    /// Bind the configured address.
    pub async fn bind(hub: Arc<Hub>) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", hub.config.server.bind, hub.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self { listener, hub })
    }

    /// The address the listener actually bound.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the process ends.
    pub async fn serve(self) -> anyhow::Result<()> {
        let app = self.into_app()?;
        axum::serve(app.0, app.1).await?;
        Ok(())
    }

    /// Serve until `shutdown` resolves, then drain gracefully.
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let app = self.into_app()?;
        axum::serve(app.0, app.1)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    fn into_app(self) -> anyhow::Result<(tokio::net::TcpListener, Router)> {
        let port = self.listener.local_addr()?.port();
        let router = router(AppState {
            hub: self.hub,
            port,
        });
        Ok((self.listener, router))
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/qrcode", get(get_qrcode))
        .route("/api/info", get(get_info))
        .route("/api/stats", get(get_stats))
        .route("/api/feedback", post(post_feedback))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    // The cap covers the largest legal data frame: payload plus id prefix.
    let cap = state.hub.config.transfer.max_frame_size + FILE_ID_WIDTH;
    ws.max_frame_size(cap)
        .max_message_size(cap)
        .on_upgrade(move |socket| connection::handle_socket(state.hub, socket))
}

#[derive(Debug, Deserialize)]
struct QrQuery {
    session: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QrResponse {
    qr_code: String,
    url: String,
    ip: String,
}

async fn get_qrcode(
    State(state): State<AppState>,
    Query(query): Query<QrQuery>,
) -> Result<Json<QrResponse>, (StatusCode, String)> {
    let session = query.session.as_deref().map(normalize_session_code);
    let ip = info::local_ipv4();
    let url = info::hub_url(ip, state.port, session.as_deref());

    let qr_code = qr::data_url(&url)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(QrResponse {
        qr_code,
        url,
        ip: ip.to_string(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    ip: String,
    port: u16,
    url: String,
    connected_devices: usize,
}

async fn get_info(State(state): State<AppState>) -> Json<InfoResponse> {
    let ip = info::local_ipv4();
    Json(InfoResponse {
        ip: ip.to_string(),
        port: state.port,
        url: info::hub_url(ip, state.port, None),
        connected_devices: state.hub.registry.device_count(),
    })
}

async fn get_stats(State(state): State<AppState>) -> Json<UsageStats> {
    Json(state.hub.stats.snapshot())
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    rating: i32,
    #[serde(default)]
    feedback: String,
}

async fn post_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if !(1..=5).contains(&request.rating) {
        return Err((
            StatusCode::BAD_REQUEST,
            "rating must be between 1 and 5".to_string(),
        ));
    }

    state
        .hub
        .feedback
        .append(request.rating as u8, &request.feedback)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
