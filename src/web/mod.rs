//! Web layer: the HTTP control plane and the static stream/logo surfaces
//!
//! Handlers stay thin and delegate to the service layer; every endpoint
//! uses the `{"data": …}` / `{"error": …}` envelope. Playlists and
//! segments are served read-only from the HLS root.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{ServerConfig, StorageConfig};
use crate::services::{AuthService, ChannelService, SettingsService};
use crate::system::SystemProbe;

pub mod extractors;
pub mod handlers;
pub mod responses;

#[derive(Clone)]
pub struct AppState {
    pub channels: Arc<ChannelService>,
    pub auth: Arc<AuthService>,
    pub settings: Arc<SettingsService>,
    pub probe: Arc<SystemProbe>,
    pub storage: StorageConfig,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState, server: &ServerConfig) -> Result<Self> {
        let api = Router::new()
            .route("/health", get(health))
            .route("/auth/login", post(handlers::auth::login))
            .route("/auth/logout", post(handlers::auth::logout))
            .route("/auth/refresh", post(handlers::auth::refresh))
            .route("/auth/me", get(handlers::auth::me))
            .route(
                "/channels",
                get(handlers::channels::list).post(handlers::channels::create),
            )
            .route("/channels/metrics", get(handlers::channels::all_metrics))
            .route("/channels/batch/start", post(handlers::channels::batch_start))
            .route("/channels/batch/stop", post(handlers::channels::batch_stop))
            .route(
                "/channels/batch/restart",
                post(handlers::channels::batch_restart),
            )
            .route(
                "/channels/batch/delete",
                post(handlers::channels::batch_delete),
            )
            .route(
                "/channels/{id}",
                get(handlers::channels::get)
                    .put(handlers::channels::update)
                    .delete(handlers::channels::delete),
            )
            .route("/channels/{id}/start", post(handlers::channels::start))
            .route("/channels/{id}/stop", post(handlers::channels::stop))
            .route("/channels/{id}/restart", post(handlers::channels::restart))
            .route("/channels/{id}/metrics", get(handlers::channels::metrics))
            .route("/channels/{id}/logs", get(handlers::channels::logs))
            .route("/uploads/logo", post(handlers::uploads::upload_logo))
            .route(
                "/uploads/logo/{filename}",
                delete(handlers::uploads::delete_logo),
            )
            .route(
                "/settings",
                get(handlers::settings::get).put(handlers::settings::update),
            )
            .route("/system/info", get(handlers::system::info));

        // The playlist handler must win over static serving so a missing
        // index.m3u8 becomes a clean 404 instead of a directory listing.
        let streams = Router::new()
            .route(
                "/{channel_id}/index.m3u8",
                get(handlers::streams::serve_playlist),
            )
            .fallback_service(ServeDir::new(&state.storage.hls_path));

        let app = Router::new()
            .nest("/api/v1", api)
            .nest("/streams", streams)
            .nest_service("/logos", ServeDir::new(&state.storage.logo_path))
            .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr: SocketAddr = server
            .addr()
            .parse()
            .with_context(|| format!("invalid server address {}", server.addr()))?;

        Ok(Self { app, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The assembled router, for in-process testing
    pub fn into_router(self) -> Router {
        self.app
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "web server listening");
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
