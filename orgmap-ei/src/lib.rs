//! orgmap-ei library interface
//!
//! Exposes the employer import workflow (duplicate detection, merge,
//! commit) and its HTTP API for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::MatchingConfig;
use crate::services::fwc_client::FwcClient;
use crate::services::ImportOrchestrator;
use orgmap_common::events::EventBus;
use orgmap_common::{Error, Result};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Single-writer import session state; session-level operations hold
    /// this lock for their full duration
    pub orchestrator: Arc<Mutex<ImportOrchestrator>>,
    /// Cancellation token for the running detect or commit, if any
    pub active_cancel: Arc<RwLock<Option<CancellationToken>>>,
    /// FWC document search client, paced per the matching config
    pub fwc: Arc<FwcClient>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: MatchingConfig) -> Result<Self> {
        let fwc = FwcClient::new(config.fwc_pacing_ms)
            .map_err(|e| Error::Internal(format!("FWC client init failed: {}", e)))?;
        let orchestrator = ImportOrchestrator::new(db.clone(), event_bus.clone(), config);
        Ok(Self {
            db,
            event_bus,
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            active_cancel: Arc::new(RwLock::new(None)),
            fwc: Arc::new(fwc),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::cors::CorsLayer;

    Router::new()
        .merge(api::import_routes())
        .route("/import/events", get(api::import_event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
