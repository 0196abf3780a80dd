//! Import workflow API handlers
//!
//! POST /import/detect, /import/merge, /import/decision, /import/commit,
//! /import/enrich, /import/cancel and GET /import/status. One import
//! session is active
//! at a time; the session-level operations take the orchestrator lock
//! for their full duration, so a second detect or commit while one is
//! running gets 409 Conflict.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{AliasDecision, BulkMergeReport, DuplicateDetection, ImportResult};
use crate::AppState;

/// POST /import/detect response
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub session_id: Uuid,
    pub detections: Vec<DuplicateDetection>,
}

/// GET /import/status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_id: Option<Uuid>,
    pub detections: Vec<DuplicateDetection>,
}

/// POST /import/decision request
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub pending_id: Uuid,
    pub action: DecisionAction,
    /// Optional alias sub-decision, applied after the action
    #[serde(default)]
    pub alias: Option<AliasDecision>,
}

/// Decision actions accepted from the operator
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionAction {
    UseExisting { target_id: Uuid },
    CreateNew,
    Reset,
}

/// POST /import/cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /import/enrich response
#[derive(Debug, Serialize)]
pub struct EnrichResponse {
    /// Pending employers annotated with an agreement note
    pub annotated: usize,
}

/// POST /import/detect
///
/// Runs duplicate detection over all unresolved pending employers and
/// starts a fresh session.
pub async fn detect(State(state): State<AppState>) -> ApiResult<Json<DetectResponse>> {
    let mut orch = state
        .orchestrator
        .try_lock()
        .map_err(|_| ApiError::Conflict("Import operation already running".to_string()))?;

    let cancel = state.register_cancel().await;
    let result = orch.detect_batch(&cancel).await;
    state.clear_cancel().await;

    let session_id = result?;
    Ok(Json(DetectResponse {
        session_id,
        detections: orch.detections(),
    }))
}

/// GET /import/status
///
/// Detection results and decision snapshot for the active session.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let orch = state.orchestrator.lock().await;
    Json(StatusResponse {
        session_id: orch.session_id(),
        detections: orch.detections(),
    })
}

/// POST /import/merge
///
/// Collapses every multi-candidate exact-match group in the session.
pub async fn merge(State(state): State<AppState>) -> ApiResult<Json<BulkMergeReport>> {
    let mut orch = state
        .orchestrator
        .try_lock()
        .map_err(|_| ApiError::Conflict("Import operation already running".to_string()))?;

    let report = orch.merge_exact_groups().await?;
    Ok(Json(report))
}

/// POST /import/decision
///
/// Records an operator decision for one pending employer.
pub async fn decide(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let mut orch = state.orchestrator.lock().await;

    match request.action {
        DecisionAction::UseExisting { target_id } => {
            orch.decide_use_existing(request.pending_id, target_id)?;
        }
        DecisionAction::CreateNew => {
            orch.decide_create_new(request.pending_id)?;
        }
        DecisionAction::Reset => {
            orch.reset_decision(request.pending_id)?;
        }
    }

    if let Some(alias) = request.alias {
        orch.set_alias_decision(request.pending_id, alias)?;
    }

    Ok(Json(StatusResponse {
        session_id: orch.session_id(),
        detections: orch.detections(),
    }))
}

/// POST /import/commit
///
/// Applies the session's decisions to the canonical store.
pub async fn commit(State(state): State<AppState>) -> ApiResult<Json<ImportResult>> {
    let mut orch = state
        .orchestrator
        .try_lock()
        .map_err(|_| ApiError::Conflict("Import operation already running".to_string()))?;

    let cancel = state.register_cancel().await;
    let result = orch.commit(&cancel).await;
    state.clear_cancel().await;

    let result = result?;
    if !result.errors.is_empty() {
        let mut last_error = state.last_error.write().await;
        *last_error = result.errors.last().map(|e| e.reason.clone());
    }

    Ok(Json(result))
}

/// POST /import/enrich
///
/// Annotates the session's pending employers with FWC enterprise
/// agreement hits. Paced by the FWC client's rate limiter, so this can
/// run long for a large batch.
pub async fn enrich(State(state): State<AppState>) -> ApiResult<Json<EnrichResponse>> {
    let orch = state
        .orchestrator
        .try_lock()
        .map_err(|_| ApiError::Conflict("Import operation already running".to_string()))?;

    let cancel = state.register_cancel().await;
    let result = orch.enrich_with_agreements(&state.fwc, &cancel).await;
    state.clear_cancel().await;

    Ok(Json(EnrichResponse { annotated: result? }))
}

/// POST /import/cancel
///
/// Requests cancellation of the running detect or commit. Cooperative
/// and coarse: the in-flight item runs to completion, only the next
/// item is prevented from starting.
pub async fn cancel(State(state): State<AppState>) -> Json<CancelResponse> {
    let active = state.active_cancel.read().await;
    match active.as_ref() {
        Some(token) => {
            token.cancel();
            tracing::info!("Cancellation requested for running import operation");
            Json(CancelResponse { cancelled: true })
        }
        None => Json(CancelResponse { cancelled: false }),
    }
}

impl AppState {
    /// Register a fresh cancellation token for a session-level operation
    pub(crate) async fn register_cancel(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut active = self.active_cancel.write().await;
        *active = Some(token.clone());
        token
    }

    pub(crate) async fn clear_cancel(&self) {
        let mut active = self.active_cancel.write().await;
        *active = None;
    }
}

/// Build import workflow routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import/detect", post(detect))
        .route("/import/status", get(status))
        .route("/import/merge", post(merge))
        .route("/import/decision", post(decide))
        .route("/import/commit", post(commit))
        .route("/import/enrich", post(enrich))
        .route("/import/cancel", post(cancel))
}
