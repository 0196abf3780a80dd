//! Import workflow orchestration
//!
//! Owns one import session end to end: load the unresolved batch, run
//! duplicate detection, collapse exact-match groups, accept user
//! decisions, then commit. The orchestrator is the single writer of the
//! in-progress decision map; callers serialize access to it (the HTTP
//! layer holds it behind a mutex), so there is no multi-writer
//! contention on session state.

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use orgmap_common::events::{EventBus, OrgmapEvent};
use orgmap_common::{Error, Result};

use crate::config::MatchingConfig;
use crate::db;
use crate::models::{
    AliasDecision, BulkMergeReport, DuplicateDetection, ImportResult, PendingEmployer,
};
use crate::services::{
    fwc_client::FwcClient, CandidateFinder, DecisionRecorder, ImportCommitter, MergeExecutor,
};

/// Import Orchestrator
///
/// Holds the session state between the detect and commit phases.
pub struct ImportOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    finder: CandidateFinder,
    merge_executor: MergeExecutor,
    committer: ImportCommitter,
    recorder: DecisionRecorder,
    pending: Vec<PendingEmployer>,
    detections: Vec<DuplicateDetection>,
    session_id: Option<Uuid>,
}

impl ImportOrchestrator {
    /// Create a new orchestrator with no active session
    pub fn new(db: SqlitePool, event_bus: EventBus, config: MatchingConfig) -> Self {
        Self {
            finder: CandidateFinder::new(db.clone(), config),
            merge_executor: MergeExecutor::new(db.clone(), event_bus.clone()),
            committer: ImportCommitter::new(db.clone(), event_bus.clone()),
            recorder: DecisionRecorder::new(),
            pending: Vec::new(),
            detections: Vec::new(),
            session_id: None,
            db,
            event_bus,
        }
    }

    /// Id of the active session, if a detection batch has been run
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Detection results for the active session
    ///
    /// Each detection carries a snapshot of its current decision.
    pub fn detections(&self) -> Vec<DuplicateDetection> {
        self.detections
            .iter()
            .map(|d| {
                let mut d = d.clone();
                d.decision = Some(self.recorder.decision(d.pending_id));
                d
            })
            .collect()
    }

    /// Run duplicate detection over all unresolved pending employers
    ///
    /// Starts a fresh session, discarding any prior decisions. Items are
    /// processed one at a time; cancellation only prevents starting the
    /// next item.
    pub async fn detect_batch(&mut self, cancel: &CancellationToken) -> Result<Uuid> {
        let session_id = Uuid::new_v4();
        let pending = db::pending::list_unresolved(&self.db).await?;

        tracing::info!(
            session_id = %session_id,
            total = pending.len(),
            "Starting duplicate detection batch"
        );

        self.event_bus.emit(OrgmapEvent::DetectionStarted {
            session_id,
            total: pending.len(),
            timestamp: chrono::Utc::now(),
        });

        let mut recorder = DecisionRecorder::new();
        let mut detections = Vec::with_capacity(pending.len());

        for item in &pending {
            if cancel.is_cancelled() {
                tracing::info!(session_id = %session_id, "Detection cancelled between items");
                break;
            }

            let detection = self.finder.detect_duplicates(item).await;

            recorder.register_candidates(item.guid, &detection.exact_matches);
            recorder.register_candidates(item.guid, &detection.similar_matches);

            self.event_bus.emit(OrgmapEvent::DetectionCompleted {
                session_id,
                pending_id: item.guid,
                exact_matches: detection.exact_matches.len(),
                similar_matches: detection.similar_matches.len(),
                conflicting_aliases: detection.conflicting_aliases.len(),
                timestamp: chrono::Utc::now(),
            });

            detections.push(detection);
        }

        self.recorder = recorder;
        self.pending = pending;
        self.detections = detections;
        self.session_id = Some(session_id);

        Ok(session_id)
    }

    /// Collapse every multi-candidate exact-match group in the session
    pub async fn merge_exact_groups(&mut self) -> Result<BulkMergeReport> {
        self.require_session()?;
        let report = self
            .merge_executor
            .merge_detected_groups(&self.detections, &mut self.recorder)
            .await;
        Ok(report)
    }

    /// Record a user decision linking a pending employer to a candidate
    pub fn decide_use_existing(&mut self, pending_id: Uuid, target_id: Uuid) -> Result<()> {
        self.require_session()?;
        self.recorder.decide_use_existing(pending_id, target_id)
    }

    /// Record a user decision to create a new employer
    pub fn decide_create_new(&mut self, pending_id: Uuid) -> Result<()> {
        self.require_session()?;
        self.recorder.decide_create_new(pending_id);
        Ok(())
    }

    /// Record the alias sub-decision for a pending employer
    pub fn set_alias_decision(&mut self, pending_id: Uuid, alias: AliasDecision) -> Result<()> {
        self.require_session()?;
        self.recorder.set_alias_decision(pending_id, alias);
        Ok(())
    }

    /// Reset a pending employer's decision back to unresolved
    pub fn reset_decision(&mut self, pending_id: Uuid) -> Result<()> {
        self.require_session()?;
        self.recorder.reset(pending_id);
        Ok(())
    }

    /// Commit the session's decisions to the canonical store
    ///
    /// Ends the session when the batch ran to completion. A cancelled
    /// commit keeps the session so the remaining items can be re-run.
    pub async fn commit(&mut self, cancel: &CancellationToken) -> Result<ImportResult> {
        let session_id = self.require_session()?;

        let result = self
            .committer
            .commit(session_id, &self.pending, self.recorder.decisions(), cancel)
            .await;

        if !result.cancelled {
            self.clear_session();
        }

        Ok(result)
    }

    /// Annotate matched pending employers with FWC enterprise-agreement hits
    ///
    /// Best effort: a search failure is logged and skipped, never fatal.
    /// Calls are paced by the client's rate limiter.
    pub async fn enrich_with_agreements(
        &self,
        fwc: &FwcClient,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        self.require_session()?;
        let mut annotated = 0;

        for item in &self.pending {
            if cancel.is_cancelled() {
                break;
            }

            let agreements = match fwc.search_agreements(&item.name).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(
                        pending_id = %item.guid,
                        name = %item.name,
                        error = %e,
                        "FWC agreement search failed, skipping"
                    );
                    continue;
                }
            };

            if let Some(agreement) = agreements.first() {
                let note = match &agreement.expiry_date {
                    Some(expiry) => format!(
                        "FWC agreement on record: {} (expires {})",
                        agreement.title, expiry
                    ),
                    None => format!("FWC agreement on record: {}", agreement.title),
                };
                db::pending::append_resolution_note(&self.db, item.guid, &note).await?;
                annotated += 1;
            }
        }

        Ok(annotated)
    }

    fn require_session(&self) -> Result<Uuid> {
        self.session_id
            .ok_or_else(|| Error::InvalidInput("No active import session".to_string()))
    }

    fn clear_session(&mut self) {
        self.recorder = DecisionRecorder::new();
        self.pending.clear();
        self.detections.clear();
        self.session_id = None;
    }
}
