//! Import commit results and per-item errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-item commit failure
///
/// Failures are isolated: one bad record never aborts the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportItemError {
    pub pending_id: Uuid,
    pub pending_name: String,
    /// Human-readable failure reason, also recorded on the pending row
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate result of one commit run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    /// Pending employers considered in this run
    pub total: usize,
    /// New canonical employers created
    pub created: usize,
    /// Pending employers matched to existing employers
    pub matched: usize,
    /// Items skipped because they were already imported (resumed batch)
    pub already_imported: usize,
    /// Capability records created by idempotent attachment
    pub capabilities_created: usize,
    /// Alias records written
    pub aliases_written: usize,
    /// Per-item failures (batch continued past each)
    pub errors: Vec<ImportItemError>,
    /// True when a user cancel stopped the batch between items
    pub cancelled: bool,
}

impl ImportResult {
    pub fn record_error(&mut self, pending_id: Uuid, pending_name: &str, reason: String) {
        self.errors.push(ImportItemError {
            pending_id,
            pending_name: pending_name.to_string(),
            reason,
            occurred_at: Utc::now(),
        });
    }
}

/// Report from the bulk exact-match merge pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkMergeReport {
    /// Groups successfully collapsed store-side
    pub merged_groups: usize,
    /// Duplicate employers subsumed across all groups
    pub merged_count: usize,
    /// Per-group store failures (decision still advanced to the primary)
    pub failures: Vec<MergeFailure>,
}

/// A non-fatal store-side merge failure, surfaced for manual reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeFailure {
    pub primary_id: Uuid,
    pub duplicate_ids: Vec<Uuid>,
    pub reason: String,
}
