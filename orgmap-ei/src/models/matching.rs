//! Candidate match and duplicate detection types
//!
//! These are ephemeral results produced by the candidate finder; they are
//! never persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ImportDecision;

/// How a candidate was matched to a pending employer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactName,
    Alias,
    ExternalId,
    Fuzzy,
}

/// A canonical employer that may be the same real-world entity as a
/// pending employer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub employer_id: Uuid,
    pub name: String,
    pub match_type: MatchType,
    /// Confidence score on a 0-100 scale, comparable across calls
    pub confidence: u8,
}

/// An existing alias whose normalized form collides with the pending name
/// but belongs to a different employer than the best candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasConflict {
    pub alias_id: Uuid,
    pub employer_id: Uuid,
    pub employer_name: String,
    pub alias: String,
    pub alias_normalized: String,
}

/// Per-pending-employer duplicate detection aggregate
///
/// `similar_matches` is populated only when `exact_matches` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateDetection {
    pub pending_id: Uuid,
    pub pending_name: String,
    pub exact_matches: Vec<CandidateMatch>,
    pub similar_matches: Vec<CandidateMatch>,
    pub conflicting_aliases: Vec<AliasConflict>,
    /// In-progress user decision (None until made)
    pub decision: Option<ImportDecision>,
}

impl DuplicateDetection {
    /// Whether this pending employer has more than one exact candidate,
    /// i.e. the canonical store itself contains duplicates of each other
    pub fn is_multi_exact(&self) -> bool {
        self.exact_matches.len() > 1
    }
}

/// A set of canonical employers determined to be duplicates of one
/// another, collapsed to one primary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeGroup {
    /// Earliest-created employer in the group (ties broken by input order)
    pub primary_id: Uuid,
    /// Employers subsumed into the primary
    pub subsumed: Vec<Uuid>,
}
