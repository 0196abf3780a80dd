//! Per-pending-employer decision types
//!
//! The decision recorder enforces the transition rules; these types only
//! describe the states.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user's resolution decision for one pending employer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmployerDecision {
    /// No decision made yet
    Unresolved,
    /// Link to a specific surfaced candidate
    UseExisting { target_id: Uuid },
    /// Reject all candidates and create a new canonical employer
    CreateNew,
    /// Set by the merge executor after collapsing an exact-match group;
    /// the target is the merge's chosen primary
    MergedInto { target_id: Uuid },
}

impl EmployerDecision {
    /// Canonical employer this decision points at, if any
    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            EmployerDecision::UseExisting { target_id }
            | EmployerDecision::MergedInto { target_id } => Some(*target_id),
            _ => None,
        }
    }
}

/// Independent sub-decision for how the pending name relates to the
/// chosen employer's aliases
///
/// Relevant only when at least one conflicting alias exists for the
/// chosen target. Defaults to `KeepAsAlias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AliasDecision {
    /// Record the pending name as a new alias of the target
    KeepAsAlias,
    /// Make the pending name the target's canonical name, keeping the
    /// prior name as an alias
    PromoteToCanonical,
    /// Fold the pending name's provenance into an existing alias record
    MergeIntoExistingAlias { alias_id: Uuid },
}

impl Default for AliasDecision {
    fn default() -> Self {
        AliasDecision::KeepAsAlias
    }
}

/// Combined decision state carried per pending employer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecision {
    pub employer: EmployerDecision,
    pub alias: AliasDecision,
}

impl Default for ImportDecision {
    fn default() -> Self {
        Self {
            employer: EmployerDecision::Unresolved,
            alias: AliasDecision::default(),
        }
    }
}
