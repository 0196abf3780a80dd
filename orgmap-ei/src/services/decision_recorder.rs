//! Per-pending-employer decision tracking
//!
//! State machine per pending employer:
//! unresolved → use_existing(id) | create_new → merged_into(id)
//!
//! `use_existing` targets must have been surfaced by the candidate finder
//! for that pending employer (or be a post-merge primary). `merged_into`
//! is set only by the merge executor and supersedes a prior target. The
//! user may re-decide at any point before commit, which discards the
//! prior decision. The recorder is owned exclusively by the single
//! orchestrating flow; there is no multi-writer contention.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use orgmap_common::{Error, Result};

use crate::models::{AliasDecision, CandidateMatch, EmployerDecision, ImportDecision};

/// Decision Recorder
#[derive(Debug, Default)]
pub struct DecisionRecorder {
    decisions: HashMap<Uuid, ImportDecision>,
    /// Candidate ids surfaced by the finder, per pending employer
    surfaced: HashMap<Uuid, HashSet<Uuid>>,
}

impl DecisionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the candidates the finder surfaced for a pending employer
    ///
    /// Re-registering (a detection re-run) extends the surfaced set; it
    /// does not clear an existing decision.
    pub fn register_candidates(&mut self, pending_id: Uuid, candidates: &[CandidateMatch]) {
        let entry = self.surfaced.entry(pending_id).or_default();
        for c in candidates {
            entry.insert(c.employer_id);
        }
    }

    /// Current decision for a pending employer (Unresolved if none made)
    pub fn decision(&self, pending_id: Uuid) -> ImportDecision {
        self.decisions.get(&pending_id).copied().unwrap_or_default()
    }

    /// All recorded decisions
    pub fn decisions(&self) -> &HashMap<Uuid, ImportDecision> {
        &self.decisions
    }

    /// User selects a specific surfaced candidate
    pub fn decide_use_existing(&mut self, pending_id: Uuid, target_id: Uuid) -> Result<()> {
        let surfaced = self
            .surfaced
            .get(&pending_id)
            .map(|s| s.contains(&target_id))
            .unwrap_or(false);

        if !surfaced {
            return Err(Error::InvalidInput(format!(
                "Employer {} was not surfaced as a candidate for pending {}",
                target_id, pending_id
            )));
        }

        self.decisions.insert(
            pending_id,
            ImportDecision {
                employer: EmployerDecision::UseExisting { target_id },
                alias: self.decision(pending_id).alias,
            },
        );

        tracing::debug!(pending_id = %pending_id, target_id = %target_id, "Decision: use existing");

        Ok(())
    }

    /// User explicitly rejects all candidates
    pub fn decide_create_new(&mut self, pending_id: Uuid) {
        self.decisions.insert(
            pending_id,
            ImportDecision {
                employer: EmployerDecision::CreateNew,
                alias: self.decision(pending_id).alias,
            },
        );

        tracing::debug!(pending_id = %pending_id, "Decision: create new");
    }

    /// Merge executor collapsed an exact-match group
    ///
    /// Overwrites any prior `use_existing` target with the merge's chosen
    /// primary: a stale target may no longer exist after subsumption. A
    /// discarded manual choice is logged so the loss of user intent is
    /// visible; the user may still re-decide before commit.
    pub fn apply_merge(&mut self, pending_id: Uuid, primary_id: Uuid) {
        let prior = self.decision(pending_id);
        if let EmployerDecision::UseExisting { target_id } = prior.employer {
            if target_id != primary_id {
                tracing::warn!(
                    pending_id = %pending_id,
                    prior_target = %target_id,
                    primary = %primary_id,
                    "Merge supersedes a manual use-existing decision"
                );
            }
        }

        // The primary counts as surfaced for any later re-decision
        self.surfaced.entry(pending_id).or_default().insert(primary_id);

        self.decisions.insert(
            pending_id,
            ImportDecision {
                employer: EmployerDecision::MergedInto {
                    target_id: primary_id,
                },
                alias: prior.alias,
            },
        );
    }

    /// User manually re-decides: reset to unresolved, discarding the
    /// prior decision (including the alias sub-decision)
    pub fn reset(&mut self, pending_id: Uuid) {
        if self.decisions.remove(&pending_id).is_some() {
            tracing::debug!(pending_id = %pending_id, "Decision reset to unresolved");
        }
    }

    /// Set the alias sub-decision, independent of the employer decision
    pub fn set_alias_decision(&mut self, pending_id: Uuid, alias: AliasDecision) {
        let current = self.decision(pending_id);
        self.decisions.insert(
            pending_id,
            ImportDecision {
                employer: current.employer,
                alias,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchType;

    fn candidate(id: Uuid) -> CandidateMatch {
        CandidateMatch {
            employer_id: id,
            name: "Candidate".to_string(),
            match_type: MatchType::ExactName,
            confidence: 90,
        }
    }

    #[test]
    fn test_default_is_unresolved() {
        let recorder = DecisionRecorder::new();
        let decision = recorder.decision(Uuid::new_v4());
        assert_eq!(decision.employer, EmployerDecision::Unresolved);
        assert_eq!(decision.alias, AliasDecision::KeepAsAlias);
    }

    #[test]
    fn test_use_existing_requires_surfaced_candidate() {
        let mut recorder = DecisionRecorder::new();
        let pending = Uuid::new_v4();
        let surfaced = Uuid::new_v4();
        let never_surfaced = Uuid::new_v4();

        recorder.register_candidates(pending, &[candidate(surfaced)]);

        assert!(recorder.decide_use_existing(pending, never_surfaced).is_err());
        recorder.decide_use_existing(pending, surfaced).unwrap();

        assert_eq!(
            recorder.decision(pending).employer,
            EmployerDecision::UseExisting { target_id: surfaced }
        );
    }

    #[test]
    fn test_merge_overwrites_prior_target() {
        let mut recorder = DecisionRecorder::new();
        let pending = Uuid::new_v4();
        let chosen = Uuid::new_v4();
        let primary = Uuid::new_v4();

        recorder.register_candidates(pending, &[candidate(chosen)]);
        recorder.decide_use_existing(pending, chosen).unwrap();

        recorder.apply_merge(pending, primary);

        assert_eq!(
            recorder.decision(pending).employer,
            EmployerDecision::MergedInto { target_id: primary }
        );

        // The post-merge primary is now a valid manual target too
        recorder.decide_use_existing(pending, primary).unwrap();
    }

    #[test]
    fn test_reset_discards_decision() {
        let mut recorder = DecisionRecorder::new();
        let pending = Uuid::new_v4();

        recorder.decide_create_new(pending);
        recorder.set_alias_decision(pending, AliasDecision::PromoteToCanonical);

        recorder.reset(pending);

        let decision = recorder.decision(pending);
        assert_eq!(decision.employer, EmployerDecision::Unresolved);
        assert_eq!(decision.alias, AliasDecision::KeepAsAlias);
    }

    #[test]
    fn test_alias_decision_independent() {
        let mut recorder = DecisionRecorder::new();
        let pending = Uuid::new_v4();
        let alias_id = Uuid::new_v4();

        recorder.decide_create_new(pending);
        recorder.set_alias_decision(
            pending,
            AliasDecision::MergeIntoExistingAlias { alias_id },
        );

        let decision = recorder.decision(pending);
        assert_eq!(decision.employer, EmployerDecision::CreateNew);
        assert_eq!(
            decision.alias,
            AliasDecision::MergeIntoExistingAlias { alias_id }
        );
    }
}
