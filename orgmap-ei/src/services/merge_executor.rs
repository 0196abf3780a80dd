//! Merge execution for exact-match duplicate groups
//!
//! When duplicate detection finds several canonical employers that are
//! all exact matches for one pending name, the store itself contains
//! duplicates. The earliest-created employer becomes the primary and the
//! rest are subsumed via the store merge operation. Groups are processed
//! sequentially: concurrent merges could race on the same canonical rows.

use sqlx::SqlitePool;
use uuid::Uuid;

use orgmap_common::events::{EventBus, OrgmapEvent};
use orgmap_common::{Error, Result};

use crate::db;
use crate::models::{BulkMergeReport, DuplicateDetection, MergeFailure, MergeGroup};
use crate::services::DecisionRecorder;

/// Merge Executor
pub struct MergeExecutor {
    db: SqlitePool,
    event_bus: EventBus,
}

impl MergeExecutor {
    /// Create new merge executor
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Choose the primary for a candidate group without touching the store
    ///
    /// Policy: earliest-created wins, ties broken by input order. Ids
    /// missing from the store keep their input position but lose to any
    /// id with a known creation time.
    async fn choose_primary(&self, candidate_ids: &[Uuid]) -> Result<MergeGroup> {
        let created = db::employers::fetch_created_at(&self.db, candidate_ids).await?;

        let mut primary = candidate_ids[0];
        let mut primary_created: Option<&str> = None;

        for id in candidate_ids {
            let ts = created
                .iter()
                .find(|(cid, _)| cid == id)
                .map(|(_, ts)| ts.as_str());

            // Strictly earlier timestamps win; equal timestamps keep the
            // earlier input position
            match (ts, primary_created) {
                (Some(ts), Some(current)) if ts < current => {
                    primary = *id;
                    primary_created = Some(ts);
                }
                (Some(ts), None) if primary != *id => {
                    primary = *id;
                    primary_created = Some(ts);
                }
                (Some(ts), None) => {
                    primary_created = Some(ts);
                }
                _ => {}
            }
        }

        let subsumed = candidate_ids
            .iter()
            .copied()
            .filter(|id| *id != primary)
            .collect();

        Ok(MergeGroup { primary_id: primary, subsumed })
    }

    /// Merge a group of duplicate employers, returning the primary id
    ///
    /// A single-element group is trivially its own primary; no store
    /// merge is invoked. An empty group is a precondition violation.
    pub async fn merge_group(&self, candidate_ids: &[Uuid]) -> Result<Uuid> {
        if candidate_ids.is_empty() {
            return Err(Error::InvalidInput(
                "Merge group must contain at least one candidate".to_string(),
            ));
        }

        if candidate_ids.len() == 1 {
            return Ok(candidate_ids[0]);
        }

        let group = self.choose_primary(candidate_ids).await?;

        db::employers::merge_employers(&self.db, group.primary_id, &group.subsumed).await?;

        self.event_bus.emit(OrgmapEvent::MergeCompleted {
            primary_id: group.primary_id,
            subsumed: group.subsumed.len(),
            timestamp: chrono::Utc::now(),
        });

        Ok(group.primary_id)
    }

    /// Merge every multi-candidate exact-match group in a detection batch
    ///
    /// Processes groups sequentially and records the merge outcome on the
    /// decision recorder. Store-side failures are best-effort degradation:
    /// the decision still advances to the intended primary for user
    /// continuity, and the failure is surfaced in the report for manual
    /// reconciliation. Single-candidate and empty detections are no-ops.
    pub async fn merge_detected_groups(
        &self,
        detections: &[DuplicateDetection],
        recorder: &mut DecisionRecorder,
    ) -> BulkMergeReport {
        let mut report = BulkMergeReport::default();

        for detection in detections {
            if !detection.is_multi_exact() {
                continue;
            }

            let ids: Vec<Uuid> = detection
                .exact_matches
                .iter()
                .map(|c| c.employer_id)
                .collect();

            let group = match self.choose_primary(&ids).await {
                Ok(group) => group,
                Err(e) => {
                    tracing::warn!(
                        pending_id = %detection.pending_id,
                        error = %e,
                        "Could not rank merge group, skipping"
                    );
                    report.failures.push(MergeFailure {
                        primary_id: ids[0],
                        duplicate_ids: ids[1..].to_vec(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match db::employers::merge_employers(&self.db, group.primary_id, &group.subsumed).await
            {
                Ok(()) => {
                    report.merged_groups += 1;
                    report.merged_count += group.subsumed.len();
                    self.event_bus.emit(OrgmapEvent::MergeCompleted {
                        primary_id: group.primary_id,
                        subsumed: group.subsumed.len(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(e) => {
                    // Non-silent degradation: decision still advances so
                    // the user can continue, operator reconciles later
                    tracing::warn!(
                        pending_id = %detection.pending_id,
                        primary = %group.primary_id,
                        error = %e,
                        "Store merge failed; decision still advances to primary"
                    );
                    self.event_bus.emit(OrgmapEvent::MergeFailed {
                        primary_id: group.primary_id,
                        reason: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    report.failures.push(MergeFailure {
                        primary_id: group.primary_id,
                        duplicate_ids: group.subsumed.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            recorder.apply_merge(detection.pending_id, group.primary_id);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::employers::{get_employer, insert_employer, NewEmployer};
    use crate::models::{CandidateMatch, MatchType};
    use orgmap_common::db::init_test_database;

    async fn add_employer_created(pool: &SqlitePool, name: &str, created_at: &str) -> Uuid {
        let id = insert_employer(
            pool,
            &NewEmployer { name: name.to_string(), ..Default::default() },
        )
        .await
        .unwrap();

        // Backdate for deterministic merge ordering
        sqlx::query("UPDATE employers SET created_at = ? WHERE guid = ?")
            .bind(created_at)
            .bind(id.to_string())
            .execute(pool)
            .await
            .unwrap();

        id
    }

    fn executor(pool: &SqlitePool) -> MergeExecutor {
        MergeExecutor::new(pool.clone(), EventBus::new(16))
    }

    #[tokio::test]
    async fn test_single_candidate_is_trivial_primary() {
        let pool = init_test_database().await.unwrap();
        let executor = executor(&pool);
        let id = Uuid::new_v4();

        // No store row needed: a single-element group never touches the store
        let primary = executor.merge_group(&[id]).await.unwrap();
        assert_eq!(primary, id);
    }

    #[tokio::test]
    async fn test_empty_group_rejected() {
        let pool = init_test_database().await.unwrap();
        let executor = executor(&pool);

        assert!(executor.merge_group(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_earliest_created_wins() {
        let pool = init_test_database().await.unwrap();
        let id1 = add_employer_created(&pool, "Acme A", "2024-03-01 10:00:00").await;
        let id2 = add_employer_created(&pool, "Acme B", "2024-01-15 10:00:00").await;
        let id3 = add_employer_created(&pool, "Acme C", "2024-06-20 10:00:00").await;

        let executor = executor(&pool);
        let primary = executor.merge_group(&[id1, id2, id3]).await.unwrap();

        // t2 < t1 < t3, so id2 is primary and the others are subsumed
        assert_eq!(primary, id2);
        assert!(get_employer(&pool, id1).await.unwrap().is_none());
        assert!(get_employer(&pool, id3).await.unwrap().is_none());
        assert!(get_employer(&pool, id2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_created_at_ties_break_by_input_order() {
        let pool = init_test_database().await.unwrap();
        let id1 = add_employer_created(&pool, "Acme A", "2024-03-01 10:00:00").await;
        let id2 = add_employer_created(&pool, "Acme B", "2024-03-01 10:00:00").await;

        let executor = executor(&pool);
        let primary = executor.merge_group(&[id1, id2]).await.unwrap();
        assert_eq!(primary, id1);
    }

    #[tokio::test]
    async fn test_bulk_merge_updates_decisions() {
        let pool = init_test_database().await.unwrap();
        let id1 = add_employer_created(&pool, "Acme A", "2024-03-01 10:00:00").await;
        let id2 = add_employer_created(&pool, "Acme B", "2024-01-15 10:00:00").await;

        let candidate = |id: Uuid| CandidateMatch {
            employer_id: id,
            name: "Acme".to_string(),
            match_type: MatchType::ExactName,
            confidence: 95,
        };

        let pending_id = Uuid::new_v4();
        let detections = vec![DuplicateDetection {
            pending_id,
            pending_name: "Acme".to_string(),
            exact_matches: vec![candidate(id1), candidate(id2)],
            similar_matches: vec![],
            conflicting_aliases: vec![],
            decision: None,
        }];

        let executor = executor(&pool);
        let mut recorder = DecisionRecorder::new();
        let report = executor.merge_detected_groups(&detections, &mut recorder).await;

        assert_eq!(report.merged_groups, 1);
        assert_eq!(report.merged_count, 1);
        assert!(report.failures.is_empty());

        assert_eq!(
            recorder.decision(pending_id).employer,
            crate::models::EmployerDecision::MergedInto { target_id: id2 }
        );
    }

    #[tokio::test]
    async fn test_merge_failure_still_advances_decision() {
        let pool = init_test_database().await.unwrap();
        let id1 = add_employer_created(&pool, "Acme A", "2024-03-01 10:00:00").await;
        let id2 = add_employer_created(&pool, "Acme B", "2024-01-15 10:00:00").await;

        // Drop a table the merge transaction touches to force a store failure
        sqlx::query("DROP TABLE pending_employers").execute(&pool).await.unwrap();

        let candidate = |id: Uuid| CandidateMatch {
            employer_id: id,
            name: "Acme".to_string(),
            match_type: MatchType::ExactName,
            confidence: 95,
        };

        let pending_id = Uuid::new_v4();
        let detections = vec![DuplicateDetection {
            pending_id,
            pending_name: "Acme".to_string(),
            exact_matches: vec![candidate(id1), candidate(id2)],
            similar_matches: vec![],
            conflicting_aliases: vec![],
            decision: None,
        }];

        let executor = executor(&pool);
        let mut recorder = DecisionRecorder::new();
        let report = executor.merge_detected_groups(&detections, &mut recorder).await;

        assert_eq!(report.merged_groups, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].primary_id, id2);

        // Best-effort degradation: the decision still points at the
        // intended primary
        assert_eq!(
            recorder.decision(pending_id).employer,
            crate::models::EmployerDecision::MergedInto { target_id: id2 }
        );
    }
}
