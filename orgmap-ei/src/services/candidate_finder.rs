//! Candidate finding for pending employer resolution
//!
//! Given a proposed employer name (and optional external identifier and
//! alias hints), produces a ranked candidate list from the canonical
//! store: authoritative external-id matches short-circuit, otherwise
//! names and aliases are scored by normalized edit-distance similarity
//! and partitioned into exact-equivalent and fuzzy bands.

use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use orgmap_common::Result;

use crate::config::MatchingConfig;
use crate::db;
use crate::models::{
    AliasConflict, CandidateMatch, DuplicateDetection, MatchType, PendingEmployer,
};
use crate::services::similarity::{confidence, normalize_name};

/// Candidate Finder
///
/// Read-only against the canonical store.
pub struct CandidateFinder {
    db: SqlitePool,
    config: MatchingConfig,
}

impl CandidateFinder {
    /// Create new candidate finder
    pub fn new(db: SqlitePool, config: MatchingConfig) -> Self {
        Self { db, config }
    }

    /// Find ranked candidates for a proposed employer name
    ///
    /// **Algorithm:**
    /// 1. If an external identifier is supplied, exact matches on it are
    ///    authoritative and short-circuit further search (score 100)
    /// 2. Otherwise score all canonical names and aliases, keeping the
    ///    best score per employer
    /// 3. If nothing clears the similar threshold, retry with each alias
    ///    hint, merging hits that clear the exact threshold
    ///
    /// Candidates are ordered by confidence descending; equal scores
    /// keep first-seen input order (stable sort, explicit policy).
    pub async fn find_candidates(
        &self,
        name: &str,
        external_id: Option<&str>,
        alias_hints: &[String],
    ) -> Result<Vec<CandidateMatch>> {
        if name.trim().is_empty() {
            return Err(orgmap_common::Error::InvalidInput(
                "Candidate search name must be non-empty".to_string(),
            ));
        }

        // Authoritative external-id lookup short-circuits scoring
        if let Some(ext_id) = external_id.filter(|id| !id.trim().is_empty()) {
            let matches = db::employers::find_by_external_id(&self.db, ext_id).await?;
            if !matches.is_empty() {
                tracing::debug!(
                    external_id = %ext_id,
                    count = matches.len(),
                    "External-id candidates found, skipping fuzzy search"
                );
                return Ok(matches
                    .into_iter()
                    .map(|e| CandidateMatch {
                        employer_id: e.guid,
                        name: e.name,
                        match_type: MatchType::ExternalId,
                        confidence: 100,
                    })
                    .collect());
            }
        }

        let mut candidates = self.score_against_store(name).await?;

        // Alias-hint retry only when the primary search came up empty
        if candidates.is_empty() {
            for hint in alias_hints {
                if hint.trim().is_empty() {
                    continue;
                }
                let hint_matches = self.score_against_store(hint).await?;
                for m in hint_matches {
                    if m.confidence >= self.config.exact_threshold
                        && !candidates.iter().any(|c| c.employer_id == m.employer_id)
                    {
                        candidates.push(m);
                    }
                }
            }
        }

        // Stable sort: equal confidences keep first-seen order
        candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        Ok(candidates)
    }

    /// Score one search name against all canonical names and aliases,
    /// keeping the best-scoring match per employer (first-seen position
    /// preserved) and discarding scores below the similar threshold
    async fn score_against_store(&self, search_name: &str) -> Result<Vec<CandidateMatch>> {
        let normalized_search = normalize_name(search_name);

        let employer_names = db::employers::list_names(&self.db).await?;
        let alias_names = db::aliases::list_names(&self.db).await?;

        // Empty canonical store yields an empty match list, not an error
        if employer_names.is_empty() {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<CandidateMatch> = Vec::new();
        let mut index_by_id: HashMap<Uuid, usize> = HashMap::new();
        let mut canonical_names: HashMap<Uuid, String> = HashMap::new();

        let scored = employer_names
            .iter()
            .map(|(id, n)| (*id, n, MatchType::ExactName))
            .chain(alias_names.iter().map(|(id, n)| (*id, n, MatchType::Alias)));

        for (employer_id, candidate_name, source) in scored {
            if let MatchType::ExactName = source {
                canonical_names.insert(employer_id, candidate_name.clone());
            }

            let normalized_candidate = normalize_name(candidate_name);
            let score = confidence(&normalized_search, &normalized_candidate);
            if score < self.config.similar_threshold {
                continue;
            }

            let match_type = if normalized_candidate == normalized_search {
                source
            } else {
                MatchType::Fuzzy
            };

            match index_by_id.get(&employer_id) {
                Some(&i) => {
                    // Keep the best score but the first-seen position
                    if score > ordered[i].confidence {
                        ordered[i].confidence = score;
                        ordered[i].match_type = match_type;
                    }
                }
                None => {
                    let display_name = canonical_names
                        .get(&employer_id)
                        .cloned()
                        .unwrap_or_else(|| candidate_name.clone());
                    index_by_id.insert(employer_id, ordered.len());
                    ordered.push(CandidateMatch {
                        employer_id,
                        name: display_name,
                        match_type,
                        confidence: score,
                    });
                }
            }
        }

        Ok(ordered)
    }

    /// Build the duplicate detection aggregate for one pending employer
    ///
    /// Lookup failures degrade to "no candidates found" with a warning;
    /// they never abort the batch. Similar matches are populated only when
    /// no exact match exists. Alias collisions pointing at a different
    /// employer than the best candidate are surfaced as conflicts, never
    /// silently resolved.
    pub async fn detect_duplicates(&self, pending: &PendingEmployer) -> DuplicateDetection {
        let candidates = match self
            .find_candidates(
                &pending.name,
                pending.payload.external_id(),
                pending.payload.alias_hints(),
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    pending_id = %pending.guid,
                    name = %pending.name,
                    error = %e,
                    "Candidate lookup failed, treating as no candidates"
                );
                Vec::new()
            }
        };

        let (exact, similar): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| c.confidence >= self.config.exact_threshold);

        // Fuzzy candidates are only offered when nothing matched exactly
        let similar = if exact.is_empty() { similar } else { Vec::new() };

        let conflicting_aliases = match self.find_alias_conflicts(pending, exact.first()).await {
            Ok(conflicts) => conflicts,
            Err(e) => {
                tracing::warn!(
                    pending_id = %pending.guid,
                    error = %e,
                    "Alias conflict lookup failed"
                );
                Vec::new()
            }
        };

        DuplicateDetection {
            pending_id: pending.guid,
            pending_name: pending.name.clone(),
            exact_matches: exact,
            similar_matches: similar,
            conflicting_aliases,
            decision: None,
        }
    }

    /// Existing aliases whose normalized form matches the pending name
    /// but which belong to a different employer than the best candidate
    async fn find_alias_conflicts(
        &self,
        pending: &PendingEmployer,
        best_candidate: Option<&CandidateMatch>,
    ) -> Result<Vec<AliasConflict>> {
        let normalized = normalize_name(&pending.name);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let colliding = db::aliases::find_by_normalized(&self.db, &normalized).await?;
        let target = best_candidate.map(|c| c.employer_id);

        let mut conflicts = Vec::new();
        for alias in colliding {
            if Some(alias.employer_id) == target {
                continue;
            }

            let employer_name = db::employers::get_employer(&self.db, alias.employer_id)
                .await?
                .map(|e| e.name)
                .unwrap_or_default();

            conflicts.push(AliasConflict {
                alias_id: alias.guid,
                employer_id: alias.employer_id,
                employer_name,
                alias: alias.alias,
                alias_normalized: alias.alias_normalized,
            });
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::aliases::NewAlias;
    use crate::db::employers::NewEmployer;
    use crate::models::{EmployerRole, SourcePayload};
    use orgmap_common::db::init_test_database;

    async fn add_employer(pool: &SqlitePool, name: &str, external_id: Option<&str>) -> Uuid {
        db::employers::insert_employer(
            pool,
            &NewEmployer {
                name: name.to_string(),
                external_id: external_id.map(String::from),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    fn finder(pool: &SqlitePool) -> CandidateFinder {
        CandidateFinder::new(pool.clone(), MatchingConfig::default())
    }

    fn pending(name: &str) -> PendingEmployer {
        PendingEmployer::new(
            SourcePayload::ManualEntry {
                company_name: name.to_string(),
                trade_type: None,
                notes: None,
            },
            EmployerRole::Subcontractor,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_list() {
        let pool = init_test_database().await.unwrap();
        let finder = finder(&pool);

        let candidates = finder.find_candidates("Acme", None, &[]).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let pool = init_test_database().await.unwrap();
        let finder = finder(&pool);

        assert!(finder.find_candidates("  ", None, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_external_id_short_circuits() {
        let pool = init_test_database().await.unwrap();
        let by_ext = add_employer(&pool, "Totally Different Name", Some("BCI-9")).await;
        // A strong name match that must NOT be returned when the
        // external id hits
        add_employer(&pool, "Acme Constructions", None).await;

        let finder = finder(&pool);
        let candidates = finder
            .find_candidates("Acme Constructions", Some("BCI-9"), &[])
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].employer_id, by_ext);
        assert_eq!(candidates[0].match_type, MatchType::ExternalId);
        assert_eq!(candidates[0].confidence, 100);
    }

    #[tokio::test]
    async fn test_exact_and_similar_bands() {
        let pool = init_test_database().await.unwrap();
        let exact = add_employer(&pool, "Acme Constructions", None).await;
        add_employer(&pool, "Apex Plumbing Group", None).await;

        let finder = finder(&pool);
        let candidates = finder
            .find_candidates("ACME Constructions.", None, &[])
            .await
            .unwrap();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].employer_id, exact);
        assert!(candidates[0].confidence >= 80);
    }

    #[tokio::test]
    async fn test_alias_match_scores_exact() {
        let pool = init_test_database().await.unwrap();
        let employer = add_employer(&pool, "Acme Constructions Pty Ltd", None).await;
        db::aliases::insert_alias(
            &pool,
            employer,
            &NewAlias {
                alias: "Acme".to_string(),
                alias_normalized: normalize_name("Acme"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let finder = finder(&pool);
        let candidates = finder.find_candidates("Acme", None, &[]).await.unwrap();

        assert_eq!(candidates[0].employer_id, employer);
        assert_eq!(candidates[0].match_type, MatchType::Alias);
        assert_eq!(candidates[0].confidence, 100);
        // Display name is the canonical name, not the alias
        assert_eq!(candidates[0].name, "Acme Constructions Pty Ltd");
    }

    #[tokio::test]
    async fn test_alias_hints_merge_into_exact_set() {
        let pool = init_test_database().await.unwrap();
        let employer = add_employer(&pool, "Southern Cross Concreting", None).await;

        let finder = finder(&pool);
        let hints = vec!["Southern Cross Concreting".to_string()];
        let candidates = finder
            .find_candidates("Unrelated Name Entirely", None, &hints)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].employer_id, employer);
        assert!(candidates[0].confidence >= 80);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_first_seen_order() {
        let pool = init_test_database().await.unwrap();
        // Both names are the same edit distance from the search name;
        // insertion order decides the tie
        let first = add_employer(&pool, "Acme Builders A", None).await;
        let second = add_employer(&pool, "Acme Builders B", None).await;

        let finder = finder(&pool);
        let candidates = finder
            .find_candidates("Acme Builders C", None, &[])
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].confidence, candidates[1].confidence);
        assert_eq!(candidates[0].employer_id, first);
        assert_eq!(candidates[1].employer_id, second);
    }

    #[tokio::test]
    async fn test_detection_similar_only_when_no_exact() {
        let pool = init_test_database().await.unwrap();
        add_employer(&pool, "Acme Constructions", None).await;

        let finder = finder(&pool);

        // Exact hit suppresses the similar list
        let det = finder.detect_duplicates(&pending("Acme Constructions")).await;
        assert_eq!(det.exact_matches.len(), 1);
        assert!(det.similar_matches.is_empty());

        // A looser name lands in the similar band only
        let det = finder.detect_duplicates(&pending("Acme Constructions Group Co")).await;
        assert!(det.exact_matches.is_empty());
        assert!(!det.similar_matches.is_empty());
    }

    #[tokio::test]
    async fn test_alias_conflict_surfaced_not_resolved() {
        let pool = init_test_database().await.unwrap();
        let chosen = add_employer(&pool, "Acme Constructions", None).await;
        let other = add_employer(&pool, "Beta Holdings", None).await;

        // The pending name is already on file as an alias of a DIFFERENT
        // employer than the best candidate
        db::aliases::insert_alias(
            &pool,
            other,
            &NewAlias {
                alias: "Acme Constructions".to_string(),
                alias_normalized: normalize_name("Acme Constructions"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let finder = finder(&pool);
        let det = finder.detect_duplicates(&pending("Acme Constructions")).await;

        assert_eq!(det.exact_matches[0].employer_id, chosen);
        assert_eq!(det.conflicting_aliases.len(), 1);
        assert_eq!(det.conflicting_aliases[0].employer_id, other);
        assert_eq!(det.conflicting_aliases[0].employer_name, "Beta Holdings");
    }
}
