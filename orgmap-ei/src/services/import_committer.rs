//! Import commit: apply resolution decisions to the canonical store
//!
//! Processes pending employers one at a time, in input order. Each item
//! is isolated: a failure marks that record `error` and the batch
//! continues. The committer is not transactional across items; it is
//! safely re-runnable instead. An explicit already-imported guard plus
//! idempotent capability and alias writes mean a retry of the same batch
//! never creates duplicate rows.

use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use orgmap_common::events::{EventBus, OrgmapEvent};
use orgmap_common::{Error, Result};

use crate::db;
use crate::db::aliases::NewAlias;
use crate::db::employers::NewEmployer;
use crate::models::{
    AliasDecision, EmployerDecision, EmployerRole, ImportDecision, ImportResult, ImportStatus,
    PendingEmployer, SourcePayload,
};
use crate::services::similarity::normalize_name;

/// Import Committer
pub struct ImportCommitter {
    db: SqlitePool,
    event_bus: EventBus,
}

impl ImportCommitter {
    /// Create new import committer
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Apply decisions for a batch of pending employers
    ///
    /// Sequential by design: commits mutate shared canonical rows.
    /// Cancellation is cooperative and coarse: it only prevents starting
    /// the next item, an in-flight item runs to completion.
    pub async fn commit(
        &self,
        session_id: Uuid,
        pending: &[PendingEmployer],
        decisions: &HashMap<Uuid, ImportDecision>,
        cancel: &CancellationToken,
    ) -> ImportResult {
        let mut result = ImportResult {
            total: pending.len(),
            ..Default::default()
        };

        self.event_bus.emit(OrgmapEvent::ImportStarted {
            session_id,
            total: pending.len(),
            timestamp: chrono::Utc::now(),
        });

        for item in pending {
            if cancel.is_cancelled() {
                tracing::info!(session_id = %session_id, "Import cancelled between items");
                result.cancelled = true;
                break;
            }

            let decision = decisions.get(&item.guid).copied().unwrap_or_default();

            match self.commit_one(item, decision, &mut result).await {
                Ok(Outcome::AlreadyImported) => {
                    result.already_imported += 1;
                }
                Ok(Outcome::Created(employer_id)) => {
                    result.created += 1;
                    self.emit_item_completed(session_id, item.guid, employer_id, true);
                }
                Ok(Outcome::Matched(employer_id)) => {
                    result.matched += 1;
                    self.emit_item_completed(session_id, item.guid, employer_id, false);
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::warn!(
                        pending_id = %item.guid,
                        name = %item.name,
                        error = %reason,
                        "Commit failed for pending employer, continuing batch"
                    );

                    // Best effort: the status write itself may fail too
                    if let Err(mark_err) =
                        db::pending::mark_error(&self.db, item.guid, &reason).await
                    {
                        tracing::error!(
                            pending_id = %item.guid,
                            error = %mark_err,
                            "Could not record error status on pending employer"
                        );
                    }

                    result.record_error(item.guid, &item.name, reason.clone());
                    self.event_bus.emit(OrgmapEvent::ImportItemFailed {
                        session_id,
                        pending_id: item.guid,
                        reason,
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        }

        self.event_bus.emit(OrgmapEvent::ImportCompleted {
            session_id,
            created: result.created,
            matched: result.matched,
            errors: result.errors.len(),
            cancelled: result.cancelled,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    fn emit_item_completed(
        &self,
        session_id: Uuid,
        pending_id: Uuid,
        employer_id: Uuid,
        created: bool,
    ) {
        self.event_bus.emit(OrgmapEvent::ImportItemCompleted {
            session_id,
            pending_id,
            employer_id,
            created,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Commit a single pending employer
    async fn commit_one(
        &self,
        item: &PendingEmployer,
        decision: ImportDecision,
        result: &mut ImportResult,
    ) -> Result<Outcome> {
        // Explicit already-processed guard: imported is terminal and a
        // re-run of the batch must not touch the record again
        if let Some(ImportStatus::Imported) = db::pending::get_status(&self.db, item.guid).await? {
            tracing::debug!(pending_id = %item.guid, "Already imported, skipping");
            return Ok(Outcome::AlreadyImported);
        }

        item.payload.validate()?;

        let (employer_id, created) = match decision.employer {
            EmployerDecision::UseExisting { target_id }
            | EmployerDecision::MergedInto { target_id } => {
                // The target must still exist (it may have been subsumed
                // by a merge that this decision did not follow)
                if db::employers::get_employer(&self.db, target_id).await?.is_none() {
                    return Err(Error::NotFound(format!(
                        "Decision target employer no longer exists: {}",
                        target_id
                    )));
                }
                (target_id, false)
            }
            EmployerDecision::CreateNew | EmployerDecision::Unresolved => {
                let id = self.create_employer(item).await?;
                (id, true)
            }
        };

        if self.attach_capability(item, employer_id).await? {
            result.capabilities_created += 1;
        }

        if self.persist_alias(item, employer_id, created, decision.alias).await? {
            result.aliases_written += 1;
        }

        db::pending::mark_imported(&self.db, item.guid, employer_id).await?;

        Ok(if created {
            Outcome::Created(employer_id)
        } else {
            Outcome::Matched(employer_id)
        })
    }

    /// Create a new canonical employer from the pending payload
    async fn create_employer(&self, item: &PendingEmployer) -> Result<Uuid> {
        let mut new = NewEmployer {
            name: item.name.clone(),
            external_id: item.payload.external_id().map(String::from),
            ..Default::default()
        };

        match &item.payload {
            SourcePayload::BciProject {
                address, suburb, state, postcode, ..
            } => {
                new.address_line_1 = address.clone();
                new.suburb = suburb.clone();
                new.state = state.clone();
                new.postcode = postcode.clone();
            }
            SourcePayload::ScannedForm {
                contact_phone, contact_email, ..
            } => {
                new.phone = contact_phone.clone();
                new.email = contact_email.clone();
            }
            SourcePayload::ManualEntry { .. } => {}
        }

        db::employers::insert_employer(&self.db, &new).await
    }

    /// Attach the role-specific capability record, if not already present
    ///
    /// Subcontractors attach their trade type; other roles attach the
    /// role itself. Returns true when a row was created.
    async fn attach_capability(&self, item: &PendingEmployer, employer_id: Uuid) -> Result<bool> {
        let capability = match item.role {
            EmployerRole::Subcontractor => item
                .payload
                .trade_type()
                .unwrap_or("general_construction")
                .to_string(),
            role => role.as_str().to_string(),
        };

        db::capabilities::attach_capability(&self.db, employer_id, &capability).await
    }

    /// Persist the alias sub-decision for the pending name
    ///
    /// Each variant is a distinct, auditable write. Returns true when an
    /// alias row was inserted.
    async fn persist_alias(
        &self,
        item: &PendingEmployer,
        employer_id: Uuid,
        created: bool,
        alias_decision: AliasDecision,
    ) -> Result<bool> {
        let normalized = normalize_name(&item.name);

        match alias_decision {
            AliasDecision::KeepAsAlias => {
                // For a freshly created employer the pending name IS the
                // canonical name; there is nothing to alias
                if created {
                    return Ok(false);
                }

                let employer = db::employers::get_employer(&self.db, employer_id)
                    .await?
                    .ok_or_else(|| {
                        Error::NotFound(format!("Employer disappeared: {}", employer_id))
                    })?;

                if normalize_name(&employer.name) == normalized {
                    return Ok(false);
                }

                db::aliases::insert_alias(
                    &self.db,
                    employer_id,
                    &self.new_alias(item, &item.name, &normalized),
                )
                .await
            }
            AliasDecision::PromoteToCanonical => {
                let employer = db::employers::get_employer(&self.db, employer_id)
                    .await?
                    .ok_or_else(|| {
                        Error::NotFound(format!("Employer disappeared: {}", employer_id))
                    })?;

                if normalize_name(&employer.name) == normalized {
                    // Same name; promotion is a no-op
                    return Ok(false);
                }

                // Keep the prior canonical name on record as an alias
                let prior_normalized = normalize_name(&employer.name);
                let written = db::aliases::insert_alias(
                    &self.db,
                    employer_id,
                    &self.new_alias(item, &employer.name, &prior_normalized),
                )
                .await?;

                db::employers::update_canonical_name(&self.db, employer_id, &item.name).await?;

                tracing::info!(
                    employer_id = %employer_id,
                    new_name = %item.name,
                    prior_name = %employer.name,
                    "Promoted pending name to canonical"
                );

                Ok(written)
            }
            AliasDecision::MergeIntoExistingAlias { alias_id } => {
                let note = format!("also reported by {} ({})", item.source, item.guid);
                db::aliases::merge_alias_provenance(
                    &self.db,
                    alias_id,
                    Some(&item.source),
                    Some(&item.guid.to_string()),
                    &note,
                )
                .await?;
                Ok(false)
            }
        }
    }

    fn new_alias(&self, item: &PendingEmployer, alias: &str, normalized: &str) -> NewAlias {
        NewAlias {
            alias: alias.to_string(),
            alias_normalized: normalized.to_string(),
            source_system: Some(item.source.clone()),
            source_record_id: Some(item.guid.to_string()),
            collected_by: None,
            is_authoritative: false,
            notes: None,
        }
    }
}

enum Outcome {
    AlreadyImported,
    Created(Uuid),
    Matched(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgmap_common::db::init_test_database;

    fn committer(pool: &SqlitePool) -> ImportCommitter {
        ImportCommitter::new(pool.clone(), EventBus::new(64))
    }

    async fn staged_pending(
        pool: &SqlitePool,
        name: &str,
        role: EmployerRole,
        trade_type: Option<&str>,
    ) -> PendingEmployer {
        let pending = PendingEmployer::new(
            SourcePayload::ManualEntry {
                company_name: name.to_string(),
                trade_type: trade_type.map(String::from),
                notes: None,
            },
            role,
        )
        .unwrap();
        db::pending::insert_pending(pool, &pending).await.unwrap();
        pending
    }

    #[tokio::test]
    async fn test_unresolved_with_no_candidates_creates_new() {
        let pool = init_test_database().await.unwrap();
        let pending =
            staged_pending(&pool, "Delta Cranes", EmployerRole::Subcontractor, Some("crane")).await;

        let result = committer(&pool)
            .commit(
                Uuid::new_v4(),
                std::slice::from_ref(&pending),
                &HashMap::new(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.created, 1);
        assert_eq!(result.matched, 0);
        assert!(result.errors.is_empty());

        let status = db::pending::get_status(&pool, pending.guid).await.unwrap();
        assert_eq!(status, Some(ImportStatus::Imported));

        let stored = db::pending::get_pending(&pool, pending.guid).await.unwrap().unwrap();
        let employer_id = stored.imported_employer_id.unwrap();
        let caps = db::capabilities::list_capabilities(&pool, employer_id).await.unwrap();
        assert_eq!(caps, vec!["crane".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_batch() {
        let pool = init_test_database().await.unwrap();

        let mut bad =
            staged_pending(&pool, "Temp Name", EmployerRole::Builder, None).await;
        // Corrupt the payload after staging so validation fails at commit
        bad.payload = SourcePayload::ManualEntry {
            company_name: "  ".to_string(),
            trade_type: None,
            notes: None,
        };
        let good = staged_pending(&pool, "Good Builders", EmployerRole::Builder, None).await;

        let result = committer(&pool)
            .commit(
                Uuid::new_v4(),
                &[bad.clone(), good.clone()],
                &HashMap::new(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.created, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].pending_id, bad.guid);

        assert_eq!(
            db::pending::get_status(&pool, bad.guid).await.unwrap(),
            Some(ImportStatus::Error)
        );
        assert_eq!(
            db::pending::get_status(&pool, good.guid).await.unwrap(),
            Some(ImportStatus::Imported)
        );
    }

    #[tokio::test]
    async fn test_rerun_skips_imported_and_creates_no_duplicate_capabilities() {
        let pool = init_test_database().await.unwrap();
        let pending =
            staged_pending(&pool, "Echo Electrical", EmployerRole::Subcontractor, Some("electrical"))
                .await;

        let committer = committer(&pool);
        let batch = vec![pending.clone()];
        let decisions = HashMap::new();
        let cancel = CancellationToken::new();

        let first = committer.commit(Uuid::new_v4(), &batch, &decisions, &cancel).await;
        assert_eq!(first.created, 1);

        let second = committer.commit(Uuid::new_v4(), &batch, &decisions, &cancel).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.already_imported, 1);
        assert!(second.errors.is_empty());

        let stored = db::pending::get_pending(&pool, pending.guid).await.unwrap().unwrap();
        let caps =
            db::capabilities::list_capabilities(&pool, stored.imported_employer_id.unwrap())
                .await
                .unwrap();
        assert_eq!(caps.len(), 1);
    }

    #[tokio::test]
    async fn test_use_existing_attaches_capability_and_alias() {
        let pool = init_test_database().await.unwrap();

        let target = db::employers::insert_employer(
            &pool,
            &NewEmployer { name: "Acme Constructions".to_string(), ..Default::default() },
        )
        .await
        .unwrap();

        let pending = staged_pending(&pool, "Acme", EmployerRole::Builder, None).await;
        let mut decisions = HashMap::new();
        decisions.insert(
            pending.guid,
            ImportDecision {
                employer: EmployerDecision::UseExisting { target_id: target },
                alias: AliasDecision::KeepAsAlias,
            },
        );

        let result = committer(&pool)
            .commit(
                Uuid::new_v4(),
                std::slice::from_ref(&pending),
                &decisions,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.matched, 1);
        assert_eq!(result.created, 0);
        assert_eq!(result.aliases_written, 1);

        let aliases = db::aliases::find_by_normalized(&pool, "acme").await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].employer_id, target);
        assert_eq!(
            db::capabilities::list_capabilities(&pool, target).await.unwrap(),
            vec!["builder".to_string()]
        );
    }

    #[tokio::test]
    async fn test_promote_to_canonical_keeps_prior_name_as_alias() {
        let pool = init_test_database().await.unwrap();

        let target = db::employers::insert_employer(
            &pool,
            &NewEmployer { name: "Acme".to_string(), ..Default::default() },
        )
        .await
        .unwrap();

        let pending =
            staged_pending(&pool, "Acme Constructions Pty Ltd", EmployerRole::Builder, None).await;
        let mut decisions = HashMap::new();
        decisions.insert(
            pending.guid,
            ImportDecision {
                employer: EmployerDecision::UseExisting { target_id: target },
                alias: AliasDecision::PromoteToCanonical,
            },
        );

        committer(&pool)
            .commit(
                Uuid::new_v4(),
                std::slice::from_ref(&pending),
                &decisions,
                &CancellationToken::new(),
            )
            .await;

        let employer = db::employers::get_employer(&pool, target).await.unwrap().unwrap();
        assert_eq!(employer.name, "Acme Constructions Pty Ltd");

        let prior = db::aliases::find_by_normalized(&pool, "acme").await.unwrap();
        assert_eq!(prior.len(), 1);
        assert_eq!(prior[0].alias, "Acme");
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_item() {
        let pool = init_test_database().await.unwrap();
        let a = staged_pending(&pool, "Alpha", EmployerRole::Builder, None).await;
        let b = staged_pending(&pool, "Beta", EmployerRole::Builder, None).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = committer(&pool)
            .commit(Uuid::new_v4(), &[a.clone(), b.clone()], &HashMap::new(), &cancel)
            .await;

        assert!(result.cancelled);
        assert_eq!(result.created, 0);
        assert_eq!(
            db::pending::get_status(&pool, a.guid).await.unwrap(),
            Some(ImportStatus::Pending)
        );
    }
}
