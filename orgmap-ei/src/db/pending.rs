//! Pending employer persistence
//!
//! Staged records are created by the ingestion boundary and mutated only
//! by user decisions and the commit step. `imported` is terminal.

use chrono::{DateTime, Utc};
use orgmap_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{EmployerRole, ImportStatus, PendingEmployer, SourcePayload};

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

fn row_to_pending(row: &sqlx::sqlite::SqliteRow) -> Result<PendingEmployer> {
    let guid_str: String = row.get("guid");
    let payload_json: String = row.get("payload");
    let role_str: String = row.get("role");
    let status_str: String = row.get("import_status");
    let imported_str: Option<String> = row.get("imported_employer_id");
    let created_str: String = row.get("created_at");
    let updated_str: String = row.get("updated_at");

    let payload: SourcePayload = serde_json::from_str(&payload_json)
        .map_err(|e| Error::Internal(format!("Invalid payload JSON in database: {}", e)))?;

    Ok(PendingEmployer {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        name: row.get("name"),
        source: row.get("source"),
        payload,
        role: EmployerRole::parse(&role_str)?,
        inferred_category: row.get("inferred_category"),
        confirmed_category: row.get("confirmed_category"),
        import_status: ImportStatus::parse(&status_str)?,
        imported_employer_id: imported_str
            .map(|s| {
                Uuid::parse_str(&s)
                    .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
            })
            .transpose()?,
        resolution_notes: row.get("resolution_notes"),
        created_at: parse_timestamp(&created_str)?,
        updated_at: parse_timestamp(&updated_str)?,
    })
}

const PENDING_COLUMNS: &str = "guid, name, source, payload, role, inferred_category, \
     confirmed_category, import_status, imported_employer_id, resolution_notes, \
     created_at, updated_at";

/// Insert a staged pending employer
pub async fn insert_pending(pool: &SqlitePool, pending: &PendingEmployer) -> Result<()> {
    let payload_json = serde_json::to_string(&pending.payload)
        .map_err(|e| Error::Internal(format!("Failed to serialize payload: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO pending_employers (
            guid, name, source, payload, role, inferred_category, confirmed_category,
            import_status, imported_employer_id, resolution_notes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pending.guid.to_string())
    .bind(&pending.name)
    .bind(&pending.source)
    .bind(payload_json)
    .bind(pending.role.as_str())
    .bind(&pending.inferred_category)
    .bind(&pending.confirmed_category)
    .bind(pending.import_status.as_str())
    .bind(pending.imported_employer_id.map(|id| id.to_string()))
    .bind(&pending.resolution_notes)
    .bind(pending.created_at.to_rfc3339())
    .bind(pending.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(guid = %pending.guid, name = %pending.name, "Staged pending employer");

    Ok(())
}

/// Load one pending employer
pub async fn get_pending(pool: &SqlitePool, id: Uuid) -> Result<Option<PendingEmployer>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM pending_employers WHERE guid = ?",
        PENDING_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_pending).transpose()
}

/// List pending employers awaiting resolution, in staging order
pub async fn list_unresolved(pool: &SqlitePool) -> Result<Vec<PendingEmployer>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM pending_employers
         WHERE import_status IN ('pending', 'matched', 'create_new')
         ORDER BY created_at, rowid",
        PENDING_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_pending).collect()
}

/// Current status of a pending employer (already-processed guard)
pub async fn get_status(pool: &SqlitePool, id: Uuid) -> Result<Option<ImportStatus>> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT import_status FROM pending_employers WHERE guid = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;

    status.as_deref().map(ImportStatus::parse).transpose()
}

/// Mark a pending employer imported, recording the resulting employer id
pub async fn mark_imported(pool: &SqlitePool, id: Uuid, employer_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE pending_employers SET import_status = 'imported', imported_employer_id = ?,
         updated_at = ? WHERE guid = ?",
    )
    .bind(employer_id.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    tracing::debug!(pending_id = %id, employer_id = %employer_id, "Marked pending imported");

    Ok(())
}

/// Mark a pending employer failed, recording the human-readable reason
pub async fn mark_error(pool: &SqlitePool, id: Uuid, reason: &str) -> Result<()> {
    sqlx::query(
        "UPDATE pending_employers SET import_status = 'error', resolution_notes = ?,
         updated_at = ? WHERE guid = ?",
    )
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    tracing::debug!(pending_id = %id, reason = %reason, "Marked pending errored");

    Ok(())
}

/// Append a line to the pending employer's resolution notes
pub async fn append_resolution_note(pool: &SqlitePool, id: Uuid, note: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE pending_employers SET
            resolution_notes = CASE
                WHEN resolution_notes IS NULL OR resolution_notes = '' THEN ?
                ELSE resolution_notes || char(10) || ?
            END,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(note)
    .bind(note)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
