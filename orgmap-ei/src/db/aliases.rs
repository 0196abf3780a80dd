//! Employer alias persistence
//!
//! Aliases carry provenance (source system, record id, collection time and
//! actor). Normalized form is unique per employer; cross-employer
//! collisions are legal and surfaced as conflicts by the candidate finder.

use orgmap_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Alias record with provenance
#[derive(Debug, Clone)]
pub struct EmployerAlias {
    pub guid: Uuid,
    pub employer_id: Uuid,
    pub alias: String,
    pub alias_normalized: String,
    pub source_system: Option<String>,
    pub source_record_id: Option<String>,
    pub collected_at: Option<String>,
    pub collected_by: Option<String>,
    pub is_authoritative: bool,
    pub notes: Option<String>,
}

/// Fields for writing a new alias
#[derive(Debug, Clone, Default)]
pub struct NewAlias {
    pub alias: String,
    pub alias_normalized: String,
    pub source_system: Option<String>,
    pub source_record_id: Option<String>,
    pub collected_by: Option<String>,
    pub is_authoritative: bool,
    pub notes: Option<String>,
}

fn row_to_alias(row: &sqlx::sqlite::SqliteRow) -> Result<EmployerAlias> {
    let guid_str: String = row.get("guid");
    let employer_str: String = row.get("employer_id");
    let authoritative: i64 = row.get("is_authoritative");

    Ok(EmployerAlias {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        employer_id: Uuid::parse_str(&employer_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        alias: row.get("alias"),
        alias_normalized: row.get("alias_normalized"),
        source_system: row.get("source_system"),
        source_record_id: row.get("source_record_id"),
        collected_at: row.get("collected_at"),
        collected_by: row.get("collected_by"),
        is_authoritative: authoritative != 0,
        notes: row.get("notes"),
    })
}

const ALIAS_COLUMNS: &str = "guid, employer_id, alias, alias_normalized, source_system, \
     source_record_id, collected_at, collected_by, is_authoritative, notes";

/// Insert an alias for an employer
///
/// Idempotent on `(employer_id, alias_normalized)`: re-inserting the same
/// normalized form for the same employer is a no-op. Returns true when a
/// row was actually written.
pub async fn insert_alias(pool: &SqlitePool, employer_id: Uuid, new: &NewAlias) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO employer_aliases (
            guid, employer_id, alias, alias_normalized, source_system,
            source_record_id, collected_at, collected_by, is_authoritative, notes
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, ?, ?, ?)
        ON CONFLICT(employer_id, alias_normalized) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(employer_id.to_string())
    .bind(&new.alias)
    .bind(&new.alias_normalized)
    .bind(&new.source_system)
    .bind(&new.source_record_id)
    .bind(&new.collected_by)
    .bind(new.is_authoritative as i64)
    .bind(&new.notes)
    .execute(pool)
    .await?;

    let written = result.rows_affected() > 0;
    tracing::debug!(
        employer_id = %employer_id,
        alias = %new.alias,
        written,
        "Recorded employer alias"
    );

    Ok(written)
}

/// Find aliases by normalized form, across all employers
pub async fn find_by_normalized(pool: &SqlitePool, normalized: &str) -> Result<Vec<EmployerAlias>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM employer_aliases WHERE alias_normalized = ? ORDER BY rowid",
        ALIAS_COLUMNS
    ))
    .bind(normalized)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_alias).collect()
}

/// List all alias (employer_id, alias) pairs for candidate scoring
pub async fn list_names(pool: &SqlitePool) -> Result<Vec<(Uuid, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT employer_id, alias FROM employer_aliases ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(employer_id, alias)| {
            Uuid::parse_str(&employer_id)
                .map(|id| (id, alias))
                .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
        })
        .collect()
}

/// Load one alias by id
pub async fn get_alias(pool: &SqlitePool, alias_id: Uuid) -> Result<Option<EmployerAlias>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM employer_aliases WHERE guid = ?",
        ALIAS_COLUMNS
    ))
    .bind(alias_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_alias).transpose()
}

/// Fold additional provenance into an existing alias record
///
/// Used when the user decides a pending name is the same alias already on
/// file, rather than a new one. Each call is an auditable notes append.
pub async fn merge_alias_provenance(
    pool: &SqlitePool,
    alias_id: Uuid,
    source_system: Option<&str>,
    source_record_id: Option<&str>,
    note: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE employer_aliases SET
            source_system = COALESCE(source_system, ?),
            source_record_id = COALESCE(source_record_id, ?),
            notes = CASE
                WHEN notes IS NULL OR notes = '' THEN ?
                ELSE notes || char(10) || ?
            END
        WHERE guid = ?
        "#,
    )
    .bind(source_system)
    .bind(source_record_id)
    .bind(note)
    .bind(note)
    .bind(alias_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Alias not found: {}", alias_id)));
    }

    tracing::debug!(alias_id = %alias_id, "Merged provenance into existing alias");

    Ok(())
}
