//! SQLite schema for the employer canonical store
//!
//! All statements use CREATE TABLE IF NOT EXISTS so schema creation is
//! safe to run on every startup.

use crate::Result;
use sqlx::SqlitePool;

/// Create all orgmap tables if they don't exist
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Canonical employers (deduplicated real-world organizations)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employers (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address_line_1 TEXT,
            address_line_2 TEXT,
            suburb TEXT,
            state TEXT,
            postcode TEXT,
            phone TEXT,
            email TEXT,
            website TEXT,
            external_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_employers_external_id ON employers(external_id)")
        .execute(pool)
        .await?;

    // Secondary names known to refer to an employer, with provenance
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employer_aliases (
            guid TEXT PRIMARY KEY,
            employer_id TEXT NOT NULL REFERENCES employers(guid) ON DELETE CASCADE,
            alias TEXT NOT NULL,
            alias_normalized TEXT NOT NULL,
            source_system TEXT,
            source_record_id TEXT,
            collected_at TIMESTAMP,
            collected_by TEXT,
            is_authoritative INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(employer_id, alias_normalized)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Normalized form is intentionally NOT globally unique: cross-entity
    // collisions are surfaced as conflicts during duplicate detection.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_aliases_normalized ON employer_aliases(alias_normalized)",
    )
    .execute(pool)
    .await?;

    // Role-specific capability records (e.g. trade capabilities)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employer_capabilities (
            employer_id TEXT NOT NULL REFERENCES employers(guid) ON DELETE CASCADE,
            capability_type TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (employer_id, capability_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Staged records awaiting a human merge/create decision
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_employers (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source TEXT NOT NULL,
            payload TEXT NOT NULL,
            role TEXT NOT NULL,
            inferred_category TEXT,
            confirmed_category TEXT,
            import_status TEXT NOT NULL DEFAULT 'pending',
            imported_employer_id TEXT,
            resolution_notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Key/value settings for runtime parameter overrides
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database schema initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_schema_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_schema(&pool).await.unwrap();
        // Second run must not fail
        create_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_alias_unique_per_employer() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO employers (guid, name) VALUES ('e1', 'Acme')")
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO employer_aliases (guid, employer_id, alias, alias_normalized)
             VALUES ('a1', 'e1', 'ACME Pty Ltd', 'acme pty ltd')",
        )
        .execute(&pool)
        .await
        .unwrap();

        // Same normalized form for the same employer violates the unique constraint
        let dup = sqlx::query(
            "INSERT INTO employer_aliases (guid, employer_id, alias, alias_normalized)
             VALUES ('a2', 'e1', 'Acme PTY LTD', 'acme pty ltd')",
        )
        .execute(&pool)
        .await;
        assert!(dup.is_err());
    }
}
