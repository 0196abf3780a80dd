//! Role-specific capability records
//!
//! Attachment is an idempotent check-then-insert keyed on
//! `(employer_id, capability_type)` so a re-run of the same batch never
//! creates duplicate rows.

use orgmap_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Whether the employer already has a capability of this type
pub async fn has_capability(
    pool: &SqlitePool,
    employer_id: Uuid,
    capability_type: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM employer_capabilities WHERE employer_id = ? AND capability_type = ?",
    )
    .bind(employer_id.to_string())
    .bind(capability_type)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Attach a capability if not already present; returns true when created
pub async fn attach_capability(
    pool: &SqlitePool,
    employer_id: Uuid,
    capability_type: &str,
) -> Result<bool> {
    if has_capability(pool, employer_id, capability_type).await? {
        tracing::debug!(
            employer_id = %employer_id,
            capability_type = %capability_type,
            "Capability already attached"
        );
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO employer_capabilities (employer_id, capability_type) VALUES (?, ?)",
    )
    .bind(employer_id.to_string())
    .bind(capability_type)
    .execute(pool)
    .await?;

    tracing::debug!(
        employer_id = %employer_id,
        capability_type = %capability_type,
        "Attached capability"
    );

    Ok(true)
}

/// List capability types for an employer
pub async fn list_capabilities(pool: &SqlitePool, employer_id: Uuid) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT capability_type FROM employer_capabilities WHERE employer_id = ? ORDER BY capability_type",
    )
    .bind(employer_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(t,)| t).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::employers::{insert_employer, NewEmployer};
    use orgmap_common::db::init_test_database;

    #[tokio::test]
    async fn test_attach_capability_idempotent() {
        let pool = init_test_database().await.unwrap();
        let employer = insert_employer(
            &pool,
            &NewEmployer { name: "Acme".to_string(), ..Default::default() },
        )
        .await
        .unwrap();

        assert!(attach_capability(&pool, employer, "concrete").await.unwrap());
        assert!(!attach_capability(&pool, employer, "concrete").await.unwrap());
        assert!(attach_capability(&pool, employer, "builder").await.unwrap());

        let caps = list_capabilities(&pool, employer).await.unwrap();
        assert_eq!(caps, vec!["builder".to_string(), "concrete".to_string()]);
    }
}
