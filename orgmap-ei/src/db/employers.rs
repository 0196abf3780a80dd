//! Canonical employer persistence
//!
//! Includes the store-side merge operation that consolidates duplicate
//! employers into a primary and reassigns dependent records.

use orgmap_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Canonical employer record
#[derive(Debug, Clone)]
pub struct Employer {
    pub guid: Uuid,
    pub name: String,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub external_id: Option<String>,
    /// SQLite CURRENT_TIMESTAMP text; lexicographic order is chronological
    pub created_at: String,
}

/// Fields for creating a new canonical employer
#[derive(Debug, Clone, Default)]
pub struct NewEmployer {
    pub name: String,
    pub address_line_1: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub external_id: Option<String>,
}

fn row_to_employer(row: &sqlx::sqlite::SqliteRow) -> Result<Employer> {
    let guid_str: String = row.get("guid");
    Ok(Employer {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        name: row.get("name"),
        address_line_1: row.get("address_line_1"),
        address_line_2: row.get("address_line_2"),
        suburb: row.get("suburb"),
        state: row.get("state"),
        postcode: row.get("postcode"),
        phone: row.get("phone"),
        email: row.get("email"),
        website: row.get("website"),
        external_id: row.get("external_id"),
        created_at: row.get("created_at"),
    })
}

const EMPLOYER_COLUMNS: &str = "guid, name, address_line_1, address_line_2, suburb, state, \
     postcode, phone, email, website, external_id, created_at";

/// Insert a new canonical employer, returning its id
pub async fn insert_employer(pool: &SqlitePool, new: &NewEmployer) -> Result<Uuid> {
    let guid = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO employers (
            guid, name, address_line_1, suburb, state, postcode, phone, email, external_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(&new.name)
    .bind(&new.address_line_1)
    .bind(&new.suburb)
    .bind(&new.state)
    .bind(&new.postcode)
    .bind(&new.phone)
    .bind(&new.email)
    .bind(&new.external_id)
    .execute(pool)
    .await?;

    tracing::debug!(guid = %guid, name = %new.name, "Created employer");

    Ok(guid)
}

/// Load one employer by id
pub async fn get_employer(pool: &SqlitePool, id: Uuid) -> Result<Option<Employer>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM employers WHERE guid = ?",
        EMPLOYER_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_employer).transpose()
}

/// Find employers by authoritative external-system identifier
pub async fn find_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Vec<Employer>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM employers WHERE external_id = ? ORDER BY rowid",
        EMPLOYER_COLUMNS
    ))
    .bind(external_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_employer).collect()
}

/// List all employer (id, name) pairs for candidate scoring
pub async fn list_names(pool: &SqlitePool) -> Result<Vec<(Uuid, String)>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT guid, name FROM employers ORDER BY rowid")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|(guid, name)| {
            Uuid::parse_str(&guid)
                .map(|g| (g, name))
                .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
        })
        .collect()
}

/// Fetch creation timestamps for a set of employers
///
/// Returned in no particular order; missing ids are absent from the map.
pub async fn fetch_created_at(
    pool: &SqlitePool,
    ids: &[Uuid],
) -> Result<Vec<(Uuid, String)>> {
    let mut out = Vec::with_capacity(ids.len());

    for id in ids {
        let created: Option<String> =
            sqlx::query_scalar("SELECT created_at FROM employers WHERE guid = ?")
                .bind(id.to_string())
                .fetch_optional(pool)
                .await?;

        if let Some(created_at) = created {
            out.push((*id, created_at));
        }
    }

    Ok(out)
}

/// Rename an employer's canonical name
pub async fn update_canonical_name(pool: &SqlitePool, id: Uuid, name: &str) -> Result<()> {
    sqlx::query("UPDATE employers SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?")
        .bind(name)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    tracing::debug!(guid = %id, name = %name, "Updated canonical employer name");

    Ok(())
}

/// Merge duplicate employers into a primary
///
/// Reassigns capability and alias records from the duplicates to the
/// primary, re-points already-imported pending records, then deletes the
/// duplicate employer rows. Runs in a single transaction.
pub async fn merge_employers(
    pool: &SqlitePool,
    primary_id: Uuid,
    duplicate_ids: &[Uuid],
) -> Result<()> {
    if duplicate_ids.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let primary = primary_id.to_string();

    for dup in duplicate_ids {
        let dup = dup.to_string();

        // Reassign capabilities; rows the primary already has collide on
        // the (employer_id, capability_type) key and are dropped instead
        sqlx::query(
            "UPDATE OR IGNORE employer_capabilities SET employer_id = ? WHERE employer_id = ?",
        )
        .bind(&primary)
        .bind(&dup)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM employer_capabilities WHERE employer_id = ?")
            .bind(&dup)
            .execute(&mut *tx)
            .await?;

        // Reassign aliases, same collision handling on normalized form
        sqlx::query("UPDATE OR IGNORE employer_aliases SET employer_id = ? WHERE employer_id = ?")
            .bind(&primary)
            .bind(&dup)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM employer_aliases WHERE employer_id = ?")
            .bind(&dup)
            .execute(&mut *tx)
            .await?;

        // Already-imported pending records follow the merge
        sqlx::query(
            "UPDATE pending_employers SET imported_employer_id = ?, updated_at = CURRENT_TIMESTAMP
             WHERE imported_employer_id = ?",
        )
        .bind(&primary)
        .bind(&dup)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM employers WHERE guid = ?")
            .bind(&dup)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(
        primary = %primary_id,
        subsumed = duplicate_ids.len(),
        "Merged duplicate employers into primary"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgmap_common::db::init_test_database;

    #[tokio::test]
    async fn test_insert_and_get_employer() {
        let pool = init_test_database().await.unwrap();

        let id = insert_employer(
            &pool,
            &NewEmployer {
                name: "Acme Constructions".to_string(),
                suburb: Some("Brunswick".to_string()),
                external_id: Some("BCI-77".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let employer = get_employer(&pool, id).await.unwrap().unwrap();
        assert_eq!(employer.name, "Acme Constructions");
        assert_eq!(employer.external_id.as_deref(), Some("BCI-77"));

        let by_ext = find_by_external_id(&pool, "BCI-77").await.unwrap();
        assert_eq!(by_ext.len(), 1);
        assert_eq!(by_ext[0].guid, id);
    }

    #[tokio::test]
    async fn test_merge_reassigns_dependents_and_deletes_duplicates() {
        let pool = init_test_database().await.unwrap();

        let primary = insert_employer(
            &pool,
            &NewEmployer { name: "Acme".to_string(), ..Default::default() },
        )
        .await
        .unwrap();
        let dup = insert_employer(
            &pool,
            &NewEmployer { name: "Acme Pty Ltd".to_string(), ..Default::default() },
        )
        .await
        .unwrap();

        // Capability on the duplicate, plus one colliding with the primary
        for (emp, cap) in [(primary, "builder"), (dup, "builder"), (dup, "concrete")] {
            sqlx::query(
                "INSERT INTO employer_capabilities (employer_id, capability_type) VALUES (?, ?)",
            )
            .bind(emp.to_string())
            .bind(cap)
            .execute(&pool)
            .await
            .unwrap();
        }

        merge_employers(&pool, primary, &[dup]).await.unwrap();

        assert!(get_employer(&pool, dup).await.unwrap().is_none());

        let caps: Vec<(String,)> = sqlx::query_as(
            "SELECT capability_type FROM employer_capabilities WHERE employer_id = ? ORDER BY capability_type",
        )
        .bind(primary.to_string())
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(caps, vec![("builder".to_string(),), ("concrete".to_string(),)]);
    }
}
