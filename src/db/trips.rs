//! Document storage for trip aggregates.
//!
//! Each trip is one row holding the serialized aggregate. Saves are
//! conditional on the version that was read, so two writers racing on the
//! same trip cannot silently overwrite each other.

use sqlx::{Executor, Sqlite};
use thiserror::Error;

use super::{DbPool, Trip, TripRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid trip document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("trip was modified by another request")]
    VersionConflict,
}

pub async fn insert_trip(pool: &DbPool, trip: &Trip) -> Result<(), StoreError> {
    let document = serde_json::to_string(trip)?;

    sqlx::query(
        r#"
        INSERT INTO trips (id, organizer_id, version, document, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&trip.id)
    .bind(&trip.organizer_id)
    .bind(trip.version)
    .bind(&document)
    .bind(&trip.created_at)
    .bind(&trip.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_trip<'e, E>(executor: E, id: &str) -> Result<Option<Trip>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, TripRow>("SELECT * FROM trips WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => Ok(Some(row.into_trip()?)),
        None => Ok(None),
    }
}

/// Trips the user organizes or belongs to, newest first
pub async fn find_trips_for_user(pool: &DbPool, user_id: &str) -> Result<Vec<Trip>, StoreError> {
    let rows = sqlx::query_as::<_, TripRow>(
        r#"
        SELECT * FROM trips t
        WHERE t.organizer_id = ?
           OR EXISTS (
                SELECT 1 FROM json_each(t.document, '$.members') m
                WHERE json_extract(m.value, '$.user_id') = ?
           )
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| row.into_trip().map_err(StoreError::from))
        .collect()
}

/// Replace the stored document if nobody saved it since it was read.
///
/// On success the in-memory version is bumped to match the row.
pub async fn save_trip<'e, E>(executor: E, trip: &mut Trip) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    trip.updated_at = chrono::Utc::now().to_rfc3339();
    let document = serde_json::to_string(&*trip)?;

    let result = sqlx::query(
        r#"
        UPDATE trips
        SET document = ?, version = version + 1, updated_at = ?
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&document)
    .bind(&trip.updated_at)
    .bind(&trip.id)
    .bind(trip.version)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }

    trip.version += 1;
    Ok(())
}
