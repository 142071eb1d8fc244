//! Invite queries.

use sqlx::{Executor, Sqlite};

use super::{DbPool, Invite, InviteStatus, InviteWithDetails};

pub async fn insert_invite(
    pool: &DbPool,
    trip_id: &str,
    invited_user_id: &str,
    invited_by: &str,
) -> Result<Invite, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO invites (id, trip_id, invited_user_id, invited_by, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(trip_id)
    .bind(invited_user_id)
    .bind(invited_by)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<Invite>, sqlx::Error> {
    sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_pending(
    pool: &DbPool,
    trip_id: &str,
    invited_user_id: &str,
) -> Result<Option<Invite>, sqlx::Error> {
    sqlx::query_as::<_, Invite>(
        "SELECT * FROM invites WHERE trip_id = ? AND invited_user_id = ? AND status = 'pending'",
    )
    .bind(trip_id)
    .bind(invited_user_id)
    .fetch_optional(pool)
    .await
}

/// Pending invites addressed to `user_id`, with trip and inviter details
pub async fn list_pending_for_user(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<InviteWithDetails>, sqlx::Error> {
    sqlx::query_as::<_, InviteWithDetails>(
        r#"
        SELECT
            i.id,
            i.trip_id,
            COALESCE(json_extract(t.document, '$.name'), '') AS trip_name,
            COALESCE(json_extract(t.document, '$.destination'), '') AS destination,
            i.invited_by,
            COALESCE(u.name, 'Unknown user') AS invited_by_name,
            i.status,
            i.created_at
        FROM invites i
        JOIN trips t ON t.id = i.trip_id
        LEFT JOIN users u ON u.id = i.invited_by
        WHERE i.invited_user_id = ? AND i.status = 'pending'
        ORDER BY i.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Move a pending invite to a terminal state.
///
/// Returns false when the invite was no longer pending.
pub async fn resolve<'e, E>(executor: E, id: &str, status: InviteStatus) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE invites SET status = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(status.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
