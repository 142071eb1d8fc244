//! User directory queries.

use std::collections::BTreeSet;

use super::{DbPool, PasswordResetCode, User, UserDirectory, UserSummary};

/// Emails are compared case-insensitively and stored normalized
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
}

/// Display names are not unique; the earliest registered match wins
pub async fn find_by_name(pool: &DbPool, name: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE name = ? ORDER BY created_at ASC, id ASC LIMIT 1",
    )
    .bind(name.trim())
    .fetch_optional(pool)
    .await
}

pub async fn insert_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
    mobile: Option<&str>,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, mobile, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(name.trim())
    .bind(normalize_email(email))
    .bind(password_hash)
    .bind(mobile)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

pub async fn update_password(
    pool: &DbPool,
    user_id: &str,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Store a fresh reset code for `email`, replacing any earlier one
pub async fn upsert_reset_code(
    pool: &DbPool,
    email: &str,
    code_hash: &str,
    expires_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO password_reset_codes (email, code_hash, verified, expires_at, created_at)
        VALUES (?, ?, 0, ?, ?)
        ON CONFLICT(email) DO UPDATE SET
            code_hash = excluded.code_hash,
            verified = 0,
            expires_at = excluded.expires_at,
            created_at = excluded.created_at
        "#,
    )
    .bind(normalize_email(email))
    .bind(code_hash)
    .bind(expires_at)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_reset_code(
    pool: &DbPool,
    email: &str,
) -> Result<Option<PasswordResetCode>, sqlx::Error> {
    sqlx::query_as::<_, PasswordResetCode>("SELECT * FROM password_reset_codes WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
}

pub async fn mark_reset_code_verified(pool: &DbPool, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE password_reset_codes SET verified = 1 WHERE email = ?")
        .bind(normalize_email(email))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_reset_code(pool: &DbPool, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM password_reset_codes WHERE email = ?")
        .bind(normalize_email(email))
        .execute(pool)
        .await?;
    Ok(())
}

/// Load the public profiles of `ids` in a single query
pub async fn find_summaries(
    pool: &DbPool,
    ids: &BTreeSet<String>,
) -> Result<UserDirectory, sqlx::Error> {
    if ids.is_empty() {
        return Ok(UserDirectory::default());
    }

    let ids_json = serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string());
    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT id, name, email FROM users WHERE id IN (SELECT value FROM json_each(?))",
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;

    Ok(UserDirectory::new(users))
}
