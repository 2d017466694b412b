//! Password hashes and the per-account refresh token slot.
//!
//! Each account holds at most one live refresh token, stored as a SHA-256
//! digest in `account.refresh_token`. Rotation is a compare-and-replace on
//! that column so two concurrent refreshes cannot both succeed.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::{
    db::models::Credentials,
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

/// Lookup key for an email address. Folds case across all of Unicode, not
/// just ASCII, so `Éxample` and `éxample` are the same account.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<i64> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO account (email, email_key, password_hash, first_name, last_name, create_time, update_time) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(email_key(email))
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_unique_email)?;

        Ok(result.last_insert_rowid())
    }

    /// Case-insensitive lookup by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Credentials>> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT account_id, password_hash FROM account WHERE email_key = ?",
        )
        .bind(email_key(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(credentials)
    }

    pub async fn password_hash(&self, account_id: i64) -> Result<Option<String>> {
        let hash =
            sqlx::query_scalar::<_, String>("SELECT password_hash FROM account WHERE account_id = ?")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(hash)
    }

    /// Whether any account other than `except` already uses this email,
    /// ignoring case.
    pub async fn email_in_use(&self, email: &str, except: Option<i64>) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM account WHERE email_key = ? AND account_id IS NOT ?",
        )
        .bind(email_key(email))
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Unique violations surface as `EmailInUse`.
    pub async fn change_email(&self, account_id: i64, email: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE account SET email = ?, email_key = ?, update_time = ? WHERE account_id = ?",
        )
        .bind(email)
        .bind(email_key(email))
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_email)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_password_hash(&self, account_id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE account SET password_hash = ?, update_time = ? WHERE account_id = ?",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn refresh_token_hash(&self, account_id: i64) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, Option<String>>(
            "SELECT refresh_token FROM account WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash.flatten())
    }

    /// Overwrites the stored refresh token, invalidating any previous one.
    pub async fn replace_refresh_token(&self, account_id: i64, token: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE account SET refresh_token = ? WHERE account_id = ?")
            .bind(hash_token(token))
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replaces the stored refresh token only if it still equals `current`.
    /// Returns false when the slot is empty or holds a different token.
    pub async fn compare_and_replace(
        &self,
        account_id: i64,
        current: &str,
        next: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE account SET refresh_token = ? WHERE account_id = ? AND refresh_token = ?",
        )
        .bind(hash_token(next))
        .bind(account_id)
        .bind(hash_token(current))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn clear_refresh_token(&self, account_id: i64) -> Result<()> {
        sqlx::query("UPDATE account SET refresh_token = NULL WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// The unique index on `email_key` is the final arbiter when two
/// registrations race past the pre-check.
pub fn map_unique_email(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::EmailInUse,
        _ => AppError::Database(err),
    }
}
