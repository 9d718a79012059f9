//! Persistence seam for the session manager.
//!
//! [`CredentialStore`] is the only way the auth service touches storage, so it
//! can be handed any backend at construction time. [`SqliteStore`] is the
//! production implementation; every mutation is a single statement except
//! account creation, which runs in one transaction.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{NewUser, ResetCode, Session, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("refresh token matches more than one session")]
    AmbiguousSession,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert the user and seed its session atomically.
    async fn create_user_with_session(
        &self,
        user: &NewUser,
        session: &Session,
    ) -> Result<(), StoreError>;

    async fn find_user_id_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<String>, StoreError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert or replace the session row for `session.user_id`.
    async fn upsert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Empty tokens never match; a blanked session cannot be looked up.
    async fn find_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError>;

    async fn insert_reset_code(&self, code: &ResetCode) -> Result<(), StoreError>;

    async fn find_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<ResetCode>, StoreError>;

    async fn delete_reset_code(&self, email: &str, code: &str) -> Result<(), StoreError>;

    /// Drop every code of `code_type` issued to `email`.
    async fn delete_reset_codes_for(&self, email: &str, code_type: &str) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const UPSERT_SESSION: &str = r#"
    INSERT INTO users_sessions (user_id, refresh_token, expires_at)
    VALUES (?, ?, ?)
    ON CONFLICT(user_id) DO UPDATE SET
        refresh_token = excluded.refresh_token,
        expires_at = excluded.expires_at
"#;

fn classify_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.message().contains("UNIQUE constraint failed: users.email") {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn create_user_with_session(
        &self,
        user: &NewUser,
        session: &Session,
    ) -> Result<(), StoreError> {
        // Dropping `tx` on any early return rolls the whole sign-up back.
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)")
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(classify_insert_error)?;

        sqlx::query(UPSERT_SESSION)
            .bind(&session.user_id)
            .bind(&session.refresh_token)
            .bind(&session.expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(user_id = %user.id, "User and session created");
        Ok(())
    }

    async fn find_user_id_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<String>, StoreError> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND password_hash = ?")
                .bind(email)
                .bind(password_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(UPSERT_SESSION)
            .bind(&session.user_id)
            .bind(&session.refresh_token)
            .bind(&session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError> {
        if refresh_token.is_empty() {
            return Ok(None);
        }

        let mut sessions = sqlx::query_as::<_, Session>(
            "SELECT user_id, refresh_token, expires_at FROM users_sessions \
             WHERE refresh_token = ? AND refresh_token != '' LIMIT 2",
        )
        .bind(refresh_token)
        .fetch_all(&self.pool)
        .await?;

        match sessions.len() {
            0 => Ok(None),
            1 => Ok(sessions.pop()),
            _ => Err(StoreError::AmbiguousSession),
        }
    }

    async fn insert_reset_code(&self, code: &ResetCode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO codes (user_email, code, code_type, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&code.user_email)
        .bind(&code.code)
        .bind(&code.code_type)
        .bind(&code.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<ResetCode>, StoreError> {
        let code = sqlx::query_as::<_, ResetCode>(
            "SELECT user_email, code, code_type, expires_at FROM codes \
             WHERE user_email = ? AND code = ?",
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    async fn delete_reset_code(&self, email: &str, code: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM codes WHERE user_email = ? AND code = ?")
            .bind(email)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_reset_codes_for(
        &self,
        email: &str,
        code_type: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM codes WHERE user_email = ? AND code_type = ?")
            .bind(email)
            .bind(code_type)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
