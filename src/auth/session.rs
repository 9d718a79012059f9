//! Session lifecycle: sign-up, sign-in, refresh-token rotation and logout.
//!
//! A user owns at most one session row. Rotation is decided on refresh:
//! far from expiry only the access token is re-minted, within
//! [`ROTATION_THRESHOLD_DAYS`] the whole session is replaced, and past expiry
//! the caller must sign in again.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hasher::{HashError, PasswordHasher};
use super::reset::ResetCodeNotifier;
use super::token::{TokenCodec, TokenError, Tokens};
use crate::db::{CredentialStore, NewUser, Session, StoreError, User};

/// Refreshes at or under this many days to expiry rotate the refresh token.
pub const ROTATION_THRESHOLD_DAYS: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session not found or expired")]
    UnknownOrExpiredSession,
    #[error("session not found")]
    UnknownSession,
    #[error("refresh token is expired")]
    RefreshTokenExpired,
    #[error("user not found")]
    NotFound,
    #[error("invalid reset code")]
    InvalidResetCode,
    #[error("reset code is expired")]
    ResetCodeExpired,
    #[error("corrupt stored record: {0}")]
    CorruptRecord(String),
    #[error("failed to deliver reset code: {0}")]
    Notify(String),
    #[error(transparent)]
    Token(TokenError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            other => Self::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::RefreshTokenExpired => Self::RefreshTokenExpired,
            other => Self::Token(other),
        }
    }
}

pub struct AuthService {
    pub(super) store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    pub(super) codec: TokenCodec,
    pub(super) notifier: Arc<dyn ResetCodeNotifier>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: TokenCodec,
        notifier: Arc<dyn ResetCodeNotifier>,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
            notifier,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an account and its first session in one transaction.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
        let password_hash = self.hasher.hash(password)?;
        let user_id = Uuid::new_v4();

        // Minted up front so the session row lands in the same transaction as the user.
        let tokens = self.mint(&user_id)?;
        let user = NewUser {
            id: user_id.to_string(),
            email: email.to_string(),
            password_hash,
        };
        let session = Session::new(
            user.id.clone(),
            tokens.refresh.token.clone(),
            tokens.refresh.expires_at,
        );

        self.store.create_user_with_session(&user, &session).await?;

        info!(user_id = %user_id, "User signed up");
        Ok(tokens)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
        let password_hash = self.hasher.hash(password)?;

        let user_id = self
            .store
            .find_user_id_by_credentials(email, &password_hash)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let user_id = parse_user_id(&user_id)?;

        let tokens = self.create_session(&user_id).await?;
        info!(user_id = %user_id, "User signed in");
        Ok(tokens)
    }

    /// Blank the session that owns `refresh_token`. The row itself is kept.
    pub async fn log_out(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        let session = self
            .store
            .find_session_by_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::UnknownSession)?;

        self.store.upsert_session(&session.revoked()).await?;

        info!(user_id = %session.user_id, "User logged out");
        Ok(Tokens::default())
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        let session = self
            .store
            .find_session_by_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::UnknownOrExpiredSession)?;

        let user_id = parse_user_id(&session.user_id)?;
        let expires_at = session
            .expires_at()
            .map_err(|e| AuthError::CorruptRecord(e.to_string()))?;

        let days = self.codec.days_until_expiry(expires_at).map_err(|e| {
            debug!(user_id = %user_id, "Refresh rejected, session expired");
            AuthError::from(e)
        })?;

        if days <= ROTATION_THRESHOLD_DAYS {
            debug!(user_id = %user_id, days, "Rotating refresh token");
            return self.create_session(&user_id).await;
        }

        Ok(Tokens {
            access: self.codec.new_access_token(&user_id)?,
            refresh: Default::default(),
        })
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<User, AuthError> {
        self.store
            .find_user_by_id(&user_id.to_string())
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Mint a fresh pair and replace the user's session with it.
    async fn create_session(&self, user_id: &Uuid) -> Result<Tokens, AuthError> {
        let tokens = self.mint(user_id)?;
        let session = Session::new(
            user_id.to_string(),
            tokens.refresh.token.clone(),
            tokens.refresh.expires_at,
        );

        if let Err(e) = self.store.upsert_session(&session).await {
            warn!(user_id = %user_id, error = %e, "Failed to persist session");
            return Err(e.into());
        }
        Ok(tokens)
    }

    fn mint(&self, user_id: &Uuid) -> Result<Tokens, AuthError> {
        Ok(Tokens {
            access: self.codec.new_access_token(user_id)?,
            refresh: self.codec.new_refresh_token()?,
        })
    }
}

fn parse_user_id(id: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(id)
        .map_err(|_| AuthError::CorruptRecord(format!("user id {id:?} is not a uuid")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{HmacSha256Hasher, LogNotifier, TokenConfig};
    use crate::db::{init_in_memory, SqliteStore};
    use chrono::{Duration, Utc};
    use sqlx::SqlitePool;
    use tokio_test::{assert_err, assert_ok};

    pub(crate) fn test_codec() -> TokenCodec {
        TokenCodec::new(TokenConfig {
            signing_key: "session-test-key".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
        })
        .unwrap()
    }

    pub(crate) async fn service() -> (AuthService, SqlitePool) {
        let pool = init_in_memory().await.unwrap();
        let service = AuthService::new(
            Arc::new(SqliteStore::new(pool.clone())),
            Arc::new(HmacSha256Hasher::new("pepper")),
            test_codec(),
            Arc::new(LogNotifier),
        );
        (service, pool)
    }

    async fn session_for(pool: &SqlitePool, email: &str) -> Session {
        sqlx::query_as::<_, Session>(
            "SELECT s.user_id, s.refresh_token, s.expires_at FROM users_sessions s \
             JOIN users u ON u.id = s.user_id WHERE u.email = ?",
        )
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn set_expiry(
        service: &AuthService,
        session: &Session,
        expires_at: chrono::DateTime<Utc>,
    ) {
        let moved = Session::new(
            session.user_id.clone(),
            session.refresh_token.clone(),
            expires_at,
        );
        service.store.upsert_session(&moved).await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let (service, _pool) = service().await;

        let signed_up = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        assert!(signed_up.rotated());
        let user_id = service.codec().parse_access_token(&signed_up.access).unwrap();

        let signed_in = service.sign_in("a@x.com", "qwerty123456").await.unwrap();
        assert_eq!(service.codec().parse_access_token(&signed_in.access).unwrap(), user_id);
        assert_ne!(signed_in.refresh.token, signed_up.refresh.token);

        let user = service.get_user(&user_id).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_ne!(user.password_hash, "qwerty123456");
    }

    #[tokio::test]
    async fn test_sign_in_replaces_previous_session() {
        let (service, _pool) = service().await;
        let first = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        service.sign_in("a@x.com", "qwerty123456").await.unwrap();

        let err = service.refresh_access_token(&first.refresh.token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownOrExpiredSession));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (service, _pool) = service().await;
        assert_ok!(service.sign_up("a@x.com", "qwerty123456").await);

        let err = service.sign_up("a@x.com", "another-password").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_session_untouched() {
        let (service, pool) = service().await;
        service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        let before = session_for(&pool, "a@x.com").await;

        let err = service.sign_in("a@x.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_err!(service.sign_in("nobody@x.com", "qwerty123456").await);

        assert_eq!(session_for(&pool, "a@x.com").await, before);
    }

    #[tokio::test]
    async fn test_refresh_far_from_expiry_keeps_refresh_token() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();

        let refreshed = service.refresh_access_token(&tokens.refresh.token).await.unwrap();
        assert!(!refreshed.rotated());
        assert!(!refreshed.access.is_empty());
        assert_ne!(refreshed.access, tokens.access);

        // Stored token is unchanged and still usable
        assert_eq!(session_for(&pool, "a@x.com").await.refresh_token, tokens.refresh.token);
        assert_ok!(service.refresh_access_token(&tokens.refresh.token).await);
    }

    #[tokio::test]
    async fn test_refresh_near_expiry_rotates() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        let session = session_for(&pool, "a@x.com").await;
        set_expiry(&service, &session, Utc::now() + Duration::days(3)).await;

        let refreshed = service.refresh_access_token(&tokens.refresh.token).await.unwrap();
        assert!(refreshed.rotated());
        assert_ne!(refreshed.refresh.token, tokens.refresh.token);
        assert!(refreshed.refresh.expires_at > Utc::now() + Duration::days(29));

        let err = service.refresh_access_token(&tokens.refresh.token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownOrExpiredSession));
        assert_ok!(service.refresh_access_token(&refreshed.refresh.token).await);
    }

    #[tokio::test]
    async fn test_refresh_at_threshold_rotates() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        let session = session_for(&pool, "a@x.com").await;
        set_expiry(
            &service,
            &session,
            Utc::now() + Duration::days(ROTATION_THRESHOLD_DAYS) + Duration::hours(12),
        )
        .await;

        let refreshed = service.refresh_access_token(&tokens.refresh.token).await.unwrap();
        assert!(refreshed.rotated());
    }

    #[tokio::test]
    async fn test_refresh_just_above_threshold_keeps_refresh_token() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        let session = session_for(&pool, "a@x.com").await;
        let expires_at =
            Utc::now() + Duration::days(ROTATION_THRESHOLD_DAYS + 1) + Duration::hours(1);
        set_expiry(&service, &session, expires_at).await;

        let refreshed = service.refresh_access_token(&tokens.refresh.token).await.unwrap();
        assert!(!refreshed.rotated());
        assert_eq!(session_for(&pool, "a@x.com").await.refresh_token, tokens.refresh.token);
    }

    #[tokio::test]
    async fn test_refresh_expired_session() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        let session = session_for(&pool, "a@x.com").await;
        set_expiry(&service, &session, Utc::now() - Duration::minutes(1)).await;

        let err = service.refresh_access_token(&tokens.refresh.token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenExpired));
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let (service, _pool) = service().await;

        let err = service.refresh_access_token("deadbeef").await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownOrExpiredSession));
        let err = service.refresh_access_token("").await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownOrExpiredSession));
    }

    #[tokio::test]
    async fn test_log_out_blanks_session() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();

        let out = service.log_out(&tokens.refresh.token).await.unwrap();
        assert!(out.access.is_empty());
        assert!(out.refresh.token.is_empty());

        let stored = session_for(&pool, "a@x.com").await;
        assert!(stored.refresh_token.is_empty());
        assert_eq!(stored.expires_at().unwrap().timestamp(), 0);

        let err = service.refresh_access_token(&tokens.refresh.token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownOrExpiredSession));
        let err = service.log_out(&tokens.refresh.token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownSession));
    }

    #[tokio::test]
    async fn test_log_out_expired_session() {
        let (service, pool) = service().await;
        let tokens = service.sign_up("a@x.com", "qwerty123456").await.unwrap();
        let session = session_for(&pool, "a@x.com").await;
        set_expiry(&service, &session, Utc::now() - Duration::days(1)).await;

        assert_ok!(service.log_out(&tokens.refresh.token).await);
        assert!(session_for(&pool, "a@x.com").await.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let (service, _pool) = service().await;
        let err = service.get_user(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_session_write_failure_returns_no_tokens() {
        let (service, pool) = service().await;
        service.sign_up("a@x.com", "qwerty123456").await.unwrap();

        sqlx::query("DROP TABLE users_sessions").execute(&pool).await.unwrap();

        let err = service.sign_in("a@x.com", "qwerty123456").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn test_sign_up_rolls_back_when_session_insert_fails() {
        let (service, pool) = service().await;
        sqlx::query("DROP TABLE users_sessions").execute(&pool).await.unwrap();

        let err = service.sign_up("a@x.com", "qwerty123456").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 0);
    }
}
