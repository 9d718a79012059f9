//! One-time password reset codes.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::session::{AuthError, AuthService};
use super::token::random_hex;
use crate::db::{CodeType, ResetCode};

/// How long an issued reset code stays valid
pub const RESET_CODE_TTL_MINUTES: i64 = 30;

const RESET_CODE_BYTES: usize = 32;

/// Delivers a freshly issued reset code to its owner.
#[async_trait]
pub trait ResetCodeNotifier: Send + Sync {
    async fn send_reset_code(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes the delivery to the log instead of sending anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl ResetCodeNotifier for LogNotifier {
    async fn send_reset_code(&self, email: &str, _code: &str) -> anyhow::Result<()> {
        info!(email = %email, "Password reset code issued");
        Ok(())
    }
}

impl AuthService {
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.store
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;

        // A new code supersedes any earlier or expired ones
        self.store
            .delete_reset_codes_for(email, &CodeType::PassReset.to_string())
            .await?;

        let code = ResetCode::new(
            email,
            random_hex(RESET_CODE_BYTES)?,
            CodeType::PassReset,
            Utc::now() + Duration::minutes(RESET_CODE_TTL_MINUTES),
        );
        self.store.insert_reset_code(&code).await?;

        self.notifier
            .send_reset_code(email, &code.code)
            .await
            .map_err(|e| AuthError::Notify(e.to_string()))
    }

    /// Consume a code. Each code is accepted at most once.
    pub async fn consume_password_reset(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let stored = self
            .store
            .find_reset_code(email, code)
            .await?
            .ok_or(AuthError::InvalidResetCode)?;

        self.store.delete_reset_code(email, code).await?;

        let expires_at = stored
            .expires_at()
            .map_err(|e| AuthError::CorruptRecord(e.to_string()))?;
        if expires_at <= Utc::now() {
            warn!(email = %email, "Expired reset code presented");
            return Err(AuthError::ResetCodeExpired);
        }
        Ok(())
    }
}
