//! One-time codes bound to an email address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::{format_timestamp, parse_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    PassReset,
}

impl std::fmt::Display for CodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PassReset => write!(f, "pass_reset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResetCode {
    pub user_email: String,
    pub code: String,
    pub code_type: String,
    pub expires_at: String,
}

impl ResetCode {
    pub fn new(
        user_email: impl Into<String>,
        code: impl Into<String>,
        code_type: CodeType,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_email: user_email.into(),
            code: code.into(),
            code_type: code_type.to_string(),
            expires_at: format_timestamp(expires_at),
        }
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        parse_timestamp(&self.expires_at)
    }
}
