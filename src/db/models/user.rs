//! User and session models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Insert payload for a new account; `password_hash` is already digested.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// A user's live refresh-token binding. There is at most one row per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub user_id: String,
    pub refresh_token: String,
    pub expires_at: String,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            refresh_token: refresh_token.into(),
            expires_at: format_timestamp(expires_at),
        }
    }

    /// The same row with its token blanked and expiry reset to the epoch.
    pub fn revoked(&self) -> Self {
        Self::new(self.user_id.clone(), String::new(), DateTime::<Utc>::default())
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        parse_timestamp(&self.expires_at)
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_session_expiry_round_trips_through_text() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let session = Session::new("u1", "tok", expires);
        assert_eq!(session.expires_at, "2030-01-02T03:04:05Z");
        assert_eq!(session.expires_at().unwrap(), expires);
    }

    #[test]
    fn test_revoked_session_is_blank_and_expired() {
        let session = Session::new("u1", "tok", Utc::now() + Duration::days(3));
        let revoked = session.revoked();

        assert_eq!(revoked.user_id, "u1");
        assert!(revoked.refresh_token.is_empty());
        assert_eq!(revoked.expires_at().unwrap().timestamp(), 0);
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let user = User {
            id: "id".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "digest".to_string(),
            created_at: "2024-01-01 00:00:00".to_string(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "a@x.com");
    }
}
