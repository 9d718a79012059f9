//! Access-token signing/verification and refresh-token generation.
//!
//! Access tokens are HMAC-signed JWTs carrying the user id as `sub`. They are
//! never stored; revoking a user means blanking their session's refresh token.
//! Refresh tokens are 32 random bytes from the OS generator, hex-encoded.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, TryRngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw length of a refresh token before hex encoding
pub const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("empty signing key")]
    EmptySigningKey,
    #[error("failed to sign access token: {0}")]
    Signing(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("unexpected signing method")]
    UnexpectedAlgorithm,
    #[error("Token is expired")]
    Expired,
    #[error("token claims are malformed")]
    MalformedClaims,
    #[error("refresh token is expired")]
    RefreshTokenExpired,
    #[error("random source failure: {0}")]
    Randomness(String),
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub signing_key: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    /// Makes two tokens minted in the same second distinct
    jti: String,
}

/// A freshly minted refresh token. An empty `token` means "not rotated".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

/// Token pair handed back by every session operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub access: String,
    pub refresh: RefreshToken,
}

impl Tokens {
    /// Whether this pair carries a new refresh token the client must store.
    pub fn rotated(&self) -> bool {
        !self.refresh.token.is_empty()
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        if config.signing_key.is_empty() {
            return Err(TokenError::EmptySigningKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Any HMAC variant verifies against the shared key; everything else is refused.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_key.as_bytes()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an HS256 access token for `user_id`, valid for the access TTL.
    pub fn new_access_token(&self, user_id: &Uuid) -> Result<String, TokenError> {
        self.access_token_issued_at(user_id, Utc::now())
    }

    pub(crate) fn access_token_issued_at(
        &self,
        user_id: &Uuid,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.access_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and expiry, and return the subject.
    pub fn parse_access_token(&self, token: &str) -> Result<Uuid, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::UnexpectedAlgorithm
                }
                _ => TokenError::MalformedClaims,
            }
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::MalformedClaims)
    }

    pub fn new_refresh_token(&self) -> Result<RefreshToken, TokenError> {
        Ok(RefreshToken {
            token: random_hex(REFRESH_TOKEN_BYTES)?,
            expires_at: Utc::now() + self.refresh_ttl,
            ttl_seconds: self.refresh_ttl.num_seconds(),
        })
    }

    /// Whole days left before `expires_at`.
    pub fn days_until_expiry(&self, expires_at: DateTime<Utc>) -> Result<i64, TokenError> {
        days_until_expiry(expires_at, Utc::now())
    }
}

pub fn days_until_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<i64, TokenError> {
    let remaining = expires_at - now;
    if remaining <= Duration::zero() {
        return Err(TokenError::RefreshTokenExpired);
    }
    Ok(remaining.num_days())
}

/// `len` bytes from the OS CSPRNG, hex-encoded.
pub(crate) fn random_hex(len: usize) -> Result<String, TokenError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Randomness(e.to_string()))?;
    Ok(hex::encode(bytes))
}
