//! Bearer-token identity for protected routes.
//!
//! [`require_identity`] runs as route middleware, resolves the caller from the
//! `Authorization` header and stores a [`CurrentUser`] in the request
//! extensions. Handlers take `CurrentUser` as an extractor.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use crate::auth::{TokenCodec, TokenError};
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("empty auth header")]
    MissingHeader,
    #[error("invalid auth header")]
    MalformedHeader,
    #[error(transparent)]
    InvalidToken(TokenError),
}

/// The authenticated caller of a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

pub fn resolve_identity(headers: &HeaderMap, codec: &TokenCodec) -> Result<Uuid, IdentityError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(IdentityError::MissingHeader)?
        .to_str()
        .map_err(|_| IdentityError::MalformedHeader)?;
    if header.is_empty() {
        return Err(IdentityError::MissingHeader);
    }

    let parts: Vec<&str> = header.split(' ').collect();
    let token = match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => *token,
        _ => return Err(IdentityError::MalformedHeader),
    };

    codec.parse_access_token(token).map_err(IdentityError::InvalidToken)
}

pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = resolve_identity(request.headers(), &state.codec)?;
    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized(IdentityError::MissingHeader.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_codec;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_valid_bearer_token() {
        let codec = test_codec();
        let user_id = Uuid::new_v4();
        let token = codec.new_access_token(&user_id).unwrap();

        let resolved = resolve_identity(&headers(&format!("Bearer {token}")), &codec).unwrap();
        assert_eq!(resolved, user_id);
    }

    #[test]
    fn test_missing_header() {
        let codec = test_codec();
        assert_eq!(
            resolve_identity(&HeaderMap::new(), &codec),
            Err(IdentityError::MissingHeader)
        );
        assert_eq!(
            resolve_identity(&headers(""), &codec),
            Err(IdentityError::MissingHeader)
        );
    }

    #[test]
    fn test_malformed_header() {
        let codec = test_codec();
        let token = codec.new_access_token(&Uuid::new_v4()).unwrap();

        for value in [
            token.clone(),
            format!("Basic {token}"),
            format!("Bearer {token} extra"),
            format!("Bearer  {token}"),
            "Bearer ".to_string(),
        ] {
            assert_eq!(
                resolve_identity(&headers(&value), &codec),
                Err(IdentityError::MalformedHeader),
                "{value:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_token_errors_pass_through() {
        let codec = test_codec();
        let expired = codec
            .access_token_issued_at(
                &Uuid::new_v4(),
                chrono::Utc::now() - chrono::Duration::hours(1),
            )
            .unwrap();

        assert_eq!(
            resolve_identity(&headers(&format!("Bearer {expired}")), &codec),
            Err(IdentityError::InvalidToken(TokenError::Expired))
        );
        assert_eq!(
            resolve_identity(&headers("Bearer garbage"), &codec),
            Err(IdentityError::InvalidToken(TokenError::MalformedClaims))
        );
    }
}
