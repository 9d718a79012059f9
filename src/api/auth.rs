//! Auth endpoints under `/api/v1/auth`.
//!
//! The access token travels in the JSON body; the refresh token only ever
//! travels in the `RefreshToken` cookie.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ApiError;
use super::identity::CurrentUser;
use super::validation::{validate_credentials, validate_email};
use crate::auth::{AuthError, Tokens};
use crate::config::CookieConfig;
use crate::db::UserResponse;
use crate::AppState;

pub const REFRESH_COOKIE: &str = "RefreshToken";

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetCodeRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResetCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn refresh_cookie(config: &CookieConfig, value: String, max_age_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::build((REFRESH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site.into())
        .max_age(time::Duration::seconds(max_age_secs))
        .build();
    if let Some(domain) = &config.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Attach the rotated refresh token, if any, and answer with the access token.
fn issue(state: &AppState, jar: CookieJar, tokens: Tokens) -> (CookieJar, Json<TokenResponse>) {
    let jar = if tokens.rotated() {
        jar.add(refresh_cookie(
            &state.config.cookie,
            tokens.refresh.token,
            tokens.refresh.ttl_seconds,
        ))
    } else {
        jar
    };
    (jar, Json(TokenResponse { access_token: tokens.access }))
}

fn presented_refresh_token(jar: &CookieJar) -> Result<String, ApiError> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing refresh token"))
}

fn credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(String, String), ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected request body: {}", e);
        ApiError::bad_request("invalid request body")
    })?;

    let email = request.email.trim().to_string();
    let password = request.password.trim().to_string();
    validate_credentials(&email, &password).map_err(ApiError::validation)?;
    Ok((email, password))
}

/// Register a new account
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let (email, password) = credentials(payload)?;
    let tokens = state.auth.sign_up(&email, &password).await?;
    Ok(issue(&state, jar, tokens))
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let (email, password) = credentials(payload)?;
    let tokens = state.auth.sign_in(&email, &password).await?;
    Ok(issue(&state, jar, tokens))
}

/// Revoke the session behind the refresh cookie and clear it
pub async fn log_out(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let refresh_token = presented_refresh_token(&jar)?;
    let tokens = state.auth.log_out(&refresh_token).await?;

    let jar = jar.add(refresh_cookie(&state.config.cookie, String::new(), 0));
    Ok((jar, Json(TokenResponse { access_token: tokens.access })))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let refresh_token = presented_refresh_token(&jar)?;
    let tokens = state.auth.refresh_access_token(&refresh_token).await?;
    Ok(issue(&state, jar, tokens))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<MeResponse>, ApiError> {
    let user = state.auth.get_user(&user_id).await?;
    Ok(Json(MeResponse { user: user.into() }))
}

pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResetCodeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("invalid request body"))?;
    let email = request.email.trim();
    validate_email(email).map_err(ApiError::validation)?;

    // Unknown addresses get the same answer as known ones
    match state.auth.request_password_reset(email).await {
        Ok(()) => {}
        Err(AuthError::NotFound) => info!("Reset code requested for unknown email"),
        Err(e) => return Err(e.into()),
    }
    Ok(Json(MessageResponse {
        message: "reset code sent".to_string(),
    }))
}

pub async fn verify_password_reset(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyResetCodeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("invalid request body"))?;
    let email = request.email.trim();
    let code = request.code.trim();
    if email.is_empty() || code.is_empty() {
        return Err(ApiError::validation("all fields must be completed"));
    }

    state.auth.consume_password_reset(email, code).await?;
    Ok(Json(MessageResponse {
        message: "reset code accepted".to_string(),
    }))
}
