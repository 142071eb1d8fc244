//! Authentication: password hashing, session tokens, the auth gate and the
//! user endpoints (registration, login, password reset).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::Json;
use super::validation::{validate_email, validate_otp, validate_password, validate_required_text};
use crate::config::AuthConfig;
use crate::db::{
    users, AuthResponse, EmailRequest, LoginRequest, MessageResponse, RegisterRequest,
    ResetPasswordRequest, UserResponse, VerifyOtpRequest,
};
use crate::notifications::render_otp_html;
use crate::AppState;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Six random digits, zero padded
fn generate_otp() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", code)
}

/// Reset codes are stored as SHA-256 hex digests
fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}

fn codes_match(stored_hash: &str, candidate: &str) -> bool {
    let candidate_hash = hash_code(candidate);
    let (a, b) = (stored_hash.as_bytes(), candidate_hash.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: chrono::Duration::days(config.token_ttl_days),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Pull the bearer token out of the Authorization header
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller, placed in request extensions by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Auth gate for protected routes.
///
/// Rejects with 401 when the token is missing, invalid, expired, or names a
/// user that no longer exists.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no token"))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        ApiError::unauthorized("Not authorized, token failed")
    })?;

    let user = users::find_by_id(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not authorized, user not found"))?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        name: user.name,
        email: user.email,
    });

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authorized"))
    }
}

fn issue_token(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    state.tokens.issue(user_id).map_err(|e| {
        tracing::error!("Failed to sign session token: {}", e);
        ApiError::internal("Failed to create session")
    })
}

/// POST /api/users/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_required_text(&req.name, "Name") {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password, state.config.auth.min_password_length) {
        errors.add("password", e);
    }
    errors.finish()?;

    if users::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let mobile = req
        .mobile
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let user = users::insert_user(&state.db, &req.name, &req.email, &password_hash, mobile).await?;
    let token = issue_token(&state, &user.id)?;

    tracing::info!(user_id = %user.id, "Registered user");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(user),
            token,
        }),
    ))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let user = users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    let token = issue_token(&state, &user.id)?;
    Ok(Json(AuthResponse {
        user: UserResponse::from(user),
        token,
    }))
}

/// GET /api/users/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = users::find_by_id(&state.db, &auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(UserResponse::from(user)))
}

/// POST /api/users/check-email
pub async fn check_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_email(&req.email).map_err(|e| ApiError::validation_field("email", e))?;

    match users::find_by_email(&state.db, &req.email).await? {
        Some(_) => Ok(Json(MessageResponse::new("Email is registered"))),
        None => Err(ApiError::not_found("User not found")),
    }
}

/// POST /api/users/send-otp
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let ttl = state.config.auth.otp_ttl_minutes;
    let code = generate_otp();
    let expires_at = (chrono::Utc::now() + chrono::Duration::minutes(ttl)).to_rfc3339();
    users::upsert_reset_code(&state.db, &user.email, &hash_code(&code), &expires_at).await?;

    state
        .mailer
        .send(&user.email, "Your password reset code", &render_otp_html(&code, ttl))
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.id, "Failed to send reset code: {}", e);
            ApiError::upstream("Failed to send OTP email")
        })?;

    tracing::info!(user_id = %user.id, "Password reset code issued");
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// POST /api/users/verify-otp
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_otp(&req.otp).map_err(|e| ApiError::validation_field("otp", e))?;

    let invalid = || ApiError::bad_request("Invalid or expired OTP");
    let code = users::find_reset_code(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if code.is_expired(chrono::Utc::now()) {
        users::delete_reset_code(&state.db, &req.email).await?;
        return Err(invalid());
    }
    if !codes_match(&code.code_hash, &req.otp) {
        return Err(invalid());
    }

    users::mark_reset_code_verified(&state.db, &req.email).await?;
    Ok(Json(MessageResponse::new("OTP verified")))
}

/// POST /api/users/reset-password
///
/// Only succeeds after `verify-otp` accepted a code that has not yet expired.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&req.password, state.config.auth.min_password_length)
        .map_err(|e| ApiError::validation_field("password", e))?;

    let user = users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let verified = users::find_reset_code(&state.db, &user.email)
        .await?
        .filter(|code| code.verified && !code.is_expired(chrono::Utc::now()));
    if verified.is_none() {
        return Err(ApiError::bad_request("OTP verification required"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    users::update_password(&state.db, &user.id, &password_hash).await?;
    users::delete_reset_code(&state.db, &user.email).await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(Json(MessageResponse::new("Password reset successfully")))
}
