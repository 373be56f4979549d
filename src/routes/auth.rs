/**
 * Authentication Routes
 * JWT sessions for CMS staff: login, verify, refresh, logout, password reset
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::routes::users::hash_password;
use crate::routes::ApiError;
use crate::state::AppState;
use crate::store::models::{Role, User};

// ============================================================================
// Configuration
// ============================================================================

/// Access token expiry in minutes
const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Refresh token expiry in days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Password reset token expiry in minutes
const RESET_TOKEN_EXPIRY_MINUTES: i64 = 60;

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Stored refresh token data
#[derive(Debug, Clone)]
pub struct RefreshTokenData {
    pub user_id: String,
    pub expires_at: i64,
    pub revoked: bool,
}

/// Refresh tokens by SHA-256 hash. Lost on restart, which logs everyone out.
#[derive(Debug, Default)]
pub struct Sessions {
    refresh: RwLock<HashMap<String, RefreshTokenData>>,
}

impl Sessions {
    pub async fn issue(&self, user_id: &str) -> String {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);
        let mut tokens = self.refresh.write().await;
        // Expired entries are dropped on every write.
        let now = Utc::now().timestamp();
        tokens.retain(|_, data| data.expires_at > now);
        tokens.insert(
            hash_token(&token),
            RefreshTokenData {
                user_id: user_id.to_string(),
                expires_at: expires_at.timestamp(),
                revoked: false,
            },
        );
        token
    }

    /// Revoke `token` and return its owner if it was still valid.
    pub async fn consume(&self, token: &str) -> Option<String> {
        let mut tokens = self.refresh.write().await;
        let data = tokens.get_mut(&hash_token(token))?;
        if data.revoked || data.expires_at <= Utc::now().timestamp() {
            return None;
        }
        data.revoked = true;
        Some(data.user_id.clone())
    }

    pub async fn revoke(&self, token: &str) {
        if let Some(data) = self.refresh.write().await.get_mut(&hash_token(token)) {
            data.revoked = true;
        }
    }

    pub async fn revoke_user(&self, user_id: &str) {
        for data in self.refresh.write().await.values_mut() {
            if data.user_id == user_id {
                data.revoked = true;
            }
        }
    }
}

/// User info returned to frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserInfo>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    fn failure(error: &str) -> Json<Self> {
        Json(Self {
            success: false,
            user: None,
            access_token: None,
            refresh_token: None,
            error: Some(error.to_string()),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResponse {
    fn failure(error: &str) -> Json<Self> {
        Json(Self {
            success: false,
            access_token: None,
            refresh_token: None,
            error: Some(error.to_string()),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AuthResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResult {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            error: None,
        })
    }

    fn failure(error: &str) -> Json<Self> {
        Json(Self {
            success: false,
            error: Some(error.to_string()),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn generate_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// Tokens are stored only as SHA-256 digests.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn create_access_token(
    secret: &str,
    user: &User,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_access_token(
    secret: &str,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

async fn password_matches(password: String, hash: Option<String>) -> bool {
    let Some(hash) = hash else {
        return false;
    };
    // bcrypt is CPU-bound; keep it off the async executor.
    tokio::task::spawn_blocking(move || verify(&password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            LoginResponse::failure("Email and password are required"),
        );
    }

    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            LoginResponse::failure("Invalid email format"),
        );
    }

    let user = match state.store.users.find_by_email(&payload.email).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "user lookup failed during login");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                LoginResponse::failure("Authentication service temporarily unavailable."),
            );
        }
    };

    let matched = match user {
        Some(user) => password_matches(payload.password, user.password_hash.clone())
            .await
            .then_some(user),
        None => None,
    };
    let Some(user) = matched else {
        tracing::warn!(email = %payload.email, "failed login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            LoginResponse::failure("Invalid credentials"),
        );
    };

    let access_token = match create_access_token(&state.config.jwt_secret, &user) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "failed to create access token");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                LoginResponse::failure("Failed to create token"),
            );
        }
    };
    let refresh_token = state.sessions.issue(&user.id).await;

    tracing::info!(email = %user.email, role = user.role.as_str(), "successful login");

    (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            user: Some(UserInfo::from(&user)),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            error: None,
        }),
    )
}

/// POST /api/auth/verify
/// Always 200; validity is reported in the body.
pub async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let invalid = |error: &str| {
        Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
            error: Some(error.to_string()),
        })
    };

    let Some(token) = extract_bearer_token(&headers) else {
        return invalid("No authorization token provided");
    };

    match verify_access_token(&state.config.jwt_secret, &token) {
        Ok(claims) => {
            let name = state
                .store
                .users
                .get_by_id(&claims.sub)
                .await
                .ok()
                .flatten()
                .map(|u| u.name)
                .unwrap_or_default();
            Json(VerifyResponse {
                success: true,
                is_valid: true,
                user: Some(UserInfo {
                    user_id: claims.sub,
                    email: claims.email,
                    name,
                    role: claims.role,
                }),
                error: None,
            })
        }
        Err(e) => {
            tracing::debug!(error = %e, "token verification failed");
            invalid("Invalid or expired token")
        }
    }
}

/// POST /api/auth/refresh
/// Rotates the refresh token. The new access token carries the user's
/// current role, so role changes apply at the next refresh.
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> impl IntoResponse {
    if payload.refresh_token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            RefreshResponse::failure("Refresh token is required"),
        );
    }

    let user = match state.sessions.consume(&payload.refresh_token).await {
        Some(user_id) => state.store.users.get_by_id(&user_id).await,
        None => Ok(None),
    };
    let user = match user {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                RefreshResponse::failure("Invalid or expired refresh token"),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "user lookup failed during refresh");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                RefreshResponse::failure("Failed to refresh session"),
            );
        }
    };

    match create_access_token(&state.config.jwt_secret, &user) {
        Ok(access_token) => {
            let refresh_token = state.sessions.issue(&user.id).await;
            (
                StatusCode::OK,
                Json(RefreshResponse {
                    success: true,
                    access_token: Some(access_token),
                    refresh_token: Some(refresh_token),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to create access token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                RefreshResponse::failure("Failed to create token"),
            )
        }
    }
}

/// POST /api/auth/logout
/// Revokes the given refresh token, and every session of the bearer if an
/// access token is present. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LogoutRequest>,
) -> impl IntoResponse {
    if let Some(refresh_token) = payload.refresh_token {
        state.sessions.revoke(&refresh_token).await;
    }

    if let Some(access_token) = extract_bearer_token(&headers) {
        if let Ok(claims) = verify_access_token(&state.config.jwt_secret, &access_token) {
            state.sessions.revoke_user(&claims.sub).await;
        }
    }

    (StatusCode::OK, AuthResult::ok())
}

/// POST /api/auth/forgot-password
/// Always reports success so the response does not reveal which emails exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    if !payload.email.contains('@') {
        return (StatusCode::BAD_REQUEST, AuthResult::failure("Invalid email format"));
    }

    let user = match state.store.users.find_by_email(&payload.email).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::OK, AuthResult::ok()),
        Err(e) => {
            tracing::error!(error = %e, "user lookup failed during password reset");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                AuthResult::failure("Failed to start password reset"),
            );
        }
    };

    let token = generate_token();
    let token_hash = hash_token(&token);
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_EXPIRY_MINUTES);
    let stored = state
        .store
        .users
        .modify(&user.id, Some(&user.email), |u| {
            u.reset_token = Some(token_hash);
            u.reset_expires = Some(expires);
            Ok(())
        })
        .await;
    if let Err(e) = stored {
        tracing::error!(error = %e, "failed to store reset token");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            AuthResult::failure("Failed to start password reset"),
        );
    }

    let link = format!(
        "{}/admin/reset-password?token={}",
        state.config.site_url.trim_end_matches('/'),
        token
    );
    state.notifier.notify(
        "Password reset",
        &format!(
            "Password reset requested for {}\nlink: {}\nexpires: {}",
            user.email,
            link,
            expires.to_rfc3339()
        ),
    );

    (StatusCode::OK, AuthResult::ok())
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    if payload.token.is_empty() {
        return (StatusCode::BAD_REQUEST, AuthResult::failure("Reset token is required"));
    }

    let token_hash = hash_token(&payload.token);
    let now = Utc::now();
    let found = state
        .store
        .users
        .find(|u| {
            u.reset_token.as_deref() == Some(token_hash.as_str())
                && u.reset_expires.is_some_and(|exp| exp > now)
        })
        .await;
    let user = match found {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                AuthResult::failure("Invalid or expired reset token"),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "user lookup failed during password reset");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                AuthResult::failure("Failed to reset password"),
            );
        }
    };

    let password_hash = match hash_password(payload.password).await {
        Ok(hash) => hash,
        Err(e) => {
            let status = if matches!(e, ApiError::BadRequest(_)) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return (status, AuthResult::failure(&e.to_string()));
        }
    };

    let updated = state
        .store
        .users
        .modify(&user.id, Some(&user.email), |u| {
            u.password_hash = Some(password_hash);
            u.reset_token = None;
            u.reset_expires = None;
            Ok(())
        })
        .await;
    if let Err(e) = updated {
        tracing::error!(error = %e, "failed to store new password");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            AuthResult::failure("Failed to reset password"),
        );
    }

    state.sessions.revoke_user(&user.id).await;
    tracing::info!(email = %user.email, "password reset completed");
    (StatusCode::OK, AuthResult::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{bearer, post_json, test_app, TestApp};
    use axum::http::Request;
    use serde_json::json;

    #[test]
    fn test_verify_access_token_invalid_returns_err() {
        assert!(verify_access_token("secret", "invalid.jwt.token").is_err());
    }

    #[tokio::test]
    async fn test_access_token_round_trip_carries_role() {
        let TestApp { state, .. } = test_app().await;
        let user = state
            .store
            .users
            .find_by_email("editor@example.test")
            .await
            .unwrap()
            .unwrap();

        let token = create_access_token("secret", &user).unwrap();
        let claims = verify_access_token("secret", &token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Editor);
        assert!(verify_access_token("other-secret", &token).is_err());
    }

    #[tokio::test]
    async fn test_login_empty_email_returns_bad_request() {
        let app = test_app().await;
        let (status, _) = post_json(
            app.router(),
            "/api/auth/login",
            json!({ "email": "", "password": "password123" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_wrong_password_returns_unauthorized() {
        let app = test_app().await;
        let (status, body) = post_json(
            app.router(),
            "/api/auth/login",
            json!({ "email": "admin@example.test", "password": "wrongpassword" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_login_then_verify_and_refresh() {
        let app = test_app().await;
        let (status, body) = post_json(
            app.router(),
            "/api/auth/login",
            json!({ "email": "Admin@Example.test", "password": "password123" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], json!("admin"));
        let access = body["accessToken"].as_str().unwrap().to_string();
        let refresh_token = body["refreshToken"].as_str().unwrap().to_string();

        let (status, body) = post_json(
            app.router(),
            "/api/auth/verify",
            json!({}),
            Some(&access),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], json!(true));

        let (status, body) = post_json(
            app.router(),
            "/api/auth/refresh",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["refreshToken"].as_str().is_some());

        // The consumed token cannot be used twice.
        let (status, _) = post_json(
            app.router(),
            "/api/auth/refresh",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_verify_no_token_returns_error_in_body() {
        let app = test_app().await;
        let req = Request::post("/api/auth/verify")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, body) = crate::routes::test_support::send(app.router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], json!(false));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let app = test_app().await;
        let (_, body) = post_json(
            app.router(),
            "/api/auth/login",
            json!({ "email": "editor@example.test", "password": "password123" }),
            None,
        )
        .await;
        let refresh_token = body["refreshToken"].as_str().unwrap().to_string();

        let (status, body) = post_json(
            app.router(),
            "/api/auth/logout",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        let (status, _) = post_json(
            app.router(),
            "/api/auth/refresh",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_with_bearer_revokes_all_user_sessions() {
        let app = test_app().await;
        let mut tokens = Vec::new();
        for _ in 0..2 {
            let (_, body) = post_json(
                app.router(),
                "/api/auth/login",
                json!({ "email": "editor@example.test", "password": "password123" }),
                None,
            )
            .await;
            tokens.push(body["refreshToken"].as_str().unwrap().to_string());
        }

        let (status, _) = post_json(
            app.router(),
            "/api/auth/logout",
            json!({}),
            Some(&bearer(&app, "editor@example.test").await),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        for token in tokens {
            let (status, _) = post_json(
                app.router(),
                "/api/auth/refresh",
                json!({ "refreshToken": token }),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let app = test_app().await;
        let (status, _) = post_json(
            app.router(),
            "/api/auth/forgot-password",
            json!({ "email": "editor@example.test" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let sent = app.notifier.sent();
        let (_, text) = sent.last().unwrap();
        let token = text
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap()
            .to_string();

        let stored = app
            .state
            .store
            .users
            .find_by_email("editor@example.test")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.reset_token.as_deref(), Some(token.as_str()));

        let (status, _) = post_json(
            app.router(),
            "/api/auth/reset-password",
            json!({ "token": token, "password": "new-password-1" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            app.router(),
            "/api/auth/login",
            json!({ "email": "editor@example.test", "password": "new-password-1" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            app.router(),
            "/api/auth/reset-password",
            json!({ "token": token, "password": "another-password" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_still_ok() {
        let app = test_app().await;
        let (status, body) = post_json(
            app.router(),
            "/api/auth/forgot-password",
            json!({ "email": "nobody@example.test" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert!(app.notifier.sent().is_empty());
    }
}
