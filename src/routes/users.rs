/**
 * User Routes
 * Staff accounts. Credentials never leave the server.
 */
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, DEFAULT_COST};
use serde_json::{json, Map, Value};

use crate::access::{Action, Resource};
use crate::routes::{authorize, ApiError, ListResponse, SuccessResponse};
use crate::state::AppState;
use crate::store::models::{PublicUser, SENSITIVE_USER_FIELDS};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt-hash a new password off the async executor.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// Drop credential keys and turn a `password` into `passwordHash`.
async fn prepare_payload(mut payload: Map<String, Value>) -> Result<Map<String, Value>, ApiError> {
    for key in SENSITIVE_USER_FIELDS {
        payload.remove(*key);
    }
    match payload.remove("password") {
        None | Some(Value::Null) => {}
        Some(Value::String(password)) => {
            let password_hash = hash_password(password).await?;
            payload.insert("passwordHash".into(), json!(password_hash));
        }
        Some(_) => return Err(ApiError::BadRequest("password must be a string".to_string())),
    }
    Ok(payload)
}

async fn ensure_email_free(
    state: &AppState,
    payload: &Map<String, Value>,
    except: Option<&str>,
) -> Result<(), ApiError> {
    let Some(email) = payload.get("email").and_then(Value::as_str) else {
        return Ok(());
    };
    match state.store.users.find_by_email(email).await? {
        Some(other) if Some(other.id.as_str()) != except => {
            Err(ApiError::Conflict("A user with this email already exists".to_string()))
        }
        _ => Ok(()),
    }
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<PublicUser>>, ApiError> {
    authorize(&state, &headers, Resource::Users, Action::Read)?;
    let users: Vec<PublicUser> = state
        .store
        .users
        .list()
        .await?
        .iter()
        .map(PublicUser::from)
        .collect();
    Ok(Json(users.into()))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    authorize(&state, &headers, Resource::Users, Action::Read)?;
    state
        .store
        .users
        .get_by_id(&id)
        .await?
        .map(|u| Json(PublicUser::from(&u)))
        .ok_or(ApiError::NotFound)
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers, Resource::Users, Action::Write)?;

    let payload = prepare_payload(payload).await?;
    ensure_email_free(&state, &payload, None).await?;
    let user = state.store.users.create(payload, Some(&claims.email)).await?;

    tracing::info!(email = %user.email, role = user.role.as_str(), by = %claims.email, "user created");
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

/// PATCH /api/admin/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<PublicUser>, ApiError> {
    let claims = authorize(&state, &headers, Resource::Users, Action::Write)?;

    let payload = prepare_payload(payload).await?;
    ensure_email_free(&state, &payload, Some(&id)).await?;
    let user = state.store.users.update(&id, payload, Some(&claims.email)).await?;
    Ok(Json(PublicUser::from(&user)))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let claims = authorize(&state, &headers, Resource::Users, Action::Write)?;

    if claims.sub == id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }
    if !state.store.users.delete(&id).await? {
        return Err(ApiError::NotFound);
    }
    state.sessions.revoke_user(&id).await;
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{bearer, get_json, post_json, request_json, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_only_admin_manages_users() {
        let app = test_app().await;
        for email in ["editor@example.test", "jobs@example.test"] {
            let token = bearer(&app, email).await;
            let (status, _) = get_json(app.router(), "/api/admin/users", Some(&token)).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let token = bearer(&app, "admin@example.test").await;
        let (status, list) = get_json(app.router(), "/api/admin/users", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], json!(3));
        assert!(list["items"][0].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_create_user_hashes_password_and_hides_credentials() {
        let app = test_app().await;
        let token = bearer(&app, "admin@example.test").await;

        let (status, user) = post_json(
            app.router(),
            "/api/admin/users",
            json!({
                "email": "New.Editor@Example.test",
                "name": "New",
                "role": "editor",
                "password": "long-enough",
                "passwordHash": "injected",
                "twoFASecret": "injected"
            }),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["email"], json!("new.editor@example.test"));
        assert_eq!(user["twoFactorEnabled"], json!(false));
        assert!(user.get("passwordHash").is_none());

        let stored = app
            .state
            .store
            .users
            .find_by_email("new.editor@example.test")
            .await
            .unwrap()
            .unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "injected");
        assert!(bcrypt::verify("long-enough", &hash).unwrap());
        assert!(stored.two_fa_secret.is_none());

        let (status, _) = post_json(
            app.router(),
            "/api/auth/login",
            json!({ "email": "new.editor@example.test", "password": "long-enough" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_user_rejects_short_password_and_duplicates() {
        let app = test_app().await;
        let token = bearer(&app, "admin@example.test").await;

        let (status, _) = post_json(
            app.router(),
            "/api/admin/users",
            json!({ "email": "x@example.test", "role": "editor", "password": "short" }),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            app.router(),
            "/api/admin/users",
            json!({ "email": "EDITOR@example.test", "role": "editor" }),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_update_role_and_self_delete_guard() {
        let app = test_app().await;
        let token = bearer(&app, "admin@example.test").await;
        let editor = app.state.store.users.find_by_email("editor@example.test").await.unwrap().unwrap();
        let admin = app.state.store.users.find_by_email("admin@example.test").await.unwrap().unwrap();

        let (status, user) = request_json(
            app.router(),
            Method::PATCH,
            &format!("/api/admin/users/{}", editor.id),
            Some(json!({ "role": "jobs_manager" })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["role"], json!("jobs_manager"));

        let (status, _) = request_json(
            app.router(),
            Method::DELETE,
            &format!("/api/admin/users/{}", admin.id),
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = request_json(
            app.router(),
            Method::DELETE,
            &format!("/api/admin/users/{}", editor.id),
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
