/**
 * Settings Routes
 * Site-wide settings and theme singletons
 */
use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{Map, Value};

use crate::access::{Action, Resource};
use crate::routes::{authorize, ApiError};
use crate::state::AppState;
use crate::store::models::{SiteSettings, Theme};

lazy_static::lazy_static! {
    static ref HEX_COLOR: regex::Regex = regex::Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

/// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SiteSettings>, ApiError> {
    authorize(&state, &headers, Resource::Settings, Action::Read)?;
    Ok(Json(state.store.settings.get().await?))
}

/// PATCH /api/admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<SiteSettings>, ApiError> {
    let claims = authorize(&state, &headers, Resource::Settings, Action::Write)?;
    Ok(Json(state.store.settings.update(payload, Some(&claims.email)).await?))
}

/// GET /api/admin/theme
pub async fn get_theme(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Theme>, ApiError> {
    authorize(&state, &headers, Resource::Theme, Action::Read)?;
    Ok(Json(state.store.theme.get().await?))
}

/// PATCH /api/admin/theme
/// Colours must be `#rgb` or `#rrggbb`; they are written into a stylesheet.
pub async fn update_theme(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Theme>, ApiError> {
    let claims = authorize(&state, &headers, Resource::Theme, Action::Write)?;

    for key in ["primaryColor", "accentColor"] {
        if let Some(value) = payload.get(key) {
            if !value.as_str().is_some_and(|c| HEX_COLOR.is_match(c)) {
                return Err(ApiError::BadRequest(format!("{} must be a hex colour", key)));
            }
        }
    }
    if let Some(font) = payload.get("fontFamily").and_then(Value::as_str) {
        if font.contains(['<', '>', '{', '}', ';']) {
            return Err(ApiError::BadRequest("Invalid fontFamily".to_string()));
        }
    }

    Ok(Json(state.store.theme.update(payload, Some(&claims.email)).await?))
}
