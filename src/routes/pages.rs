/**
 * Page Routes
 * Admin CRUD for block-based pages, plus a staff preview of any draft
 */
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::access::{Action, Resource};
use crate::render::{self, BlockSet, Fragment};
use crate::routes::{authorize, ApiError, ListResponse, SuccessResponse};
use crate::state::AppState;
use crate::store::models::{Page, PageStatus};

#[derive(Debug, Deserialize)]
pub struct PageListQuery {
    pub status: Option<PageStatus>,
}

/// A page together with its rendered blocks.
#[derive(Debug, Serialize)]
pub struct RenderedPage {
    pub page: Page,
    pub fragments: Vec<Fragment>,
}

impl RenderedPage {
    pub fn new(page: Page, set: BlockSet) -> Self {
        let fragments = render::render_blocks_with(&page.blocks, set);
        Self { page, fragments }
    }
}

/// GET /api/admin/pages
pub async fn list_pages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageListQuery>,
) -> Result<Json<ListResponse<Page>>, ApiError> {
    authorize(&state, &headers, Resource::Pages, Action::Read)?;

    let mut pages = state.store.pages.list().await?;
    if let Some(status) = query.status {
        pages.retain(|p| p.status == status);
    }
    Ok(Json(pages.into()))
}

/// GET /api/admin/pages/{id}
pub async fn get_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Page>, ApiError> {
    authorize(&state, &headers, Resource::Pages, Action::Read)?;

    state
        .store
        .pages
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /api/admin/pages
pub async fn create_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers, Resource::Pages, Action::Write)?;

    if let Some(slug) = payload.get("slug").and_then(Value::as_str) {
        if state.store.pages.get_by_slug(slug).await?.is_some() {
            return Err(ApiError::Conflict(format!("Slug {} is already in use", slug)));
        }
    }

    let page = state.store.pages.create(payload, Some(&claims.email)).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// PATCH /api/admin/pages/{id}
pub async fn update_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Page>, ApiError> {
    let claims = authorize(&state, &headers, Resource::Pages, Action::Write)?;

    if let Some(slug) = payload.get("slug").and_then(Value::as_str) {
        if let Some(other) = state.store.pages.get_by_slug(slug).await? {
            if other.id != id {
                return Err(ApiError::Conflict(format!("Slug {} is already in use", slug)));
            }
        }
    }

    Ok(Json(state.store.pages.update(&id, payload, Some(&claims.email)).await?))
}

/// DELETE /api/admin/pages/{id}
pub async fn delete_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    authorize(&state, &headers, Resource::Pages, Action::Write)?;

    if !state.store.pages.delete(&id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/admin/pages/{id}/preview
/// Renders regardless of status.
pub async fn preview_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    authorize(&state, &headers, Resource::Pages, Action::Read)?;

    let page = state.store.pages.get_by_id(&id).await?.ok_or(ApiError::NotFound)?;
    let fragments = render::render_blocks_with(&page.blocks, state.config.block_set());
    let settings = state.store.settings.get().await?;
    let theme = state.store.theme.get().await?;
    Ok(Html(render::page::render_document(
        &page, &fragments, &settings, &theme,
    )))
}
