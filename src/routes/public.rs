/**
 * Public Routes
 * The rendered marketing site and its read-only JSON API
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::render;
use crate::routes::pages::RenderedPage;
use crate::routes::{ApiError, ListResponse};
use crate::state::AppState;
use crate::store::models::{Job, Page, SiteSettings, Theme};

#[derive(Debug, Deserialize)]
pub struct SlugQuery {
    pub slug: String,
}

async fn published_by_slug(state: &AppState, slug: &str) -> Result<Option<Page>, ApiError> {
    Ok(state
        .store
        .pages
        .get_by_slug(slug)
        .await?
        .filter(Page::is_published))
}

async fn render_site_page(state: &AppState, slug: &str) -> Result<Response, ApiError> {
    let settings = state.store.settings.get().await?;
    let theme = state.store.theme.get().await?;

    match published_by_slug(state, slug).await? {
        Some(page) => {
            let fragments = render::render_blocks_with(&page.blocks, state.config.block_set());
            let html = render::page::render_document(&page, &fragments, &settings, &theme);
            Ok(Html(html).into_response())
        }
        None => {
            tracing::debug!(slug, "no published page");
            Ok((
                StatusCode::NOT_FOUND,
                Html(render::page::render_not_found(&settings, &theme)),
            )
                .into_response())
        }
    }
}

/// GET /
pub async fn home(State(state): State<AppState>) -> Result<Response, ApiError> {
    render_site_page(&state, "/").await
}

/// GET /{*path}
pub async fn site_page(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    render_site_page(&state, &format!("/{}", path)).await
}

/// GET /api/public/pages
pub async fn list_pages(State(state): State<AppState>) -> Result<Json<ListResponse<Page>>, ApiError> {
    Ok(Json(state.store.pages.list_published().await?.into()))
}

/// GET /api/public/pages/by-slug?slug=/about-us
pub async fn page_by_slug(
    State(state): State<AppState>,
    Query(query): Query<SlugQuery>,
) -> Result<Json<RenderedPage>, ApiError> {
    published_by_slug(&state, &query.slug).await?
        .map(|page| Json(RenderedPage::new(page, state.config.block_set())))
        .ok_or(ApiError::NotFound)
}

/// GET /api/public/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<ListResponse<Job>>, ApiError> {
    let mut jobs = state.store.jobs.list_visible().await?;
    jobs.sort_by(|a, b| b.posted_date.cmp(&a.posted_date));
    Ok(Json(jobs.into()))
}

/// GET /api/public/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .store
        .jobs
        .get_by_id(&id)
        .await?
        .filter(|j| j.visible)
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// GET /api/public/settings
pub async fn settings(State(state): State<AppState>) -> Result<Json<SiteSettings>, ApiError> {
    Ok(Json(state.store.settings.get().await?.public_view()))
}

/// GET /api/public/theme
pub async fn theme(State(state): State<AppState>) -> Result<Json<Theme>, ApiError> {
    let mut theme = state.store.theme.get().await?;
    theme.updated_by = None;
    Ok(Json(theme))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get_json, get_text, object, test_app, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    async fn seed_pages(app: &TestApp) {
        let pages = &app.state.store.pages;
        pages
            .create(
                object(json!({
                    "title": "Home",
                    "slug": "/",
                    "status": "published",
                    "blocks": [
                        { "type": "hero", "content": { "title": "We build <software>" } },
                        { "type": "carousel", "content": { "slides": [] } },
                        { "type": "paragraph", "content": "Reliable delivery." }
                    ]
                })),
                None,
            )
            .await
            .unwrap();
        pages
            .create(
                object(json!({ "title": "Cloud", "slug": "/services/cloud", "status": "published" })),
                None,
            )
            .await
            .unwrap();
        pages
            .create(object(json!({ "title": "Secret", "slug": "/secret" })), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_home_renders_published_blocks_and_skips_unknown() {
        let app = test_app().await;
        seed_pages(&app).await;

        let (status, html) = get_text(app.router(), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("We build &lt;software&gt;"));
        assert!(html.contains("Reliable delivery."));
        assert!(!html.contains("carousel"));
    }

    #[tokio::test]
    async fn test_nested_slug_and_drafts() {
        let app = test_app().await;
        seed_pages(&app).await;

        let (status, _) = get_text(app.router(), "/services/cloud").await;
        assert_eq!(status, StatusCode::OK);

        let (status, html) = get_text(app.router(), "/secret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(html.contains("Page not found"));

        let (status, _) = get_text(app.router(), "/services/cloud/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_public_page_api_hides_drafts() {
        let app = test_app().await;
        seed_pages(&app).await;

        let (status, list) = get_json(app.router(), "/api/public/pages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], json!(2));

        let (status, body) =
            get_json(app.router(), "/api/public/pages/by-slug?slug=/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"]["title"], json!("Home"));
        // Three stored blocks, one of an unknown type.
        assert_eq!(body["page"]["blocks"].as_array().unwrap().len(), 3);
        assert_eq!(body["fragments"].as_array().unwrap().len(), 2);

        let (status, _) =
            get_json(app.router(), "/api/public/pages/by-slug?slug=/secret", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_extended_blocks_render_only_when_enabled() {
        let mut app = test_app().await;
        app.state
            .store
            .pages
            .create(
                object(json!({
                    "title": "Services",
                    "slug": "/services",
                    "status": "published",
                    "blocks": [
                        { "type": "heading", "content": "Services" },
                        { "type": "list", "content": { "items": ["Cloud", "Data"] } }
                    ]
                })),
                None,
            )
            .await
            .unwrap();
        let uri = "/api/public/pages/by-slug?slug=/services";

        let (_, body) = get_json(app.router(), uri, None).await;
        assert_eq!(body["fragments"].as_array().unwrap().len(), 1);

        std::sync::Arc::make_mut(&mut app.state.config).extended_blocks = true;
        let (_, body) = get_json(app.router(), uri, None).await;
        assert_eq!(body["fragments"].as_array().unwrap().len(), 2);
        assert_eq!(body["fragments"][1]["kind"], json!("list"));
    }

    #[tokio::test]
    async fn test_public_jobs_only_visible() {
        let app = test_app().await;
        let jobs = &app.state.store.jobs;
        jobs.create(object(json!({ "title": "Open" })), None).await.unwrap();
        let hidden = jobs
            .create(object(json!({ "title": "Closed", "visible": false })), None)
            .await
            .unwrap();

        let (status, list) = get_json(app.router(), "/api/public/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], json!(1));
        assert_eq!(list["items"][0]["title"], json!("Open"));

        let (status, _) =
            get_json(app.router(), &format!("/api/public/jobs/{}", hidden.id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
