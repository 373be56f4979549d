/**
 * Job Routes
 * Admin CRUD for vacancies
 */
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::access::{Action, Resource};
use crate::routes::{authorize, ApiError, ListResponse, SuccessResponse};
use crate::state::AppState;
use crate::store::models::Job;

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub visible: Option<bool>,
    pub department: Option<String>,
}

/// GET /api/admin/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<JobListQuery>,
) -> Result<Json<ListResponse<Job>>, ApiError> {
    authorize(&state, &headers, Resource::Jobs, Action::Read)?;

    let jobs = state
        .store
        .jobs
        .list()
        .await?
        .into_iter()
        .filter(|j| query.visible.is_none_or(|v| j.visible == v))
        .filter(|j| {
            query
                .department
                .as_deref()
                .is_none_or(|d| j.department.eq_ignore_ascii_case(d))
        })
        .collect::<Vec<_>>();
    Ok(Json(jobs.into()))
}

/// GET /api/admin/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    authorize(&state, &headers, Resource::Jobs, Action::Read)?;
    state
        .store
        .jobs
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /api/admin/jobs
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers, Resource::Jobs, Action::Write)?;
    let job = state.store.jobs.create(payload, Some(&claims.email)).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// PATCH /api/admin/jobs/{id}
pub async fn update_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Job>, ApiError> {
    let claims = authorize(&state, &headers, Resource::Jobs, Action::Write)?;
    Ok(Json(state.store.jobs.update(&id, payload, Some(&claims.email)).await?))
}

/// DELETE /api/admin/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    authorize(&state, &headers, Resource::Jobs, Action::Write)?;
    if !state.store.jobs.delete(&id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{bearer, get_json, post_json, request_json, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_jobs_manager_manages_jobs() {
        let app = test_app().await;
        let token = bearer(&app, "jobs@example.test").await;

        let (status, job) = post_json(
            app.router(),
            "/api/admin/jobs",
            json!({ "title": "Backend Engineer", "department": "Engineering" }),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(job["visible"], json!(true));
        assert_eq!(job["applicants"], json!(0));
        assert_eq!(job["type"], json!("full-time"));
        let uri = format!("/api/admin/jobs/{}", job["id"].as_str().unwrap());

        let (status, job) = request_json(
            app.router(),
            Method::PATCH,
            &uri,
            Some(json!({ "visible": false })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["visible"], json!(false));
        assert_eq!(job["title"], json!("Backend Engineer"));

        let (_, list) = get_json(app.router(), "/api/admin/jobs?visible=false", Some(&token)).await;
        assert_eq!(list["total"], json!(1));
        let (_, list) = get_json(app.router(), "/api/admin/jobs?visible=true", Some(&token)).await;
        assert_eq!(list["total"], json!(0));

        let (status, _) = request_json(app.router(), Method::DELETE, &uri, None, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = request_json(app.router(), Method::DELETE, &uri, None, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_job_requires_title() {
        let app = test_app().await;
        let token = bearer(&app, "admin@example.test").await;
        let (status, body) = post_json(
            app.router(),
            "/api/admin/jobs",
            json!({ "department": "Sales" }),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Missing required field"));
    }
}
