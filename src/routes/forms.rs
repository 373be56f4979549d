/**
 * Form Routes
 * Public contact / job application intake, and the admin inbox
 */
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::access::{Action, Resource};
use crate::notify::format_submission;
use crate::routes::{authorize, ApiError, ListResponse, SuccessResponse};
use crate::state::AppState;
use crate::store::models::FormSubmission;

/// Keys set by the server, never by the visitor.
const RESERVED_FIELDS: &[&str] = &["id", "formType", "status", "submittedAt", "jobTitle"];

/// Inbox fields staff may change.
const EDITABLE_FIELDS: &[&str] = &["status", "notes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    Contact,
    Application,
}

impl FormKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "contact" => Some(Self::Contact),
            "application" => Some(Self::Application),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Application => "application",
        }
    }

    fn required(&self) -> &'static [&'static str] {
        match self {
            Self::Contact => &["name", "email", "message"],
            Self::Application => &["name", "email", "jobId"],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormListQuery {
    pub form_type: Option<String>,
    pub status: Option<String>,
}

fn field_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Bump a job's applicant count. The submission is already stored, so a
/// failure here is logged rather than returned.
async fn count_applicant(state: &AppState, job_id: &str) {
    let counted = state
        .store
        .jobs
        .modify(job_id, None, |job| {
            job.applicants += 1;
            Ok(())
        })
        .await;
    if let Err(e) = counted {
        tracing::warn!(job_id, error = %e, "applicant count not updated");
    }
}

/// POST /api/forms/{kind}
pub async fn submit_form(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = FormKind::parse(&kind).ok_or(ApiError::NotFound)?;

    let mut fields: Map<String, Value> = payload
        .into_iter()
        .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
        .collect();

    for field in kind.required() {
        if field_str(&fields, field).is_none() {
            return Err(ApiError::BadRequest(format!("{} is required", field)));
        }
    }
    if !field_str(&fields, "email").is_some_and(|e| e.contains('@')) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }

    let title = match kind {
        FormKind::Contact => "New contact request".to_string(),
        FormKind::Application => {
            let job_id = field_str(&fields, "jobId").unwrap_or_default().to_string();
            let job = state
                .store
                .jobs
                .get_by_id(&job_id)
                .await?
                .filter(|j| j.visible)
                .ok_or_else(|| ApiError::BadRequest("Unknown job".to_string()))?;
            fields.insert("jobTitle".into(), json!(job.title));
            format!("New application: {}", job.title)
        }
    };

    let text = format_submission(&title, &fields);
    fields.insert("formType".into(), json!(kind.as_str()));
    let submission = state.store.forms.create(fields, None).await?;

    if kind == FormKind::Application {
        let job_id = field_str(&submission.fields, "jobId").unwrap_or_default();
        count_applicant(&state, job_id).await;
    }

    state.notifier.notify(&title, &text);
    tracing::info!(id = %submission.id, form_type = kind.as_str(), "form submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            id: submission.id,
        }),
    ))
}

/// GET /api/admin/forms
/// Newest submissions first.
pub async fn list_forms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FormListQuery>,
) -> Result<Json<ListResponse<FormSubmission>>, ApiError> {
    authorize(&state, &headers, Resource::Forms, Action::Read)?;

    let mut forms: Vec<FormSubmission> = state
        .store
        .forms
        .list()
        .await?
        .into_iter()
        .filter(|f| query.form_type.as_deref().is_none_or(|t| f.form_type == t))
        .filter(|f| query.status.as_deref().is_none_or(|s| f.status == s))
        .collect();
    forms.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(Json(forms.into()))
}

/// GET /api/admin/forms/{id}
pub async fn get_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FormSubmission>, ApiError> {
    authorize(&state, &headers, Resource::Forms, Action::Read)?;
    state
        .store
        .forms
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PATCH /api/admin/forms/{id}
pub async fn update_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<FormSubmission>, ApiError> {
    authorize(&state, &headers, Resource::Forms, Action::Write)?;

    let payload = payload
        .into_iter()
        .filter(|(key, _)| EDITABLE_FIELDS.contains(&key.as_str()))
        .collect();
    Ok(Json(state.store.forms.update(&id, payload, None).await?))
}

/// DELETE /api/admin/forms/{id}
pub async fn delete_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    authorize(&state, &headers, Resource::Forms, Action::Write)?;
    if !state.store.forms.delete(&id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}
