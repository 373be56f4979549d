//! Content store records (one JSON collection per type).

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::blocks::ContentBlock;
use super::{Record, SingletonRecord};
use crate::error::{StoreError, StoreResult};

lazy_static! {
    /// Leading-slash path of lowercase, hyphenated segments; `/` is the home page.
    static ref SLUG_REGEX: Regex =
        Regex::new(r"^/(?:[a-z0-9]+(?:-[a-z0-9]+)*(?:/[a-z0-9]+(?:-[a-z0-9]+)*)*)?$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// Pages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn is_published(&self) -> bool {
        self.status == PageStatus::Published
    }
}

impl Record for Page {
    const COLLECTION: &'static str = "pages";
    const REQUIRED: &'static [&'static str] = &["title", "slug"];

    fn id(&self) -> &str {
        &self.id
    }

    fn defaults(_now: DateTime<Utc>) -> Map<String, Value> {
        object(json!({ "status": "draft", "blocks": [] }))
    }

    fn validate(&mut self) -> StoreResult<()> {
        if !is_valid_slug(&self.slug) {
            return Err(StoreError::invalid(
                "slug",
                "must start with '/' and contain only lowercase letters, numbers, hyphens and '/'",
            ));
        }
        for block in &mut self.blocks {
            if block.id.trim().is_empty() {
                block.id = Uuid::new_v4().to_string();
            }
        }
        Ok(())
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub department: String,
    pub location_type: String,
    #[serde(rename = "type")]
    pub employment_type: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub visible: bool,
    pub posted_date: NaiveDate,
    pub applicants: u32,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Job {
    const COLLECTION: &'static str = "jobs";
    const REQUIRED: &'static [&'static str] = &["title"];

    fn id(&self) -> &str {
        &self.id
    }

    fn defaults(now: DateTime<Utc>) -> Map<String, Value> {
        object(json!({
            "department": "General",
            "locationType": "onsite",
            "type": "full-time",
            "description": "",
            "requirements": [],
            "visible": true,
            "postedDate": now.date_naive(),
            "applicants": 0,
            "city": "",
            "country": "",
        }))
    }
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl Record for MediaItem {
    const COLLECTION: &'static str = "media";
    const REQUIRED: &'static [&'static str] = &["filename", "url"];
    const STAMPED: bool = false;

    fn id(&self) -> &str {
        &self.id
    }

    fn defaults(now: DateTime<Utc>) -> Map<String, Value> {
        object(json!({
            "type": "application/octet-stream",
            "size": 0,
            "uploadedAt": now,
        }))
    }
}

// ============================================================================
// Form submissions
// ============================================================================

/// A captured form payload. Everything the visitor sent lands in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub id: String,
    pub form_type: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record for FormSubmission {
    const COLLECTION: &'static str = "forms";
    const STAMPED: bool = false;

    fn id(&self) -> &str {
        &self.id
    }

    fn defaults(now: DateTime<Utc>) -> Map<String, Value> {
        object(json!({
            "formType": "contact",
            "status": "new",
            "submittedAt": now,
        }))
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    JobsManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::JobsManager => "jobs_manager",
        }
    }
}

/// Keys of [`User`] that never leave the server and are never taken from a
/// request body.
pub const SENSITIVE_USER_FIELDS: &[&str] =
    &["passwordHash", "resetToken", "resetExpires", "twoFASecret"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_expires: Option<DateTime<Utc>>,
    #[serde(
        rename = "twoFASecret",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub two_fa_secret: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    const REQUIRED: &'static [&'static str] = &["email", "role"];

    fn id(&self) -> &str {
        &self.id
    }

    fn defaults(_now: DateTime<Utc>) -> Map<String, Value> {
        object(json!({ "name": "" }))
    }

    fn validate(&mut self) -> StoreResult<()> {
        self.email = self.email.trim().to_lowercase();
        if !self.email.contains('@') {
            return Err(StoreError::invalid("email", "invalid email format"));
        }
        Ok(())
    }
}

/// A user with every credential field removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            two_factor_enabled: user.two_fa_secret.is_some(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// Singletons
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FooterLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FooterColumn {
    pub title: String,
    pub links: Vec<FooterLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettings {
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
    pub footer_columns: Vec<FooterColumn>,
    pub social_links: Vec<SocialLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudflare_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudflare_zone: Option<String>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Company Site".to_string(),
            tagline: String::new(),
            contact_email: String::new(),
            contact_phone: String::new(),
            address: String::new(),
            footer_columns: Vec::new(),
            social_links: Vec::new(),
            cloudflare_token: None,
            cloudflare_zone: None,
            updated_by: None,
            updated_at: None,
        }
    }
}

impl SiteSettings {
    /// Settings as shown to unauthenticated visitors.
    pub fn public_view(&self) -> Self {
        Self {
            cloudflare_token: None,
            cloudflare_zone: None,
            updated_by: None,
            ..self.clone()
        }
    }
}

impl SingletonRecord for SiteSettings {
    const NAME: &'static str = "settings";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub primary_color: String,
    pub accent_color: String,
    pub font_family: String,
    pub dark_mode: bool,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#1f4e79".to_string(),
            accent_color: "#f28c28".to_string(),
            font_family: "system-ui, sans-serif".to_string(),
            dark_mode: false,
            updated_by: None,
            updated_at: None,
        }
    }
}

impl SingletonRecord for Theme {
    const NAME: &'static str = "theme";
}
