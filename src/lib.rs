//! Site CMS - content store, block renderer and the HTTP service around them

pub mod access;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod render;
pub mod routes;
pub mod state;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use config::{AdminPassword, AppConfig, DEFAULT_JWT_SECRET};
use error::{StoreError, StoreResult};
use state::AppState;
use store::ContentStore;

/// Extra room for multipart framing and the metadata fields.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local admin frontend.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

fn admin_routes() -> Router<AppState> {
    use routes::{forms, jobs, media, pages, settings, users};

    Router::new()
        .route("/pages", get(pages::list_pages).post(pages::create_page))
        .route(
            "/pages/{id}",
            get(pages::get_page)
                .patch(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/pages/{id}/preview", get(pages::preview_page))
        .route("/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/jobs/{id}",
            get(jobs::get_job).patch(jobs::update_job).delete(jobs::delete_job),
        )
        .route("/media", get(media::list_media).post(media::upload_media))
        .route(
            "/media/{id}",
            get(media::get_media)
                .patch(media::update_media)
                .delete(media::delete_media),
        )
        .route("/forms", get(forms::list_forms))
        .route(
            "/forms/{id}",
            get(forms::get_form)
                .patch(forms::update_form)
                .delete(forms::delete_form),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/settings",
            get(settings::get_settings).patch(settings::update_settings),
        )
        .route("/theme", get(settings::get_theme).patch(settings::update_theme))
}

fn public_api_routes() -> Router<AppState> {
    use routes::public;

    Router::new()
        .route("/pages", get(public::list_pages))
        .route("/pages/by-slug", get(public::page_by_slug))
        .route("/jobs", get(public::list_jobs))
        .route("/jobs/{id}", get(public::get_job))
        .route("/settings", get(public::settings))
        .route("/theme", get(public::theme))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_SLACK;

    let mut app = Router::new()
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/forgot-password", post(routes::auth::forgot_password))
        .route("/api/auth/reset-password", post(routes::auth::reset_password))
        .nest("/api/admin", admin_routes())
        .nest("/api/public", public_api_routes())
        .route("/api/forms/{kind}", post(routes::forms::submit_form))
        .route("/sitemap.xml", get(routes::sitemap::sitemap))
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .route("/", get(routes::public::home))
        .route("/{*path}", get(routes::public::site_page));

    let prefix = state.config.upload_url_prefix.trim_end_matches('/');
    if prefix.starts_with('/') && prefix.len() > 1 && !prefix.contains(['{', '}']) {
        app = app.nest_service(prefix, ServeDir::new(&state.config.upload_dir));
    } else {
        tracing::warn!(prefix, "upload URL prefix is not a mountable path; uploads are not served");
    }

    app.with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

/// Seed the first admin account when no user exists yet.
/// Returns whether a user was created.
pub async fn ensure_admin_user(store: &ContentStore, config: &AppConfig) -> StoreResult<bool> {
    if !store.users.list().await?.is_empty() {
        return Ok(false);
    }

    let password_hash = match &config.admin_password {
        AdminPassword::Hashed(hash) => hash.clone(),
        AdminPassword::Plain(password) => {
            let password = password.clone();
            tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| StoreError::invalid("passwordHash", e.to_string()))?
                .map_err(|e| StoreError::invalid("passwordHash", e.to_string()))?
        }
    };

    let mut admin = serde_json::Map::new();
    admin.insert("email".into(), json!(config.admin_email));
    admin.insert("name".into(), json!("Administrator"));
    admin.insert("role".into(), json!("admin"));
    admin.insert("passwordHash".into(), json!(password_hash));
    let user = store.users.create(admin, None).await?;
    tracing::info!(email = %user.email, "seeded admin user");
    Ok(true)
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    let config = AppConfig::default();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(&config.environment);

    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    if config.is_production() {
        if config.jwt_secret.is_empty() || config.jwt_secret == DEFAULT_JWT_SECRET {
            panic!(
                "FATAL: JWT_SECRET must be set to a secure, unique value in production. \
                 Refusing to start with the default secret."
            );
        }

        if config.admin_email == "admin@example.com" {
            tracing::warn!(
                "SECURITY: ADMIN_EMAIL is using an insecure default. \
                 Set ADMIN_EMAIL env var to a real address."
            );
        }
        if matches!(&config.admin_password, AdminPassword::Plain(p) if p == "admin123") {
            tracing::warn!(
                "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
                 The fallback default password 'admin123' is insecure. \
                 Set ADMIN_HASH_PASSWORD to a bcrypt hash of a strong password."
            );
        }
    }

    tracing::info!(data_dir = %config.data_dir.display(), "opening content store");
    let store = ContentStore::open(&config.data_dir);
    if let Err(e) = store.ping().await {
        tracing::error!(error = %e, "content store is not readable");
    }
    match ensure_admin_user(&store, &config).await {
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "failed to seed admin user"),
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST/PORT configuration");

    let app = create_app(AppState::new(store, config));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_ensure_admin_user_seeds_once() {
        let store = ContentStore::in_memory();
        let mut config = AppConfig::for_tests(PathBuf::from("uploads"));
        config.admin_password = AdminPassword::Hashed(bcrypt::hash("s3cret-pass", 4).unwrap());

        assert!(ensure_admin_user(&store, &config).await.unwrap());
        assert!(!ensure_admin_user(&store, &config).await.unwrap());

        let users = store.users.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "admin@example.test");
        assert_eq!(users[0].role, store::models::Role::Admin);
        assert!(bcrypt::verify("s3cret-pass", users[0].password_hash.as_deref().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn test_uploaded_files_are_served() {
        let app = routes::test_support::test_app().await;
        std::fs::write(app.upload_dir.path().join("hello.txt"), "hi").unwrap();

        let (status, body) = routes::test_support::get_text(app.router(), "/uploads/hello.txt").await;

        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(body, "hi");
    }
}
