use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::routes::ApiError;
use crate::state::AppState;
use crate::store::models::Page;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn w3c_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

fn sitemap_xml(base_url: &str, pages: &[Page]) -> String {
    let base_url = base_url.trim_end_matches('/');
    let mut urls = String::new();
    for page in pages {
        let loc = if page.slug == "/" {
            format!("{}/", base_url)
        } else {
            format!("{}{}", base_url, page.slug)
        };
        let priority = if page.slug == "/" { "1.0" } else { "0.8" };
        urls.push_str(&format!(
            "  <url>\n\
                 <loc>{}</loc>\n\
                 <lastmod>{}</lastmod>\n\
                 <priority>{}</priority>\n\
               </url>\n",
            escape_xml(&loc),
            w3c_date(&page.updated_at),
            priority,
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}</urlset>"#,
        urls
    )
}

/// GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut pages = state.store.pages.list_published().await?;
    pages.sort_by(|a, b| a.slug.cmp(&b.slug));
    let xml = sitemap_xml(&state.config.site_url, &pages);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        xml,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{get_text, object, test_app};
    use serde_json::json;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("<loc>"), "&lt;loc&gt;");
    }

    #[tokio::test]
    async fn test_sitemap_lists_only_published_pages() {
        let app = test_app().await;
        let pages = &app.state.store.pages;
        for (slug, status) in [("/", "published"), ("/services", "published"), ("/draft", "draft")] {
            pages
                .create(object(json!({ "title": slug, "slug": slug, "status": status })), None)
                .await
                .unwrap();
        }

        let (status, xml) = get_text(app.router(), "/sitemap.xml").await;

        assert_eq!(status, StatusCode::OK);
        assert!(xml.contains("<loc>https://example.test/</loc>"));
        assert!(xml.contains("<loc>https://example.test/services</loc>"));
        assert!(!xml.contains("/draft"));
        assert_eq!(xml.matches("<url>").count(), 2);
    }
}
