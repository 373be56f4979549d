//! Full HTML documents around rendered fragments

use super::html::{escape, link};
use super::Fragment;
use crate::store::models::{Page, SiteSettings, Theme};

fn theme_css(theme: &Theme) -> String {
    // Theme values land inside a <style> element; keep only harmless characters.
    let css_value = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || " #,-.%()".contains(*c))
            .collect()
    };
    format!(
        ":root{{--color-primary:{};--color-accent:{};--font-body:{};}}",
        css_value(&theme.primary_color),
        css_value(&theme.accent_color),
        css_value(&theme.font_family)
    )
}

fn footer(settings: &SiteSettings) -> String {
    let mut out = String::from(r#"<footer class="site-footer">"#);

    for column in &settings.footer_columns {
        out.push_str(r#"<div class="footer-column">"#);
        if !column.title.trim().is_empty() {
            out.push_str(&format!("<h4>{}</h4>", escape(column.title.trim())));
        }
        out.push_str("<ul>");
        for l in &column.links {
            if let Some(a) = link(&l.url, &l.label, "footer-link") {
                out.push_str(&format!("<li>{}</li>", a));
            }
        }
        out.push_str("</ul></div>");
    }

    let social: String = settings
        .social_links
        .iter()
        .filter_map(|s| link(&s.url, &s.platform, "social-link"))
        .collect();
    if !social.is_empty() {
        out.push_str(&format!(r#"<div class="social">{}</div>"#, social));
    }

    let mut contact = Vec::new();
    if !settings.contact_email.trim().is_empty() {
        let email = settings.contact_email.trim();
        contact.push(
            link(&format!("mailto:{}", email), email, "contact-email")
                .unwrap_or_else(|| escape(email)),
        );
    }
    if !settings.contact_phone.trim().is_empty() {
        contact.push(escape(settings.contact_phone.trim()));
    }
    if !settings.address.trim().is_empty() {
        contact.push(escape(settings.address.trim()));
    }
    if !contact.is_empty() {
        out.push_str(&format!(r#"<p class="contact">{}</p>"#, contact.join(" · ")));
    }

    out.push_str(&format!(
        r#"<p class="copyright">&copy; {}</p></footer>"#,
        escape(&settings.site_name)
    ));
    out
}

fn document(
    title: &str,
    description: Option<&str>,
    body: &str,
    settings: &SiteSettings,
    theme: &Theme,
) -> String {
    let meta = description
        .map(|d| format!(r#"<meta name="description" content="{}">"#, escape(d)))
        .unwrap_or_default();
    let tagline = if settings.tagline.trim().is_empty() {
        String::new()
    } else {
        format!(r#"<span class="tagline">{}</span>"#, escape(settings.tagline.trim()))
    };
    let body_class = if theme.dark_mode { "theme-dark" } else { "theme-light" };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | {site}</title>
{meta}
<style>{css}</style>
</head>
<body class="{body_class}">
<header class="site-header"><a class="brand" href="/">{site}</a>{tagline}</header>
<main>
{body}
</main>
{footer}
</body>
</html>
"#,
        title = escape(title),
        site = escape(&settings.site_name),
        meta = meta,
        css = theme_css(theme),
        body_class = body_class,
        tagline = tagline,
        body = body,
        footer = footer(settings),
    )
}

/// A published page as a complete HTML document.
pub fn render_document(
    page: &Page,
    fragments: &[Fragment],
    settings: &SiteSettings,
    theme: &Theme,
) -> String {
    let body: Vec<&str> = fragments.iter().map(|f| f.html.as_str()).collect();
    document(
        &page.title,
        page.description.as_deref(),
        &body.join("\n"),
        settings,
        theme,
    )
}

pub fn render_not_found(settings: &SiteSettings, theme: &Theme) -> String {
    let body = r#"<section class="not-found"><h1>Page not found</h1><p><a href="/">Back to the home page</a></p></section>"#;
    document("Not found", None, body, settings, theme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{FooterColumn, FooterLink, PageStatus, SocialLink};
    use chrono::Utc;

    fn page() -> Page {
        let now = Utc::now();
        Page {
            id: "p1".into(),
            title: "About & Team".into(),
            slug: "/about-us".into(),
            status: PageStatus::Published,
            blocks: vec![],
            description: Some("Who we are".into()),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_document_contains_fragments_in_order() {
        let fragments = vec![
            Fragment {
                block_id: "a".into(),
                kind: "heading".into(),
                html: "<h1>First</h1>".into(),
            },
            Fragment {
                block_id: "b".into(),
                kind: "paragraph".into(),
                html: "<p>Second</p>".into(),
            },
        ];
        let html = render_document(&page(), &fragments, &SiteSettings::default(), &Theme::default());

        let first = html.find("<h1>First</h1>").unwrap();
        let second = html.find("<p>Second</p>").unwrap();
        assert!(first < second);
        assert!(html.contains("<title>About &amp; Team | Company Site</title>"));
        assert!(html.contains(r#"<meta name="description" content="Who we are">"#));
    }

    #[test]
    fn test_footer_renders_columns_and_social_links() {
        let settings = SiteSettings {
            contact_email: "hello@example.com".into(),
            footer_columns: vec![FooterColumn {
                title: "Company".into(),
                links: vec![
                    FooterLink {
                        label: "Careers".into(),
                        url: "/careers".into(),
                    },
                    FooterLink {
                        label: "Evil".into(),
                        url: "javascript:void(0)".into(),
                    },
                ],
            }],
            social_links: vec![SocialLink {
                platform: "LinkedIn".into(),
                url: "https://linkedin.com/company/example".into(),
            }],
            ..SiteSettings::default()
        };

        let html = footer(&settings);

        assert!(html.contains("<h4>Company</h4>"));
        assert!(html.contains(r#"href="/careers""#));
        assert!(!html.contains("javascript"));
        assert!(html.contains("LinkedIn"));
        assert!(html.contains("mailto:hello@example.com"));
    }

    #[test]
    fn test_theme_css_drops_markup() {
        let theme = Theme {
            primary_color: "red;}</style><script>".into(),
            ..Theme::default()
        };
        let css = theme_css(&theme);
        assert!(!css.contains('<'));
        assert!(css.contains("--color-primary:redstylescript;"));
    }

    #[test]
    fn test_not_found_page() {
        let html = render_not_found(&SiteSettings::default(), &Theme::default());
        assert!(html.contains("Page not found"));
    }
}
