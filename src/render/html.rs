//! HTML helpers for block rendering

/// Escape text for an HTML text node or a quoted attribute.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Accept a link target only for web, mail and phone schemes or site-relative
/// paths. Returns the trimmed URL.
pub fn safe_url(url: &str) -> Option<&str> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let lower = url.to_ascii_lowercase();
    let allowed = lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || (url.starts_with('/') && !url.starts_with("//"))
        || url.starts_with('#');
    allowed.then_some(url)
}

/// Sanitize editor-supplied HTML.
pub fn sanitize(html: &str) -> String {
    ammonia::clean(html)
}

/// `<a href="..">text</a>`, or `None` when the URL is not safe.
pub fn link(url: &str, text: &str, class: &str) -> Option<String> {
    let href = safe_url(url)?;
    let external = href.starts_with("http://") || href.starts_with("https://");
    Some(if external {
        format!(
            r#"<a class="{}" href="{}" target="_blank" rel="noopener">{}</a>"#,
            class,
            escape(href),
            escape(text)
        )
    } else {
        format!(r#"<a class="{}" href="{}">{}</a>"#, class, escape(href), escape(text))
    })
}

/// Text with line breaks kept.
pub fn text_with_breaks(s: &str) -> String {
    escape(s.trim()).replace('\n', "<br>")
}
