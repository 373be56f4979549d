/*!
 * Block Renderer
 * Turns a page's ordered block list into HTML fragments, one per block
 */
pub mod html;
pub mod page;

use serde::Serialize;
use thiserror::Error;

use crate::store::blocks::{
    Align, BlockContent, BlockStyles, Button, CallToAction, Cards, Columns, ContentBlock, Hero,
    Image, Link, ListItems, RichText, Testimonial, Text,
};
use html::{escape, link, safe_url, sanitize, text_with_breaks};

/// Rendered output of one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub block_id: String,
    pub kind: String,
    pub html: String,
}

/// Why a block produced no output. Never surfaced to visitors.
#[derive(Debug, Error, PartialEq)]
pub enum BlockError {
    #[error("unknown block type '{0}'")]
    UnknownType(String),

    #[error("malformed '{kind}' block: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("'{kind}' block has no {missing}")]
    Incomplete {
        kind: &'static str,
        missing: &'static str,
    },
}

// ============================================================================
// Style resolution
// ============================================================================

pub fn resolve_align(styles: &BlockStyles) -> Align {
    styles.align.unwrap_or_default()
}

/// Heading rank 1-6, default 2.
pub fn heading_level(styles: &BlockStyles) -> u8 {
    match styles.level {
        Some(level @ 1..=6) => level,
        _ => 2,
    }
}

/// Card grid width 1-6, default 3.
pub fn grid_columns(styles: &BlockStyles) -> u8 {
    match styles.columns {
        Some(columns @ 1..=6) => columns,
        _ => 3,
    }
}

fn classes(kind: &str, styles: &BlockStyles) -> String {
    format!("block block-{} align-{}", kind, resolve_align(styles).as_str())
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn button_link(l: &Link) -> Option<String> {
    let text = l.text.trim();
    if text.is_empty() {
        return None;
    }
    link(&l.url, text, "btn btn-primary")
}

// ============================================================================
// Dispatch
// ============================================================================

/// Block types the renderer dispatches on.
///
/// `Core` is hero, heading, paragraph, image, button, testimonial and cards.
/// `Extended` also renders list, cta, columns and richtext; under `Core`
/// those are skipped like any unknown type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockSet {
    #[default]
    Core,
    Extended,
}

impl BlockSet {
    pub fn includes(self, content: &BlockContent) -> bool {
        match content {
            BlockContent::List(_)
            | BlockContent::Cta(_)
            | BlockContent::Columns(_)
            | BlockContent::RichText(_) => self == BlockSet::Extended,
            _ => true,
        }
    }
}

/// Render one block with the core block set.
pub fn render_block(block: &ContentBlock) -> Result<Fragment, BlockError> {
    render_block_with(block, BlockSet::Core)
}

pub fn render_block_with(block: &ContentBlock, set: BlockSet) -> Result<Fragment, BlockError> {
    if !set.includes(&block.content) {
        return Err(BlockError::UnknownType(block.kind().to_string()));
    }
    let styles = &block.styles;
    let html = match &block.content {
        BlockContent::Hero(hero) => render_hero(hero, styles)?,
        BlockContent::Heading(text) => render_heading(text, styles)?,
        BlockContent::Paragraph(text) => render_paragraph(text, styles)?,
        BlockContent::Image(image) => render_image(image, styles)?,
        BlockContent::Button(button) => render_button(button, styles)?,
        BlockContent::List(list) => render_list(list, styles)?,
        BlockContent::Cards(cards) => render_cards(cards, styles)?,
        BlockContent::Cta(cta) => render_cta(cta, styles)?,
        BlockContent::Columns(columns) => render_columns(columns, styles)?,
        BlockContent::Testimonial(t) => render_testimonial(t, styles)?,
        BlockContent::RichText(rich) => render_richtext(rich, styles)?,
        BlockContent::Unknown { kind, .. } => return Err(BlockError::UnknownType(kind.clone())),
        BlockContent::Malformed { kind, reason, .. } => {
            return Err(BlockError::Malformed {
                kind: kind.clone(),
                reason: reason.clone(),
            })
        }
    };

    Ok(Fragment {
        block_id: block.id.clone(),
        kind: block.kind().to_string(),
        html,
    })
}

/// Render blocks in order with the core block set.
pub fn render_blocks(blocks: &[ContentBlock]) -> Vec<Fragment> {
    render_blocks_with(blocks, BlockSet::Core)
}

/// Render blocks in order. A block that cannot be rendered is logged and
/// skipped; the rest of the page still renders.
pub fn render_blocks_with(blocks: &[ContentBlock], set: BlockSet) -> Vec<Fragment> {
    blocks
        .iter()
        .filter_map(|block| match render_block_with(block, set) {
            Ok(fragment) => Some(fragment),
            Err(BlockError::UnknownType(kind)) => {
                tracing::debug!(block_id = %block.id, kind = %kind, "skipping unknown block type");
                None
            }
            Err(e) => {
                tracing::warn!(block_id = %block.id, error = %e, "skipping block");
                None
            }
        })
        .collect()
}

// ============================================================================
// Block types
// ============================================================================

fn render_hero(hero: &Hero, styles: &BlockStyles) -> Result<String, BlockError> {
    let title = hero.title.trim();
    if title.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "hero",
            missing: "title",
        });
    }

    let style = non_blank(&hero.background_image)
        .and_then(safe_url)
        .map(|url| format!(r#" style="background-image:url('{}')""#, escape(url)))
        .unwrap_or_default();

    let mut out = format!(
        r#"<section class="{}"{}><div class="hero-inner"><h1 class="hero-title">{}</h1>"#,
        classes("hero", styles),
        style,
        escape(title)
    );
    if let Some(subtitle) = non_blank(&hero.subtitle) {
        out.push_str(&format!(r#"<p class="hero-subtitle">{}</p>"#, escape(subtitle)));
    }
    if let Some(cta) = hero.cta.as_ref().and_then(button_link) {
        out.push_str(&cta);
    }
    out.push_str("</div></section>");
    Ok(out)
}

fn render_heading(text: &Text, styles: &BlockStyles) -> Result<String, BlockError> {
    let body = text.text.trim();
    if body.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "heading",
            missing: "text",
        });
    }
    let level = heading_level(styles);
    Ok(format!(
        r#"<h{level} class="{}">{}</h{level}>"#,
        classes("heading", styles),
        escape(body)
    ))
}

fn render_paragraph(text: &Text, styles: &BlockStyles) -> Result<String, BlockError> {
    if text.text.trim().is_empty() {
        return Err(BlockError::Incomplete {
            kind: "paragraph",
            missing: "text",
        });
    }
    Ok(format!(
        r#"<p class="{}">{}</p>"#,
        classes("paragraph", styles),
        text_with_breaks(&text.text)
    ))
}

fn render_image(image: &Image, styles: &BlockStyles) -> Result<String, BlockError> {
    if image.src.trim().is_empty() {
        return Err(BlockError::Incomplete {
            kind: "image",
            missing: "src",
        });
    }
    let src = safe_url(&image.src).ok_or_else(|| BlockError::Malformed {
        kind: "image".to_string(),
        reason: "unsupported image url".to_string(),
    })?;

    let mut out = format!(
        r#"<figure class="{}"><img src="{}" alt="{}" loading="lazy">"#,
        classes("image", styles),
        escape(src),
        escape(image.alt.as_deref().unwrap_or(""))
    );
    if let Some(caption) = non_blank(&image.caption) {
        out.push_str(&format!("<figcaption>{}</figcaption>", escape(caption)));
    }
    out.push_str("</figure>");
    Ok(out)
}

fn button_variant(variant: &Option<String>) -> &str {
    match non_blank(variant) {
        Some(v) if v.chars().all(|c| c.is_ascii_lowercase() || c == '-') => v,
        _ => "primary",
    }
}

fn render_button(button: &Button, styles: &BlockStyles) -> Result<String, BlockError> {
    if button.text.trim().is_empty() {
        return Err(BlockError::Incomplete {
            kind: "button",
            missing: "text",
        });
    }
    let class = format!("btn btn-{}", button_variant(&button.variant));
    let anchor = link(&button.url, button.text.trim(), &class).ok_or_else(|| {
        BlockError::Malformed {
            kind: "button".to_string(),
            reason: "missing or unsupported url".to_string(),
        }
    })?;
    Ok(format!(r#"<div class="{}">{}</div>"#, classes("button", styles), anchor))
}

fn render_list(list: &ListItems, styles: &BlockStyles) -> Result<String, BlockError> {
    let items: String = list
        .items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("<li>{}</li>", escape(item)))
        .collect();
    if items.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "list",
            missing: "items",
        });
    }
    let tag = if list.ordered { "ol" } else { "ul" };
    Ok(format!(
        r#"<{tag} class="{}">{}</{tag}>"#,
        classes("list", styles),
        items
    ))
}

fn render_cards(cards: &Cards, styles: &BlockStyles) -> Result<String, BlockError> {
    let mut body = String::new();
    for card in &cards.cards {
        let title = card.title.trim();
        if title.is_empty() {
            continue;
        }
        body.push_str(r#"<article class="card">"#);
        if let Some(icon) = non_blank(&card.icon) {
            body.push_str(&format!(r#"<span class="card-icon">{}</span>"#, escape(icon)));
        }
        let heading = card
            .url
            .as_deref()
            .and_then(|url| link(url, title, "card-link"))
            .unwrap_or_else(|| escape(title));
        body.push_str(&format!(r#"<h3 class="card-title">{}</h3>"#, heading));
        if !card.description.trim().is_empty() {
            body.push_str(&format!(
                r#"<p class="card-description">{}</p>"#,
                escape(card.description.trim())
            ));
        }
        body.push_str("</article>");
    }
    if body.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "cards",
            missing: "cards",
        });
    }
    Ok(format!(
        r#"<div class="{} grid cols-{}">{}</div>"#,
        classes("cards", styles),
        grid_columns(styles),
        body
    ))
}

fn render_cta(cta: &CallToAction, styles: &BlockStyles) -> Result<String, BlockError> {
    let title = cta.title.trim();
    if title.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "cta",
            missing: "title",
        });
    }
    let mut out = format!(
        r#"<section class="{}"><h2 class="cta-title">{}</h2>"#,
        classes("cta", styles),
        escape(title)
    );
    if let Some(description) = non_blank(&cta.description) {
        out.push_str(&format!(r#"<p class="cta-description">{}</p>"#, escape(description)));
    }
    if let Some(button) = cta.button.as_ref().and_then(button_link) {
        out.push_str(&button);
    }
    out.push_str("</section>");
    Ok(out)
}

fn render_columns(columns: &Columns, styles: &BlockStyles) -> Result<String, BlockError> {
    if columns.columns.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "columns",
            missing: "columns",
        });
    }
    let count = match styles.columns {
        Some(c @ 1..=6) => c as usize,
        _ => columns.columns.len().clamp(1, 6),
    };
    let body: String = columns
        .columns
        .iter()
        .map(|column| {
            let title = non_blank(&column.title)
                .map(|t| format!(r#"<h3 class="column-title">{}</h3>"#, escape(t)))
                .unwrap_or_default();
            format!(
                r#"<div class="column">{}<p>{}</p></div>"#,
                title,
                text_with_breaks(&column.text)
            )
        })
        .collect();
    Ok(format!(
        r#"<div class="{} grid cols-{}">{}</div>"#,
        classes("columns", styles),
        count,
        body
    ))
}

fn render_testimonial(t: &Testimonial, styles: &BlockStyles) -> Result<String, BlockError> {
    let quote = t.quote.trim();
    if quote.is_empty() {
        return Err(BlockError::Incomplete {
            kind: "testimonial",
            missing: "quote",
        });
    }
    let mut out = format!(
        r#"<blockquote class="{}"><p class="quote">{}</p>"#,
        classes("testimonial", styles),
        escape(quote)
    );
    let author = t.author.trim();
    if !author.is_empty() {
        out.push_str(&format!("<footer><cite>{}</cite>", escape(author)));
        if let Some(role) = non_blank(&t.role) {
            out.push_str(&format!(r#"<span class="role">{}</span>"#, escape(role)));
        }
        out.push_str("</footer>");
    }
    out.push_str("</blockquote>");
    Ok(out)
}

fn render_richtext(rich: &RichText, styles: &BlockStyles) -> Result<String, BlockError> {
    let clean = sanitize(&rich.html);
    if clean.trim().is_empty() {
        return Err(BlockError::Incomplete {
            kind: "richtext",
            missing: "content",
        });
    }
    Ok(format!(r#"<div class="{}">{}</div>"#, classes("richtext", styles), clean))
}
