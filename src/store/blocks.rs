//! Page content blocks.
//!
//! Blocks are stored as `{ id, type, content, styles }`. On load the `content`
//! payload is decoded into a [`BlockContent`] variant chosen by `type`. A block
//! whose type is unknown, or whose payload does not fit its type, still loads
//! and keeps its raw JSON, so one bad block never makes a page unreadable.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlock", into = "RawBlock")]
pub struct ContentBlock {
    pub id: String,
    pub content: BlockContent,
    pub styles: BlockStyles,
}

impl ContentBlock {
    pub fn new(id: impl Into<String>, content: BlockContent) -> Self {
        Self {
            id: id.into(),
            content,
            styles: BlockStyles::default(),
        }
    }

    pub fn with_styles(mut self, styles: BlockStyles) -> Self {
        self.styles = styles;
        self
    }

    pub fn kind(&self) -> &str {
        self.content.kind()
    }
}

/// Storage shape of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    styles: Value,
}

impl From<RawBlock> for ContentBlock {
    fn from(raw: RawBlock) -> Self {
        Self {
            id: raw.id,
            content: BlockContent::decode(&raw.kind, raw.content),
            styles: BlockStyles::from_value(&raw.styles),
        }
    }
}

impl From<ContentBlock> for RawBlock {
    fn from(block: ContentBlock) -> Self {
        let styles = if block.styles.is_empty() {
            Value::Null
        } else {
            block.styles.to_value()
        };
        Self {
            id: block.id,
            kind: block.content.kind().to_string(),
            content: block.content.encode(),
            styles,
        }
    }
}

// ============================================================================
// Styles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Align::Left),
            "center" | "centre" => Some(Align::Center),
            "right" => Some(Align::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// Per-block presentation overrides. Values that cannot be understood are
/// treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockStyles {
    pub align: Option<Align>,
    pub level: Option<u8>,
    pub columns: Option<u8>,
}

impl BlockStyles {
    pub fn is_empty(&self) -> bool {
        self.align.is_none() && self.level.is_none() && self.columns.is_none()
    }

    fn from_value(value: &Value) -> Self {
        let small_int = |key: &str| {
            let v = value.get(key)?;
            let n = v
                .as_u64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))?;
            u8::try_from(n).ok()
        };
        Self {
            align: value.get("align").and_then(Value::as_str).and_then(Align::parse),
            level: small_int("level"),
            columns: small_int("columns"),
        }
    }

    fn to_value(self) -> Value {
        let mut map = Map::new();
        if let Some(align) = self.align {
            map.insert("align".into(), Value::from(align.as_str()));
        }
        if let Some(level) = self.level {
            map.insert("level".into(), Value::from(level));
        }
        if let Some(columns) = self.columns {
            map.insert("columns".into(), Value::from(columns));
        }
        Value::Object(map)
    }
}

// ============================================================================
// Content payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, alias = "label")]
    pub text: String,
    #[serde(default, alias = "href", alias = "link")]
    pub url: String,
}

/// A link the block can live without: anything that is not a link object
/// decodes as absent instead of failing the whole block.
fn optional_link<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Link>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hero {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_link",
        skip_serializing_if = "Option::is_none"
    )]
    pub cta: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextRepr {
    Plain(String),
    Object {
        #[serde(alias = "content")]
        text: String,
    },
}

/// Body of `heading` and `paragraph` blocks: either a bare string or `{ text }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TextRepr", into = "String")]
pub struct Text {
    pub text: String,
}

impl From<TextRepr> for Text {
    fn from(repr: TextRepr) -> Self {
        match repr {
            TextRepr::Plain(text) | TextRepr::Object { text } => Text { text },
        }
    }
}

impl From<Text> for String {
    fn from(t: Text) -> Self {
        t.text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(alias = "url")]
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    #[serde(alias = "label")]
    pub text: String,
    #[serde(alias = "href", alias = "link")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItems {
    pub items: Vec<String>,
    #[serde(default)]
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cards {
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToAction {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        alias = "cta",
        deserialize_with = "optional_link",
        skip_serializing_if = "Option::is_none"
    )]
    pub button: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "content")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub quote: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HtmlRepr {
    Plain(String),
    Object {
        #[serde(alias = "content", alias = "text")]
        html: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "HtmlRepr", into = "String")]
pub struct RichText {
    pub html: String,
}

impl From<HtmlRepr> for RichText {
    fn from(repr: HtmlRepr) -> Self {
        match repr {
            HtmlRepr::Plain(html) | HtmlRepr::Object { html } => RichText { html },
        }
    }
}

impl From<RichText> for String {
    fn from(r: RichText) -> Self {
        r.html
    }
}

/// Typed block payload, keyed by the stored `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Hero(Hero),
    Heading(Text),
    Paragraph(Text),
    Image(Image),
    Button(Button),
    List(ListItems),
    Cards(Cards),
    Cta(CallToAction),
    Columns(Columns),
    Testimonial(Testimonial),
    RichText(RichText),
    /// A type this build does not know about.
    Unknown { kind: String, content: Value },
    /// A known type whose payload could not be decoded.
    Malformed {
        kind: String,
        content: Value,
        reason: String,
    },
}

fn typed<T: DeserializeOwned>(
    kind: &str,
    content: Value,
    wrap: fn(T) -> BlockContent,
) -> BlockContent {
    match serde_json::from_value::<T>(content.clone()) {
        Ok(payload) => wrap(payload),
        Err(e) => BlockContent::Malformed {
            kind: kind.to_string(),
            content,
            reason: e.to_string(),
        },
    }
}

impl BlockContent {
    pub fn decode(kind: &str, content: Value) -> Self {
        match kind {
            "hero" => typed(kind, content, BlockContent::Hero),
            "heading" => typed(kind, content, BlockContent::Heading),
            "paragraph" => typed(kind, content, BlockContent::Paragraph),
            "image" => typed(kind, content, BlockContent::Image),
            "button" => typed(kind, content, BlockContent::Button),
            "list" => typed(kind, content, BlockContent::List),
            "cards" => typed(kind, content, BlockContent::Cards),
            "cta" => typed(kind, content, BlockContent::Cta),
            "columns" => typed(kind, content, BlockContent::Columns),
            "testimonial" => typed(kind, content, BlockContent::Testimonial),
            "richtext" => typed(kind, content, BlockContent::RichText),
            _ => BlockContent::Unknown {
                kind: kind.to_string(),
                content,
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            BlockContent::Hero(_) => "hero",
            BlockContent::Heading(_) => "heading",
            BlockContent::Paragraph(_) => "paragraph",
            BlockContent::Image(_) => "image",
            BlockContent::Button(_) => "button",
            BlockContent::List(_) => "list",
            BlockContent::Cards(_) => "cards",
            BlockContent::Cta(_) => "cta",
            BlockContent::Columns(_) => "columns",
            BlockContent::Testimonial(_) => "testimonial",
            BlockContent::RichText(_) => "richtext",
            BlockContent::Unknown { kind, .. } | BlockContent::Malformed { kind, .. } => {
                kind.as_str()
            }
        }
    }

    fn encode(&self) -> Value {
        let encoded = match self {
            BlockContent::Hero(p) => serde_json::to_value(p),
            BlockContent::Heading(p) | BlockContent::Paragraph(p) => serde_json::to_value(p),
            BlockContent::Image(p) => serde_json::to_value(p),
            BlockContent::Button(p) => serde_json::to_value(p),
            BlockContent::List(p) => serde_json::to_value(p),
            BlockContent::Cards(p) => serde_json::to_value(p),
            BlockContent::Cta(p) => serde_json::to_value(p),
            BlockContent::Columns(p) => serde_json::to_value(p),
            BlockContent::Testimonial(p) => serde_json::to_value(p),
            BlockContent::RichText(p) => serde_json::to_value(p),
            BlockContent::Unknown { content, .. } | BlockContent::Malformed { content, .. } => {
                return content.clone()
            }
        };
        encoded.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(value: Value) -> ContentBlock {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_heading_accepts_plain_string_content() {
        let b = block(json!({ "type": "heading", "content": "About Us", "styles": { "level": 1 } }));
        assert_eq!(
            b.content,
            BlockContent::Heading(Text {
                text: "About Us".to_string()
            })
        );
        assert_eq!(b.styles.level, Some(1));
    }

    #[test]
    fn test_paragraph_accepts_object_content() {
        let b = block(json!({ "id": "p1", "type": "paragraph", "content": { "text": "Hello" } }));
        assert!(matches!(b.content, BlockContent::Paragraph(ref t) if t.text == "Hello"));
    }

    #[test]
    fn test_hero_cta_is_optional() {
        let b = block(json!({
            "type": "hero",
            "content": { "title": "We build software", "subtitle": "Since 2010" }
        }));
        match b.content {
            BlockContent::Hero(hero) => {
                assert_eq!(hero.title, "We build software");
                assert!(hero.cta.is_none());
            }
            other => panic!("expected hero, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_hero_cta_keeps_hero() {
        let b = block(json!({
            "type": "hero",
            "content": { "title": "We build software", "cta": { "text": "Go" } }
        }));
        match b.content {
            BlockContent::Hero(hero) => {
                assert_eq!(hero.title, "We build software");
                let cta = hero.cta.unwrap();
                assert_eq!(cta.text, "Go");
                assert!(cta.url.is_empty());
            }
            other => panic!("expected hero, got {:?}", other),
        }

        let b = block(json!({ "type": "hero", "content": { "title": "Hi", "cta": "Go" } }));
        assert!(matches!(b.content, BlockContent::Hero(ref h) if h.cta.is_none()));
    }

    #[test]
    fn test_testimonial_without_author_decodes() {
        let b = block(json!({ "type": "testimonial", "content": { "quote": "Great team" } }));
        match b.content {
            BlockContent::Testimonial(t) => {
                assert_eq!(t.quote, "Great team");
                assert!(t.author.is_empty());
            }
            other => panic!("expected testimonial, got {:?}", other),
        }
    }

    #[test]
    fn test_untitled_card_does_not_break_cards() {
        let b = block(json!({
            "type": "cards",
            "content": { "cards": [{ "title": "Cloud" }, { "description": "no title" }] }
        }));
        match b.content {
            BlockContent::Cards(cards) => {
                assert_eq!(cards.cards.len(), 2);
                assert_eq!(cards.cards[0].title, "Cloud");
                assert!(cards.cards[1].title.is_empty());
            }
            other => panic!("expected cards, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_keeps_raw_content() {
        let raw = json!({ "id": "x", "type": "carousel", "content": { "slides": [1, 2] } });
        let b = block(raw.clone());

        assert!(matches!(b.content, BlockContent::Unknown { ref kind, .. } if kind == "carousel"));
        assert_eq!(serde_json::to_value(&b).unwrap(), raw);
    }

    #[test]
    fn test_malformed_payload_is_captured_not_rejected() {
        let raw = json!({ "id": "t", "type": "testimonial", "content": { "quote": 42 } });
        let b = block(raw.clone());

        assert!(matches!(b.content, BlockContent::Malformed { ref kind, .. } if kind == "testimonial"));
        assert_eq!(serde_json::to_value(&b).unwrap(), raw);
    }

    #[test]
    fn test_missing_type_is_unknown() {
        let b = block(json!({ "id": "?", "content": "text" }));
        assert!(matches!(b.content, BlockContent::Unknown { ref kind, .. } if kind.is_empty()));
    }

    #[test]
    fn test_unreadable_styles_are_ignored() {
        let b = block(json!({
            "type": "cards",
            "content": { "cards": [] },
            "styles": { "align": "diagonal", "columns": "4", "level": -3 }
        }));
        assert_eq!(b.styles.align, None);
        assert_eq!(b.styles.columns, Some(4));
        assert_eq!(b.styles.level, None);
    }

    #[test]
    fn test_button_accepts_label_and_href_aliases() {
        let b = block(json!({ "type": "button", "content": { "label": "Contact", "href": "/contact" } }));
        match b.content {
            BlockContent::Button(button) => {
                assert_eq!(button.text, "Contact");
                assert_eq!(button.url, "/contact");
            }
            other => panic!("expected button, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_styles_are_not_serialized() {
        let b = ContentBlock::new("h", BlockContent::Heading(Text { text: "Hi".into() }));
        let value = serde_json::to_value(&b).unwrap();
        assert!(value.get("styles").is_none());
        assert_eq!(value["content"], json!("Hi"));
        assert_eq!(value["type"], json!("heading"));
    }
}
