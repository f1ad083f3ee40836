use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Maximum characters in a single rich text span accepted by the API
pub const RICH_TEXT_LIMIT: usize = 2000;

/// Title property shared by the projects and notes databases
pub const NAME_PROPERTY: &str = "Name";
/// Note properties
pub const TYPE_PROPERTY: &str = "Type";
pub const TAGS_PROPERTY: &str = "Tags";
pub const PROJECT_PROPERTY: &str = "Project";
/// Project properties used by the project filter
pub const CREATED_PROPERTY: &str = "Created";
pub const TAG_PROPERTY: &str = "Tag";

const UNTITLED: &str = "Untitled";

// ===== Outgoing blocks =====

/// One structured content unit written to a page body.
///
/// Produced fresh by the markdown compiler on every push; there is no block
/// identity carried across syncs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Code { content: String, language: String },
    Equation { expression: String },
}

/// Paragraph-level text block: plain paragraphs, headings, list items,
/// to-dos and quotes all share this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphStyle {
    #[default]
    Plain,
    Heading1,
    Heading2,
    Heading3,
    BulletedListItem,
    NumberedListItem,
    ToDo { checked: bool },
    Quote,
}

impl ParagraphStyle {
    fn block_type(self) -> &'static str {
        match self {
            Self::Plain => "paragraph",
            Self::Heading1 => "heading_1",
            Self::Heading2 => "heading_2",
            Self::Heading3 => "heading_3",
            Self::BulletedListItem => "bulleted_list_item",
            Self::NumberedListItem => "numbered_list_item",
            Self::ToDo { .. } => "to_do",
            Self::Quote => "quote",
        }
    }
}

impl Paragraph {
    pub fn plain(text: &str) -> Self {
        Self {
            style: ParagraphStyle::Plain,
            rich_text: RichText::chunked(text, Annotations::default(), None),
        }
    }

    /// Concatenated text content, ignoring formatting
    pub fn plain_text(&self) -> String {
        self.rich_text.iter().map(|t| t.content.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

impl Annotations {
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// A run of text with uniform formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichText {
    pub content: String,
    pub annotations: Annotations,
    pub link: Option<String>,
}

impl RichText {
    /// Split `content` into spans that respect [`RICH_TEXT_LIMIT`]
    pub fn chunked(content: &str, annotations: Annotations, link: Option<&str>) -> Vec<Self> {
        let chars: Vec<char> = content.chars().collect();
        chars
            .chunks(RICH_TEXT_LIMIT)
            .map(|chunk| Self {
                content: chunk.iter().collect(),
                annotations,
                link: link.map(str::to_string),
            })
            .collect()
    }

    fn to_json(&self) -> Value {
        let link = self.link.as_ref().map(|url| json!({ "url": url }));
        json!({
            "type": "text",
            "text": {
                "content": self.content,
                "link": link,
            },
            "annotations": {
                "bold": self.annotations.bold,
                "italic": self.annotations.italic,
                "strikethrough": self.annotations.strikethrough,
                "underline": false,
                "code": self.annotations.code,
                "color": "default",
            },
        })
    }
}

impl Block {
    /// Serialize into the API's block object
    pub fn to_json(&self) -> Value {
        match self {
            Block::Paragraph(paragraph) => {
                let block_type = paragraph.style.block_type();
                let rich_text: Vec<Value> = paragraph.rich_text.iter().map(RichText::to_json).collect();
                let mut body = json!({ "rich_text": rich_text });
                if let ParagraphStyle::ToDo { checked } = paragraph.style {
                    body["checked"] = json!(checked);
                }
                let mut block = serde_json::Map::new();
                block.insert("object".to_string(), json!("block"));
                block.insert("type".to_string(), json!(block_type));
                block.insert(block_type.to_string(), body);
                Value::Object(block)
            }
            Block::Code { content, language } => {
                let rich_text: Vec<Value> = RichText::chunked(content, Annotations::default(), None)
                    .iter()
                    .map(RichText::to_json)
                    .collect();
                json!({
                    "object": "block",
                    "type": "code",
                    "code": {
                        "rich_text": rich_text,
                        "language": api_language(language),
                    },
                })
            }
            Block::Equation { expression } => json!({
                "object": "block",
                "type": "equation",
                "equation": { "expression": expression },
            }),
        }
    }
}

/// Map common fence shorthands onto the language names the API accepts
fn api_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    let mapped = match lower.as_str() {
        "" | "text" | "plaintext" | "txt" => "plain text",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "rs" => "rust",
        "sh" | "zsh" => "shell",
        "yml" => "yaml",
        "md" => "markdown",
        "c++" | "cpp" => "c++",
        "cs" | "csharp" => "c#",
        other => other,
    };
    mapped.to_string()
}

// ===== Pages and records =====

/// A page object as returned by database queries and page retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub object: String,
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl Page {
    pub fn is_page(&self) -> bool {
        self.object == "page"
    }

    /// Plain text of a title property, if any
    pub fn title(&self, property: &str) -> Option<String> {
        let fragments = self.properties.get(property)?.get("title")?.as_array()?;
        let title: String = fragments
            .iter()
            .filter_map(|f| f.get("plain_text").and_then(Value::as_str))
            .collect();
        let title = title.trim().to_string();
        if title.is_empty() {
            None
        } else {
            Some(title)
        }
    }

    pub fn select_name(&self, property: &str) -> Option<String> {
        self.properties
            .get(property)?
            .pointer("/select/name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn multi_select_names(&self, property: &str) -> Vec<String> {
        self.properties
            .get(property)
            .and_then(|p| p.get("multi_select"))
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|o| o.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn relation_ids(&self, property: &str) -> Vec<String> {
        self.properties
            .get(property)
            .and_then(|p| p.get("relation"))
            .and_then(Value::as_array)
            .map(|relations| {
                relations
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A record of the projects database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: String,
    pub title: String,
}

impl ProjectRecord {
    pub fn from_page(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            title: page.title(NAME_PROPERTY).unwrap_or_else(|| UNTITLED.to_string()),
        }
    }
}

/// A record of the notes database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    pub note_type: Option<String>,
    pub created: Option<String>,
    pub tags: Vec<String>,
    pub project_id: Option<String>,
}

impl NoteRecord {
    pub fn from_page(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            title: page.title(NAME_PROPERTY).unwrap_or_else(|| UNTITLED.to_string()),
            note_type: page.select_name(TYPE_PROPERTY),
            created: page.created_time.clone(),
            tags: page.multi_select_names(TAGS_PROPERTY),
            project_id: page.relation_ids(PROJECT_PROPERTY).into_iter().next(),
        }
    }
}

// ===== Incoming blocks =====

/// Rich text as read back from the API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteRichText {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub annotations: Annotations,
}

impl RemoteRichText {
    pub fn is_equation(&self) -> bool {
        self.kind == "equation"
    }
}

/// A child block of a page, as listed by the API
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawBlock")]
pub struct RemoteBlock {
    pub id: String,
    pub has_children: bool,
    pub kind: RemoteBlockKind,
}

#[derive(Debug, Clone)]
pub enum RemoteBlockKind {
    Paragraph(Vec<RemoteRichText>),
    Heading { level: u8, text: Vec<RemoteRichText> },
    BulletedListItem(Vec<RemoteRichText>),
    NumberedListItem(Vec<RemoteRichText>),
    ToDo { text: Vec<RemoteRichText>, checked: bool },
    Quote(Vec<RemoteRichText>),
    Callout(Vec<RemoteRichText>),
    Toggle(Vec<RemoteRichText>),
    Code { text: Vec<RemoteRichText>, language: String },
    Equation(String),
    Divider,
    ChildPage(String),
    Bookmark(String),
    Image { url: String, caption: Vec<RemoteRichText> },
    Unsupported(String),
}

#[derive(Deserialize)]
struct RawBlock {
    id: String,
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    has_children: bool,
    #[serde(flatten)]
    data: HashMap<String, Value>,
}

impl From<RawBlock> for RemoteBlock {
    fn from(raw: RawBlock) -> Self {
        let body = raw.data.get(&raw.block_type).cloned().unwrap_or(Value::Null);
        let text = || rich_text_field(&body, "rich_text");

        let kind = match raw.block_type.as_str() {
            "paragraph" => RemoteBlockKind::Paragraph(text()),
            "heading_1" => RemoteBlockKind::Heading { level: 1, text: text() },
            "heading_2" => RemoteBlockKind::Heading { level: 2, text: text() },
            "heading_3" => RemoteBlockKind::Heading { level: 3, text: text() },
            "bulleted_list_item" => RemoteBlockKind::BulletedListItem(text()),
            "numbered_list_item" => RemoteBlockKind::NumberedListItem(text()),
            "to_do" => RemoteBlockKind::ToDo {
                text: text(),
                checked: body.get("checked").and_then(Value::as_bool).unwrap_or(false),
            },
            "quote" => RemoteBlockKind::Quote(text()),
            "callout" => RemoteBlockKind::Callout(text()),
            "toggle" => RemoteBlockKind::Toggle(text()),
            "code" => RemoteBlockKind::Code {
                text: text(),
                language: body
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or("plain text")
                    .to_string(),
            },
            "equation" => RemoteBlockKind::Equation(
                body.get("expression").and_then(Value::as_str).unwrap_or_default().to_string(),
            ),
            "divider" => RemoteBlockKind::Divider,
            "child_page" => RemoteBlockKind::ChildPage(
                body.get("title").and_then(Value::as_str).unwrap_or(UNTITLED).to_string(),
            ),
            "bookmark" | "link_preview" | "embed" => RemoteBlockKind::Bookmark(
                body.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
            ),
            "image" => {
                // Either {"type": "external", "external": {"url"}} or {"type": "file", "file": {"url"}}
                let source = body.get("type").and_then(Value::as_str).unwrap_or("external");
                RemoteBlockKind::Image {
                    url: body
                        .get(source)
                        .and_then(|s| s.get("url"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    caption: rich_text_field(&body, "caption"),
                }
            }
            other => RemoteBlockKind::Unsupported(other.to_string()),
        };

        RemoteBlock {
            id: raw.id,
            has_children: raw.has_children,
            kind,
        }
    }
}

fn rich_text_field(body: &Value, field: &str) -> Vec<RemoteRichText> {
    body.get(field)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Paginated list envelope used by query and children endpoints
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_page() -> Page {
        serde_json::from_value(json!({
            "object": "page",
            "id": "note-1",
            "created_time": "2025-05-14T08:00:00.000Z",
            "properties": {
                "Name": { "title": [{ "plain_text": "Weekly " }, { "plain_text": "review" }] },
                "Type": { "select": { "name": "Meeting" } },
                "Tags": { "multi_select": [{ "name": "work" }, { "name": "q2" }] },
                "Project": { "relation": [{ "id": "proj-1" }] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_note_record_from_page() {
        let note = NoteRecord::from_page(&note_page());
        assert_eq!(note.id, "note-1");
        assert_eq!(note.title, "Weekly review");
        assert_eq!(note.note_type.as_deref(), Some("Meeting"));
        assert_eq!(note.created.as_deref(), Some("2025-05-14T08:00:00.000Z"));
        assert_eq!(note.tags, vec!["work", "q2"]);
        assert_eq!(note.project_id.as_deref(), Some("proj-1"));
    }

    #[test]
    fn test_records_default_to_untitled() {
        let page: Page = serde_json::from_value(json!({
            "object": "page",
            "id": "p",
            "properties": { "Name": { "title": [] } }
        }))
        .unwrap();
        assert_eq!(ProjectRecord::from_page(&page).title, "Untitled");
        let note = NoteRecord::from_page(&page);
        assert_eq!(note.title, "Untitled");
        assert!(note.tags.is_empty());
        assert_eq!(note.project_id, None);
    }

    #[test]
    fn test_paragraph_block_json() {
        let block = Block::Paragraph(Paragraph {
            style: ParagraphStyle::ToDo { checked: true },
            rich_text: vec![RichText {
                content: "ship it".to_string(),
                annotations: Annotations { bold: true, ..Default::default() },
                link: Some("https://example.com".to_string()),
            }],
        });
        let json = block.to_json();
        assert_eq!(json["type"], "to_do");
        assert_eq!(json["to_do"]["checked"], true);
        assert_eq!(json["to_do"]["rich_text"][0]["text"]["content"], "ship it");
        assert_eq!(json["to_do"]["rich_text"][0]["text"]["link"]["url"], "https://example.com");
        assert_eq!(json["to_do"]["rich_text"][0]["annotations"]["bold"], true);
    }

    #[test]
    fn test_code_block_json_maps_language() {
        let block = Block::Code {
            content: "print(1)".to_string(),
            language: "py".to_string(),
        };
        let json = block.to_json();
        assert_eq!(json["code"]["language"], "python");
        assert_eq!(json["code"]["rich_text"][0]["text"]["content"], "print(1)");
    }

    #[test]
    fn test_rich_text_chunked_respects_limit() {
        let long = "a".repeat(RICH_TEXT_LIMIT * 2 + 5);
        let spans = RichText::chunked(&long, Annotations::default(), None);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].content.len(), RICH_TEXT_LIMIT);
        assert_eq!(spans[2].content.len(), 5);
    }

    #[test]
    fn test_remote_block_parsing() {
        let block: RemoteBlock = serde_json::from_value(json!({
            "object": "block",
            "id": "b1",
            "type": "code",
            "has_children": false,
            "code": {
                "language": "rust",
                "rich_text": [{ "type": "text", "plain_text": "fn main() {}", "annotations": { "bold": false, "color": "default" } }]
            }
        }))
        .unwrap();
        assert_eq!(block.id, "b1");
        match block.kind {
            RemoteBlockKind::Code { text, language } => {
                assert_eq!(language, "rust");
                assert_eq!(text[0].plain_text, "fn main() {}");
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        let unknown: RemoteBlock = serde_json::from_value(json!({
            "id": "b2",
            "type": "synced_block",
            "synced_block": {}
        }))
        .unwrap();
        assert!(matches!(unknown.kind, RemoteBlockKind::Unsupported(ref t) if t == "synced_block"));
    }
}
