use futures_util::future::{BoxFuture, FutureExt};

use super::import::DEFAULT_CODE_LANGUAGE;
use crate::notion::{NotionError, RemoteBlock, RemoteBlockKind, RemoteRichText, RemoteStore};

/// Render a page's block tree as markdown.
///
/// An empty page renders as an empty string.
pub async fn page_to_markdown(store: &dyn RemoteStore, page_id: &str) -> Result<String, NotionError> {
    render_children(store, page_id.to_string()).await
}

/// Render the children of `block_id`, descending into nested blocks
fn render_children(store: &dyn RemoteStore, block_id: String) -> BoxFuture<'_, Result<String, NotionError>> {
    async move {
        let blocks = store.list_children(&block_id).await?;
        let mut parts: Vec<(String, bool)> = Vec::new();
        let mut number = 0;

        for block in &blocks {
            number = match block.kind {
                RemoteBlockKind::NumberedListItem(_) => number + 1,
                _ => 0,
            };

            let mut text = convert_block_to_markdown(block, number);

            if block.has_children && renders_children(&block.kind) {
                let children = render_children(store, block.id.clone()).await?;
                if !children.is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&indent(&children));
                }
            }

            if !text.is_empty() {
                parts.push((text, is_list_item(&block.kind)));
            }
        }

        Ok(join_blocks(&parts))
    }
    .boxed()
}

/// Convert a single block to Markdown
fn convert_block_to_markdown(block: &RemoteBlock, number: usize) -> String {
    match &block.kind {
        RemoteBlockKind::Paragraph(text) => rich_text_to_markdown(text),
        RemoteBlockKind::Heading { level, text } => {
            format!("{} {}", "#".repeat(*level as usize), rich_text_to_markdown(text))
        }
        RemoteBlockKind::BulletedListItem(text) => format!("- {}", rich_text_to_markdown(text)),
        RemoteBlockKind::NumberedListItem(text) => {
            format!("{}. {}", number, rich_text_to_markdown(text))
        }
        RemoteBlockKind::ToDo { text, checked } => {
            let marker = if *checked { "x" } else { " " };
            format!("- [{}] {}", marker, rich_text_to_markdown(text))
        }
        RemoteBlockKind::Quote(text) | RemoteBlockKind::Callout(text) => rich_text_to_markdown(text)
            .lines()
            .map(|line| format!("> {}", line))
            .collect::<Vec<_>>()
            .join("\n"),
        RemoteBlockKind::Toggle(text) => format!("- {}", rich_text_to_markdown(text)),
        RemoteBlockKind::Code { text, language } => convert_code(text, language),
        RemoteBlockKind::Equation(expression) => format!("$${}$$", expression.trim()),
        RemoteBlockKind::Divider => "---".to_string(),
        RemoteBlockKind::ChildPage(title) => format!("[[{}]]", title),
        RemoteBlockKind::Bookmark(url) if !url.is_empty() => format!("[{}]({})", url, url),
        RemoteBlockKind::Bookmark(_) => String::new(),
        RemoteBlockKind::Image { url, caption } if !url.is_empty() => {
            format!("![{}]({})", plain_text(caption), url)
        }
        RemoteBlockKind::Image { .. } => String::new(),
        RemoteBlockKind::Unsupported(block_type) => {
            log::debug!("Skipping unsupported block {} of type {}", block.id, block_type);
            String::new()
        }
    }
}

fn convert_code(text: &[RemoteRichText], language: &str) -> String {
    let code = plain_text(text);
    let language = if language == DEFAULT_CODE_LANGUAGE { "" } else { language };
    format!("```{}\n{}\n```", language, code)
}

/// Child pages carry their own content; everything else nests
fn renders_children(kind: &RemoteBlockKind) -> bool {
    !matches!(kind, RemoteBlockKind::ChildPage(_) | RemoteBlockKind::Unsupported(_))
}

fn is_list_item(kind: &RemoteBlockKind) -> bool {
    matches!(
        kind,
        RemoteBlockKind::BulletedListItem(_)
            | RemoteBlockKind::NumberedListItem(_)
            | RemoteBlockKind::ToDo { .. }
            | RemoteBlockKind::Toggle(_)
    )
}

/// Blank line between blocks, single newline between consecutive list items
fn join_blocks(parts: &[(String, bool)]) -> String {
    let mut output = String::new();
    for (i, (text, is_list)) in parts.iter().enumerate() {
        if i > 0 {
            let previous_is_list = parts[i - 1].1;
            output.push_str(if *is_list && previous_is_list { "\n" } else { "\n\n" });
        }
        output.push_str(text);
    }
    output
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("  {}", line) })
        .collect::<Vec<_>>()
        .join("\n")
}

fn plain_text(text: &[RemoteRichText]) -> String {
    text.iter().map(|t| t.plain_text.as_str()).collect()
}

/// Convert rich text spans to inline markdown
pub fn rich_text_to_markdown(text: &[RemoteRichText]) -> String {
    text.iter().map(convert_span).collect()
}

fn convert_span(span: &RemoteRichText) -> String {
    if span.is_equation() {
        return format!("${}$", span.plain_text.trim());
    }

    let annotations = span.annotations;
    let mut text = span.plain_text.clone();
    if annotations.code {
        text = wrap(&text, "`");
    }
    if annotations.bold {
        text = wrap(&text, "**");
    }
    if annotations.italic {
        text = wrap(&text, "*");
    }
    if annotations.strikethrough {
        text = wrap(&text, "~~");
    }
    match &span.href {
        Some(href) if !text.trim().is_empty() => format!("[{}]({})", text, href),
        _ => text,
    }
}

/// Wrap the non-whitespace core of `text` in `marker`, keeping surrounding
/// whitespace outside so the markers stay attached to the text
fn wrap(text: &str, marker: &str) -> String {
    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    format!("{}{}{}{}{}", &text[..start], marker, core, marker, &text[end..])
}
