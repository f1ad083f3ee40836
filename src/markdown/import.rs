use std::sync::OnceLock;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;

use super::sanitize::normalize_inline_math_str;
use crate::notion::{Annotations, Block, Paragraph, ParagraphStyle, RichText};

/// Language recorded for fences opened without a tag
pub const DEFAULT_CODE_LANGUAGE: &str = "plain text";

const FENCE: &str = "```";

/// Whole-line display equation: `$$...$$`
fn block_equation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\$(.*?)\$\$$").expect("block equation pattern is valid"))
}

/// Result of compiling a markdown body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledMarkdown {
    pub blocks: Vec<Block>,
    /// A fence was still open at end of input; its buffered lines were dropped
    pub unterminated_fence: bool,
}

/// Line classifier state
#[derive(Debug)]
enum State {
    Normal,
    InFence { language: String, lines: Vec<String> },
}

/// Compile a markdown body into blocks in reading order.
///
/// Fenced code becomes one `Code` block, standalone `$$...$$` lines become
/// `Equation` blocks and every other non-blank line goes through
/// [`line_to_blocks`]. Inline math is normalized outside fences only; fence
/// content is kept verbatim.
pub fn compile_markdown(markdown: &str) -> CompiledMarkdown {
    let mut blocks = Vec::new();
    let mut state = State::Normal;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix(FENCE) {
            state = match state {
                State::Normal => State::InFence {
                    language: fence_language(rest),
                    lines: Vec::new(),
                },
                State::InFence { language, lines } => {
                    blocks.push(Block::Code {
                        content: lines.join("\n"),
                        language,
                    });
                    State::Normal
                }
            };
            continue;
        }

        match &mut state {
            State::InFence { lines, .. } => lines.push(line.to_string()),
            State::Normal => compile_line(trimmed, &mut blocks),
        }
    }

    let unterminated_fence = match &state {
        State::Normal => false,
        State::InFence { language, lines } => {
            log::warn!(
                "Unterminated {} code fence at end of input, dropping {} buffered lines",
                language,
                lines.len()
            );
            true
        }
    };

    CompiledMarkdown {
        blocks,
        unterminated_fence,
    }
}

fn fence_language(rest: &str) -> String {
    let language = rest.trim();
    if language.is_empty() {
        DEFAULT_CODE_LANGUAGE.to_string()
    } else {
        language.to_string()
    }
}

fn compile_line(line: &str, blocks: &mut Vec<Block>) {
    if line.is_empty() {
        return;
    }

    let normalized = normalize_inline_math_str(line);
    let normalized = normalized.trim();

    if let Some(caps) = block_equation_regex().captures(normalized) {
        blocks.push(Block::Equation {
            expression: caps[1].trim().to_string(),
        });
        return;
    }

    blocks.extend(line_to_blocks(normalized));
}

/// Convert a single line of markdown into paragraph-level blocks.
///
/// Inline formatting (bold, italic, strikethrough, code, links) becomes
/// annotations; headings, list items, task items and quotes set the paragraph
/// style. Math spans are not parsed and stay literal text. A thematic break
/// or a line with no text produces nothing.
pub fn line_to_blocks(line: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(line, options);

    let mut builder = LineBuilder::default();
    let mut parsed_anything = false;

    for event in parser {
        parsed_anything = true;
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                builder.style = match level {
                    HeadingLevel::H1 => ParagraphStyle::Heading1,
                    HeadingLevel::H2 => ParagraphStyle::Heading2,
                    _ => ParagraphStyle::Heading3,
                };
            }
            Event::Start(Tag::List(first_item)) => {
                builder.ordered = first_item.is_some();
            }
            Event::Start(Tag::Item) => {
                builder.style = if builder.ordered {
                    ParagraphStyle::NumberedListItem
                } else {
                    ParagraphStyle::BulletedListItem
                };
            }
            Event::TaskListMarker(checked) => {
                builder.style = ParagraphStyle::ToDo { checked };
            }
            Event::Start(Tag::BlockQuote) => {
                builder.style = ParagraphStyle::Quote;
            }
            Event::Start(Tag::Strong) => builder.bold += 1,
            Event::End(TagEnd::Strong) => builder.bold = builder.bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => builder.italic += 1,
            Event::End(TagEnd::Emphasis) => builder.italic = builder.italic.saturating_sub(1),
            Event::Start(Tag::Strikethrough) => builder.strikethrough += 1,
            Event::End(TagEnd::Strikethrough) => {
                builder.strikethrough = builder.strikethrough.saturating_sub(1)
            }
            Event::Start(Tag::Link { dest_url, .. }) | Event::Start(Tag::Image { dest_url, .. }) => {
                builder.link = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                builder.link = None;
            }
            Event::Text(text) => builder.push(&text, false),
            Event::Code(text) => builder.push(&text, true),
            Event::Html(html) => builder.push(&html, false),
            Event::FootnoteReference(label) => builder.push(&format!("[^{}]", label), false),
            Event::SoftBreak | Event::HardBreak => builder.push(" ", false),
            _ => {}
        }
    }

    // Link reference definitions produce no events at all
    if !parsed_anything && !line.trim().is_empty() {
        log::debug!("Keeping unparsed line as plain text: {}", line);
        return vec![Block::Paragraph(Paragraph::plain(line.trim()))];
    }

    builder.finish().into_iter().collect()
}

/// Accumulates the spans of one line
#[derive(Default)]
struct LineBuilder {
    style: ParagraphStyle,
    ordered: bool,
    bold: usize,
    italic: usize,
    strikethrough: usize,
    link: Option<String>,
    spans: Vec<RichText>,
}

impl LineBuilder {
    fn push(&mut self, text: &str, code: bool) {
        if text.is_empty() {
            return;
        }
        let annotations = Annotations {
            bold: self.bold > 0,
            italic: self.italic > 0,
            strikethrough: self.strikethrough > 0,
            code,
        };

        // Merge with the previous span when formatting is identical
        if let Some(last) = self.spans.last_mut() {
            if last.annotations == annotations && last.link == self.link {
                last.content.push_str(text);
                return;
            }
        }
        self.spans.push(RichText {
            content: text.to_string(),
            annotations,
            link: self.link.clone(),
        });
    }

    fn finish(self) -> Option<Block> {
        if self.spans.iter().all(|s| s.content.trim().is_empty()) {
            return None;
        }
        let rich_text = self
            .spans
            .iter()
            .flat_map(|s| RichText::chunked(&s.content, s.annotations, s.link.as_deref()))
            .collect();
        Some(Block::Paragraph(Paragraph {
            style: self.style,
            rich_text,
        }))
    }
}
