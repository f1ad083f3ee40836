//! Markdown conversion between vault notes and remote blocks.
//!
//! `import` compiles a note body into blocks for upload, `export` renders a
//! remote page back to markdown, `frontmatter` handles the note header and
//! the pull-side merge, and `sanitize` holds the line-level rewrites both
//! directions share.

pub mod export;
pub mod frontmatter;
pub mod import;
pub mod sanitize;

pub use export::{page_to_markdown, rich_text_to_markdown};
pub use frontmatter::{
    merge_note, split_front_matter, FrontMatter, MergeAction, MergeResult, NoteFrontMatter,
    SplitNote, NOTION_ID_KEY,
};
pub use import::{compile_markdown, line_to_blocks, CompiledMarkdown, DEFAULT_CODE_LANGUAGE};
pub use sanitize::{normalize_inline_math, normalize_inline_math_str, remove_task_markers};
