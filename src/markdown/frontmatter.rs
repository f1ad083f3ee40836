use crate::notion::NoteRecord;

const DELIMITER: &str = "---";
const NOT_AVAILABLE: &str = "N/A";

/// Header key holding the remote record id
pub const NOTION_ID_KEY: &str = "notion_id";

/// Header written on top of every pulled note, always regenerated from the
/// remote record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFrontMatter {
    pub note_type: String,
    pub created: String,
    pub tags: Vec<String>,
    pub project_name: String,
    pub notion_id: String,
}

impl NoteFrontMatter {
    /// Missing fields fall back to `N/A`
    pub fn from_note(note: &NoteRecord, project_name: Option<&str>) -> Self {
        Self {
            note_type: note.note_type.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            created: note.created.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            tags: note.tags.clone(),
            project_name: project_name.unwrap_or(NOT_AVAILABLE).to_string(),
            notion_id: note.id.clone(),
        }
    }

    pub fn render(&self) -> String {
        let tags = if self.tags.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            self.tags.join(", ")
        };

        format!(
            "{delim}\ntype: {}\ncreated: {}\ntags: {}\nproject: {project} [[{project}]]\n{}: {}\n{delim}\n",
            self.note_type,
            self.created,
            tags,
            NOTION_ID_KEY,
            self.notion_id,
            delim = DELIMITER,
            project = self.project_name,
        )
    }
}

/// Parsed `key: value` header of a local note, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    entries: Vec<(String, String)>,
}

impl FrontMatter {
    fn parse(header: &str) -> Self {
        let entries = header
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The linked record id, if present and non-empty
    pub fn notion_id(&self) -> Option<&str> {
        self.get(NOTION_ID_KEY).filter(|id| !id.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A local note split into header and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitNote<'a> {
    pub front_matter: FrontMatter,
    /// Body with surrounding whitespace trimmed
    pub body: &'a str,
}

/// Byte offsets of the header content and of the first byte after the closing
/// delimiter line. The opening delimiter must be the first line of the file.
fn header_bounds(content: &str) -> Option<(usize, usize, usize)> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((start, offset, offset + line.len()));
        }
        offset += line.len();
    }
    None
}

/// Split a note into its front matter and body.
///
/// Returns `None` when the file does not open with a `---` header, the header
/// is never closed, or it holds no entries.
pub fn split_front_matter(content: &str) -> Option<SplitNote<'_>> {
    let (start, end, body_start) = header_bounds(content)?;
    let front_matter = FrontMatter::parse(&content[start..end]);
    if front_matter.is_empty() {
        return None;
    }

    Some(SplitNote {
        front_matter,
        body: content[body_start..].trim(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    Created,
    Appended,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub action: MergeAction,
    pub content: String,
}

impl MergeResult {
    pub fn is_changed(&self) -> bool {
        self.action != MergeAction::Unchanged
    }
}

/// Merge freshly pulled content into a local note.
///
/// A new file is `front_matter + body`. An existing file is only ever
/// appended to: when the trimmed body is not already contained in the
/// existing body it is added after a blank line, otherwise the file is
/// returned as is. Reworded remote content therefore shows up twice.
pub fn merge_note(existing: Option<&str>, front_matter: &str, body: &str) -> MergeResult {
    let Some(existing) = existing else {
        return MergeResult {
            action: MergeAction::Created,
            content: format!("{}{}", front_matter, body),
        };
    };

    let body_start = header_bounds(existing).map_or(0, |(_, _, body_start)| body_start);
    let existing_body = &existing[body_start..];
    let body = body.trim();

    if body.is_empty() || existing_body.contains(body) {
        return MergeResult {
            action: MergeAction::Unchanged,
            content: existing.to_string(),
        };
    }

    MergeResult {
        action: MergeAction::Appended,
        content: format!("{}\n\n{}\n", existing.trim_end(), body),
    }
}
