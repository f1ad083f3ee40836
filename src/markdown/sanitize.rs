use std::sync::OnceLock;

use regex::Regex;

/// Unchecked (`[ ]`) or dashed (`[-]`) task marker at line start, optionally
/// behind a list bullet
fn task_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]\s+)?\[[ -]\]").expect("task marker pattern is valid"))
}

/// Drop every line that is an open task-list item.
///
/// The whole line goes, not just the marker. Checked items and every other
/// line are kept verbatim and in order. Missing input yields an empty string.
pub fn remove_task_markers(markdown: Option<&str>) -> String {
    let Some(markdown) = markdown else {
        log::warn!("Markdown content is empty or invalid");
        return String::new();
    };

    markdown
        .split('\n')
        .filter(|line| !task_marker_regex().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite single-dollar inline math (`$x$`) into the double form (`$$x$$`).
///
/// Missing input is passed through untouched.
pub fn normalize_inline_math(markdown: Option<&str>) -> Option<String> {
    match markdown {
        Some(markdown) => Some(normalize_inline_math_str(markdown)),
        None => {
            log::warn!("Markdown content for equation transformation is empty or invalid");
            None
        }
    }
}

/// A span opens at a `$` with no `$` neighbour and closes at the next `$` on
/// the same line, which must also stand alone. Dollars that are already part
/// of a `$$` run are never touched, so the rewrite is idempotent.
pub fn normalize_inline_math_str(markdown: &str) -> String {
    let bytes = markdown.as_bytes();
    let lone_dollar = |i: usize| {
        bytes[i] == b'$' && (i == 0 || bytes[i - 1] != b'$') && bytes.get(i + 1) != Some(&b'$')
    };

    let mut out = String::with_capacity(markdown.len() + 8);
    let mut flushed = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        if !lone_dollar(i) {
            while i < bytes.len() && bytes[i] == b'$' {
                i += 1;
            }
            continue;
        }

        let mut close = i + 1;
        while close < bytes.len() && bytes[close] != b'$' && bytes[close] != b'\n' {
            close += 1;
        }

        if close < bytes.len() && lone_dollar(close) {
            out.push_str(&markdown[flushed..i]);
            out.push_str("$$");
            out.push_str(&markdown[i + 1..close]);
            out.push_str("$$");
            i = close + 1;
            flushed = i;
        } else {
            i = close;
        }
    }

    out.push_str(&markdown[flushed..]);
    out
}
