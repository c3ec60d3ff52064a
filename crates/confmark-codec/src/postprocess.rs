//! Deterministic fixups for generated markdown.
//!
//! An ordered list of pure textual fixups applied to fully-rendered markdown,
//! after every placeholder has been restored. Each fixup is idempotent:
//! applying [`apply`] twice yields the same text as applying it once.
//!
//! Fenced code regions pass through untouched; the fixups exist to clean up
//! serializer artifacts in prose, and code content must stay byte-exact.

use std::sync::LazyLock;

use regex::Regex;

static STRONG_SPACING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+)\*\* ([:\u{ff1a}])").expect("invalid regex"));

static HEADING_ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6} )(\d+)\\\.").expect("invalid regex"));

static THEMATIC_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\* \* \*|- - -|_{3,})[ \t]*$").expect("invalid regex"));

/// Apply all fixups in order and normalize whitespace.
///
/// Idempotent: `apply(&apply(x)) == apply(x)`.
#[must_use]
pub fn apply(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut blank_run = 0usize;

    for line in text.lines() {
        if is_fence_marker(line) {
            in_fence = !in_fence;
            blank_run = 0;
            out.push(line.trim_end().to_owned());
            continue;
        }
        if in_fence {
            out.push(line.to_owned());
            continue;
        }

        let line = fix_strong_spacing(line);
        let line = fix_heading_ordinals(&line);
        let line = fix_thematic_break(&line);

        for piece in split_merged_list_items(&line) {
            let piece = piece.trim_end().to_owned();
            if piece.is_empty() {
                blank_run += 1;
                // At most one blank line between blocks.
                if blank_run >= 2 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push(piece);
        }
    }

    // Strip leading and trailing blank lines, end with exactly one newline.
    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    let mut result = out.join("\n");
    result.push('\n');
    result
}

/// A fence delimiter at line start, possibly behind indentation, blockquote
/// markers (`> ```` ``` ````), or a list marker opening the item with a fence.
fn is_fence_marker(line: &str) -> bool {
    let rest = line.trim_start_matches(['>', ' ', '\t']);
    if rest.starts_with("```") {
        return true;
    }
    let rest = if let Some(item) = rest.strip_prefix("- ").or_else(|| rest.strip_prefix("* ")) {
        item
    } else {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        match rest[digits..].strip_prefix(". ") {
            Some(item) if digits > 0 => item,
            _ => return false,
        }
    };
    rest.trim_start_matches(' ').starts_with("```")
}

/// Drop the stray space a generic renderer leaves between a closing strong
/// marker and following colon punctuation.
fn fix_strong_spacing(line: &str) -> String {
    STRONG_SPACING_RE.replace_all(line, "**$1**$2").into_owned()
}

/// Unescape ordinal dots at the start of headings (`## 1\.` -> `## 1.`).
fn fix_heading_ordinals(line: &str) -> String {
    HEADING_ORDINAL_RE.replace(line, "${1}${2}.").into_owned()
}

/// Normalize alternate thematic-break spellings to `---`.
fn fix_thematic_break(line: &str) -> String {
    if THEMATIC_BREAK_RE.is_match(line) {
        String::from("---")
    } else {
        line.to_owned()
    }
}

/// Split list items a generic renderer merged onto one line.
///
/// Only lines that already open with a `- ` item are candidates, and only
/// ` \- ` separators mark a concatenation point; an escaped dash in prose
/// stays put.
fn split_merged_list_items(line: &str) -> Vec<String> {
    if !line.trim_start().starts_with("- ") || !line.contains(" \\- ") {
        return vec![line.to_owned()];
    }
    let indent = &line[..line.len() - line.trim_start().len()];
    let mut parts = line.split(" \\- ");
    let mut lines = Vec::new();
    if let Some(first) = parts.next() {
        lines.push(first.trim_end().to_owned());
    }
    for part in parts {
        let part = part.trim();
        if !part.is_empty() {
            lines.push(format!("{indent}- {part}"));
        }
    }
    lines
}
