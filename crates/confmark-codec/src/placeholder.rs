//! Call-scoped placeholder protection for verbatim spans.
//!
//! Any content that must survive byte-exact is never allowed through a
//! transformation pass not designed for exactness. Instead it is swapped for
//! a token before the lossy pass and spliced back afterwards.
//!
//! Tokens are uppercase alphanumerics only: no underscores, asterisks,
//! backticks, or characters subject to entity escaping, so neither the
//! markdown parser nor its inverse serializer can see them as syntax. The
//! token prefix is chosen by scanning the source text, so a token can never
//! collide with naturally occurring content.

use std::collections::HashMap;

use confmark_diagrams::DiagramKind;

use crate::error::RestorationError;

/// What kind of content a placeholder protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Generic fenced code block.
    Code,
    /// Fenced diagram source.
    Diagram(DiagramKind),
    /// Reference to a diagram attachment by name; no source available.
    DiagramRef(DiagramKind),
}

/// A protected span: the kind plus the exact original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderEntry {
    pub kind: PlaceholderKind,
    /// Exact protected text. For [`PlaceholderKind::DiagramRef`] this is the
    /// attachment name, not diagram source.
    pub content: String,
    /// Fence language tag, when one was present.
    pub language: Option<String>,
}

/// Bijective token -> content mapping, scoped to one conversion call.
#[derive(Debug)]
pub struct PlaceholderMap {
    prefix: String,
    entries: Vec<PlaceholderEntry>,
}

impl PlaceholderMap {
    /// Create a map whose tokens are guaranteed absent from `source`.
    ///
    /// Scans for the shortest salted prefix that does not occur naturally.
    #[must_use]
    pub fn for_source(source: &str) -> Self {
        let mut salt = 0u32;
        let prefix = loop {
            let candidate = format!("QCMPH{salt}X");
            if !source.contains(&candidate) {
                break candidate;
            }
            salt += 1;
        };
        Self {
            prefix,
            entries: Vec::new(),
        }
    }

    /// Allocate a fresh token for `content` and record the entry.
    ///
    /// The returned token is spliced into the text stream in place of the
    /// protected content.
    pub fn protect(
        &mut self,
        kind: PlaceholderKind,
        language: Option<String>,
        content: impl Into<String>,
    ) -> String {
        let token = self.token(self.entries.len());
        self.entries.push(PlaceholderEntry {
            kind,
            content: content.into(),
            language,
        });
        tracing::debug!(token = %token, ?kind, "protected span");
        token
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(token, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (String, &PlaceholderEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (self.token(idx), entry))
    }

    /// Substitute every token in `text` back with `render(entry)` output.
    ///
    /// For each token, the paragraph-wrapped form (`<p>token</p>`), the
    /// literal token, and the escaped form the intervening lossy pass may
    /// have produced are all matched. A token found in none of the forms
    /// yields [`RestorationError`] naming it.
    pub fn restore<F>(&self, text: &str, mut render: F) -> Result<String, RestorationError>
    where
        F: FnMut(&PlaceholderEntry) -> String,
    {
        let mut out = text.to_owned();
        for (idx, entry) in self.entries.iter().enumerate() {
            let token = self.token(idx);
            let replacement = render(entry);

            let candidates = [
                format!("<p>{token}</p>"),
                token.clone(),
                escaped_form(&token),
            ];
            let mut found = false;
            for candidate in &candidates {
                if out.contains(candidate.as_str()) {
                    out = out.replace(candidate.as_str(), &replacement);
                    found = true;
                }
            }
            if !found {
                return Err(RestorationError { token });
            }
        }
        Ok(out)
    }

    /// Like [`restore`](Self::restore), but a missing token is left visible
    /// and reported through `on_missing` instead of aborting.
    ///
    /// A token sitting after a blockquote marker, indentation, or a list
    /// marker carries that context onto every line of the replacement, so a
    /// spliced multi-line fence stays inside its enclosing quote or list
    /// item.
    pub fn restore_lossy<F, M>(&self, text: &str, mut render: F, mut on_missing: M) -> String
    where
        F: FnMut(&PlaceholderEntry) -> String,
        M: FnMut(RestorationError),
    {
        let mut out = text.to_owned();
        for (idx, entry) in self.entries.iter().enumerate() {
            let token = self.token(idx);
            let replacement = render(entry);

            let candidates = [
                format!("<p>{token}</p>"),
                token.clone(),
                escaped_form(&token),
            ];
            let mut found = false;
            for candidate in &candidates {
                let mut search = 0;
                while let Some(offset) = out[search..].find(candidate.as_str()) {
                    let at = search + offset;
                    let line_start = out[..at].rfind('\n').map_or(0, |nl| nl + 1);
                    let prefix = &out[line_start..at];
                    let spliced = match continuation_prefix(prefix) {
                        Some(cont) if !cont.is_empty() => {
                            prefix_continuation_lines(&replacement, &cont)
                        }
                        _ => replacement.clone(),
                    };
                    out.replace_range(at..at + candidate.len(), &spliced);
                    search = at + spliced.len();
                    found = true;
                }
            }
            if !found {
                tracing::warn!(token = %token, "placeholder token missing after lossy pass");
                on_missing(RestorationError { token });
            }
        }
        out
    }

    fn token(&self, index: usize) -> String {
        format!("{}{}X", self.prefix, index)
    }
}

/// Token form produced by a generic markdown escaper.
///
/// Our alphabet avoids escapable characters, so for tokens generated here the
/// escaped form equals the literal form; the function still handles arbitrary
/// tokens so restoration stays correct if the alphabet ever widens.
fn escaped_form(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if matches!(c, '_' | '*' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The prefix continuation lines must carry so they stay inside the block
/// the token's line belongs to, or `None` when the token does not sit in a
/// quote or list context.
///
/// Quote markers and indentation carry over verbatim; a list marker opening
/// the token's line turns into indentation of the same width.
fn continuation_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_start_matches(['>', ' ', '\t']);
    if trimmed.is_empty() {
        return Some(prefix.to_owned());
    }
    let lead = &prefix[..prefix.len() - trimmed.len()];
    if matches!(trimmed, "- " | "* ") {
        return Some(format!("{lead}  "));
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && &trimmed[digits..] == ". " {
        return Some(format!("{lead}{}", " ".repeat(digits + 2)));
    }
    None
}

/// Carry `prefix` onto every line of `text` after the first, which already
/// sits behind the prefix in the surrounding document.
fn prefix_continuation_lines(text: &str, prefix: &str) -> String {
    let mut lines = text.split('\n');
    let mut out = String::with_capacity(text.len());
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        out.push_str(prefix);
        out.push_str(line);
    }
    out
}

/// A resolved mapping snapshot, mainly for diagnostics.
pub type PlaceholderMapping = HashMap<String, PlaceholderEntry>;

impl PlaceholderMap {
    /// Snapshot the token -> entry mapping.
    #[must_use]
    pub fn mapping(&self) -> PlaceholderMapping {
        self.iter().map(|(t, e)| (t, e.clone())).collect()
    }
}
