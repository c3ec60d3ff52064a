//! Block-level document model.
//!
//! A [`Document`] is the intermediate representation produced by the storage
//! reader before markdown serialization. It is purely tree-shaped and built
//! fresh per conversion call.

use std::collections::HashMap;

use confmark_diagrams::DiagramKind;

/// An ordered sequence of blocks; one page body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document(pub Vec<Block>);

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.0.push(block);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Block-level content variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Heading, levels 1-6.
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    /// Ordered or unordered list; each item is a block sequence.
    List { ordered: bool, items: Vec<Vec<Block>> },
    /// Rows of cells, each cell inline content. The first row is the header.
    Table { rows: Vec<Vec<Vec<Inline>>> },
    /// Fenced code; content is exact text, never escaped or rewrapped.
    CodeBlock {
        language: Option<String>,
        content: String,
    },
    /// Diagram with verbatim source.
    Diagram { kind: DiagramKind, source: String },
    /// Structured macro with no registered conversion. Kept as a visible
    /// marker; never dropped.
    Macro {
        name: String,
        params: HashMap<String, String>,
        body: MacroBody,
    },
    /// Block quote, optionally carrying a callout marker.
    Quote {
        callout: Option<CalloutKind>,
        content: Document,
    },
    /// Collapsible section with nested content.
    Expand { title: String, content: Document },
    ThematicBreak,
}

impl Block {
    /// Variant name, used in error reporting.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::Paragraph(_) => "paragraph",
            Self::List { .. } => "list",
            Self::Table { .. } => "table",
            Self::CodeBlock { .. } => "code-block",
            Self::Diagram { .. } => "diagram",
            Self::Macro { .. } => "macro",
            Self::Quote { .. } => "quote",
            Self::Expand { .. } => "expand",
            Self::ThematicBreak => "thematic-break",
        }
    }
}

/// Body of a structured macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroBody {
    None,
    /// Literal (CDATA) body, taken verbatim.
    PlainText(String),
    /// Rich-text body with nested structured content.
    RichText(Document),
}

/// Inline content variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    /// Inline code span; exact text.
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { url: String, content: Vec<Inline> },
    Image { url: String, alt: String },
    LineBreak,
}

/// Semantic marker for callout quotes (admonition macros).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalloutKind {
    Info,
    Note,
    Tip,
    Warning,
}

impl CalloutKind {
    /// Storage macro name for this callout.
    #[must_use]
    pub fn macro_name(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Note => "note",
            Self::Tip => "tip",
            Self::Warning => "warning",
        }
    }

    /// Marker label rendered at the start of a markdown blockquote.
    #[must_use]
    pub fn marker_label(self) -> &'static str {
        match self {
            Self::Info => "\u{2139}\u{fe0f} Info",
            Self::Note => "\u{1f4dd} Note",
            Self::Tip => "\u{1f4a1} Tip",
            Self::Warning => "\u{26a0}\u{fe0f} Warning",
        }
    }

    /// Resolve a callout from its macro name.
    #[must_use]
    pub fn from_macro_name(name: &str) -> Option<Self> {
        match name {
            "info" => Some(Self::Info),
            "note" => Some(Self::Note),
            "tip" => Some(Self::Tip),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }

    /// Detect a callout from the leading marker text of a blockquote.
    ///
    /// Accepts both the emoji-prefixed label and the bare word, with a
    /// trailing ASCII or fullwidth colon.
    #[must_use]
    pub fn from_marker(text: &str) -> Option<Self> {
        let text = text.trim();
        for kind in [Self::Info, Self::Note, Self::Tip, Self::Warning] {
            let label = kind.marker_label();
            let bare = label
                .rsplit(' ')
                .next()
                .unwrap_or(label);
            for candidate in [label, bare] {
                if let Some(rest) = text.strip_prefix(candidate)
                    && rest.starts_with([':', '\u{ff1a}'])
                {
                    return Some(kind);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callout_macro_names_round_trip() {
        for kind in [
            CalloutKind::Info,
            CalloutKind::Note,
            CalloutKind::Tip,
            CalloutKind::Warning,
        ] {
            assert_eq!(CalloutKind::from_macro_name(kind.macro_name()), Some(kind));
        }
    }

    #[test]
    fn test_callout_from_marker() {
        assert_eq!(
            CalloutKind::from_marker("\u{2139}\u{fe0f} Info:"),
            Some(CalloutKind::Info)
        );
        assert_eq!(CalloutKind::from_marker("Warning:"), Some(CalloutKind::Warning));
        assert_eq!(
            CalloutKind::from_marker("Tip\u{ff1a}"),
            Some(CalloutKind::Tip)
        );
        assert_eq!(CalloutKind::from_marker("Info"), None);
        assert_eq!(CalloutKind::from_marker("Dangerous:"), None);
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(Block::ThematicBreak.variant_name(), "thematic-break");
        assert_eq!(
            Block::CodeBlock {
                language: None,
                content: String::new()
            }
            .variant_name(),
            "code-block"
        );
    }
}
