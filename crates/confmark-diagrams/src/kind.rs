//! Diagram kinds and storage render modes.

/// Supported diagram languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramKind {
    Mermaid,
    Drawio,
}

impl DiagramKind {
    /// Parse a kind from a code fence language tag.
    ///
    /// Returns `None` if the language is not a supported diagram type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mermaid" => Some(Self::Mermaid),
            "drawio" => Some(Self::Drawio),
            _ => None,
        }
    }

    /// Fence language tag used when serializing the diagram to markdown.
    #[must_use]
    pub fn fence_language(self) -> &'static str {
        match self {
            Self::Mermaid => "mermaid",
            Self::Drawio => "drawio",
        }
    }

    /// Storage macro name for this diagram kind.
    #[must_use]
    pub fn macro_name(self) -> &'static str {
        match self {
            Self::Mermaid => "mermaid",
            Self::Drawio => "drawio",
        }
    }
}

impl std::fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fence_language())
    }
}

/// Strategy for representing a diagram in the storage format.
///
/// Selected per conversion call; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Embed the diagram source in its native storage macro.
    ///
    /// Assumes the destination environment has the matching macro installed.
    #[default]
    NativeMacro,
    /// Image reference to an external rendering service, plus a collapsible
    /// block retaining the literal source and an editor deep link.
    ImageLink,
    /// Collapsible code block with an editor deep link. No external rendering
    /// dependency; the source is never rendered as an image.
    CollapsibleCodeBlock,
}

impl RenderMode {
    /// Parse a mode from its configuration name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "macro" => Some(Self::NativeMacro),
            "image" => Some(Self::ImageLink),
            "code-block" | "code_block" => Some(Self::CollapsibleCodeBlock),
            _ => None,
        }
    }

    /// Return the mode as its configuration name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeMacro => "macro",
            Self::ImageLink => "image",
            Self::CollapsibleCodeBlock => "code-block",
        }
    }
}
