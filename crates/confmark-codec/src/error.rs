//! Error taxonomy for the codec.
//!
//! Document-level structural failures ([`ParseError`], [`ConversionError`])
//! abort the conversion and report precisely. Per-block degradations are
//! absorbed locally as [`ConversionWarning`]s and always yield a complete,
//! renderable document.

use std::fmt;

use confmark_diagrams::DiagramKind;

/// Malformed storage XML. Aborts the whole conversion; no partial output.
#[derive(Debug, thiserror::Error)]
#[error("storage parse error at byte {position}: {message}")]
pub struct ParseError {
    /// Byte offset into the (wrapped) storage document.
    pub position: u64,
    pub message: String,
}

/// A placeholder token could not be found during restoration.
///
/// Surfaced to the caller, never silently swallowed. The caller decides
/// whether to abort or leave the token visible.
#[derive(Debug, thiserror::Error)]
#[error("placeholder token `{token}` not found during restoration")]
pub struct RestorationError {
    pub token: String,
}

/// Write-side failure; aborts only the current conversion call.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// A block construct has no registered storage writer.
    #[error("no storage writer registered for `{0}`")]
    UnsupportedBlock(&'static str),

    /// A protected span disappeared between extraction and restoration.
    #[error(transparent)]
    Restoration(#[from] RestorationError),
}

/// Non-fatal degradation recorded during a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionWarning {
    /// Macro name with no registered conversion; degraded to a visible
    /// marker block.
    UnsupportedMacro { name: String },
    /// A macro was missing its required body; degraded to an empty,
    /// annotated block.
    MissingMacroBody { name: String },
    /// Diagram codec failure; the diagram was left as an untouched code
    /// block.
    DiagramEncoding { kind: DiagramKind, message: String },
    /// A diagram macro carried only a rendered representation with no
    /// embedded source.
    DiagramSourceUnavailable { name: String },
    /// A placeholder token was left visible in the output.
    UnrestoredPlaceholder { token: String },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMacro { name } => {
                write!(f, "unsupported macro `{name}` degraded to a marker block")
            }
            Self::MissingMacroBody { name } => {
                write!(f, "macro `{name}` is missing its body")
            }
            Self::DiagramEncoding { kind, message } => {
                write!(f, "{kind} diagram left as a code block: {message}")
            }
            Self::DiagramSourceUnavailable { name } => {
                write!(f, "diagram `{name}` has no embedded source")
            }
            Self::UnrestoredPlaceholder { token } => {
                write!(f, "placeholder token `{token}` left visible in output")
            }
        }
    }
}
