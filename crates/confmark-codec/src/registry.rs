//! Macro name to block variant mapping.

use std::collections::HashMap;

use confmark_diagrams::DiagramKind;

use crate::block::CalloutKind;

/// Semantic conversion target for a registered macro name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// Admonition macro; reads to a callout quote.
    Callout(CalloutKind),
    /// Code macro with a literal body.
    Code,
    /// Collapsible macro with a rich-text body.
    Expand,
    /// Diagram macro for the given kind.
    Diagram(DiagramKind),
}

/// Registry of known structured-macro names.
///
/// Reading an unregistered name degrades to a visible marker block carrying
/// the name; it is never dropped silently. That policy lives in the
/// converters; the registry only answers what a name means.
#[derive(Debug)]
pub struct MacroRegistry {
    by_name: HashMap<&'static str, MacroKind>,
}

impl MacroRegistry {
    /// Registry with the built-in macro vocabulary.
    #[must_use]
    pub fn builtin() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("info", MacroKind::Callout(CalloutKind::Info));
        by_name.insert("note", MacroKind::Callout(CalloutKind::Note));
        by_name.insert("tip", MacroKind::Callout(CalloutKind::Tip));
        by_name.insert("warning", MacroKind::Callout(CalloutKind::Warning));
        by_name.insert("code", MacroKind::Code);
        by_name.insert("expand", MacroKind::Expand);
        by_name.insert("mermaid", MacroKind::Diagram(DiagramKind::Mermaid));
        // Cloud marketplace variant of the mermaid macro.
        by_name.insert("mermaid-macro", MacroKind::Diagram(DiagramKind::Mermaid));
        by_name.insert("drawio", MacroKind::Diagram(DiagramKind::Drawio));
        Self { by_name }
    }

    /// Resolve a macro name to its conversion target.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<MacroKind> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn supports(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Macro name written for a conversion target.
    #[must_use]
    pub fn macro_name(kind: MacroKind) -> &'static str {
        match kind {
            MacroKind::Callout(callout) => callout.macro_name(),
            MacroKind::Code => "code",
            MacroKind::Expand => "expand",
            MacroKind::Diagram(DiagramKind::Mermaid) => "mermaid",
            MacroKind::Diagram(DiagramKind::Drawio) => "drawio",
        }
    }
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_resolve() {
        let registry = MacroRegistry::builtin();
        assert_eq!(
            registry.resolve("info"),
            Some(MacroKind::Callout(CalloutKind::Info))
        );
        assert_eq!(registry.resolve("code"), Some(MacroKind::Code));
        assert_eq!(
            registry.resolve("mermaid-macro"),
            Some(MacroKind::Diagram(DiagramKind::Mermaid))
        );
        assert_eq!(
            registry.resolve("drawio"),
            Some(MacroKind::Diagram(DiagramKind::Drawio))
        );
    }

    #[test]
    fn test_unknown_name_is_unsupported() {
        let registry = MacroRegistry::builtin();
        assert!(registry.resolve("jira").is_none());
        assert!(!registry.supports("gliffy"));
    }

    #[test]
    fn test_macro_name_round_trip() {
        let registry = MacroRegistry::builtin();
        for kind in [
            MacroKind::Callout(CalloutKind::Warning),
            MacroKind::Code,
            MacroKind::Expand,
            MacroKind::Diagram(DiagramKind::Mermaid),
        ] {
            let name = MacroRegistry::macro_name(kind);
            assert_eq!(registry.resolve(name), Some(kind));
        }
    }
}
