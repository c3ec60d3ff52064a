//! Bidirectional codec between markdown and Confluence storage format.
//!
//! The two directions are independent converters sharing one principle:
//! content that must survive byte-exact (code, diagram source) is swapped
//! for placeholder tokens before any lossy transformation pass and spliced
//! back afterwards.
//!
//! - [`StorageConverter`]: storage-format XHTML to markdown. Unsupported
//!   macros degrade to visible markers and are reported as warnings; only
//!   malformed XML aborts.
//! - [`MarkdownConverter`]: markdown to storage-format XHTML. Constructs
//!   with no storage representation abort the conversion.
//!
//! Both converters are stateless between calls and safe to share across
//! threads.

pub mod block;
pub mod collab;
pub mod error;
pub mod placeholder;
pub mod postprocess;
pub mod registry;

mod reader;
mod writer;
mod xml;

pub use confmark_diagrams::{DiagramKind, RenderMode};

pub use block::{Block, CalloutKind, Document, Inline};
pub use error::{ConversionError, ConversionWarning, ParseError, RestorationError};
pub use reader::{StorageConversion, StorageConverter};
pub use registry::{MacroKind, MacroRegistry};
pub use writer::{MarkdownConversion, MarkdownConverter, PendingAttachment};

#[cfg(test)]
mod roundtrip_tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn to_markdown(storage: &str) -> StorageConversion {
        StorageConverter::new().convert(storage).unwrap()
    }

    fn to_storage(markdown: &str) -> MarkdownConversion {
        MarkdownConverter::new().convert(markdown).unwrap()
    }

    /// Storage -> markdown -> storage for a page mixing prose, code, a
    /// diagram, and a callout.
    #[test]
    fn test_mixed_page_round_trip() {
        let storage = concat!(
            "<h1>Обзор</h1>",
            "<p>Текст с под_черк и <em>курсивом</em>.</p>",
            r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#,
            r#"<ac:parameter ac:name="language">rust</ac:parameter>"#,
            r#"<ac:parameter ac:name="linenumbers">true</ac:parameter>"#,
            "<ac:plain-text-body><![CDATA[let s = \"__dunder__ *and* `ticks`\";]]></ac:plain-text-body>",
            "</ac:structured-macro>",
            r#"<ac:structured-macro ac:name="mermaid" ac:schema-version="1">"#,
            "<ac:plain-text-body><![CDATA[graph TD\n    A --> B]]></ac:plain-text-body>",
            "</ac:structured-macro>",
            r#"<ac:structured-macro ac:name="info" ac:schema-version="1">"#,
            "<ac:rich-text-body><p>важно</p></ac:rich-text-body></ac:structured-macro>"
        );

        let markdown = to_markdown(storage);
        assert!(markdown.warnings.is_empty());
        assert!(markdown.markdown.contains("# Обзор"));
        assert!(markdown.markdown.contains("под\\_черк"));
        assert!(
            markdown
                .markdown
                .contains("```rust\nlet s = \"__dunder__ *and* `ticks`\";\n```")
        );
        assert!(markdown.markdown.contains("```mermaid\ngraph TD\n    A --> B\n```"));
        assert!(markdown.markdown.contains("> **\u{2139}\u{fe0f} Info:**\n> важно"));

        let back = to_storage(&markdown.markdown);
        assert!(back.warnings.is_empty());
        assert_eq!(back.storage, storage);
    }

    /// Markdown -> storage -> markdown reproduces the input byte for byte.
    #[test]
    fn test_markdown_round_trip_exact() {
        let markdown = "# Title\n\nSome *prose* here.\n\n```rust\nlet s = \"__dunder__ *and* `ticks`\";\n```\n\n> **\u{26a0}\u{fe0f} Warning:**\n> careful now\n";
        let storage = to_storage(markdown);
        assert!(storage.warnings.is_empty());
        let back = to_markdown(&storage.storage);
        assert_eq!(back.markdown, markdown);
    }

    /// Code content survives exactly even when it looks like markup in both
    /// syntaxes.
    #[test]
    fn test_hostile_code_content_round_trip() {
        let code = "<p>not html</p>\n**not bold**\n]]> <![CDATA[\n# not a heading";
        let markdown = format!("```\n{code}\n```\n");
        let storage = to_storage(&markdown);
        let back = to_markdown(&storage.storage);
        assert_eq!(back.markdown, markdown);
    }

    /// A code macro nested in a callout keeps its fence inside the quote and
    /// re-nests into the callout body on the way back.
    #[test]
    fn test_code_macro_nested_in_callout_round_trip() {
        let storage = concat!(
            r#"<ac:structured-macro ac:name="info" ac:schema-version="1">"#,
            "<ac:rich-text-body><p>intro</p>",
            r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#,
            r#"<ac:parameter ac:name="language">rust</ac:parameter>"#,
            "<ac:plain-text-body><![CDATA[let x = 1;]]></ac:plain-text-body>",
            "</ac:structured-macro></ac:rich-text-body></ac:structured-macro>"
        );

        let markdown = to_markdown(storage);
        assert!(markdown.warnings.is_empty());
        assert_eq!(
            markdown.markdown,
            "> **\u{2139}\u{fe0f} Info:**\n> intro\n>\n> ```rust\n> let x = 1;\n> ```\n"
        );

        let back = to_storage(&markdown.markdown);
        assert!(back.warnings.is_empty());
        assert_eq!(back.storage, storage);
    }

    /// Unsupported macros degrade visibly in markdown and never round-trip
    /// into a fabricated macro.
    #[test]
    fn test_unsupported_macro_degrades_visibly() {
        let storage = concat!(
            "<p>before</p>",
            r#"<ac:structured-macro ac:name="jira" ac:schema-version="1"/>"#,
            "<p>after</p>"
        );
        let markdown = to_markdown(storage);
        assert!(markdown.markdown.contains("**Unsupported macro:** jira"));
        assert_eq!(
            markdown.warnings,
            vec![ConversionWarning::UnsupportedMacro {
                name: String::from("jira")
            }]
        );

        let back = to_storage(&markdown.markdown);
        assert!(!back.storage.contains(r#"ac:name="jira""#));
        assert!(back.storage.contains("<blockquote>"));
    }

    /// Draw.io attachment references survive a full cycle without inventing
    /// diagram source.
    #[test]
    fn test_drawio_reference_round_trip() {
        let storage = concat!(
            r#"<ac:structured-macro ac:name="drawio" ac:schema-version="1">"#,
            r#"<ac:parameter ac:name="diagramName">arch.drawio</ac:parameter>"#,
            r#"<ac:parameter ac:name="attachment">arch.drawio</ac:parameter>"#,
            "</ac:structured-macro>"
        );
        let markdown = to_markdown(storage);
        assert!(markdown.markdown.contains("**Draw.io Diagram:** arch.drawio"));

        let back = to_storage(&markdown.markdown);
        assert_eq!(back.storage, storage);
        assert!(back.attachments.is_empty());
    }

    /// Post-processing cleans renderer artifacts without touching content.
    #[test]
    fn test_generated_markdown_is_clean() {
        let storage = "<h2>1. Введение</h2><p><strong>Термин</strong> : определение</p>";
        let markdown = to_markdown(storage);
        assert_eq!(
            markdown.markdown,
            "## 1. Введение\n\n**Термин**: определение\n"
        );
    }

    /// Tokens never collide even at volume, and every one restores.
    #[test]
    fn test_placeholder_volume() {
        use std::collections::HashSet;

        use crate::placeholder::{PlaceholderKind, PlaceholderMap};

        let mut map = PlaceholderMap::for_source("");
        let mut tokens = HashSet::new();
        let mut text = String::new();
        for i in 0..10_000 {
            let token = map.protect(PlaceholderKind::Code, None, format!("content-{i}"));
            assert!(tokens.insert(token.clone()));
            text.push_str(&token);
            text.push('\n');
        }
        let restored = map.restore(&text, |entry| entry.content.clone()).unwrap();
        assert!(restored.starts_with("content-0\n"));
        assert!(restored.ends_with("content-9999\n"));
    }

    /// The salted prefix stays out of arbitrary page text, including text
    /// built from the token alphabet itself.
    #[test]
    fn test_placeholder_prefix_avoids_random_source() {
        use rand::RngExt;

        use crate::placeholder::{PlaceholderKind, PlaceholderMap};

        let alphabet: Vec<char> = "QCMPHX0123456789abc *_`[]>#-\\\n".chars().collect();
        let mut rng = rand::rng();
        for _ in 0..50 {
            let sample: String = (0..4096)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            let mut map = PlaceholderMap::for_source(&sample);
            let token = map.protect(PlaceholderKind::Code, None, "body");
            assert!(!sample.contains(&token), "token collided with page text");

            let text = format!("{sample}\n{token}\n");
            let restored = map.restore(&text, |entry| entry.content.clone()).unwrap();
            assert!(restored.ends_with("\nbody\n"));
        }
    }
}
