//! Storage format to markdown conversion (read path).
//!
//! The XML is parsed into an [`XmlNode`] tree, walked into a [`Document`],
//! then serialized to markdown. Code and diagram content never touches the
//! escaping serializer: it is swapped for placeholder tokens during
//! serialization and spliced back as fenced blocks afterwards, so the
//! verbatim invariant holds end to end.

use confmark_diagrams::DiagramKind;

use crate::block::{Block, Document, Inline, MacroBody};
use crate::error::{ConversionWarning, ParseError};
use crate::placeholder::{PlaceholderKind, PlaceholderMap};
use crate::postprocess;
use crate::registry::{MacroKind, MacroRegistry};
use crate::xml::{self, XmlNode};

/// Result of a storage to markdown conversion.
#[derive(Debug)]
pub struct StorageConversion {
    pub markdown: String,
    /// Non-fatal degradations recorded along the way.
    pub warnings: Vec<ConversionWarning>,
}

/// Converts Confluence storage format to markdown.
///
/// Stateless between calls; every conversion builds its own placeholder
/// mapping, so concurrent use from multiple threads is safe.
#[derive(Debug, Default)]
pub struct StorageConverter {
    registry: MacroRegistry,
    title: Option<String>,
}

impl StorageConverter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: MacroRegistry::builtin(),
            title: None,
        }
    }

    /// Emit a YAML front matter header with the given page title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Convert a storage-format body to markdown.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the storage XML is malformed. The whole
    /// conversion aborts; there is no partial output. Per-block problems
    /// (unsupported macros, missing bodies) degrade to visible markers and
    /// are reported as warnings instead.
    pub fn convert(&self, storage: &str) -> Result<StorageConversion, ParseError> {
        tracing::info!(len = storage.len(), "converting storage format to markdown");

        let root = xml::parse_storage(storage)?;
        let mut warnings = Vec::new();
        let document = Document(self.blocks_from(&root, &mut warnings));

        let mut placeholders = PlaceholderMap::for_source(storage);
        let rendered = render_blocks(&document.0, &mut placeholders);
        let restored = placeholders.restore_lossy(
            &rendered,
            fenced_block,
            |err| warnings.push(ConversionWarning::UnrestoredPlaceholder { token: err.token }),
        );

        let mut markdown = postprocess::apply(&restored);
        if let Some(title) = &self.title {
            markdown = format!("---\ntitle: {title}\n---\n\n{markdown}");
        }

        tracing::info!(warnings = warnings.len(), "storage conversion finished");
        Ok(StorageConversion { markdown, warnings })
    }

    /// Convert mixed XHTML content into a block sequence.
    ///
    /// Inline runs between block-level children are gathered into paragraphs.
    fn blocks_from(&self, node: &XmlNode, warnings: &mut Vec<ConversionWarning>) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut pending: Vec<Inline> = Vec::new();

        if !node.text.trim().is_empty() {
            pending.push(Inline::Text(node.text.clone()));
        }
        for child in &node.children {
            if is_block_tag(&child.tag) {
                flush_paragraph(&mut pending, &mut blocks);
                self.append_block(child, &mut blocks, warnings);
            } else {
                push_inline(child, &mut pending);
            }
            if !child.tail.is_empty() {
                pending.push(Inline::Text(child.tail.clone()));
            }
        }
        flush_paragraph(&mut pending, &mut blocks);
        blocks
    }

    fn append_block(
        &self,
        node: &XmlNode,
        blocks: &mut Vec<Block>,
        warnings: &mut Vec<ConversionWarning>,
    ) {
        match node.tag.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = node.tag.as_bytes()[1] - b'0';
                blocks.push(Block::Heading {
                    level,
                    content: inline_content(node),
                });
            }
            "p" => {
                let content = inline_content(node);
                if !content.is_empty() {
                    blocks.push(Block::Paragraph(content));
                }
            }
            "ul" | "ol" => blocks.push(self.list_block(node, warnings)),
            "table" => blocks.push(table_block(node)),
            "blockquote" => blocks.push(Block::Quote {
                callout: None,
                content: Document(self.blocks_from(node, warnings)),
            }),
            "hr" => blocks.push(Block::ThematicBreak),
            "pre" => blocks.push(pre_block(node)),
            "ac:structured-macro" => {
                if let Some(block) = self.macro_block(node, warnings) {
                    blocks.push(block);
                }
            }
            "ac:image" => {
                blocks.push(Block::Paragraph(vec![image_inline(node)]));
            }
            // Transparent containers: recurse into children.
            _ => blocks.extend(self.blocks_from(node, warnings)),
        }
    }

    fn list_block(&self, node: &XmlNode, warnings: &mut Vec<ConversionWarning>) -> Block {
        let ordered = node.tag == "ol";
        let items = node
            .children
            .iter()
            .filter(|c| c.tag == "li")
            .map(|li| self.blocks_from(li, warnings))
            .collect();
        Block::List { ordered, items }
    }

    fn macro_block(
        &self,
        node: &XmlNode,
        warnings: &mut Vec<ConversionWarning>,
    ) -> Option<Block> {
        let name = node.attr("ac:name").unwrap_or("").to_owned();
        let params = macro_params(node);
        // Literal body content is taken raw; CDATA never passes through
        // entity decoding, so code survives byte for byte.
        let plain_body = node
            .find_child("ac:plain-text-body")
            .map(XmlNode::plain_text);
        let rich_body = node.find_child("ac:rich-text-body");

        let Some(kind) = self.registry.resolve(&name) else {
            tracing::debug!(name = %name, "unsupported macro degraded to marker");
            warnings.push(ConversionWarning::UnsupportedMacro { name: name.clone() });
            let body = if let Some(text) = plain_body {
                MacroBody::PlainText(text)
            } else if let Some(rich) = rich_body {
                MacroBody::RichText(Document(self.blocks_from(rich, warnings)))
            } else {
                MacroBody::None
            };
            return Some(Block::Macro { name, params, body });
        };

        let block = match kind {
            MacroKind::Callout(callout) => Block::Quote {
                callout: Some(callout),
                content: self.rich_document(rich_body, &name, warnings),
            },
            MacroKind::Code => {
                let content = plain_body.unwrap_or_else(|| {
                    warnings.push(ConversionWarning::MissingMacroBody { name: name.clone() });
                    String::new()
                });
                Block::CodeBlock {
                    language: params.get("language").cloned(),
                    content,
                }
            }
            MacroKind::Expand => Block::Expand {
                title: params
                    .get("title")
                    .cloned()
                    .unwrap_or_else(|| String::from("Details")),
                content: self.rich_document(rich_body, &name, warnings),
            },
            MacroKind::Diagram(kind) => {
                return Some(self.diagram_block(kind, &name, &params, plain_body, warnings));
            }
        };
        Some(block)
    }

    fn rich_document(
        &self,
        body: Option<&XmlNode>,
        name: &str,
        warnings: &mut Vec<ConversionWarning>,
    ) -> Document {
        match body {
            Some(b) => Document(self.blocks_from(b, warnings)),
            None => {
                warnings.push(ConversionWarning::MissingMacroBody {
                    name: name.to_owned(),
                });
                Document::new()
            }
        }
    }

    fn diagram_block(
        &self,
        kind: DiagramKind,
        name: &str,
        params: &std::collections::HashMap<String, String>,
        plain_body: Option<String>,
        warnings: &mut Vec<ConversionWarning>,
    ) -> Block {
        if let Some(source) = plain_body {
            return Block::Diagram { kind, source };
        }

        let attachment = params
            .get("diagramName")
            .or_else(|| params.get("attachment"))
            .cloned();
        if kind == DiagramKind::Drawio
            && let Some(attachment) = attachment
        {
            // Attachment-stored diagram: round-trippable marker quote. The
            // write path recognizes this exact shape.
            return drawio_marker(&attachment);
        }

        // Only a rendered representation is available. Never fabricate
        // content; leave an explicit marker instead.
        warnings.push(ConversionWarning::DiagramSourceUnavailable {
            name: name.to_owned(),
        });
        Block::Quote {
            callout: None,
            content: Document(vec![Block::Paragraph(vec![Inline::Text(format!(
                "\u{26a0}\u{fe0f} {kind} diagram source unavailable"
            ))])]),
        }
    }
}

/// Marker quote representing a draw.io diagram stored as an attachment.
fn drawio_marker(attachment: &str) -> Block {
    Block::Quote {
        callout: None,
        content: Document(vec![Block::Paragraph(vec![
            Inline::Text(String::from("\u{1f4ca} ")),
            Inline::Strong(vec![Inline::Text(String::from("Draw.io Diagram:"))]),
            Inline::Text(format!(" {attachment}")),
            Inline::LineBreak,
            Inline::Link {
                url: String::from("https://app.diagrams.net/"),
                content: vec![Inline::Text(String::from("Open in diagrams.net"))],
            },
        ])]),
    }
}

fn macro_params(node: &XmlNode) -> std::collections::HashMap<String, String> {
    node.children
        .iter()
        .filter(|c| c.tag == "ac:parameter")
        .filter_map(|c| {
            c.attr("ac:name")
                .map(|key| (key.to_owned(), c.plain_text().trim().to_owned()))
        })
        .collect()
}

fn table_block(node: &XmlNode) -> Block {
    let mut rows = Vec::new();
    collect_rows(node, &mut rows);
    Block::Table { rows }
}

fn collect_rows(node: &XmlNode, rows: &mut Vec<Vec<Vec<Inline>>>) {
    for child in &node.children {
        match child.tag.as_str() {
            "tr" => {
                let cells = child
                    .children
                    .iter()
                    .filter(|c| c.tag == "td" || c.tag == "th")
                    .map(inline_content)
                    .collect();
                rows.push(cells);
            }
            "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
            _ => {}
        }
    }
}

fn pre_block(node: &XmlNode) -> Block {
    let (content, language) = node.find_child("code").map_or_else(
        || (node.plain_text(), None),
        |code| {
            let language = code
                .attr("class")
                .and_then(|c| c.split_whitespace().find_map(|c| c.strip_prefix("language-")))
                .map(str::to_owned);
            (code.plain_text(), language)
        },
    );
    Block::CodeBlock { language, content }
}

/// Block-level XHTML tags; everything else is treated as inline flow.
fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "h1" | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "p"
            | "ul"
            | "ol"
            | "table"
            | "blockquote"
            | "hr"
            | "pre"
            | "div"
            | "section"
            | "ac:structured-macro"
            | "ac:image"
            | "ac:layout"
            | "ac:layout-section"
            | "ac:layout-cell"
    )
}

/// Inline content of a node, whitespace-normalized for prose.
fn inline_content(node: &XmlNode) -> Vec<Inline> {
    let mut out = Vec::new();
    if !node.text.is_empty() {
        out.push(Inline::Text(node.text.clone()));
    }
    for child in &node.children {
        push_inline(child, &mut out);
        if !child.tail.is_empty() {
            out.push(Inline::Text(child.tail.clone()));
        }
    }
    normalize_inlines(out)
}

fn push_inline(child: &XmlNode, out: &mut Vec<Inline>) {
    match child.tag.as_str() {
        "strong" | "b" => out.push(Inline::Strong(inline_content(child))),
        "em" | "i" => out.push(Inline::Emphasis(inline_content(child))),
        "s" | "del" | "strike" => out.push(Inline::Strikethrough(inline_content(child))),
        "code" | "tt" => out.push(Inline::Code(child.plain_text())),
        "a" => out.push(Inline::Link {
            url: child.attr("href").unwrap_or("").to_owned(),
            content: inline_content(child),
        }),
        "br" => out.push(Inline::LineBreak),
        "ac:image" => out.push(image_inline(child)),
        // Unknown inline containers are flattened, never dropped.
        _ => {
            if !child.text.is_empty() {
                out.push(Inline::Text(child.text.clone()));
            }
            for grandchild in &child.children {
                push_inline(grandchild, out);
                if !grandchild.tail.is_empty() {
                    out.push(Inline::Text(grandchild.tail.clone()));
                }
            }
        }
    }
}

fn image_inline(node: &XmlNode) -> Inline {
    let url = node
        .find_child("ri:url")
        .and_then(|n| n.attr("ri:value"))
        .or_else(|| {
            node.find_child("ri:attachment")
                .and_then(|n| n.attr("ri:filename"))
        })
        .unwrap_or("")
        .to_owned();
    let alt = node.attr("ac:alt").unwrap_or("").to_owned();
    Inline::Image { url, alt }
}

/// Collapse XHTML pretty-printing whitespace and trim paragraph edges.
fn normalize_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => {
                let collapsed = collapse_whitespace(&text);
                if !collapsed.is_empty() {
                    out.push(Inline::Text(collapsed));
                }
            }
            other => out.push(other),
        }
    }
    // Trim the outer edges so paragraphs do not start or end with blanks.
    if let Some(Inline::Text(first)) = out.first_mut() {
        *first = first.trim_start().to_owned();
    }
    if let Some(Inline::Text(last)) = out.last_mut() {
        *last = last.trim_end().to_owned();
    }
    out.retain(|i| !matches!(i, Inline::Text(t) if t.is_empty()));
    out
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}

fn flush_paragraph(pending: &mut Vec<Inline>, blocks: &mut Vec<Block>) {
    if pending.is_empty() {
        return;
    }
    let content = normalize_inlines(std::mem::take(pending));
    if !content.is_empty() {
        blocks.push(Block::Paragraph(content));
    }
}

// --- markdown serialization ---

fn render_blocks(blocks: &[Block], placeholders: &mut PlaceholderMap) -> String {
    let rendered: Vec<String> = blocks
        .iter()
        .map(|b| render_block(b, placeholders))
        .filter(|s| !s.is_empty())
        .collect();
    rendered.join("\n\n")
}

fn render_block(block: &Block, placeholders: &mut PlaceholderMap) -> String {
    match block {
        Block::Heading { level, content } => {
            let hashes = "#".repeat(usize::from(*level).clamp(1, 6));
            format!("{hashes} {}", render_inlines(content))
        }
        Block::Paragraph(content) => render_inlines(content),
        Block::List { ordered, items } => render_list(*ordered, items, placeholders),
        Block::Table { rows } => render_table(rows),
        Block::CodeBlock { language, content } => {
            placeholders.protect(PlaceholderKind::Code, language.clone(), content.clone())
        }
        Block::Diagram { kind, source } => {
            placeholders.protect(PlaceholderKind::Diagram(*kind), None, source.clone())
        }
        Block::Macro { name, .. } => {
            format!("> \u{26a0}\u{fe0f} **Unsupported macro:** {name}")
        }
        Block::Quote { callout, content } => {
            let mut body = render_blocks(&content.0, placeholders);
            if let Some(kind) = callout {
                let marker = format!("**{}:**", kind.marker_label());
                body = if body.is_empty() {
                    marker
                } else {
                    format!("{marker}\n{body}")
                };
            }
            quote_lines(&body)
        }
        Block::Expand { title, content } => {
            let body = render_blocks(&content.0, placeholders);
            format!("<!-- expand: {title} -->\n\n{body}\n\n<!-- /expand -->")
        }
        Block::ThematicBreak => String::from("---"),
    }
}

fn render_list(ordered: bool, items: &[Vec<Block>], placeholders: &mut PlaceholderMap) -> String {
    let mut lines = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let marker = if ordered {
            format!("{}. ", index + 1)
        } else {
            String::from("- ")
        };
        let body = item
            .iter()
            .map(|b| render_block(b, placeholders))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        for (i, line) in body.lines().enumerate() {
            if i == 0 {
                lines.push(format!("{marker}{line}"));
            } else {
                lines.push(format!("    {line}"));
            }
        }
        if body.is_empty() {
            lines.push(marker.trim_end().to_owned());
        }
    }
    lines.join("\n")
}

fn render_table(rows: &[Vec<Vec<Inline>>]) -> String {
    let mut lines = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| render_inlines(cell).replace('\n', " ").replace('|', "\\|"))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            let separator: Vec<&str> = row.iter().map(|_| "---").collect();
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }
    lines.join("\n")
}

fn quote_lines(body: &str) -> String {
    body.lines()
        .map(|line| {
            if line.is_empty() {
                String::from(">")
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&escape_markdown(text)),
            Inline::Code(code) => {
                if code.contains('`') {
                    out.push_str(&format!("`` {code} ``"));
                } else {
                    out.push_str(&format!("`{code}`"));
                }
            }
            Inline::Emphasis(content) => {
                out.push('*');
                out.push_str(&render_inlines(content));
                out.push('*');
            }
            Inline::Strong(content) => {
                out.push_str("**");
                out.push_str(&render_inlines(content));
                out.push_str("**");
            }
            Inline::Strikethrough(content) => {
                out.push_str("~~");
                out.push_str(&render_inlines(content));
                out.push_str("~~");
            }
            Inline::Link { url, content } => {
                out.push('[');
                out.push_str(&render_inlines(content));
                out.push_str(&format!("]({url})"));
            }
            Inline::Image { url, alt } => {
                out.push_str(&format!("![{alt}]({url})"));
            }
            Inline::LineBreak => out.push('\n'),
        }
    }
    out
}

/// Escape markdown syntax characters in prose text.
///
/// This is the lossy pass protected content must never meet: placeholder
/// tokens contain none of these characters, so they pass through untouched.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    // A leading ordinal would misparse as a list item marker.
    escape_leading_ordinal(&out)
}

fn escape_leading_ordinal(text: &str) -> String {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && text[digits..].starts_with('.') {
        format!("{}\\.{}", &text[..digits], &text[digits + 1..])
    } else {
        text.to_owned()
    }
}

/// Render a restored placeholder entry as a fenced block.
fn fenced_block(entry: &crate::placeholder::PlaceholderEntry) -> String {
    let language = match entry.kind {
        PlaceholderKind::Code => entry.language.clone().unwrap_or_default(),
        PlaceholderKind::Diagram(kind) | PlaceholderKind::DiagramRef(kind) => {
            kind.fence_language().to_owned()
        }
    };
    format!("```{language}\n{}\n```", entry.content)
}
