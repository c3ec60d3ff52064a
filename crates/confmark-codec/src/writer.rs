//! Markdown to storage format conversion (write path).
//!
//! Code fences and diagram markers are pulled out of the markdown text and
//! replaced with placeholder tokens before the markdown parser ever runs;
//! the remaining prose goes through a pulldown-cmark event renderer, and
//! the tokens are swapped for storage macros at the end. Restoration is
//! strict here: a token that went missing aborts the conversion rather than
//! publishing a corrupted page.

use std::fmt::Write as _;
use std::sync::LazyLock;

use confmark_diagrams::{DiagramKind, RenderMode, codec, links};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::block::CalloutKind;
use crate::error::{ConversionError, ConversionWarning};
use crate::placeholder::{PlaceholderEntry, PlaceholderKind, PlaceholderMap};

static FRONT_MATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---[ \t]*\n.*?\n---[ \t]*\n").expect("invalid regex"));

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^```([^\n]*)\n(.*?)^```[ \t]*$").expect("invalid regex"));

static DRAWIO_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^> ?(?:\u{1f4ca} )?\*\*Draw\.io Diagram:?\*\*:? *([^\n]+?)[ \t]*$(?:\n> ?\[[^\]\n]*\]\([^)\n]*\))?",
    )
    .expect("invalid regex")
});

static EXPAND_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A<!--\s*expand:\s*(.*?)\s*-->\s*\z").expect("invalid regex"));

static EXPAND_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A<!--\s*/expand\s*-->\s*\z").expect("invalid regex"));

/// A diagram destined for attachment storage.
///
/// The generated macro references the attachment by filename; the caller
/// must upload the bytes under that name before persisting the page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Result of a markdown to storage conversion.
#[derive(Debug)]
pub struct MarkdownConversion {
    pub storage: String,
    /// Attachments the storage body references but which do not exist yet.
    pub attachments: Vec<PendingAttachment>,
    pub warnings: Vec<ConversionWarning>,
}

/// Converts markdown to Confluence storage format.
///
/// Diagram handling is configurable per kind; everything else is fixed.
/// Stateless between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownConverter {
    mermaid_mode: RenderMode,
    drawio_mode: RenderMode,
}

impl MarkdownConverter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How mermaid fences are represented in storage.
    #[must_use]
    pub fn mermaid_mode(mut self, mode: RenderMode) -> Self {
        self.mermaid_mode = mode;
        self
    }

    /// How draw.io fences are represented in storage.
    #[must_use]
    pub fn drawio_mode(mut self, mode: RenderMode) -> Self {
        self.drawio_mode = mode;
        self
    }

    /// Convert a markdown document to a storage-format body.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if the markdown uses a construct with no
    /// storage representation, or if a protected span cannot be restored.
    pub fn convert(&self, markdown: &str) -> Result<MarkdownConversion, ConversionError> {
        tracing::info!(len = markdown.len(), "converting markdown to storage format");

        let body = FRONT_MATTER_RE.replace(markdown, "");
        let mut placeholders = PlaceholderMap::for_source(&body);

        // Fences first so marker-shaped text inside code is never touched.
        let protected = FENCE_RE.replace_all(&body, |caps: &regex::Captures<'_>| {
            let language = caps[1].split_whitespace().next().unwrap_or("").to_owned();
            let content = caps[2].strip_suffix('\n').unwrap_or(&caps[2]).to_owned();
            match DiagramKind::parse(&language) {
                Some(kind) => placeholders.protect(PlaceholderKind::Diagram(kind), None, content),
                None => {
                    let language = (!language.is_empty()).then_some(language);
                    placeholders.protect(PlaceholderKind::Code, language, content)
                }
            }
        });
        let protected = DRAWIO_MARKER_RE.replace_all(&protected, |caps: &regex::Captures<'_>| {
            placeholders.protect(
                PlaceholderKind::DiagramRef(DiagramKind::Drawio),
                None,
                caps[1].to_owned(),
            )
        });

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        let parser = Parser::new_ext(&protected, options);
        let rendered = StorageRenderer::new().render(parser)?;

        let mut attachments = Vec::new();
        let mut warnings = Vec::new();
        let storage = placeholders.restore(&rendered, |entry| {
            self.storage_for(entry, &mut attachments, &mut warnings)
        })?;

        tracing::info!(
            attachments = attachments.len(),
            warnings = warnings.len(),
            "markdown conversion finished"
        );
        Ok(MarkdownConversion {
            storage,
            attachments,
            warnings,
        })
    }

    fn storage_for(
        &self,
        entry: &PlaceholderEntry,
        attachments: &mut Vec<PendingAttachment>,
        warnings: &mut Vec<ConversionWarning>,
    ) -> String {
        match entry.kind {
            PlaceholderKind::Code => code_macro(entry.language.as_deref(), &entry.content),
            PlaceholderKind::Diagram(DiagramKind::Mermaid) => {
                self.mermaid_storage(&entry.content, warnings)
            }
            PlaceholderKind::Diagram(DiagramKind::Drawio) => {
                self.drawio_storage(&entry.content, attachments, warnings)
            }
            PlaceholderKind::DiagramRef(kind) => diagram_ref_macro(kind, &entry.content),
        }
    }

    fn mermaid_storage(&self, source: &str, warnings: &mut Vec<ConversionWarning>) -> String {
        match self.mermaid_mode {
            RenderMode::NativeMacro => diagram_macro(DiagramKind::Mermaid, source),
            RenderMode::ImageLink => match codec::encode(source) {
                Ok(token) => {
                    let mut out = format!(
                        r#"<ac:image ac:alt="Mermaid diagram"><ri:url ri:value="{}" /></ac:image>"#,
                        escape_xml(&links::mermaid_image_url(&token))
                    );
                    out.push_str(&collapsible_source(
                        "Mermaid diagram source",
                        Some("mermaid"),
                        source,
                        Some(("Open in Mermaid Live Editor", &links::mermaid_editor_url(&token))),
                    ));
                    out
                }
                Err(err) => degraded_code_block(DiagramKind::Mermaid, source, err, warnings),
            },
            RenderMode::CollapsibleCodeBlock => match codec::encode(source) {
                Ok(token) => collapsible_source(
                    "Mermaid diagram",
                    Some("mermaid"),
                    source,
                    Some(("Open in Mermaid Live Editor", &links::mermaid_editor_url(&token))),
                ),
                Err(err) => degraded_code_block(DiagramKind::Mermaid, source, err, warnings),
            },
        }
    }

    fn drawio_storage(
        &self,
        source: &str,
        attachments: &mut Vec<PendingAttachment>,
        warnings: &mut Vec<ConversionWarning>,
    ) -> String {
        match self.drawio_mode {
            RenderMode::NativeMacro => {
                let filename = format!("diagram-{}.drawio", attachments.len() + 1);
                attachments.push(PendingAttachment {
                    filename: filename.clone(),
                    bytes: source.as_bytes().to_vec(),
                });
                diagram_ref_macro(DiagramKind::Drawio, &filename)
            }
            RenderMode::ImageLink | RenderMode::CollapsibleCodeBlock => {
                match codec::encode(source) {
                    Ok(token) => collapsible_source(
                        "Draw.io diagram",
                        Some("xml"),
                        source,
                        Some(("Open in diagrams.net", &links::drawio_editor_url(&token))),
                    ),
                    Err(err) => degraded_code_block(DiagramKind::Drawio, source, err, warnings),
                }
            }
        }
    }
}

/// Encode failure fallback: keep the diagram as a plain code macro so the
/// source is never lost, and record the degradation.
fn degraded_code_block(
    kind: DiagramKind,
    source: &str,
    err: confmark_diagrams::EncodingError,
    warnings: &mut Vec<ConversionWarning>,
) -> String {
    tracing::warn!(%kind, error = %err, "diagram encoding failed, keeping code block");
    warnings.push(ConversionWarning::DiagramEncoding {
        kind,
        message: err.to_string(),
    });
    code_macro(Some(kind.fence_language()), source)
}

fn code_macro(language: Option<&str>, content: &str) -> String {
    let mut out = String::from(r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#);
    if let Some(language) = language {
        let _ = write!(
            out,
            r#"<ac:parameter ac:name="language">{}</ac:parameter>"#,
            escape_xml(language)
        );
    }
    out.push_str(r#"<ac:parameter ac:name="linenumbers">true</ac:parameter>"#);
    out.push_str("<ac:plain-text-body><![CDATA[");
    out.push_str(&cdata(content));
    out.push_str("]]></ac:plain-text-body></ac:structured-macro>");
    out
}

fn diagram_macro(kind: DiagramKind, source: &str) -> String {
    format!(
        concat!(
            r#"<ac:structured-macro ac:name="{name}" ac:schema-version="1">"#,
            "<ac:plain-text-body><![CDATA[{body}]]></ac:plain-text-body>",
            "</ac:structured-macro>"
        ),
        name = kind.macro_name(),
        body = cdata(source),
    )
}

/// Macro referencing a diagram stored as a page attachment.
fn diagram_ref_macro(kind: DiagramKind, attachment: &str) -> String {
    format!(
        concat!(
            r#"<ac:structured-macro ac:name="{name}" ac:schema-version="1">"#,
            r#"<ac:parameter ac:name="diagramName">{file}</ac:parameter>"#,
            r#"<ac:parameter ac:name="attachment">{file}</ac:parameter>"#,
            "</ac:structured-macro>"
        ),
        name = kind.macro_name(),
        file = escape_xml(attachment),
    )
}

/// Expand macro holding the literal source and an optional editor link.
fn collapsible_source(
    title: &str,
    language: Option<&str>,
    source: &str,
    editor_link: Option<(&str, &str)>,
) -> String {
    let mut out = format!(
        concat!(
            r#"<ac:structured-macro ac:name="expand" ac:schema-version="1">"#,
            r#"<ac:parameter ac:name="title">{}</ac:parameter>"#,
            "<ac:rich-text-body>"
        ),
        escape_xml(title)
    );
    out.push_str(&code_macro(language, source));
    if let Some((label, url)) = editor_link {
        let _ = write!(
            out,
            r#"<p><a href="{}">{}</a></p>"#,
            escape_xml(url),
            escape_xml(label)
        );
    }
    out.push_str("</ac:rich-text-body></ac:structured-macro>");
    out
}

/// Split any `]]>` so the CDATA section cannot be terminated early.
fn cdata(content: &str) -> String {
    content.replace("]]>", "]]]]><![CDATA[>")
}

/// Renders pulldown-cmark events to storage-format XHTML.
struct StorageRenderer {
    output: String,
    in_code_block: bool,
    /// Code text buffered until the block ends so CDATA splitting sees the
    /// whole body.
    code_buffer: String,
    in_table_head: bool,
    /// Output offsets where open blockquotes began.
    quote_starts: Vec<usize>,
}

impl StorageRenderer {
    fn new() -> Self {
        Self {
            output: String::with_capacity(4096),
            in_code_block: false,
            code_buffer: String::new(),
            in_table_head: false,
            quote_starts: Vec::new(),
        }
    }

    fn render<'a, I>(mut self, events: I) -> Result<String, ConversionError>
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in events {
            self.process_event(event)?;
        }
        Ok(self.output)
    }

    fn process_event(&mut self, event: Event<'_>) -> Result<(), ConversionError> {
        match event {
            Event::Start(tag) => self.start_tag(&tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_buffer.push_str(&text);
                } else {
                    self.output.push_str(&escape_xml(&text));
                }
            }
            Event::Code(code) => {
                let _ = write!(self.output, "<code>{}</code>", escape_xml(&code));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.html(&html),
            Event::SoftBreak => self.output.push('\n'),
            Event::HardBreak => self.output.push_str("<br />"),
            Event::Rule => self.output.push_str("<hr />"),
            Event::TaskListMarker(checked) => {
                self.output.push_str(if checked { "[x] " } else { "[ ] " });
            }
            Event::InlineMath(_) | Event::DisplayMath(_) => {
                return Err(ConversionError::UnsupportedBlock("math"));
            }
            Event::FootnoteReference(_) => {
                return Err(ConversionError::UnsupportedBlock("footnote"));
            }
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: &Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.in_code_block {
                    self.output.push_str("<p>");
                }
            }
            Tag::Heading { level, .. } => {
                let _ = write!(self.output, "<h{}>", *level as u8);
            }
            Tag::BlockQuote(_) => {
                self.quote_starts.push(self.output.len());
            }
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                self.code_buffer.clear();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                        lang.split_whitespace().next().map(str::to_owned)
                    }
                    _ => None,
                };
                self.output
                    .push_str(r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#);
                if let Some(language) = language {
                    let _ = write!(
                        self.output,
                        r#"<ac:parameter ac:name="language">{}</ac:parameter>"#,
                        escape_xml(&language)
                    );
                }
                self.output.push_str("<ac:plain-text-body><![CDATA[");
            }
            Tag::List(start) => {
                self.output
                    .push_str(if start.is_some() { "<ol>" } else { "<ul>" });
            }
            Tag::Item => self.output.push_str("<li>"),
            Tag::Table(_) => self.output.push_str("<table><tbody>"),
            Tag::TableHead => {
                self.in_table_head = true;
                self.output.push_str("<tr>");
            }
            Tag::TableRow => self.output.push_str("<tr>"),
            Tag::TableCell => {
                self.output
                    .push_str(if self.in_table_head { "<th>" } else { "<td>" });
            }
            Tag::Emphasis => self.output.push_str("<em>"),
            Tag::Strong => self.output.push_str("<strong>"),
            Tag::Strikethrough => self.output.push_str("<s>"),
            Tag::Superscript => self.output.push_str("<sup>"),
            Tag::Subscript => self.output.push_str("<sub>"),
            Tag::Link { dest_url, .. } => {
                let _ = write!(self.output, r#"<a href="{}">"#, escape_xml(dest_url));
            }
            Tag::Image { dest_url, .. } => {
                if dest_url.starts_with("http://") || dest_url.starts_with("https://") {
                    let _ = write!(
                        self.output,
                        r#"<ac:image><ri:url ri:value="{}" /></ac:image>"#,
                        escape_xml(dest_url)
                    );
                } else {
                    // Local path: reference it as a page attachment.
                    let filename = dest_url.rsplit('/').next().unwrap_or(dest_url);
                    let _ = write!(
                        self.output,
                        r#"<ac:image><ri:attachment ri:filename="{}" /></ac:image>"#,
                        escape_xml(filename)
                    );
                }
            }
            Tag::DefinitionList => self.output.push_str("<dl>"),
            Tag::DefinitionListTitle => self.output.push_str("<dt>"),
            Tag::DefinitionListDefinition => self.output.push_str("<dd>"),
            Tag::FootnoteDefinition(_) | Tag::HtmlBlock | Tag::MetadataBlock(_) => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if !self.in_code_block {
                    self.output.push_str("</p>");
                }
            }
            TagEnd::Heading(level) => {
                let _ = write!(self.output, "</h{}>", level as u8);
            }
            TagEnd::BlockQuote(_) => self.close_quote(),
            TagEnd::CodeBlock => {
                // Fence content from the parser carries the closing newline.
                let content = self.code_buffer.strip_suffix('\n').unwrap_or(&self.code_buffer);
                let body = cdata(content);
                self.output.push_str(&body);
                self.output
                    .push_str("]]></ac:plain-text-body></ac:structured-macro>");
                self.in_code_block = false;
                self.code_buffer.clear();
            }
            TagEnd::List(ordered) => {
                self.output.push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => self.output.push_str("</li>"),
            TagEnd::Table => self.output.push_str("</tbody></table>"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.output.push_str("</tr>");
            }
            TagEnd::TableRow => self.output.push_str("</tr>"),
            TagEnd::TableCell => {
                self.output
                    .push_str(if self.in_table_head { "</th>" } else { "</td>" });
            }
            TagEnd::Emphasis => self.output.push_str("</em>"),
            TagEnd::Strong => self.output.push_str("</strong>"),
            TagEnd::Strikethrough => self.output.push_str("</s>"),
            TagEnd::Superscript => self.output.push_str("</sup>"),
            TagEnd::Subscript => self.output.push_str("</sub>"),
            TagEnd::Link => self.output.push_str("</a>"),
            TagEnd::Image => {}
            TagEnd::DefinitionList => self.output.push_str("</dl>"),
            TagEnd::DefinitionListTitle => self.output.push_str("</dt>"),
            TagEnd::DefinitionListDefinition => self.output.push_str("</dd>"),
            TagEnd::FootnoteDefinition | TagEnd::HtmlBlock | TagEnd::MetadataBlock(_) => {}
        }
    }

    /// Close the innermost blockquote, promoting a leading callout marker
    /// into the corresponding admonition macro.
    fn close_quote(&mut self) {
        let Some(start) = self.quote_starts.pop() else {
            return;
        };
        let inner = self.output.split_off(start);
        if let Some((kind, body)) = detect_callout(&inner) {
            let _ = write!(
                self.output,
                concat!(
                    r#"<ac:structured-macro ac:name="{}" ac:schema-version="1">"#,
                    "<ac:rich-text-body>{}</ac:rich-text-body></ac:structured-macro>"
                ),
                kind.macro_name(),
                body
            );
        } else {
            let _ = write!(self.output, "<blockquote>{inner}</blockquote>");
        }
    }

    fn html(&mut self, html: &str) {
        let trimmed = html.trim();
        if let Some(caps) = EXPAND_OPEN_RE.captures(trimmed) {
            let _ = write!(
                self.output,
                concat!(
                    r#"<ac:structured-macro ac:name="expand" ac:schema-version="1">"#,
                    r#"<ac:parameter ac:name="title">{}</ac:parameter>"#,
                    "<ac:rich-text-body>"
                ),
                escape_xml(&caps[1])
            );
        } else if EXPAND_CLOSE_RE.is_match(trimmed) {
            self.output
                .push_str("</ac:rich-text-body></ac:structured-macro>");
        } else {
            // Raw XHTML passes through untouched.
            self.output.push_str(html);
        }
    }
}

/// Detect a callout marker at the start of a rendered blockquote body.
///
/// The read path emits `<p><strong>{label}:</strong>` followed by a soft
/// break; hand-written `> **Info:** text` lands in the same shape.
fn detect_callout(inner: &str) -> Option<(CalloutKind, String)> {
    let body = inner.strip_prefix("<p><strong>")?;
    let close = body.find("</strong>")?;
    let marker = &body[..close];
    let kind = CalloutKind::from_marker(marker)?;
    let rest = body[close + "</strong>".len()..]
        .trim_start_matches(['\n', ' '])
        .trim_start_matches("<br />")
        .trim_start_matches(['\n', ' ']);
    // A marker alone in its paragraph: the body is whatever follows it.
    if let Some(remainder) = rest.strip_prefix("</p>") {
        return Some((kind, remainder.to_owned()));
    }
    Some((kind, format!("<p>{rest}")))
}

fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn convert(markdown: &str) -> MarkdownConversion {
        MarkdownConverter::new().convert(markdown).unwrap()
    }

    #[test]
    fn test_basic_paragraph() {
        let result = convert("Hello, world!");
        assert_eq!(result.storage, "<p>Hello, world!</p>");
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(convert("# Title").storage, "<h1>Title</h1>");
        assert_eq!(convert("### Deep").storage, "<h3>Deep</h3>");
    }

    #[test]
    fn test_code_fence_exact_content() {
        let result = convert("```python\nif a < b and c == \"&\":\n    pass\n```");
        assert!(result.storage.contains(r#"<ac:parameter ac:name="language">python</ac:parameter>"#));
        assert!(result
            .storage
            .contains("<![CDATA[if a < b and c == \"&\":\n    pass]]>"));
    }

    #[test]
    fn test_code_fence_with_cdata_terminator() {
        let result = convert("```\na ]]> b\n```");
        assert!(result.storage.contains("a ]]]]><![CDATA[> b"));
    }

    #[test]
    fn test_fence_containing_markdown_syntax() {
        // Fence bodies never reach the markdown parser.
        let result = convert("```\n# not a heading\n> not a quote\n```");
        assert!(result
            .storage
            .contains("<![CDATA[# not a heading\n> not a quote]]>"));
        assert!(!result.storage.contains("<h1>"));
        assert!(!result.storage.contains("<blockquote>"));
    }

    #[test]
    fn test_mermaid_native_macro() {
        let result = convert("```mermaid\ngraph TD\n    A --> B\n```");
        assert!(result.storage.contains(r#"<ac:structured-macro ac:name="mermaid""#));
        assert!(result.storage.contains("<![CDATA[graph TD\n    A --> B]]>"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_mermaid_image_link_mode() {
        let source = "graph TD\n    A --> B";
        let result = MarkdownConverter::new()
            .mermaid_mode(RenderMode::ImageLink)
            .convert(&format!("```mermaid\n{source}\n```"))
            .unwrap();

        // The image URL must decode back to the exact source.
        let marker = r#"<ri:url ri:value=""#;
        let start = result.storage.find(marker).unwrap() + marker.len();
        let end = start + result.storage[start..].find('"').unwrap();
        let url = &result.storage[start..end];
        let token = url
            .strip_prefix("https://mermaid.ink/img/pako:")
            .and_then(|u| u.strip_suffix("?type=png"))
            .unwrap();
        assert_eq!(codec::decode(token).unwrap(), source);

        // And the literal source rides along in a collapsible block.
        assert!(result.storage.contains("<![CDATA[graph TD\n    A --> B]]>"));
        assert!(result.storage.contains("https://mermaid.live/edit#pako:"));
    }

    #[test]
    fn test_drawio_native_macro_produces_attachment() {
        let result = convert("```drawio\n<mxfile><diagram>x</diagram></mxfile>\n```");
        assert_eq!(result.attachments.len(), 1);
        let attachment = &result.attachments[0];
        assert_eq!(attachment.filename, "diagram-1.drawio");
        assert_eq!(attachment.bytes, b"<mxfile><diagram>x</diagram></mxfile>");
        assert!(result
            .storage
            .contains(r#"<ac:parameter ac:name="diagramName">diagram-1.drawio</ac:parameter>"#));
    }

    #[test]
    fn test_drawio_marker_round_trips_to_macro() {
        let markdown = "> \u{1f4ca} **Draw.io Diagram:** flow.drawio\n> [Open in diagrams.net](https://app.diagrams.net/)\n";
        let result = convert(markdown);
        assert!(result
            .storage
            .contains(r#"<ac:parameter ac:name="diagramName">flow.drawio</ac:parameter>"#));
        assert!(result.attachments.is_empty());
    }

    #[test]
    fn test_callout_quote_to_info_macro() {
        let result = convert("> **\u{2139}\u{fe0f} Info:**\n> remember this");
        assert_eq!(
            result.storage,
            concat!(
                r#"<ac:structured-macro ac:name="info" ac:schema-version="1">"#,
                "<ac:rich-text-body><p>remember this</p></ac:rich-text-body></ac:structured-macro>"
            )
        );
    }

    #[test]
    fn test_bare_callout_word_detected() {
        let result = convert("> **Warning:** careful");
        assert!(result.storage.contains(r#"ac:name="warning""#));
        assert!(result.storage.contains("<p>careful</p>"));
    }

    #[test]
    fn test_quoted_fence_nests_inside_callout_macro() {
        let result = convert("> **\u{2139}\u{fe0f} Info:**\n>\n> ```rust\n> let x = 1;\n> ```");
        assert_eq!(
            result.storage,
            concat!(
                r#"<ac:structured-macro ac:name="info" ac:schema-version="1">"#,
                "<ac:rich-text-body>",
                r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#,
                r#"<ac:parameter ac:name="language">rust</ac:parameter>"#,
                "<ac:plain-text-body><![CDATA[let x = 1;]]></ac:plain-text-body>",
                "</ac:structured-macro></ac:rich-text-body></ac:structured-macro>"
            )
        );
    }

    #[test]
    fn test_plain_quote_stays_blockquote() {
        let result = convert("> just quoting");
        assert_eq!(result.storage, "<blockquote><p>just quoting</p></blockquote>");
    }

    #[test]
    fn test_expand_comments() {
        let result = convert("<!-- expand: More -->\n\nhidden text\n\n<!-- /expand -->\n");
        assert_eq!(
            result.storage,
            concat!(
                r#"<ac:structured-macro ac:name="expand" ac:schema-version="1">"#,
                r#"<ac:parameter ac:name="title">More</ac:parameter>"#,
                "<ac:rich-text-body><p>hidden text</p></ac:rich-text-body></ac:structured-macro>"
            )
        );
    }

    #[test]
    fn test_table_with_header() {
        let result = convert("| Name | Age |\n| --- | --- |\n| Ada | 36 |\n");
        assert_eq!(
            result.storage,
            "<table><tbody><tr><th>Name</th><th>Age</th></tr><tr><td>Ada</td><td>36</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_nested_list() {
        let result = convert("- one\n- two\n    - deep\n");
        assert_eq!(
            result.storage,
            "<ul><li>one</li><li>two<ul><li>deep</li></ul></li></ul>"
        );
    }

    #[test]
    fn test_escaped_prose_unescaped_in_storage() {
        let result = convert("под\\_черк and \\*stars\\*");
        assert_eq!(result.storage, "<p>под_черк and *stars*</p>");
    }

    #[test]
    fn test_xml_escaping_in_prose() {
        let result = convert("a < b & c > d");
        assert_eq!(result.storage, "<p>a &lt; b &amp; c &gt; d</p>");
    }

    #[test]
    fn test_front_matter_stripped() {
        let result = convert("---\ntitle: Page\n---\n\nbody text\n");
        assert_eq!(result.storage, "<p>body text</p>");
    }

    #[test]
    fn test_dollar_signs_stay_literal() {
        // Math extensions are not enabled; dollar signs are plain prose.
        let result = convert("price is $5 and $x$");
        assert_eq!(result.storage, "<p>price is $5 and $x$</p>");
    }

    #[test]
    fn test_external_and_attachment_images() {
        let result = convert("![logo](https://e.x/a.png) and ![shot](images/shot.png)");
        assert!(result
            .storage
            .contains(r#"<ac:image><ri:url ri:value="https://e.x/a.png" /></ac:image>"#));
        assert!(result
            .storage
            .contains(r#"<ac:image><ri:attachment ri:filename="shot.png" /></ac:image>"#));
    }

    #[test]
    fn test_inline_code_preserved() {
        let result = convert("see `my_fn` here");
        assert_eq!(result.storage, "<p>see <code>my_fn</code> here</p>");
    }

    #[test]
    fn test_thematic_break() {
        let result = convert("a\n\n---\n\nb");
        assert_eq!(result.storage, "<p>a</p><hr /><p>b</p>");
    }
}
