//! Tolerant storage-format XML parser.
//!
//! Confluence storage bodies are XHTML fragments with `ac:`/`ri:` prefixed
//! elements and no namespace declarations of their own, so the fragment is
//! wrapped in a declaring root before parsing. Attribute order never matters;
//! entity references are decoded to their character values; CDATA sections
//! are taken raw, byte for byte, which is what keeps plain-text macro bodies
//! exact.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ParseError;

/// Storage namespace declarations added to the wrapping root.
const NAMESPACES: &[(&str, &str)] = &[
    ("ac", "http://www.atlassian.com/schema/confluence/4/ac/"),
    ("ri", "http://www.atlassian.com/schema/confluence/4/ri/"),
];

/// Node in the parsed storage tree.
///
/// Mixed content uses the text/tail convention: `text` is the run before the
/// first child, each child's `tail` is the run following it inside the same
/// parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Element name with its prefix (e.g. `ac:structured-macro`).
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub tail: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// First direct child with the given tag.
    #[must_use]
    pub fn find_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Concatenated text of this node and all descendants, tails included.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }
}

/// Parse a storage-format fragment into a tree.
///
/// The returned node is the synthetic wrapping root; the fragment's top-level
/// elements are its children.
///
/// # Errors
///
/// Returns [`ParseError`] with the offending byte position if the fragment is
/// not well-formed XML. The whole conversion aborts; there is no partial
/// output.
pub fn parse_storage(storage: &str) -> Result<XmlNode, ParseError> {
    let decls = NAMESPACES
        .iter()
        .map(|(prefix, uri)| format!(r#"xmlns:{prefix}="{uri}""#))
        .collect::<Vec<_>>()
        .join(" ");
    let wrapped = format!("<confmark-root {decls}>{storage}</confmark-root>");

    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| error_at(&reader, &e))?
        {
            Event::Start(e) => {
                let tag = decode_name(&reader, e.name().as_ref());
                let attrs = decode_attrs(&reader, &e);
                let mut root = parse_children(&mut reader, &tag)?;
                root.tag = tag;
                root.attrs = attrs;
                return Ok(root);
            }
            Event::Eof => {
                return Err(ParseError {
                    position: reader.buffer_position(),
                    message: String::from("empty document"),
                });
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_children(reader: &mut Reader<&[u8]>, parent_tag: &str) -> Result<XmlNode, ParseError> {
    let mut buf = Vec::new();
    let mut node = XmlNode::default();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| error_at(reader, &e))?
        {
            Event::Start(e) => {
                let tag = decode_name(reader, e.name().as_ref());
                let attrs = decode_attrs(reader, &e);
                let mut child = parse_children(reader, &tag)?;
                child.tag = tag;
                child.attrs = attrs;
                node.children.push(child);
            }
            Event::Empty(e) => {
                node.children.push(XmlNode {
                    tag: decode_name(reader, e.name().as_ref()),
                    attrs: decode_attrs(reader, &e),
                    ..XmlNode::default()
                });
            }
            Event::Text(e) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|e| ParseError {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })?
                    .into_owned();
                append_text(&mut node, &text);
            }
            Event::GeneralRef(e) => {
                let name = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|e| ParseError {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })?
                    .into_owned();
                append_text(&mut node, &decode_entity(&name));
            }
            Event::CData(e) => {
                // Raw bytes, no entity decoding. This is the verbatim path
                // for plain-text macro bodies.
                let text = String::from_utf8_lossy(&e).into_owned();
                append_text(&mut node, &text);
            }
            Event::End(e) => {
                let end_tag = decode_name(reader, e.name().as_ref());
                if end_tag == parent_tag {
                    return Ok(node);
                }
                return Err(ParseError {
                    position: reader.buffer_position(),
                    message: format!("unexpected closing tag `{end_tag}` inside `{parent_tag}`"),
                });
            }
            Event::Eof => {
                return Err(ParseError {
                    position: reader.buffer_position(),
                    message: format!("unclosed element `{parent_tag}`"),
                });
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }
}

fn error_at(reader: &Reader<&[u8]>, err: &quick_xml::Error) -> ParseError {
    ParseError {
        position: reader.buffer_position(),
        message: err.to_string(),
    }
}

fn decode_name(reader: &Reader<&[u8]>, name: &[u8]) -> String {
    reader.decoder().decode(name).map_or_else(
        |_| String::from_utf8_lossy(name).into_owned(),
        std::borrow::Cow::into_owned,
    )
}

fn decode_attrs(reader: &Reader<&[u8]>, e: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = reader.decoder().decode(attr.key.as_ref()).map_or_else(
            |_| String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            std::borrow::Cow::into_owned,
        );
        if key.starts_with("xmlns") {
            continue;
        }
        let value = attr.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attr.value).into_owned(),
            std::borrow::Cow::into_owned,
        );
        attrs.insert(key, value);
    }
    attrs
}

/// Append text to the node's leading run or the last child's tail.
fn append_text(node: &mut XmlNode, text: &str) {
    if let Some(last) = node.children.last_mut() {
        last.tail.push_str(text);
    } else {
        node.text.push_str(text);
    }
}

/// Decode an entity reference name to its character value.
///
/// Covers the XML five, the HTML names Confluence commonly emits, and
/// numeric character references. Unknown names are preserved literally so
/// nothing is silently discarded.
fn decode_entity(name: &str) -> String {
    let ch = match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        "nbsp" => "\u{00a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "bull" => "\u{2022}",
        "rarr" => "\u{2192}",
        "larr" => "\u{2190}",
        "times" => "\u{00d7}",
        "middot" => "\u{00b7}",
        "copy" => "\u{00a9}",
        "reg" => "\u{00ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{00b0}",
        s if s.starts_with('#') => {
            let code = if let Some(hex) = s.strip_prefix("#x").or_else(|| s.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            return code
                .and_then(char::from_u32)
                .map_or_else(|| format!("&{name};"), |c| c.to_string());
        }
        _ => return format!("&{name};"),
    };
    ch.to_owned()
}
