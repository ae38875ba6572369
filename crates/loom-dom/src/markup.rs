//! Markup reader and writer.
//!
//! The reader accepts well-formed markup only: no sanitizing, no implied end
//! tags, no error recovery. It exists so trees can be described compactly in
//! fixtures and inspected after an edit. The writer is the inverse for the
//! node kinds the arena knows about.

use smol_str::SmolStr;
use thiserror::Error;

use crate::document::Document;
use crate::error::DomError;
use crate::node::{NodeData, NodeId};

/// Elements serialized without an end tag and never given children by the reader.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

/// Errors from [`parse_fragment`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarkupError {
    #[error("unclosed <{name}> opened at byte {position}")]
    UnclosedTag { name: SmolStr, position: usize },

    #[error("end tag </{found}> at byte {position} does not match open <{expected}>")]
    MismatchedEndTag {
        expected: SmolStr,
        found: SmolStr,
        position: usize,
    },

    #[error("end tag </{name}> at byte {position} has no open element")]
    UnexpectedEndTag { name: SmolStr, position: usize },

    #[error("unterminated comment starting at byte {position}")]
    UnterminatedComment { position: usize },

    #[error("malformed tag at byte {position}")]
    MalformedTag { position: usize },

    #[error(transparent)]
    Tree(#[from] DomError),
}

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Parse `markup` into a new fragment owned by `doc`.
pub fn parse_fragment(doc: &mut Document, markup: &str) -> Result<NodeId, MarkupError> {
    let fragment = doc.create_fragment();
    let bytes = markup.as_bytes();
    let mut open: Vec<(NodeId, SmolStr, usize)> = Vec::new();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        let parent = open.last().map(|(node, _, _)| *node).unwrap_or(fragment);

        if bytes[idx] != b'<' {
            let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
            let text = doc.create_text(decode_entities(&markup[idx..next]));
            doc.append_child(parent, text)?;
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            let end = find_subslice(bytes, idx + 4, b"-->")
                .ok_or(MarkupError::UnterminatedComment { position: idx })?;
            let comment = doc.create_comment(&markup[idx + 4..end]);
            doc.append_child(parent, comment)?;
            idx = end + 3;
            continue;
        }

        if starts_with(bytes, idx, b"<!") {
            let end =
                find_byte(bytes, idx, b'>').ok_or(MarkupError::MalformedTag { position: idx })?;
            let body = markup[idx + 2..end].trim();
            let name = body
                .strip_prefix("DOCTYPE")
                .or_else(|| body.strip_prefix("doctype"))
                .unwrap_or(body)
                .trim();
            let doctype = doc.create_doctype(name);
            doc.append_child(parent, doctype)?;
            idx = end + 1;
            continue;
        }

        if starts_with(bytes, idx, b"</") {
            let (name, after_name) = read_name(markup, idx + 2);
            let after_spaces = skip_spaces(bytes, after_name);
            if name.is_empty() || bytes.get(after_spaces).copied() != Some(b'>') {
                return Err(MarkupError::MalformedTag { position: idx });
            }
            match open.pop() {
                Some((_, expected, _)) if expected == name => {}
                Some((_, expected, _)) => {
                    return Err(MarkupError::MismatchedEndTag {
                        expected,
                        found: name,
                        position: idx,
                    });
                }
                None => return Err(MarkupError::UnexpectedEndTag { name, position: idx }),
            }
            idx = after_spaces + 1;
            continue;
        }

        let (name, mut cursor) = read_name(markup, idx + 1);
        if name.is_empty() {
            return Err(MarkupError::MalformedTag { position: idx });
        }
        let element = doc.create_element(&name);
        let mut self_closing = false;

        loop {
            cursor = skip_spaces(bytes, cursor);
            match bytes.get(cursor).copied() {
                None => return Err(MarkupError::MalformedTag { position: idx }),
                Some(b'>') => {
                    cursor += 1;
                    break;
                }
                Some(b'/') if bytes.get(cursor + 1).copied() == Some(b'>') => {
                    self_closing = true;
                    cursor += 2;
                    break;
                }
                Some(_) => {
                    let (attr, after_attr) = read_name(markup, cursor);
                    if attr.is_empty() {
                        return Err(MarkupError::MalformedTag { position: cursor });
                    }
                    let (value, after_value) = read_attribute_value(markup, after_attr)
                        .ok_or(MarkupError::MalformedTag { position: cursor })?;
                    if let Some(el) = doc.element_mut(element) {
                        el.set_attribute(&attr, value);
                    }
                    cursor = after_value;
                }
            }
        }

        doc.append_child(parent, element)?;
        if !self_closing && !is_void_element(&name) {
            open.push((element, name, idx));
        }
        idx = cursor;
    }

    if let Some((_, name, position)) = open.pop() {
        return Err(MarkupError::UnclosedTag { name, position });
    }
    Ok(fragment)
}

impl Document {
    /// Build a document whose root holds the parsed markup.
    pub fn from_markup(markup: &str) -> Result<Document, MarkupError> {
        let mut doc = Document::new();
        let fragment = parse_fragment(&mut doc, markup)?;
        let root = doc.root();
        doc.append_child(root, fragment)?;
        Ok(doc)
    }

    /// Serialize a node including its own tag.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            NodeData::Document | NodeData::Fragment => {
                for child in self.children(node) {
                    self.write_node(*child, out);
                }
            }
            NodeData::Text(text) => escape_into(text, false, out),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::DocType(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for attr in &element.attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_into(&attr.value, true, out);
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&element.name) {
                    return;
                }
                for child in self.children(node) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
        }
    }
}

fn escape_into(text: &str, in_attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !in_attribute => out.push_str("&lt;"),
            '>' if !in_attribute => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn read_name(input: &str, start: usize) -> (SmolStr, usize) {
    let bytes = input.as_bytes();
    let mut idx = start;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx += 1;
    }
    (SmolStr::new(input[start..idx].to_ascii_lowercase()), idx)
}

/// Read `="value"`, `='value'`, `=value`, or nothing (boolean attribute).
fn read_attribute_value(input: &str, start: usize) -> Option<(String, usize)> {
    let bytes = input.as_bytes();
    let idx = skip_spaces(bytes, start);
    if bytes.get(idx).copied() != Some(b'=') {
        return Some((String::new(), start));
    }
    let idx = skip_spaces(bytes, idx + 1);
    match bytes.get(idx).copied()? {
        quote @ (b'"' | b'\'') => {
            let end = find_byte(bytes, idx + 1, quote)?;
            Some((decode_entities(&input[idx + 1..end]), end + 1))
        }
        _ => {
            let mut end = idx;
            while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>' {
                end += 1;
            }
            Some((decode_entities(&input[idx..end]), end))
        }
    }
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    bytes.get(idx..idx + pattern.len()) == Some(pattern)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    #[test]
    fn test_round_trip_nested_markup() {
        let source = r#"<div class="a b" lang="en">x<span>y<br>z</span><!--note--></div>"#;
        let doc = Document::from_markup(source).unwrap();
        assert_eq!(doc.inner_html(doc.root()), source);
    }

    #[test]
    fn test_entities_and_escaping() {
        let doc = Document::from_markup("<p title=\"a&quot;b\">1 &lt; 2 &amp;&amp; &#x41;&#66; &bogus;</p>")
            .unwrap();
        let p = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.text_content(p), "1 < 2 && AB &bogus;");
        insta::assert_snapshot!(doc.outer_html(p), @r#"<p title="a&quot;b">1 &lt; 2 &amp;&amp; AB &amp;bogus;</p>"#);
    }

    #[test]
    fn test_attribute_forms() {
        let doc = Document::from_markup("<input disabled value=x><b data-k='v'/>").unwrap();
        let input = doc.first_child(doc.root()).unwrap();
        let bold = doc.child_at(doc.root(), 1).unwrap();
        let input_el = doc.element(input).unwrap();
        assert_eq!(input_el.attribute("disabled"), Some(""));
        assert_eq!(input_el.attribute("value"), Some("x"));
        assert_eq!(doc.element(bold).unwrap().attribute("data-k"), Some("v"));
        assert_eq!(doc.child_count(input), 0);
    }

    #[test]
    fn test_doctype_and_comment_kinds() {
        let doc = Document::from_markup("<!DOCTYPE html><!--c-->t").unwrap();
        let kinds: Vec<_> = doc
            .children(doc.root())
            .iter()
            .map(|n| doc.kind(*n))
            .collect();
        assert_eq!(kinds, vec![NodeKind::DocType, NodeKind::Comment, NodeKind::Text]);
        assert_eq!(doc.inner_html(doc.root()), "<!DOCTYPE html><!--c-->t");
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(
            Document::from_markup("<div><span></div>").unwrap_err(),
            MarkupError::MismatchedEndTag {
                expected: "span".into(),
                found: "div".into(),
                position: 11,
            }
        );
        assert_eq!(
            Document::from_markup("<div>").unwrap_err(),
            MarkupError::UnclosedTag {
                name: "div".into(),
                position: 0,
            }
        );
        assert!(matches!(
            Document::from_markup("</p>"),
            Err(MarkupError::UnexpectedEndTag { .. })
        ));
        assert!(matches!(
            Document::from_markup("a<!--b"),
            Err(MarkupError::UnterminatedComment { position: 1 })
        ));
        assert!(matches!(
            Document::from_markup("<p class=\"x>"),
            Err(MarkupError::MalformedTag { .. })
        ));
    }
}
