use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::escape::partial_escape;
use quick_xml::Writer;
use thiserror::Error;

use crate::tree::{LineEnding, XmlDocument, XmlNode};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors that can occur while writing XML from an [`XmlDocument`].
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize XML bytes.
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Failed to write output.
    #[error("failed to write XML output: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize an [`XmlDocument`] into bytes, reproducing its BOM, declaration,
/// indentation and line endings.
pub fn write(doc: &XmlDocument) -> Result<Vec<u8>, WriteError> {
    let mut writer = Writer::new_with_indent(Vec::new(), doc.indent.ch, doc.indent.size);

    if let Some(decl) = &doc.declaration {
        writer.write_event(Event::Decl(BytesDecl::new(
            &decl.version,
            decl.encoding.as_deref(),
            decl.standalone.as_deref(),
        )))?;
    }
    write_node(&mut writer, &doc.root)?;
    for comment in &doc.trailing_comments {
        writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?;
    }

    let mut body = writer.into_inner();
    if doc.final_newline {
        body.push(b'\n');
    }
    let body = match doc.line_ending {
        LineEnding::Lf => body,
        LineEnding::CrLf => to_crlf(&body),
    };

    let mut out = Vec::with_capacity(body.len() + UTF8_BOM.len());
    if doc.bom {
        out.extend_from_slice(UTF8_BOM);
    }
    out.extend_from_slice(&body);
    Ok(out)
}

/// Serialize a document into a UTF-8 string (lossy for invalid bytes, which the
/// writer never produces).
pub fn write_string(doc: &XmlDocument) -> Result<String, WriteError> {
    let bytes = write(doc)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialize a single element on one line, without declaration or
/// indentation. The comments in front of the element are left out.
pub fn write_fragment(node: &XmlNode) -> Result<String, WriteError> {
    let mut writer = Writer::new(Vec::new());
    if node.leading_comments.is_empty() {
        write_node(&mut writer, node)?;
    } else {
        let mut bare = node.clone();
        bare.leading_comments.clear();
        write_node(&mut writer, &bare)?;
    }
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), quick_xml::Error> {
    for comment in &node.leading_comments {
        writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?;
    }

    let is_empty = node.children.is_empty()
        && node.text.is_none()
        && node.trailing_comments.is_empty();
    let start = start_tag(node, is_empty);

    if is_empty {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;

    if let Some(text) = &node.text {
        writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    }

    for child in &node.children {
        write_node(writer, child)?;
    }
    for comment in &node.trailing_comments {
        writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?;
    }

    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}

/// Builds the raw start tag content. Attribute values only escape what the
/// double-quoted form requires, so MSBuild conditions keep their apostrophes.
fn start_tag(node: &XmlNode, is_empty: bool) -> BytesStart<'static> {
    let mut content = node.tag.clone();
    for (key, value) in &node.attributes {
        content.push(' ');
        content.push_str(key);
        content.push_str("=\"");
        content.push_str(&escape_attribute(value));
        content.push('"');
    }
    if is_empty {
        content.push(' ');
    }
    let name_len = node.tag.len();
    BytesStart::from_content(content, name_len)
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn to_crlf(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + body.len() / 16);
    let mut previous = 0u8;
    for &b in body {
        if b == b'\n' && previous != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        previous = b;
    }
    out
}
