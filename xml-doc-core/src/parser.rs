use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::tree::{Declaration, Indent, LineEnding, XmlDocument, XmlNode};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors that can occur while parsing XML into an [`XmlDocument`].
///
/// Positions are byte offsets into the input after any byte order mark.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input XML could not be decoded or tokenized.
    #[error("failed to parse XML at byte {position}: {source}")]
    Xml {
        position: u64,
        source: quick_xml::Error,
    },
    /// Input bytes were not valid UTF-8 for tag/attribute/text extraction.
    #[error("invalid UTF-8 while parsing XML at byte {position}: {source}")]
    Utf8 {
        position: u64,
        source: std::str::Utf8Error,
    },
    /// Failed to read input file.
    #[error("failed to read XML file: {0}")]
    Io(#[from] std::io::Error),
    /// Structural issue in XML document.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

impl ParseError {
    /// Byte offset of the failure, when known.
    pub fn position(&self) -> Option<u64> {
        match self {
            ParseError::Xml { position, .. }
            | ParseError::Utf8 { position, .. }
            | ParseError::Malformed { position, .. } => Some(*position),
            ParseError::Io(_) => None,
        }
    }
}

/// Parse XML bytes into an [`XmlDocument`].
pub fn parse(xml: &[u8]) -> Result<XmlDocument, ParseError> {
    let (bom, body) = match xml.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, xml),
    };

    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut declaration = None;
    let mut pending_comments: Vec<String> = Vec::new();
    let mut trailing_comments: Vec<String> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ParseError::Xml { position, source })?;
        match event {
            Event::Start(e) => {
                let mut node = build_node_start(&e, &reader, position)?;
                node.leading_comments = std::mem::take(&mut pending_comments);
                stack.push(node);
            }
            Event::Empty(e) => {
                let mut node = build_node_start(&e, &reader, position)?;
                node.leading_comments = std::mem::take(&mut pending_comments);
                attach(node, &mut stack, &mut root, position)?;
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| xml_error(err, position))?
                        .into_owned();
                    push_text(current, text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = std::str::from_utf8(e.as_ref())
                        .map_err(|source| ParseError::Utf8 { position, source })?
                        .to_string();
                    push_text(current, text);
                }
            }
            Event::Comment(e) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|source| ParseError::Utf8 { position, source })?
                    .to_string();
                if root.is_some() && stack.is_empty() {
                    trailing_comments.push(text);
                } else {
                    pending_comments.push(text);
                }
            }
            Event::End(_) => {
                let mut node = stack.pop().ok_or_else(|| ParseError::Malformed {
                    position,
                    message: "encountered closing tag without open tag".to_string(),
                })?;
                node.trailing_comments = std::mem::take(&mut pending_comments);
                attach(node, &mut stack, &mut root, position)?;
            }
            Event::Decl(e) => {
                declaration = Some(read_declaration(&e, position)?);
            }
            Event::Eof => break,
            Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: "unclosed element(s) at end of document".to_string(),
        });
    }

    let root = root.ok_or_else(|| ParseError::Malformed {
        position: 0,
        message: "no root element found".to_string(),
    })?;

    Ok(XmlDocument {
        declaration,
        root,
        trailing_comments,
        bom,
        line_ending: LineEnding::detect(body),
        indent: detect_indent(body),
        final_newline: body.ends_with(b"\n"),
    })
}

/// Parse an XML file into an [`XmlDocument`].
pub fn parse_file(path: &Path) -> Result<XmlDocument, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

/// Parse a single element written by
/// [`write_fragment`](crate::writer::write_fragment).
pub fn parse_fragment(xml: &str) -> Result<XmlNode, ParseError> {
    parse(xml.as_bytes()).map(|doc| doc.root)
}

fn attach(
    node: XmlNode,
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    position: u64,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(ParseError::Malformed {
            position,
            message: "multiple top-level elements found".to_string(),
        });
    }
    Ok(())
}

fn push_text(current: &mut XmlNode, text: String) {
    if text.trim().is_empty() {
        return;
    }
    match &mut current.text {
        Some(existing) => existing.push_str(&text),
        None => current.text = Some(text),
    }
}

fn build_node_start(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    position: u64,
) -> Result<XmlNode, ParseError> {
    let tag = qname_to_string(e.name(), position)?;
    let mut node = XmlNode::new(tag);

    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(err, position))?;
        let key = qname_to_string(attr.key, position)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| xml_error(err, position))?
            .into_owned();
        node.attributes.insert(key, value);
    }

    Ok(node)
}

fn read_declaration(e: &BytesDecl<'_>, position: u64) -> Result<Declaration, ParseError> {
    let version = e.version().map_err(|err| xml_error(err, position))?;
    let encoding = match e.encoding() {
        Some(value) => Some(bytes_to_string(
            &value.map_err(|err| xml_error(err, position))?,
            position,
        )?),
        None => None,
    };
    let standalone = match e.standalone() {
        Some(value) => Some(bytes_to_string(
            &value.map_err(|err| xml_error(err, position))?,
            position,
        )?),
        None => None,
    };
    Ok(Declaration {
        version: bytes_to_string(&version, position)?,
        encoding,
        standalone,
    })
}

/// First indented line decides the indentation unit.
fn detect_indent(body: &[u8]) -> Indent {
    for line in body.split(|b| *b == b'\n').skip(1) {
        match line.first() {
            Some(b'\t') => return Indent { ch: b'\t', size: 1 },
            Some(b' ') => {
                let size = line.iter().take_while(|b| **b == b' ').count();
                return Indent { ch: b' ', size };
            }
            _ => {}
        }
    }
    Indent::default()
}

fn xml_error(err: impl Into<quick_xml::Error>, position: u64) -> ParseError {
    ParseError::Xml {
        position,
        source: err.into(),
    }
}

fn bytes_to_string(bytes: &[u8], position: u64) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(bytes)
        .map_err(|source| ParseError::Utf8 { position, source })?
        .to_string())
}

fn qname_to_string(name: QName<'_>, position: u64) -> Result<String, ParseError> {
    bytes_to_string(name.as_ref(), position)
}
