use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

/// A generic XML element node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes in document order.
    pub attributes: IndexMap<String, String>,
    /// Child elements.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
    /// Comments that appeared directly before this element.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leading_comments: Vec<String>,
    /// Comments that appeared after the last child, before the closing tag.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing_comments: Vec<String>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
            text: None,
            leading_comments: Vec::new(),
            trailing_comments: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style text setter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Return an attribute value by name.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        if path.is_empty() {
            return self.text.as_deref();
        }

        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        current.text.as_deref()
    }
}

impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, value)?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, " />");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write!(f, "{}", text)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}

/// Line terminator style detected on parse and reproduced on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Detect the dominant style of `bytes`; any CRLF pair wins.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.windows(2).any(|w| w == b"\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Indentation unit used when writing nested elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Indent {
    pub ch: u8,
    pub size: usize,
}

impl Default for Indent {
    fn default() -> Self {
        Self { ch: b' ', size: 2 }
    }
}

/// The `<?xml ...?>` declaration fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A parsed XML document: the root element plus the surface details needed to
/// write it back without unrelated churn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub root: XmlNode,
    /// Comments after the root element closed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing_comments: Vec<String>,
    pub bom: bool,
    pub line_ending: LineEnding,
    pub indent: Indent,
    pub final_newline: bool,
}

impl XmlDocument {
    /// Wrap a root element with default surface settings (UTF-8 declaration,
    /// LF, two-space indent).
    pub fn new(root: XmlNode) -> Self {
        Self {
            declaration: Some(Declaration {
                version: "1.0".to_string(),
                encoding: Some("utf-8".to_string()),
                standalone: None,
            }),
            root,
            trailing_comments: Vec::new(),
            bom: false,
            line_ending: LineEnding::Lf,
            indent: Indent::default(),
            final_newline: true,
        }
    }
}
