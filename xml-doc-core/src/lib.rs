//! Order-preserving XML document model used to edit build manifests in place.
//!
//! Documents keep their declaration, byte order mark, line endings, indentation,
//! attribute order and comments, so rewriting one element does not churn the
//! rest of the file.

pub mod parser;
pub mod tree;
pub mod writer;

pub use parser::{parse, parse_file, parse_fragment, ParseError};
pub use tree::{Declaration, Indent, LineEnding, XmlDocument, XmlNode};
pub use writer::{write, write_fragment, write_string, WriteError};
