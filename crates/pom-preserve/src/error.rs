//! Error types for parsing, editing and writing documents.

use thiserror::Error;

use crate::NodeId;

/// Result type alias for pom-preserve operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the parser, the tree editing primitives and the
/// round-trip controller.
///
/// Malformed markup is always fatal: no partial document is produced.
/// Structural errors indicate a caller bug (for example removing a node from
/// an element that does not contain it).
#[derive(Debug, Error)]
pub enum Error {
    /// XML syntax error from quick-xml.
    #[error("XML syntax error: {message}{}", .position.as_ref().map(|p| format!(" at byte {}", p)).unwrap_or_default())]
    Syntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    /// Mismatched end tag.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag { expected: String, found: String },

    /// Invalid XML structure.
    #[error("Invalid XML structure: {message}")]
    InvalidStructure { message: String },

    /// Empty document (no root element).
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// Multiple root elements.
    #[error("Invalid XML: multiple root elements")]
    MultipleRoots,

    #[error("node {node} is not an element")]
    NotAnElement { node: NodeId },

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {node} has no parent")]
    DetachedNode { node: NodeId },

    #[error("node {node} is already attached to the tree")]
    AlreadyAttached { node: NodeId },

    #[error("cannot insert node {child} into {parent}, which lies inside it")]
    CyclicInsertion { parent: NodeId, child: NodeId },

    #[error("index {index} is out of bounds for an element with {len} children")]
    InvalidIndex { index: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error means the input markup could not be parsed.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Error::Syntax { .. }
                | Error::UnexpectedEof { .. }
                | Error::MismatchedEndTag { .. }
                | Error::InvalidStructure { .. }
                | Error::EmptyDocument
                | Error::MultipleRoots
        )
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Syntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Syntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}
