//! Formatting-preserving editing of XML documents such as Maven POMs.
//!
//! Tools that rewrite build descriptors should change only what they mean to
//! change. This crate parses a document into a tree that keeps every piece of
//! whitespace, every comment and the original spelling of every tag, offers
//! field-level edits that respect the surrounding layout, and writes the
//! result back so untouched regions are byte-identical to the input.
//!
//! # Overview
//!
//! - [`Document`]: arena-backed tree addressed by [`NodeId`]s
//! - [`OrderTable`]: where new child elements go, per parent tag
//! - [`Etl`]: the extract / transform / load round trip, including the text
//!   outside the root element
//! - [`TransformPipeline`]: ordered edits run between extract and load
//!
//! # Example
//!
//! ```rust
//! use pom_preserve::{Document, OrderTable};
//!
//! let mut doc = Document::parse("<build><plugins> </plugins></build>").unwrap();
//! let order = OrderTable::maven_pom();
//! let plugins = doc.get_child(doc.root(), "plugins").unwrap();
//!
//! let plugin = doc.insert_new_element("plugin", plugins, &order).unwrap();
//! doc.rewrite_element("groupId", Some("a"), plugin, &order).unwrap();
//! doc.rewrite_element("artifactId", Some("b"), plugin, &order).unwrap();
//!
//! assert_eq!(
//!     doc.to_xml_string(),
//!     "<build><plugins>\n  <plugin>\n    <groupId>a</groupId>\n    <artifactId>b</artifactId>\n  </plugin> </plugins></build>"
//! );
//! ```
//!
//! Cleanup ([`Document::cleanup_empty_elements`],
//! [`Document::squash_multilines`]) never runs on its own; call it once after
//! a batch of edits, or add [`CleanupEmptyProfiles`] and [`SquashMultilines`]
//! to a pipeline.

pub mod cleanup;
pub mod edit;
pub mod error;
pub mod etl;
pub mod indent;
pub mod order;
pub mod parser;
pub mod transform;
pub mod tree;
pub mod writer;

// Re-export main types
pub use error::{Error, Result};
pub use etl::{
    Etl, EtlOptions, Extracted, Fidelity, LineSeparator, Loaded, SchemaInjection,
    normalize_line_endings,
};
pub use indent::INDENT_STEP;
pub use order::{BLANK_LINE, OrderTable};
pub use transform::{
    CleanupEmptyElements, CleanupEmptyProfiles, DocumentTransform, SquashMultilines,
    TransformPipeline,
};
pub use tree::{Attribute, Document, Element, Node, NodeId};
