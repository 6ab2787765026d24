//! Document transformation pipeline.
//!
//! This module provides the hook between extracting and loading a document:
//!
//! - [`DocumentTransform`] - The trait implemented by all transformations
//! - [`TransformPipeline`] - Ordered collection of transforms to execute
//!
//! Transforms run in a flat, ordered sequence (insertion order). The
//! built-in transforms wrap the cleanup operations; nothing runs unless a
//! caller adds it.
//!
//! # Example
//!
//! ```rust
//! use pom_preserve::{Document, DocumentTransform, Result, SquashMultilines, TransformPipeline};
//!
//! struct Rename;
//!
//! impl DocumentTransform for Rename {
//!     fn name(&self) -> &str { "rename" }
//!
//!     fn transform(&self, doc: &mut Document) -> Result<()> {
//!         let root = doc.root();
//!         if let Some(name) = doc.get_child(root, "name") {
//!             doc.rewrite_value(name, "renamed")?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut pipeline = TransformPipeline::new();
//! pipeline.push(Box::new(Rename));
//! pipeline.push(Box::new(SquashMultilines));
//!
//! let mut doc = Document::parse("<project>\n  <name> old </name>\n</project>").unwrap();
//! pipeline.execute(&mut doc).unwrap();
//! assert_eq!(doc.to_xml_string(), "<project>\n  <name> renamed </name>\n</project>");
//! ```

use crate::{Document, Result};

/// Trait for document transformations.
///
/// Transforms must be `Send + Sync` so a pipeline can be shared between
/// edit sessions running on different threads.
pub trait DocumentTransform: Send + Sync {
    /// Human-readable name for this transform.
    ///
    /// Used for logging and debugging.
    fn name(&self) -> &str;

    /// Apply the transformation to the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the transformation fails.
    fn transform(&self, doc: &mut Document) -> Result<()>;
}

/// A pipeline of document transforms to execute in order.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn DocumentTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform to the pipeline.
    ///
    /// Transforms run in the order they are added.
    pub fn push(&mut self, transform: Box<dyn DocumentTransform>) {
        self.transforms.push(transform);
    }

    pub fn extend(&mut self, transforms: impl IntoIterator<Item = Box<dyn DocumentTransform>>) {
        self.transforms.extend(transforms);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Execute all transforms in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered. Execution stops on error.
    pub fn execute(&self, doc: &mut Document) -> Result<()> {
        for transform in &self.transforms {
            tracing::debug!(transform = transform.name(), "Running transform");
            transform.transform(doc)?;
        }

        Ok(())
    }

    /// List the names of all transforms in execution order.
    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

/// Removes profiles that only carry an id or activation, and emptied
/// `profiles` containers.
pub struct CleanupEmptyProfiles;

impl DocumentTransform for CleanupEmptyProfiles {
    fn name(&self) -> &str {
        "cleanup-empty-profiles"
    }

    fn transform(&self, doc: &mut Document) -> Result<()> {
        let root = doc.root();
        doc.cleanup_empty_profiles(root);
        Ok(())
    }
}

/// Removes `tag` elements whose children (other than `ignore`) are leaves.
pub struct CleanupEmptyElements {
    pub tag: String,
    pub ignore: Vec<String>,
}

impl DocumentTransform for CleanupEmptyElements {
    fn name(&self) -> &str {
        "cleanup-empty-elements"
    }

    fn transform(&self, doc: &mut Document) -> Result<()> {
        let root = doc.root();
        let ignore: Vec<&str> = self.ignore.iter().map(String::as_str).collect();
        doc.cleanup_empty_elements(root, &self.tag, &ignore);
        Ok(())
    }
}

/// Collapses runs of blank lines left behind by removals.
pub struct SquashMultilines;

impl DocumentTransform for SquashMultilines {
    fn name(&self) -> &str {
        "squash-multilines"
    }

    fn transform(&self, doc: &mut Document) -> Result<()> {
        let root = doc.root();
        doc.squash_multilines(root);
        Ok(())
    }
}
