//! Tree-wide tidying after a batch of edits.
//!
//! None of these run implicitly. They never fail: a tree with nothing to
//! clean is left as is and the returned count is zero.

use crate::tree::{Node, is_blank, newline_count};
use crate::{Document, NodeId, Result};

const PROFILES: &str = "profiles";
const PROFILE: &str = "profile";
const PROFILE_IGNORED_CHILDREN: [&str; 2] = ["id", "activation"];

impl Document {
    /// Remove every `tag` element below `scope` that carries no substance.
    ///
    /// An element is empty when each of its child elements, other than the
    /// ones named in `ignore`, has no child elements itself. Empty elements
    /// go together with their attached comments. If this removed anything
    /// and `scope` is left without child elements, `scope` itself is removed
    /// as well (unless it is the document root).
    ///
    /// Returns the number of elements removed.
    pub fn cleanup_empty_elements(&mut self, scope: NodeId, tag: &str, ignore: &[&str]) -> usize {
        let candidates = self.descendant_elements_named(scope, tag);
        let mut removed = 0;

        // Innermost first, so a parent is judged after its children are gone
        for candidate in candidates.into_iter().rev() {
            if !self.is_descendant_of(candidate, scope) || !self.is_without_substance(candidate, ignore)
            {
                continue;
            }
            if self.remove_with_comments(candidate) {
                removed += 1;
            }
        }

        if removed > 0
            && self.child_elements(scope).next().is_none()
            && self.remove_with_comments(scope)
        {
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(tag, removed, "Removed empty elements");
        }
        removed
    }

    fn is_without_substance(&self, id: NodeId, ignore: &[&str]) -> bool {
        self.child_elements(id)
            .filter(|&child| !self.name(child).is_some_and(|name| ignore.contains(&name)))
            .all(|child| self.child_elements(child).next().is_none())
    }

    /// Remove `profile` elements that hold nothing beyond an `id` and an
    /// `activation`, then every `profiles` element without any `profile`.
    pub fn cleanup_empty_profiles(&mut self, root: NodeId) -> usize {
        let mut removed = 0;
        for profiles in self.descendant_elements_named(root, PROFILES) {
            if !self.is_descendant_of(profiles, root) {
                continue;
            }
            removed += self.cleanup_empty_elements(profiles, PROFILE, &PROFILE_IGNORED_CHILDREN);

            let orphaned = self.parent(profiles).is_some()
                && self.descendant_elements_named(profiles, PROFILE).is_empty();
            if orphaned && self.remove_with_comments(profiles) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every `tag` element below `root` that has no child elements.
    pub fn cleanup_childless_elements(&mut self, root: NodeId, tag: &str) -> usize {
        let mut removed = 0;
        for candidate in self.descendant_elements_named(root, tag).into_iter().rev() {
            if self.child_elements(candidate).next().is_some() {
                continue;
            }
            if self.remove_with_comments(candidate) {
                removed += 1;
            }
        }
        removed
    }

    fn remove_with_comments(&mut self, id: NodeId) -> bool {
        match self.parent(id) {
            Some(parent) => self.remove_child_content(parent, id).is_ok(),
            None => false,
        }
    }

    /// Collapse runs of three or more line breaks to a single blank line.
    ///
    /// Adjacent whitespace-only text nodes (as left behind by removals) are
    /// treated as one run. A run with more than two line breaks becomes one
    /// text node of two line breaks followed by the indentation of the run's
    /// last line. Returns the number of runs collapsed.
    pub fn squash_multilines(&mut self, root: NodeId) -> usize {
        let mut elements = vec![root];
        elements.extend(
            self.descendants(root)
                .into_iter()
                .filter(|&id| self.is_element(id)),
        );

        let mut squashed = 0;
        for element in elements {
            for run in self.blank_text_runs(element) {
                let combined: String = run
                    .iter()
                    .filter_map(|&id| self.raw_text(id))
                    .collect();
                if newline_count(&combined) <= 2 {
                    continue;
                }
                let tail = combined.rsplit('\n').next().unwrap_or_default();
                self.set_raw_text(run[0], format!("\n\n{}", tail));
                if self.remove_texts(element, &run[1..]).is_ok() {
                    squashed += 1;
                }
            }
        }
        squashed
    }

    fn remove_texts(&mut self, parent: NodeId, texts: &[NodeId]) -> Result<()> {
        for &text in texts {
            self.remove_child(parent, text)?;
        }
        Ok(())
    }

    /// Maximal runs of adjacent whitespace-only text children of `id`.
    fn blank_text_runs(&self, id: NodeId) -> Vec<Vec<NodeId>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for &child in self.children(id) {
            match self.node(child) {
                Node::Text(text) if is_blank(text) => current.push(child),
                _ => {
                    if !current.is_empty() {
                        runs.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}
