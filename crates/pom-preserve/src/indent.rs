//! Indentation inference.
//!
//! Indentation is never stored; it is read off the whitespace that precedes
//! child elements, which keeps it correct after arbitrary structural edits.

use crate::tree::{Node, is_blank};
use crate::{Document, NodeId};

/// Extra indentation per nesting level when nothing can be detected.
pub const INDENT_STEP: &str = "  ";

impl Document {
    /// Detect the indentation used in front of the children of `id`.
    ///
    /// Returns the characters after the last line break of the text that
    /// directly precedes the first indented child element. When `id` has no
    /// such child, falls back to the parent's indentation plus
    /// [`INDENT_STEP`], bottoming out at `""` for the root.
    pub fn detect_indentation(&self, id: NodeId) -> String {
        if let Some(indent) = self.own_indentation(id) {
            return indent.to_string();
        }
        match self.parent(id) {
            Some(parent) => format!("{}{}", self.detect_indentation(parent), INDENT_STEP),
            None => String::new(),
        }
    }

    fn own_indentation(&self, id: NodeId) -> Option<&str> {
        let mut candidate: Option<&str> = None;
        for &child in self.children(id) {
            match self.node(child) {
                Node::Text(text) => match text.rfind(['\n', '\r']) {
                    Some(pos) => {
                        let tail = &text[pos + 1..];
                        candidate = is_blank(tail).then_some(tail);
                    }
                    None if !is_blank(text) => candidate = None,
                    None => {}
                },
                Node::Element(_) => {
                    if candidate.is_some() {
                        return candidate;
                    }
                }
                Node::Comment(_) | Node::CData(_) | Node::Instruction(_) => candidate = None,
            }
        }
        None
    }

    /// Re-indent the direct children of `id` with `indent`.
    ///
    /// For every element child preceded by whitespace-only text, that text is rewritten to end in
    /// `"\n" + indent` (blank lines before the last line break are kept). If
    /// that child has element content of its own, the whitespace before its
    /// closing tag is rewritten the same way.
    pub fn reset_indentation(&mut self, id: NodeId, indent: &str) {
        let children = self.children(id).to_vec();
        for pair in children.windows(2) {
            let (before, child) = (pair[0], pair[1]);
            if !self.is_element(child) {
                continue;
            }
            self.reindent_text(before, indent);

            let has_element_content = self.child_elements(child).next().is_some();
            if let Some(&last) = self.children(child).last() {
                if has_element_content {
                    self.reindent_text(last, indent);
                }
            }
        }
    }

    fn reindent_text(&mut self, id: NodeId, indent: &str) {
        let Some(text) = self.raw_text(id) else {
            return;
        };
        if !is_blank(text) {
            return;
        }
        let head = text.rfind('\n').map_or("", |pos| &text[..pos]);
        let rewritten = format!("{}\n{}", head, indent);
        self.set_raw_text(id, rewritten);
    }
}
