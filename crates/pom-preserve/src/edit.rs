//! Field-level reads and edits that keep surrounding layout intact.

use quick_xml::escape::partial_escape;

use crate::order::OrderTable;
use crate::tree::{Node, is_blank, is_xml_whitespace, newline_count, unescape_lossy};
use crate::{Document, NodeId, Result};

/// Text value that [`Document::get_child_text_trim`] reports as absent.
const NULL_SENTINEL: &str = "null";

impl Document {
    /// First child element of `parent` with local name `name` in the
    /// parent's namespace prefix.
    pub fn get_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let prefix = self.element(parent)?.prefix.as_deref();
        self.child_elements(parent).find(|&child| {
            self.element(child)
                .is_some_and(|e| e.name == name && e.prefix.as_deref() == prefix)
        })
    }

    /// All child elements matching [`get_child`](Self::get_child)'s rule,
    /// in document order.
    pub fn children_named(&self, parent: NodeId, name: &str) -> Vec<NodeId> {
        let Some(prefix) = self.element(parent).map(|e| e.prefix.as_deref()) else {
            return Vec::new();
        };
        self.child_elements(parent)
            .filter(|&child| {
                self.element(child)
                    .is_some_and(|e| e.name == name && e.prefix.as_deref() == prefix)
            })
            .collect()
    }

    /// Trimmed text of the named child.
    ///
    /// Returns `None` when the child is missing, and also when its text is
    /// the literal `null`, which existing documents use to mean "unset".
    pub fn get_child_text_trim(&self, parent: NodeId, name: &str) -> Option<String> {
        let child = self.get_child(parent, name)?;
        let text = self.element_text(child);
        let trimmed = text.trim_matches(is_xml_whitespace);
        if trimmed == NULL_SENTINEL {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Replace the value of `element` while keeping the whitespace around it.
    ///
    /// The first text (or CDATA) child with non-whitespace content absorbs
    /// the text-like siblings that directly follow it, then only the part
    /// between its leading and trailing whitespace is replaced. An element
    /// without such a child gets `value` appended as new text.
    pub fn rewrite_value(&mut self, element: NodeId, value: &str) -> Result<()> {
        self.expect_element(element)?;

        let children = self.children(element).to_vec();
        let Some(first) = children.iter().position(|&c| self.has_content(c)) else {
            let text = self.create_text(value);
            return self.append_child(element, text);
        };
        let target = children[first];

        let (mut body, in_cdata) = match self.node(target) {
            Node::CData(content) => (content.clone(), true),
            Node::Text(raw) => (raw.clone(), false),
            _ => return Ok(()),
        };
        let mut absorbed = Vec::new();
        for &next in &children[first + 1..] {
            match (in_cdata, self.node(next)) {
                (false, Node::Text(raw)) => body.push_str(raw),
                (false, Node::CData(content)) => body.push_str(&partial_escape(content)),
                (true, Node::Text(raw)) => body.push_str(&unescape_lossy(raw)),
                (true, Node::CData(content)) => body.push_str(content),
                _ => break,
            }
            absorbed.push(next);
        }
        for next in absorbed {
            self.remove_child(element, next)?;
        }

        let replaced = if !in_cdata {
            Node::Text(replace_trimmed(&body, &partial_escape(value)))
        } else if value.contains("]]>") {
            // A CDATA section cannot hold its own terminator
            Node::Text(replace_trimmed(&partial_escape(&body), &partial_escape(value)))
        } else {
            Node::CData(replace_trimmed(&body, value))
        };
        *self.node_mut(target) = replaced;
        Ok(())
    }

    fn has_content(&self, id: NodeId) -> bool {
        match self.node(id) {
            Node::Text(body) | Node::CData(body) => !is_blank(body),
            _ => false,
        }
    }

    /// Set, replace or remove the child `name` of `parent`.
    ///
    /// | child   | value  | effect                                          |
    /// |---------|--------|-------------------------------------------------|
    /// | present | `Some` | [`rewrite_value`](Self::rewrite_value)          |
    /// | present | `None` | removed with all directly preceding text        |
    /// | absent  | `Some` | inserted per `order`, then given `value`        |
    /// | absent  | `None` | nothing                                         |
    ///
    /// Returns the element holding the value, if any remains.
    pub fn rewrite_element(
        &mut self,
        name: &str,
        value: Option<&str>,
        parent: NodeId,
        order: &OrderTable,
    ) -> Result<Option<NodeId>> {
        match (self.get_child(parent, name), value) {
            (Some(child), Some(value)) => {
                self.rewrite_value(child, value)?;
                Ok(Some(child))
            }
            (Some(child), None) => {
                tracing::debug!(element = name, parent = %parent, "Removing element");
                let mut index = self.remove_child(parent, child)?;
                while index > 0 {
                    let previous = self.children(parent)[index - 1];
                    if !self.is_text(previous) {
                        break;
                    }
                    self.remove_child(parent, previous)?;
                    index -= 1;
                }
                Ok(None)
            }
            (None, Some(value)) => {
                let child = self.insert_new_element(name, parent, order)?;
                self.set_text(child, value)?;
                Ok(Some(child))
            }
            (None, None) => Ok(None),
        }
    }

    /// Remove `child` together with the text node right before it.
    pub fn remove_child_element(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.remove_child(parent, child)?;
        if index > 0 {
            let previous = self.children(parent)[index - 1];
            if self.is_text(previous) {
                self.remove_child(parent, previous)?;
            }
        }
        Ok(())
    }

    /// Remove `child`, its preceding text and the comments attached to it.
    ///
    /// A comment counts as attached when no more than one line break
    /// separates it from the removed node. Each removed comment takes its own
    /// preceding text along; the walk ends after removing a text with a blank
    /// line in it, or at any node that is not a comment.
    pub fn remove_child_content(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let mut index = self.remove_child(parent, child)?;
        loop {
            let mut blank_line = false;
            if index > 0 {
                let previous = self.children(parent)[index - 1];
                if let Some(text) = self.raw_text(previous) {
                    blank_line = newline_count(text) > 1;
                    self.remove_child(parent, previous)?;
                    index -= 1;
                }
            }
            if blank_line || index == 0 {
                break;
            }

            let previous = self.children(parent)[index - 1];
            if !self.is_comment(previous) {
                break;
            }
            tracing::debug!(comment = %previous, "Removing attached comment");
            self.remove_child(parent, previous)?;
            index -= 1;
        }
        Ok(())
    }
}

/// Swap the non-whitespace middle of `body` for `value`.
fn replace_trimmed(body: &str, value: &str) -> String {
    let start = body.len() - body.trim_start_matches(is_xml_whitespace).len();
    let end = body.trim_end_matches(is_xml_whitespace).len().max(start);
    format!("{}{}{}", &body[..start], value, &body[end..])
}
