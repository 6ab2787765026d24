//! Serialization back to markup.
//!
//! Nodes that came from the parser are written from their source text, so an
//! unedited subtree reproduces its input exactly. Only elements created in
//! memory (or whose attributes were changed) get a generated start tag.

use crate::tree::Node;
use crate::{Document, NodeId};

impl Document {
    /// Serialize the root element and everything below it.
    pub fn to_xml_string(&self) -> String {
        self.node_to_string(self.root())
    }

    /// Serialize a single node (and its subtree).
    pub fn node_to_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Node::Element(element) => {
                let children = element.children();
                let collapse = children.is_empty() && element.is_self_closing();

                match element.start_tag() {
                    Some(tag) if collapse || !element.is_self_closing() => out.push_str(tag),
                    Some(tag) => {
                        // `<a/>` that gained content: reopen it as `<a>`
                        let open = tag.strip_suffix("/>").unwrap_or(tag).trim_end();
                        out.push_str(open);
                        if !open.ends_with('>') {
                            out.push('>');
                        }
                    }
                    None => {
                        out.push('<');
                        out.push_str(&element.qualified_name());
                        for attr in element.attributes() {
                            out.push(' ');
                            out.push_str(&attr.name);
                            out.push('=');
                            out.push(attr.quote);
                            out.push_str(&attr.value);
                            out.push(attr.quote);
                        }
                        out.push_str(if collapse { "/>" } else { ">" });
                    }
                }

                if collapse {
                    return;
                }

                for &child in children {
                    self.write_node(child, out);
                }

                match element.end_tag() {
                    Some(tag) => out.push_str(tag),
                    None => {
                        out.push_str("</");
                        out.push_str(&element.qualified_name());
                        out.push('>');
                    }
                }
            }
            Node::Text(raw) => out.push_str(raw),
            Node::Comment(body) => {
                out.push_str("<!--");
                out.push_str(body);
                out.push_str("-->");
            }
            Node::CData(body) => {
                out.push_str("<![CDATA[");
                out.push_str(body);
                out.push_str("]]>");
            }
            Node::Instruction(body) => {
                out.push_str("<?");
                out.push_str(body);
                out.push_str("?>");
            }
        }
    }
}
