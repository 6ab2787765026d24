//! XML parser that builds a formatting-preserving [`Document`].
//!
//! Unlike a typical DOM builder, nothing inside the root element is dropped:
//! whitespace-only text, comments, CDATA sections and processing instructions
//! all become nodes, and start/end tags keep their source text. Everything
//! outside the root (XML declaration, doctype, leading and trailing comments)
//! is skipped here and carried separately as prolog/epilog by the round-trip
//! controller.

use quick_xml::Reader;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::tree::{Attribute, Element, Node, split_qualified_name};
use crate::{Document, Error, NodeId, Result};

impl Document {
    /// Parse a document from markup text.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pom_preserve::Document;
    ///
    /// let doc = Document::parse("<project>\n  <modelVersion>4.0.0</modelVersion>\n</project>").unwrap();
    /// let version = doc.get_child(doc.root(), "modelVersion").unwrap();
    /// assert_eq!(doc.element_text(version), "4.0.0");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the markup is malformed, has no root element or
    /// has more than one.
    pub fn parse(content: &str) -> Result<Document> {
        XmlParser::new(content).parse()
    }
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The source content being parsed.
    source: &'a str,

    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// Arena being filled.
    doc: Document,

    /// Open elements, innermost last.
    stack: Vec<NodeId>,

    root: Option<NodeId>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            source,
            reader,
            doc: Document::empty(),
            stack: Vec::new(),
            root: None,
        }
    }

    fn parse(mut self) -> Result<Document> {
        loop {
            // Capture position before reading the event
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let id = self.handle_start(&e, event_start, false)?;
                    self.stack.push(id);
                }
                Ok(Event::Empty(e)) => {
                    self.handle_start(&e, event_start, true)?;
                }
                Ok(Event::End(e)) => {
                    self.handle_end(&e, event_start)?;
                }
                Ok(Event::Text(e)) => {
                    let text = utf8(&e, event_start)?;
                    self.handle_text(text)?;
                }
                Ok(Event::CData(e)) => {
                    let body = utf8(&e, event_start)?;
                    self.push_content(Node::CData(body))?;
                }
                Ok(Event::Comment(e)) => {
                    let body = utf8(&e, event_start)?;
                    self.push_content(Node::Comment(body))?;
                }
                Ok(Event::PI(e)) => {
                    let body = utf8(&e, event_start)?;
                    self.push_content(Node::Instruction(body))?;
                }
                Ok(Event::Decl(_) | Event::DocType(_)) => {
                    // Only legal before the root; reproduced through the prolog
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Syntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        // Check for unclosed elements
        if let Some(&open) = self.stack.last() {
            let name = self
                .doc
                .element(open)
                .map(|e| e.qualified_name().into_owned())
                .unwrap_or_default();
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", name),
            });
        }

        let root = self.root.ok_or(Error::EmptyDocument)?;
        self.doc.set_root(root);
        Ok(self.doc)
    }

    fn handle_start(
        &mut self,
        e: &BytesStart<'_>,
        event_start: usize,
        self_closing: bool,
    ) -> Result<NodeId> {
        let qualified = utf8(e.name().as_ref(), event_start)?;
        let (prefix, name) = split_qualified_name(&qualified);

        let event_end = self.reader.buffer_position() as usize;
        let start_tag = &self.source[event_start..event_end];
        let attributes = parse_attributes(e, start_tag, event_start)?;

        let element = Element::parsed(
            name,
            prefix,
            attributes,
            start_tag.to_string(),
            self_closing,
        );
        let id = self.doc.alloc(Node::Element(element));

        match self.stack.last() {
            Some(&parent) => self.doc.append_child(parent, id)?,
            None if self.root.is_some() => return Err(Error::MultipleRoots),
            None => self.root = Some(id),
        }
        Ok(id)
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>, event_start: usize) -> Result<()> {
        let end_name = utf8(e.name().as_ref(), event_start)?;

        let open = self.stack.pop().ok_or_else(|| Error::InvalidStructure {
            message: format!("Unexpected closing tag </{}>", end_name),
        })?;

        let event_end = self.reader.buffer_position() as usize;
        let end_tag = self.source[event_start..event_end].to_string();

        let element = self.doc.element_mut(open)?;
        // Verify tag names match
        if element.qualified_name() != end_name {
            return Err(Error::MismatchedEndTag {
                expected: element.qualified_name().into_owned(),
                found: end_name,
            });
        }
        element.set_end_tag(end_tag);
        Ok(())
    }

    fn handle_text(&mut self, text: String) -> Result<()> {
        if self.stack.is_empty() {
            // Whitespace between prolog items and the root is not content
            if text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}').is_empty() {
                return Ok(());
            }
            return Err(Error::InvalidStructure {
                message: format!("Text outside the root element: {:?}", text.trim()),
            });
        }
        self.push_content(Node::Text(text))
    }

    /// Append a non-element node to the innermost open element. Outside the
    /// root these nodes belong to the prolog or epilog and are skipped.
    fn push_content(&mut self, node: Node) -> Result<()> {
        if let Some(&parent) = self.stack.last() {
            let id = self.doc.alloc(node);
            self.doc.append_child(parent, id)?;
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8], position: usize) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| Error::Syntax {
            message: format!("Invalid UTF-8: {}", err),
            position: Some(position as u64),
        })
}

fn parse_attributes(e: &BytesStart<'_>, start_tag: &str, tag_start: usize) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let name = utf8(attr.key.as_ref(), tag_start)?;
        // Keep the escaped form; values are unescaped on access
        let value = utf8(&attr.value, tag_start)?;
        let quote = find_quote(start_tag, &name);

        attributes.push(Attribute { name, value, quote });
    }

    Ok(attributes)
}

/// Find the quote character used for `attr_name` inside the source of a start
/// tag. Pattern: `name="value"` or `name='value'`, with optional whitespace
/// around `=`.
fn find_quote(tag: &str, attr_name: &str) -> char {
    for (pos, _) in tag.match_indices(attr_name) {
        let preceded_by_space = tag[..pos].chars().next_back().is_some_and(char::is_whitespace);
        if !preceded_by_space {
            continue;
        }
        let rest = tag[pos + attr_name.len()..].trim_start();
        if let Some(after_eq) = rest.strip_prefix('=') {
            if let Some(quote) = after_eq.trim_start().chars().next() {
                if quote == '"' || quote == '\'' {
                    return quote;
                }
            }
        }
    }
    '"'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let doc = Document::parse("<root/>").unwrap();
        assert_eq!(doc.name(doc.root()), Some("root"));
        assert!(doc.children(doc.root()).is_empty());
    }

    #[test]
    fn test_whitespace_text_is_kept() {
        let doc = Document::parse("<root>\n  <child/>\n</root>").unwrap();
        let children = doc.children(doc.root());
        assert_eq!(children.len(), 3);
        assert_eq!(doc.raw_text(children[0]), Some("\n  "));
        assert_eq!(doc.name(children[1]), Some("child"));
        assert_eq!(doc.raw_text(children[2]), Some("\n"));
    }

    #[test]
    fn test_comments_cdata_and_instructions_are_kept() {
        let doc = Document::parse("<a><!-- c --><![CDATA[x<y]]><?pi data?></a>").unwrap();
        let children = doc.children(doc.root());
        assert!(matches!(doc.node(children[0]), Node::Comment(c) if c == " c "));
        assert!(matches!(doc.node(children[1]), Node::CData(c) if c == "x<y"));
        assert!(matches!(doc.node(children[2]), Node::Instruction(p) if p == "pi data"));
    }

    #[test]
    fn test_prolog_items_are_skipped() {
        let doc = Document::parse(
            "<?xml version=\"1.0\"?>\n<!DOCTYPE project>\n<!-- header -->\n<project/>\n<!-- trailer -->\n",
        )
        .unwrap();
        assert_eq!(doc.name(doc.root()), Some("project"));
    }

    #[test]
    fn test_namespace_prefix() {
        let doc = Document::parse(r#"<pom:project xmlns:pom="urn:pom"><pom:a/></pom:project>"#).unwrap();
        let root = doc.element(doc.root()).unwrap();
        assert_eq!(root.name, "project");
        assert_eq!(root.prefix.as_deref(), Some("pom"));
    }

    #[test]
    fn test_attributes_keep_quote_style() {
        let doc = Document::parse(r#"<root a='1' b="x &amp; y"/>"#).unwrap();
        let attributes = doc.element(doc.root()).unwrap().attributes();
        assert_eq!(attributes[0].quote, '\'');
        assert_eq!(attributes[1].quote, '"');
        assert_eq!(attributes[1].value, "x &amp; y");
        assert_eq!(doc.attribute(doc.root(), "b").as_deref(), Some("x & y"));
    }

    #[test]
    fn test_empty_document_error() {
        let result = Document::parse("");
        assert!(matches!(result, Err(Error::EmptyDocument)));
    }

    #[test]
    fn test_unclosed_element_error() {
        let result = Document::parse("<root><child>");
        assert!(
            matches!(result, Err(Error::UnexpectedEof { .. } | Error::Syntax { .. })),
            "Expected UnexpectedEof or Syntax error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_multiple_roots_error() {
        let result = Document::parse("<root/><another/>");
        assert!(matches!(result, Err(Error::MultipleRoots)));
    }

    #[test]
    fn test_mismatched_tags_error() {
        let result = Document::parse("<root></wrong>");
        // quick-xml reports this itself when check_end_names is enabled (default)
        assert!(
            matches!(
                result,
                Err(Error::MismatchedEndTag { .. } | Error::Syntax { .. })
            ),
            "Expected MismatchedEndTag or Syntax error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_text_outside_root_error() {
        let result = Document::parse("<root/>trailing");
        assert!(matches!(result, Err(Error::InvalidStructure { .. })));
    }
}
