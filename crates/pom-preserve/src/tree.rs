//! Arena-backed document tree.
//!
//! Every node lives in a single `Vec` owned by [`Document`] and is addressed by
//! a [`NodeId`]. Parents own their children through the `children` list of
//! their [`Element`]; each node additionally records the id of its parent for
//! upward traversal. Detached nodes stay in the arena until the document is
//! dropped, so an id never refers to a different node than the one it was
//! created for.
//!
//! Text, comment and attribute payloads are stored in their raw markup form
//! (entities left escaped). This is what allows untouched regions to be
//! written back byte for byte.

use std::borrow::Cow;
use std::fmt;

use quick_xml::escape::{escape, partial_escape, unescape};

use crate::{Error, Result};

/// Stable handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content kinds that can appear inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, escaped as it appears in markup.
    Text(String),
    /// Comment body, without the `<!--` and `-->` markers.
    Comment(String),
    /// CDATA section body, without the `<![CDATA[` and `]]>` markers.
    CData(String),
    /// Processing instruction body, without the `<?` and `?>` markers.
    Instruction(String),
}

/// An element: qualified name, attributes and ordered mixed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Local name (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g. `xsi` in `<xsi:foo>`).
    pub prefix: Option<String>,

    attributes: Vec<Attribute>,
    children: Vec<NodeId>,

    /// Source text of the start tag, kept until the attributes change.
    start_tag: Option<String>,

    /// Source text of the end tag.
    end_tag: Option<String>,

    /// Parsed from (or created as) an empty-element tag such as `<a/>`.
    self_closing: bool,
}

/// An attribute with its value in escaped markup form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name, e.g. `xsi:schemaLocation`.
    pub name: String,

    /// Raw (escaped) value, without quotes.
    pub value: String,

    /// Quote character used in the source.
    pub quote: char,
}

impl Element {
    pub(crate) fn new(name: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            name: name.into(),
            prefix,
            attributes: Vec::new(),
            children: Vec::new(),
            start_tag: None,
            end_tag: None,
            self_closing: true,
        }
    }

    pub(crate) fn parsed(
        name: String,
        prefix: Option<String>,
        attributes: Vec<Attribute>,
        start_tag: String,
        self_closing: bool,
    ) -> Self {
        Self {
            name,
            prefix,
            attributes,
            children: Vec::new(),
            start_tag: Some(start_tag),
            end_tag: None,
            self_closing,
        }
    }

    /// The name as written in markup, including the prefix.
    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(format!("{}:{}", prefix, self.name)),
            None => Cow::Borrowed(&self.name),
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn start_tag(&self) -> Option<&str> {
        self.start_tag.as_deref()
    }

    pub(crate) fn end_tag(&self) -> Option<&str> {
        self.end_tag.as_deref()
    }

    pub(crate) fn set_end_tag(&mut self, end_tag: String) {
        self.end_tag = Some(end_tag);
    }

    pub(crate) fn is_self_closing(&self) -> bool {
        self.self_closing
    }
}

#[derive(Debug, Clone)]
struct Slot {
    parent: Option<NodeId>,
    node: Node,
}

/// A parsed (or programmatically built) document rooted at a single element.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    root: NodeId,
}

impl Document {
    /// Create a document containing only an empty root element.
    pub fn new(root_name: &str) -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            root: NodeId(0),
        };
        let (prefix, name) = split_qualified_name(root_name);
        doc.root = doc.alloc(Node::Element(Element::new(name, prefix)));
        doc
    }

    /// Arena with no nodes; the parser sets the root once it has one.
    pub(crate) fn empty() -> Self {
        Self {
            slots: Vec::new(),
            root: NodeId(0),
        }
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot { parent: None, node });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Access a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this document.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.slots[id.index()].node
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.slots[id.index()].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].parent
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id) {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        match self.node_mut(id) {
            Node::Element(element) => Ok(element),
            _ => Err(Error::NotAnElement { node: id }),
        }
    }

    pub(crate) fn expect_element(&self, id: NodeId) -> Result<&Element> {
        self.element(id).ok_or(Error::NotAnElement { node: id })
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Text(_))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Comment(_))
    }

    /// Local name of an element.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Content of an element in document order; empty for other node kinds.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Node::Element(element) => &element.children,
            _ => &[],
        }
    }

    /// Element children only, skipping text, comments and the like.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.is_element(child))
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Descendant elements with the given local name, in document order.
    pub fn descendant_elements_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&d| self.name(d) == Some(name))
            .collect()
    }

    /// Whether `id` sits somewhere below `ancestor`.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether `id` is the root or reachable from it.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.is_descendant_of(id, self.root)
    }

    /// Raw (escaped) payload of a text node.
    pub fn raw_text(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node::Text(raw) => Some(raw),
            _ => None,
        }
    }

    /// Unescaped value of a text or CDATA node.
    pub fn text(&self, id: NodeId) -> Option<Cow<'_, str>> {
        match self.node(id) {
            Node::Text(raw) => Some(unescape_lossy(raw)),
            Node::CData(content) => Some(Cow::Borrowed(content)),
            _ => None,
        }
    }

    /// Concatenated text and CDATA content of an element's direct children.
    pub fn element_text(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .filter_map(|&child| self.text(child))
            .collect()
    }

    /// Unescaped attribute value by qualified name.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<Cow<'_, str>> {
        self.element(id)?
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| unescape_lossy(&a.value))
    }

    /// Set (or add) an attribute.
    ///
    /// Setting an attribute to the value it already has leaves the element's
    /// original start tag untouched; any real change makes the start tag be
    /// regenerated from the attribute list on output.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let escaped = escape(value).into_owned();
        let element = self.element_mut(id)?;
        match element.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) if existing.value == escaped => return Ok(()),
            Some(existing) => existing.value = escaped,
            None => element.attributes.push(Attribute {
                name: name.to_string(),
                value: escaped,
                quote: '"',
            }),
        }
        element.start_tag = None;
        Ok(())
    }

    /// Create a detached element sharing no content with the tree.
    pub fn create_element(&mut self, name: &str, prefix: Option<&str>) -> NodeId {
        self.alloc(Node::Element(Element::new(name, prefix.map(str::to_string))))
    }

    /// Create a detached text node from an unescaped value.
    pub fn create_text(&mut self, value: &str) -> NodeId {
        self.alloc(Node::Text(partial_escape(value).into_owned()))
    }

    pub fn create_comment(&mut self, body: &str) -> NodeId {
        self.alloc(Node::Comment(body.to_string()))
    }

    /// Insert a detached node into `parent` at content position `index`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        if self.parent(child).is_some() || child == self.root {
            return Err(Error::AlreadyAttached { node: child });
        }
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::CyclicInsertion { parent, child });
        }
        let element = self.element_mut(parent)?;
        if index > element.children.len() {
            return Err(Error::InvalidIndex {
                index,
                len: element.children.len(),
            });
        }
        element.children.insert(index, child);
        self.slots[child.index()].parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.expect_element(parent)?.children.len();
        self.insert_child(parent, index, child)
    }

    /// Detach `child` from `parent`, returning the position it occupied.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize> {
        if self.parent(child) != Some(parent) {
            return Err(Error::NotAChild { parent, child });
        }
        let element = self.element_mut(parent)?;
        let index = element
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(Error::NotAChild { parent, child })?;
        element.children.remove(index);
        self.slots[child.index()].parent = None;
        Ok(index)
    }

    /// Detach a node from whatever parent it has.
    pub fn detach(&mut self, id: NodeId) -> Result<usize> {
        let parent = self.parent(id).ok_or(Error::DetachedNode { node: id })?;
        self.remove_child(parent, id)
    }

    /// Replace all content of an element with a single text node.
    pub fn set_text(&mut self, id: NodeId, value: &str) -> Result<()> {
        let old = std::mem::take(&mut self.element_mut(id)?.children);
        for child in old {
            self.slots[child.index()].parent = None;
        }
        let text = self.create_text(value);
        self.append_child(id, text)
    }

    pub(crate) fn set_raw_text(&mut self, id: NodeId, raw: String) {
        if let Node::Text(existing) = self.node_mut(id) {
            *existing = raw;
        }
    }

    /// Deep-copy a subtree of `source` into this document, returning the
    /// detached copy.
    pub fn import(&mut self, source: &Document, id: NodeId) -> NodeId {
        let copy = match source.node(id) {
            Node::Element(element) => {
                let mut shallow = element.clone();
                shallow.children = Vec::new();
                Node::Element(shallow)
            }
            other => other.clone(),
        };
        let new_id = self.alloc(copy);
        for &child in source.children(id) {
            let child_copy = self.import(source, child);
            if let Node::Element(element) = self.node_mut(new_id) {
                element.children.push(child_copy);
            }
            self.slots[child_copy.index()].parent = Some(new_id);
        }
        new_id
    }
}

/// Split `prefix:local` into its parts.
pub(crate) fn split_qualified_name(qualified: &str) -> (Option<String>, String) {
    match qualified.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qualified.to_string()),
    }
}

/// Unescape markup text, falling back to the raw form for entities we cannot
/// resolve (e.g. ones declared in an internal DTD subset).
pub(crate) fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

/// XML whitespace: space, tab, carriage return and line feed.
pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.chars().all(is_xml_whitespace)
}

pub(crate) fn newline_count(text: &str) -> usize {
    text.matches('\n').count()
}
