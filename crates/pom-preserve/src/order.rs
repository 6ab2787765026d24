//! Schema-driven placement of new child elements.
//!
//! An [`OrderTable`] lists, per parent tag, the expected order of its child
//! tags. Empty entries ([`BLANK_LINE`]) mark where the house style puts a
//! blank line between groups of children.

use std::collections::HashMap;

use serde::Deserialize;

use crate::indent::INDENT_STEP;
use crate::tree::{Node, is_blank};
use crate::{Document, NodeId, Result};

/// Order table entry that stands for a blank line rather than a tag.
pub const BLANK_LINE: &str = "";

/// Per-parent child ordering used by [`Document::insert_new_element`].
///
/// Tables can be built in code or read from TOML:
///
/// ```toml
/// [order]
/// project = ["modelVersion", "", "parent", "", "groupId", "artifactId"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderTable {
    #[serde(default)]
    order: HashMap<String, Vec<String>>,
}

impl OrderTable {
    /// An empty table: every insertion appends.
    pub fn new() -> Self {
        Self::default()
    }

    /// The child order of a Maven POM `project` and `profile`.
    pub fn maven_pom() -> Self {
        Self::new()
            .with_order(
                "project",
                [
                    "modelVersion",
                    BLANK_LINE,
                    "parent",
                    BLANK_LINE,
                    "groupId",
                    "artifactId",
                    "version",
                    "packaging",
                    BLANK_LINE,
                    "name",
                    "description",
                    "url",
                    "inceptionYear",
                    "organization",
                    "licenses",
                    BLANK_LINE,
                    "developers",
                    "contributors",
                    BLANK_LINE,
                    "mailingLists",
                    BLANK_LINE,
                    "prerequisites",
                    BLANK_LINE,
                    "modules",
                    BLANK_LINE,
                    "scm",
                    "issueManagement",
                    "ciManagement",
                    "distributionManagement",
                    BLANK_LINE,
                    "properties",
                    BLANK_LINE,
                    "dependencyManagement",
                    "dependencies",
                    BLANK_LINE,
                    "repositories",
                    "pluginRepositories",
                    BLANK_LINE,
                    "build",
                    BLANK_LINE,
                    "reporting",
                    BLANK_LINE,
                    "profiles",
                ],
            )
            .with_order(
                "profile",
                [
                    "id",
                    "activation",
                    "modules",
                    "distributionManagement",
                    "properties",
                    "dependencyManagement",
                    "dependencies",
                    "repositories",
                    "pluginRepositories",
                    "build",
                    "reporting",
                ],
            )
    }

    /// Parse a table from TOML (see the type-level docs for the layout).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_order<I, S>(mut self, parent_tag: &str, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_order(parent_tag, children);
        self
    }

    /// Replace the child order for `parent_tag`.
    pub fn set_order<I, S>(&mut self, parent_tag: &str, children: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order.insert(
            parent_tag.to_string(),
            children.into_iter().map(Into::into).collect(),
        );
    }

    pub fn order_for(&self, parent_tag: &str) -> Option<&[String]> {
        self.order.get(parent_tag).map(Vec::as_slice)
    }

    /// Whether the entry right before `name` in the order of `parent_tag` is
    /// a blank-line marker.
    pub fn blank_line_before(&self, name: &str, parent_tag: &str) -> bool {
        let Some(order) = self.order_for(parent_tag) else {
            return false;
        };
        match order.iter().position(|entry| entry == name) {
            Some(pos) if pos > 0 => order[pos - 1] == BLANK_LINE,
            _ => false,
        }
    }
}

impl Document {
    /// Create an element named `name` and insert it into `parent` at the
    /// position dictated by `order`.
    ///
    /// The element is preceded by a line break plus the parent's detected
    /// indentation (two line breaks when the table asks for a blank line)
    /// and is given the same break as interior content, so its end tag lines
    /// up once children are added. It inherits the parent's namespace prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnElement`](crate::Error::NotAnElement) if `parent`
    /// is not an element.
    pub fn insert_new_element(
        &mut self,
        name: &str,
        parent: NodeId,
        order: &OrderTable,
    ) -> Result<NodeId> {
        let parent_element = self.expect_element(parent)?;
        let parent_tag = parent_element.name.clone();
        let prefix = parent_element.prefix.clone();

        let indent = self.detect_indentation(parent);
        let index = self.insertion_index(name, parent, order);
        let separator = if order.blank_line_before(name, &parent_tag) {
            "\n\n"
        } else {
            "\n"
        };

        tracing::debug!(element = name, parent = %parent, index, "Inserting element");

        let leading = self.alloc(Node::Text(format!("{}{}", separator, indent)));
        let element = self.create_element(name, prefix.as_deref());
        let interior = self.alloc(Node::Text(format!("\n{}", indent)));
        self.append_child(element, interior)?;

        self.insert_child(parent, index, leading)?;
        self.insert_child(parent, index + 1, element)?;
        Ok(element)
    }

    /// Content position at which a new `name` child of `parent` goes.
    fn insertion_index(&self, name: &str, parent: NodeId, order: &OrderTable) -> usize {
        if self.children(parent).is_empty() {
            return 0;
        }
        let Some(table) = self.name(parent).and_then(|tag| order.order_for(tag)) else {
            return self.append_index(parent);
        };
        let Some(pos) = table.iter().position(|entry| entry == name) else {
            return self.append_index(parent);
        };

        for previous in table[..pos].iter().rev() {
            if previous == BLANK_LINE {
                continue;
            }
            let last_match = self
                .children_named(parent, previous)
                .last()
                .and_then(|&sibling| self.index_of(parent, sibling));
            if let Some(index) = last_match {
                return index + 1;
            }
        }
        0
    }

    /// Position of the last child, ignoring the whitespace that indents the
    /// parent's end tag.
    pub(crate) fn append_index(&self, parent: NodeId) -> usize {
        let children = self.children(parent);
        match children.last() {
            Some(&last) if matches!(self.node(last), Node::Text(text) if is_blank(text)) => {
                children.len() - 1
            }
            _ => children.len(),
        }
    }

    /// Deep-copy `node` from `source` to the end of `parent`, re-indenting
    /// the copy to fit its new position.
    pub fn append_copy(&mut self, parent: NodeId, source: &Document, node: NodeId) -> Result<NodeId> {
        self.expect_element(parent)?;
        let indent = self.detect_indentation(parent);
        let index = self.append_index(parent);

        let copy = self.import(source, node);
        let leading = self.alloc(Node::Text(format!("\n{}", indent)));
        self.insert_child(parent, index, leading)?;
        self.insert_child(parent, index + 1, copy)?;

        let indent = self.detect_indentation(parent);
        self.reset_indentation(parent, &indent);
        self.reset_indentation(copy, &format!("{}{}", indent, INDENT_STEP));

        tracing::debug!(parent = %parent, copy = %copy, "Appended copied element");
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_table() -> OrderTable {
        OrderTable::new().with_order("p", ["A", "B", "C"])
    }

    fn p_in_project() -> (Document, NodeId) {
        let doc = Document::parse("<project>\n  <p>\n  </p>\n</project>").unwrap();
        let p = doc.descendant_elements_named(doc.root(), "p")[0];
        (doc, p)
    }

    #[test]
    fn test_insertion_is_independent_of_prior_order() {
        let order = abc_table();

        let (mut first, p) = p_in_project();
        first.insert_new_element("A", p, &order).unwrap();
        first.insert_new_element("C", p, &order).unwrap();
        first.insert_new_element("B", p, &order).unwrap();

        let (mut second, p) = p_in_project();
        second.insert_new_element("C", p, &order).unwrap();
        second.insert_new_element("A", p, &order).unwrap();
        second.insert_new_element("B", p, &order).unwrap();

        assert_eq!(first.to_xml_string(), second.to_xml_string());
        let names: Vec<_> = first
            .child_elements(p)
            .filter_map(|c| first.name(c))
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_insert_into_empty_parent() {
        let mut doc = Document::parse("<a><b></b></a>").unwrap();
        let b = doc.child_elements(doc.root()).next().unwrap();
        let c = doc.insert_new_element("c", b, &OrderTable::new()).unwrap();
        assert_eq!(doc.index_of(b, c), Some(1));
        assert_eq!(doc.to_xml_string(), "<a><b>\n  <c>\n  </c></b></a>");
    }

    #[test]
    fn test_unknown_parent_appends_before_closing_indent() {
        let mut doc = Document::parse("<project>\n  <x/>\n</project>").unwrap();
        let root = doc.root();
        let y = doc.insert_new_element("y", root, &OrderTable::new()).unwrap();
        doc.set_text(y, "1").unwrap();
        assert_eq!(
            doc.to_xml_string(),
            "<project>\n  <x/>\n  <y>1</y>\n</project>"
        );
    }

    #[test]
    fn test_blank_line_sentinel() {
        let order = OrderTable::maven_pom();
        assert!(order.blank_line_before("parent", "project"));
        assert!(!order.blank_line_before("artifactId", "project"));
        assert!(!order.blank_line_before("modelVersion", "project"));
        assert!(!order.blank_line_before("parent", "unknown"));

        let mut doc =
            Document::parse("<project>\n  <modelVersion>4.0.0</modelVersion>\n</project>").unwrap();
        let root = doc.root();
        let parent = doc.insert_new_element("parent", root, &order).unwrap();
        doc.set_text(parent, "p").unwrap();
        insta::assert_snapshot!(doc.to_xml_string(), @r"
        <project>
          <modelVersion>4.0.0</modelVersion>

          <parent>p</parent>
        </project>
        ");
    }

    #[test]
    fn test_nothing_earlier_present_inserts_first() {
        let mut doc =
            Document::parse("<project>\n  <packaging>jar</packaging>\n</project>").unwrap();
        let root = doc.root();
        let artifact = doc
            .insert_new_element("artifactId", root, &OrderTable::maven_pom())
            .unwrap();
        assert_eq!(doc.index_of(root, artifact), Some(1));
        doc.set_text(artifact, "a").unwrap();
        assert_eq!(
            doc.to_xml_string(),
            "<project>\n  <artifactId>a</artifactId>\n  <packaging>jar</packaging>\n</project>"
        );
    }

    #[test]
    fn test_insert_after_last_same_named_sibling() {
        let order = OrderTable::new().with_order("list", ["item", "end"]);
        let mut doc =
            Document::parse("<list>\n  <item>1</item>\n  <item>2</item>\n</list>").unwrap();
        let root = doc.root();
        let end = doc.insert_new_element("end", root, &order).unwrap();
        assert_eq!(doc.index_of(root, end), Some(5));
    }

    #[test]
    fn test_prefix_is_inherited() {
        let mut doc = Document::parse("<pom:project xmlns:pom='urn:p'>\n</pom:project>").unwrap();
        let root = doc.root();
        let child = doc.insert_new_element("name", root, &OrderTable::new()).unwrap();
        assert_eq!(doc.element(child).unwrap().prefix.as_deref(), Some("pom"));
    }

    #[test]
    fn test_table_from_toml() {
        let order = OrderTable::from_toml_str(
            r#"
            [order]
            dependency = ["groupId", "artifactId", "", "scope"]
            "#,
        )
        .unwrap();
        assert_eq!(order.order_for("dependency").map(<[String]>::len), Some(4));
        assert!(order.blank_line_before("scope", "dependency"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = OrderTable::from_toml_str("[order]\nproject = 3");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_append_copy_reindents() {
        let source = Document::parse(
            "<dependencies>\n        <dependency>\n                <groupId>g</groupId>\n        </dependency>\n</dependencies>",
        )
        .unwrap();
        let dependency = source.descendant_elements_named(source.root(), "dependency")[0];

        let mut doc = Document::parse(
            "<project>\n  <dependencies>\n    <dependency>\n      <groupId>a</groupId>\n    </dependency>\n  </dependencies>\n</project>",
        )
        .unwrap();
        let dependencies = doc.descendant_elements_named(doc.root(), "dependencies")[0];
        doc.append_copy(dependencies, &source, dependency).unwrap();

        insta::assert_snapshot!(doc.to_xml_string(), @r"
        <project>
          <dependencies>
            <dependency>
              <groupId>a</groupId>
            </dependency>
            <dependency>
              <groupId>g</groupId>
            </dependency>
          </dependencies>
        </project>
        ");
    }
}
