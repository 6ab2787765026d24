//! End-to-end editing scenarios on POM fragments.

use pom_preserve::{
    CleanupEmptyProfiles, Document, Etl, EtlOptions, LineSeparator, NodeId, OrderTable,
    SquashMultilines, TransformPipeline,
};

fn plugins_of(doc: &Document) -> Vec<NodeId> {
    let plugins = doc.get_child(doc.root(), "plugins").unwrap();
    doc.children_named(plugins, "plugin")
}

#[test]
fn test_add_plugin_to_blank_plugins() {
    let mut doc = Document::parse("<build><plugins> </plugins></build>").unwrap();
    let order = OrderTable::maven_pom();
    let plugins = doc.get_child(doc.root(), "plugins").unwrap();

    let plugin = doc.insert_new_element("plugin", plugins, &order).unwrap();
    doc.rewrite_element("groupId", Some("a"), plugin, &order).unwrap();
    doc.rewrite_element("artifactId", Some("b"), plugin, &order).unwrap();

    assert_eq!(plugins_of(&doc).len(), 1);
    assert_eq!(doc.get_child_text_trim(plugin, "groupId").as_deref(), Some("a"));
    assert_eq!(doc.get_child_text_trim(plugin, "artifactId").as_deref(), Some("b"));
    assert!(doc.to_xml_string().contains("<plugins>\n  <plugin>\n    <groupId>a</groupId>"));
}

#[test]
fn test_unset_dependency_type() {
    let mut doc = Document::parse("<dependency><type>ear</type></dependency>").unwrap();
    let root = doc.root();
    doc.rewrite_element("type", None, root, &OrderTable::maven_pom())
        .unwrap();
    assert_eq!(doc.to_xml_string(), "<dependency></dependency>");
}

#[test]
fn test_set_then_unset_restores_layout() {
    let source = "<project>\n  <groupId>g</groupId>\n  <artifactId>a</artifactId>\n</project>";
    let order = OrderTable::maven_pom();
    let mut doc = Document::parse(source).unwrap();
    let root = doc.root();

    doc.rewrite_element("version", Some("1"), root, &order).unwrap();
    assert_eq!(
        doc.to_xml_string(),
        "<project>\n  <groupId>g</groupId>\n  <artifactId>a</artifactId>\n  <version>1</version>\n</project>"
    );

    doc.rewrite_element("version", None, root, &order).unwrap();
    assert_eq!(doc.to_xml_string(), source);
}

#[test]
fn test_copy_dependency_between_documents() {
    let other = Document::parse(
        "<dependencies>\n\t<dependency>\n\t\t<groupId>x</groupId>\n\t\t<artifactId>y</artifactId>\n\t</dependency>\n</dependencies>",
    )
    .unwrap();
    let source_dependency = other.get_child(other.root(), "dependency").unwrap();

    let mut doc = Document::parse(
        "<project>\n  <dependencies>\n    <dependency>\n      <groupId>a</groupId>\n    </dependency>\n  </dependencies>\n</project>",
    )
    .unwrap();
    let dependencies = doc.get_child(doc.root(), "dependencies").unwrap();
    let copy = doc.append_copy(dependencies, &other, source_dependency).unwrap();

    assert_eq!(doc.children_named(dependencies, "dependency").len(), 2);
    assert_eq!(doc.get_child_text_trim(copy, "artifactId").as_deref(), Some("y"));
    insta::assert_snapshot!(doc.to_xml_string(), @r"
    <project>
      <dependencies>
        <dependency>
          <groupId>a</groupId>
        </dependency>
        <dependency>
          <groupId>x</groupId>
          <artifactId>y</artifactId>
        </dependency>
      </dependencies>
    </project>
    ");
}

#[test]
fn test_profiles_cleanup_pipeline() {
    let source = "<?xml version=\"1.0\"?>
<project>
  <modelVersion>4.0.0</modelVersion>

  <profiles>
    <!-- activated on CI -->
    <profile>
      <id>ci</id>
      <activation>
        <property>
          <name>env.CI</name>
        </property>
      </activation>
    </profile>
    <profile>
      <id>release</id>
      <properties>
        <gpg.skip>false</gpg.skip>
      </properties>
    </profile>
  </profiles>
</project>
";
    let etl = Etl::new(EtlOptions {
        line_separator: LineSeparator::Unix,
        schema: None,
    });
    let mut extracted = etl.extract(source).unwrap();

    let mut pipeline = TransformPipeline::new();
    pipeline.push(Box::new(CleanupEmptyProfiles));
    pipeline.push(Box::new(SquashMultilines));
    extracted.transform(&pipeline).unwrap();

    insta::assert_snapshot!(extracted.load().unwrap().text(), @r#"
    <?xml version="1.0"?>
    <project>
      <modelVersion>4.0.0</modelVersion>

      <profiles>
        <profile>
          <id>release</id>
          <properties>
            <gpg.skip>false</gpg.skip>
          </properties>
        </profile>
      </profiles>
    </project>
    "#);
}

#[test]
fn test_removing_all_profiles_removes_container() {
    let mut doc = Document::parse(
        "<project>\n  <name>n</name>\n\n  <profiles>\n    <profile>\n      <id>only</id>\n    </profile>\n  </profiles>\n</project>",
    )
    .unwrap();
    let profiles = doc.get_child(doc.root(), "profiles").unwrap();
    doc.cleanup_empty_elements(profiles, "profile", &["id", "activation"]);
    assert!(!doc.is_attached(profiles));
    assert_eq!(doc.to_xml_string(), "<project>\n  <name>n</name>\n</project>");
}
