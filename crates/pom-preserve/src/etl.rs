//! Round trip between source text and an editable [`Document`].
//!
//! The controller is a small typestate machine:
//!
//! ```text
//! Etl ──extract──▶ Extracted ──load──▶ Loaded
//!   └──(parse error)──▶ Err
//! ```
//!
//! Everything outside the root element (XML declaration, doctype, leading and
//! trailing comments, whitespace) never enters the tree. It is captured as a
//! verbatim *prolog* and *epilog* and written back around the root on load,
//! so a document loaded without edits reproduces its input.
//!
//! # Example
//!
//! ```rust
//! use pom_preserve::{Etl, EtlOptions, LineSeparator, OrderTable};
//!
//! let source = "<?xml version=\"1.0\"?>\n<project>\n  <version>1.0</version>\n</project>\n";
//! let etl = Etl::new(EtlOptions {
//!     line_separator: LineSeparator::Unix,
//!     ..Default::default()
//! });
//!
//! let mut extracted = etl.extract(source).unwrap();
//! let doc = extracted.document_mut();
//! let root = doc.root();
//! doc.rewrite_element("version", Some("1.1"), root, &OrderTable::maven_pom()).unwrap();
//!
//! let loaded = extracted.load().unwrap();
//! assert_eq!(
//!     loaded.text(),
//!     "<?xml version=\"1.0\"?>\n<project>\n  <version>1.1</version>\n</project>\n"
//! );
//! ```

use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::transform::TransformPipeline;
use crate::{Document, Error, Result};

/// Namespace bound to the `xsi` prefix by [`SchemaInjection`].
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Line separator written on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineSeparator {
    /// `\r\n` on Windows, `\n` elsewhere.
    #[default]
    Native,
    Unix,
}

impl LineSeparator {
    pub fn as_str(self) -> &'static str {
        match self {
            LineSeparator::Native if cfg!(windows) => "\r\n",
            LineSeparator::Native | LineSeparator::Unix => "\n",
        }
    }
}

/// Namespace and schema location stamped onto the root element on load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaInjection {
    /// Default namespace (`xmlns`) of the document.
    pub namespace: String,
    /// Value for `xsi:schemaLocation`, used only when the root has none.
    pub schema_location: String,
}

impl SchemaInjection {
    /// Schema settings for a Maven POM of the given model version, e.g.
    /// `4.0.0`.
    pub fn maven(model_version: &str) -> Self {
        let namespace = format!("http://maven.apache.org/POM/{}", model_version);
        let schema_location = format!(
            "{} http://maven.apache.org/maven-v{}.xsd",
            namespace,
            model_version.replace('.', "_")
        );
        Self {
            namespace,
            schema_location,
        }
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        let root = doc.root();
        doc.set_attribute(root, "xmlns", &self.namespace)?;
        if doc.attribute(root, "xmlns:xsi").is_none() {
            doc.set_attribute(root, "xmlns:xsi", XSI_NAMESPACE)?;
        }
        if doc.attribute(root, "xsi:schemaLocation").is_none() {
            doc.set_attribute(root, "xsi:schemaLocation", &self.schema_location)?;
        }
        Ok(())
    }
}

/// Round-trip configuration.
///
/// ```toml
/// line-separator = "unix"
///
/// [schema]
/// namespace = "http://maven.apache.org/POM/4.0.0"
/// schema-location = "http://maven.apache.org/POM/4.0.0 http://maven.apache.org/maven-v4_0_0.xsd"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EtlOptions {
    pub line_separator: LineSeparator,
    pub schema: Option<SchemaInjection>,
}

impl EtlOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// How the text around the root element was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fidelity {
    /// The serialized root was found verbatim in the source.
    Exact,
    /// Prolog and epilog were taken from a structural match of the source.
    Recovered,
    /// Neither worked; only the root element is written on load.
    Degraded,
}

const SPACE: &str = r"\s+";
const PI: &str = r#"<\?(?:[^"'>]+|"[^"]*"|'[^']*')*>"#;
const COMMENT: &str = r"<!--(?:[^-]|-[^-])*-->";
const INTERNAL_SUBSET: &str = r#"\[(?:[^"'\]]+|"[^"]*"|'[^']*')*\]"#;
const BOM: &str = r"\x{FEFF}?";

fn doctype() -> String {
    format!(r#"<!DOCTYPE(?:[^"'\[>]+|"[^"]*"|'[^']*'|{})*>"#, INTERNAL_SUBSET)
}

fn prolog_pattern() -> String {
    format!(
        "{}(?:{}|{}|{}|{})*",
        BOM,
        SPACE,
        PI,
        doctype(),
        COMMENT
    )
}

fn epilog_pattern() -> String {
    format!("(?:{}|{}|{})*", SPACE, COMMENT, PI)
}

/// Text that may legally precede the root element.
static PROLOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\A{}\z", prolog_pattern())).expect("Invalid prolog pattern")
});

/// Text that may legally follow the root element.
static EPILOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\A{}\z", epilog_pattern())).expect("Invalid epilog pattern")
});

/// Whole document split into prolog, root and epilog.
static DOCUMENT_LAYOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?s)\A({})(.*?)({})\z",
        prolog_pattern(),
        epilog_pattern()
    ))
    .expect("Invalid document layout pattern")
});

/// Round-trip controller in its initial state.
#[derive(Debug, Clone, Default)]
pub struct Etl {
    options: EtlOptions,
}

impl Etl {
    pub fn new(options: EtlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EtlOptions {
        &self.options
    }

    /// Parse `text` and split off everything around the root element.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the markup is malformed; no document is
    /// produced in that case.
    pub fn extract(&self, text: &str) -> Result<Extracted> {
        let normalized = normalize_line_endings(text, "\n");
        let document = Document::parse(&normalized)?;

        let root_name = document.expect_element(document.root())?.qualified_name();
        let (prolog, epilog, fidelity) =
            split_around_root(&normalized, &document.to_xml_string(), &root_name);

        if fidelity == Fidelity::Degraded {
            tracing::warn!(
                root = %root_name,
                "Could not locate the root element in the source; text outside it will not be preserved"
            );
        } else {
            tracing::debug!(?fidelity, "Extracted document");
        }

        Ok(Extracted {
            options: self.options.clone(),
            document,
            prolog,
            epilog,
            fidelity,
        })
    }

    /// Read a UTF-8 file and [`extract`](Self::extract) it.
    pub fn extract_file(&self, path: impl AsRef<Path>) -> Result<Extracted> {
        let text = std::fs::read_to_string(path.as_ref())?;
        self.extract(&text)
    }
}

/// A parsed document open for editing.
#[derive(Debug, Clone)]
pub struct Extracted {
    options: EtlOptions,
    document: Document,
    prolog: Option<String>,
    epilog: Option<String>,
    fidelity: Fidelity,
}

impl Extracted {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Text before the root element, with `\n` line endings.
    pub fn prolog(&self) -> Option<&str> {
        self.prolog.as_deref()
    }

    /// Text after the root element, with `\n` line endings.
    pub fn epilog(&self) -> Option<&str> {
        self.epilog.as_deref()
    }

    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    /// Run a pipeline of edits over the document.
    pub fn transform(&mut self, pipeline: &TransformPipeline) -> Result<()> {
        pipeline.execute(&mut self.document)
    }

    /// Apply the configured schema settings and render the final text.
    pub fn load(mut self) -> Result<Loaded> {
        if let Some(schema) = &self.options.schema {
            schema.apply(&mut self.document)?;
        }

        let mut out = String::new();
        if let Some(prolog) = &self.prolog {
            out.push_str(prolog);
        }
        out.push_str(&self.document.to_xml_string());
        if let Some(epilog) = &self.epilog {
            out.push_str(epilog);
        }

        Ok(Loaded {
            text: normalize_line_endings(&out, self.options.line_separator.as_str()),
            fidelity: self.fidelity,
        })
    }

    /// [`load`](Self::load) and write the result to `path`.
    ///
    /// The text goes to a temporary file next to `path` that is then renamed
    /// over it, so a failed write leaves any existing file untouched.
    pub fn load_to_file(self, path: impl AsRef<Path>) -> Result<Loaded> {
        let path = path.as_ref();
        let loaded = self.load()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(loaded.text.as_bytes())?;
        file.flush()?;
        // Keep the mode of the file being replaced
        match std::fs::metadata(path) {
            Ok(metadata) => file.as_file().set_permissions(metadata.permissions())?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        file.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %path.display(), "Wrote document");
        Ok(loaded)
    }
}

/// Final output of a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    text: String,
    fidelity: Fidelity,
}

impl Loaded {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }
}

/// Convert `\r\n`, `\r` and `\n` line endings to `separator`.
pub fn normalize_line_endings(text: &str, separator: &str) -> String {
    let unix = text.replace("\r\n", "\n").replace('\r', "\n");
    if separator == "\n" {
        unix
    } else {
        unix.replace('\n', separator)
    }
}

/// Find `root` (the serialized root element) inside `source` and return the
/// text before and after it.
fn split_around_root(
    source: &str,
    root: &str,
    root_name: &str,
) -> (Option<String>, Option<String>, Fidelity) {
    for (start, _) in source.match_indices(root) {
        let prolog = &source[..start];
        let epilog = &source[start + root.len()..];
        if PROLOG.is_match(prolog) && EPILOG.is_match(epilog) {
            return (
                Some(prolog.to_string()),
                Some(epilog.to_string()),
                Fidelity::Exact,
            );
        }
    }

    if let Some(captures) = DOCUMENT_LAYOUT.captures(source) {
        let starts_with_root = captures
            .get(2)
            .and_then(|m| m.as_str().strip_prefix('<'))
            .and_then(|rest| rest.strip_prefix(root_name))
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/'));
        if starts_with_root {
            let prolog = captures.get(1).map(|m| m.as_str().to_string());
            let mut epilog = captures.get(3).map(|m| m.as_str().to_string());
            // Text the epilog pattern rejected but that still follows the root
            if let (Some(middle), Some(epilog)) = (captures.get(2), epilog.as_mut())
                && let Some(rest) = middle.as_str().strip_prefix(root)
            {
                epilog.insert_str(0, rest);
            }
            return (prolog, epilog, Fidelity::Recovered);
        }
    }

    (None, None, Fidelity::Degraded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix() -> Etl {
        Etl::new(EtlOptions {
            line_separator: LineSeparator::Unix,
            schema: None,
        })
    }

    #[test]
    fn test_round_trip_keeps_prolog_and_epilog() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- header -->\n<!DOCTYPE project [\n  <!ENTITY v '1'>\n]>\n<project>\n  <a/>\n</project>\n<!-- trailer -->\n";
        let extracted = unix().extract(source).unwrap();
        assert_eq!(extracted.fidelity(), Fidelity::Exact);
        assert_eq!(
            extracted.prolog(),
            Some("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- header -->\n<!DOCTYPE project [\n  <!ENTITY v '1'>\n]>\n")
        );
        assert_eq!(extracted.epilog(), Some("\n<!-- trailer -->\n"));
        assert_eq!(extracted.load().unwrap().text(), source);
    }

    #[test]
    fn test_line_endings_are_normalized() {
        let source = "<project>\r\n  <!-- a\r\n  b -->\r\n  <x><![CDATA[1\r2]]></x>\r\n</project>\r\n";
        let loaded = unix().extract(source).unwrap().load().unwrap();
        assert_eq!(
            loaded.text(),
            "<project>\n  <!-- a\n  b -->\n  <x><![CDATA[1\n2]]></x>\n</project>\n"
        );
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\nd", "\n"), "a\nb\nc\nd");
        assert_eq!(normalize_line_endings("a\nb\r\n", "\r\n"), "a\r\nb\r\n");
    }

    #[test]
    fn test_malformed_input_fails() {
        let result = unix().extract("<project><a></project>");
        assert!(result.is_err_and(|e| e.is_parse_failure()));
    }

    #[test]
    fn test_root_copy_in_comment_is_not_matched() {
        let source = "<!-- <a/> --><a/>";
        let extracted = unix().extract(source).unwrap();
        assert_eq!(extracted.prolog(), Some("<!-- <a/> -->"));
        assert_eq!(extracted.epilog(), Some(""));
    }

    #[test]
    fn test_fallback_split_recovers_layout() {
        let source = "<?xml version=\"1.0\"?>\n<project  a='1'>\n</project>\n<!-- end -->\n";
        let (prolog, epilog, fidelity) =
            split_around_root(source, "<project a=\"1\">\n</project>", "project");
        assert_eq!(fidelity, Fidelity::Recovered);
        assert_eq!(prolog.as_deref(), Some("<?xml version=\"1.0\"?>\n"));
        assert_eq!(epilog.as_deref(), Some("\n<!-- end -->\n"));
    }

    #[test]
    fn test_fallback_split_degrades() {
        let (prolog, epilog, fidelity) = split_around_root("junk <b/>", "<a/>", "a");
        assert_eq!(fidelity, Fidelity::Degraded);
        assert_eq!(prolog, None);
        assert_eq!(epilog, None);
    }

    #[test]
    fn test_schema_injection() {
        let etl = Etl::new(EtlOptions {
            line_separator: LineSeparator::Unix,
            schema: Some(SchemaInjection::maven("4.0.0")),
        });
        let loaded = etl
            .extract("<project>\n  <modelVersion>4.0.0</modelVersion>\n</project>")
            .unwrap()
            .load()
            .unwrap();
        insta::assert_snapshot!(loaded.text(), @r#"
        <project xmlns="http://maven.apache.org/POM/4.0.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/maven-v4_0_0.xsd">
          <modelVersion>4.0.0</modelVersion>
        </project>
        "#);
    }

    #[test]
    fn test_schema_injection_keeps_matching_start_tag() {
        let source = "<project xmlns=\"urn:p\"\n         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n         xsi:schemaLocation=\"urn:p p.xsd\">\n</project>";
        let etl = Etl::new(EtlOptions {
            line_separator: LineSeparator::Unix,
            schema: Some(SchemaInjection {
                namespace: "urn:p".to_string(),
                schema_location: "urn:p other.xsd".to_string(),
            }),
        });
        let loaded = etl.extract(source).unwrap().load().unwrap();
        assert_eq!(loaded.text(), source);
    }

    #[test]
    fn test_options_from_toml() {
        let options = EtlOptions::from_toml_str(
            r#"
            line-separator = "unix"

            [schema]
            namespace = "urn:p"
            schema-location = "urn:p p.xsd"
            "#,
        )
        .unwrap();
        assert_eq!(options.line_separator, LineSeparator::Unix);
        assert_eq!(
            options.schema.map(|s| s.schema_location),
            Some("urn:p p.xsd".to_string())
        );

        let defaults = EtlOptions::from_toml_str("").unwrap();
        assert_eq!(defaults, EtlOptions::default());
    }
}
