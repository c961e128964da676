//! Loading pages into a [`Document`] and serializing them back out.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::dom::{Document, Mutation, NodeId, NodeSpec};
use crate::error::{FxError, Result};

static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// JSON description of an element tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    pub tag: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageSpec>,
}

impl PageSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: PageSpec = serde_json::from_str(json)?;
        if spec.tag.is_empty() {
            return Err(FxError::Config("page root needs a tag".into()));
        }
        Ok(spec)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// The page bundled into the binary
    pub fn bundled() -> Result<Self> {
        let json = ASSETS
            .get_file("page.json")
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| FxError::Config("bundled page.json missing".into()))?;
        Self::from_json(json)
    }

    /// Builds a document; a top-level `body` merges into the document root
    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        if self.tag == "body" {
            for child in self.children {
                insert(&mut doc, root, child);
            }
        } else {
            insert(&mut doc, root, self);
        }
        doc
    }

    /// Snapshot of `node` and everything below it
    pub fn from_document(doc: &Document, node: NodeId) -> Self {
        let Some(n) = doc.node(node) else {
            return Self::default();
        };
        Self {
            tag: n.tag.clone(),
            classes: n.classes.clone(),
            styles: n.styles.iter().cloned().collect(),
            attrs: n.attrs.iter().cloned().collect(),
            text: n.text.clone(),
            children: n
                .children
                .iter()
                .map(|c| Self::from_document(doc, *c))
                .collect(),
        }
    }
}

fn insert(doc: &mut Document, parent: NodeId, spec: PageSpec) {
    let mut node = NodeSpec::new(spec.tag.to_ascii_lowercase());
    node.classes = spec.classes;
    node.styles = spec.styles.into_iter().collect();

    let Some(id) = doc.create_element(parent, node) else {
        return;
    };
    for (name, value) in &spec.attrs {
        doc.set_attr(id, name, value);
    }
    if !spec.text.is_empty() {
        doc.apply(Mutation::AppendText {
            node: id,
            text: spec.text,
        });
    }
    for child in spec.children {
        insert(doc, id, child);
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes the document below the root as indented HTML
pub fn render_html(doc: &Document) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, 0, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, depth: usize, out: &mut String) {
    let Some(node) = doc.node(id) else {
        return;
    };
    let indent = "  ".repeat(depth);

    let mut open = format!("<{}", node.tag);
    if !node.classes.is_empty() {
        open.push_str(&format!(" class=\"{}\"", escape(&node.classes.join(" "))));
    }
    if !node.styles.is_empty() {
        let style = node
            .styles
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .join("; ");
        open.push_str(&format!(" style=\"{}\"", escape(&style)));
    }
    for (name, value) in &node.attrs {
        open.push_str(&format!(" {}=\"{}\"", name, escape(value)));
    }
    open.push('>');

    if node.children.is_empty() {
        out.push_str(&format!(
            "{indent}{open}{}</{}>\n",
            escape(&node.text),
            node.tag
        ));
        return;
    }

    out.push_str(&format!("{indent}{open}\n"));
    if !node.text.is_empty() {
        out.push_str(&format!("{indent}  {}\n", escape(&node.text)));
    }
    for child in &node.children {
        write_node(doc, *child, depth + 1, out);
    }
    out.push_str(&format!("{indent}</{}>\n", node.tag));
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_bundled_page_has_targets() {
        let doc = PageSpec::bundled().unwrap().into_document();
        assert!(doc.query_selector(".hero").is_some());
        let bio = doc.query_selector(".bio").unwrap();
        assert!(doc.text_content(bio).starts_with("Systems programmer."));
        assert_eq!(doc.query_selector_all(".social-links a").len(), 3);
    }

    #[test]
    fn test_body_root_merges() {
        let spec = PageSpec::from_json(
            r#"{"tag":"body","children":[{"tag":"p","classes":["bio"],"text":"x"}]}"#,
        )
        .unwrap();
        let doc = spec.into_document();
        assert_eq!(doc.children(doc.root()).len(), 1);
        assert!(doc.query_selector(".bio").is_some());
    }

    #[test]
    fn test_invalid_pages() {
        assert_matches!(PageSpec::from_json("{ broken"), Err(FxError::Json(_)));
        assert_matches!(PageSpec::from_json("{}"), Err(FxError::Config(_)));
        assert_matches!(
            PageSpec::from_file("/definitely/not/here.json"),
            Err(FxError::Io(_))
        );
    }

    #[test]
    fn test_render_html_escapes_and_styles() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc
            .create_element(
                root,
                NodeSpec::new("div")
                    .class("floating-element")
                    .class("circle")
                    .style("width", "20px")
                    .style("left", "3%"),
            )
            .unwrap();
        doc.set_attr(div, "title", "a \"b\"");
        doc.apply(Mutation::AppendText {
            node: div,
            text: "<&>".into(),
        });

        assert_eq!(
            render_html(&doc),
            "<div class=\"floating-element circle\" style=\"width: 20px; left: 3%\" \
             title=\"a &quot;b&quot;\">&lt;&amp;&gt;</div>\n"
        );
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_structure() {
        let doc = PageSpec::bundled().unwrap().into_document();
        let hero = doc.query_selector(".hero").unwrap();
        let snapshot = PageSpec::from_document(&doc, hero);
        assert_eq!(snapshot.classes, vec!["hero"]);
        assert_eq!(snapshot.children.len(), 3);
        assert_eq!(snapshot.children[2].children[0].attrs["href"], "https://github.com/");
    }
}
