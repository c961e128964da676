//! In-memory document tree the effects read from and write to.
//!
//! Components never touch the tree directly: they describe what to render
//! as [`Mutation`]s and the engine applies them with [`Document::apply`].

use std::fmt;

use itertools::Itertools;

use crate::error::{FxError, Result};

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: String,
    pub classes: Vec<String>,
    pub styles: Vec<(String, String)>,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl Node {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            styles: Vec::new(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn style(&self, name: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    fn set_style(&mut self, name: &str, value: &str) {
        match self.styles.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.styles.push((name.to_string(), value.to_string())),
        }
    }
}

/// Detached description of a node to be created
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSpec {
    pub tag: String,
    pub classes: Vec<String>,
    pub styles: Vec<(String, String)>,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.push((name.into(), value.into()));
        self
    }

    pub fn style_value(&self, name: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A single change to the document
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AppendChild { parent: NodeId, node: NodeSpec },
    SetText { node: NodeId, text: String },
    AppendText { node: NodeId, text: String },
    AddClass { node: NodeId, class: String },
    RemoveClass { node: NodeId, class: String },
}

#[derive(Debug, Clone, PartialEq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        self.tag.as_ref().map_or(true, |t| t == &node.tag)
            && self.classes.iter().all(|c| node.has_class(c))
    }
}

/// Parsed selector: compound selectors joined by the descendant combinator
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    /// Supports `tag`, `.class`, `tag.class.other` and whitespace descendants.
    pub fn parse(input: &str) -> Result<Self> {
        let parts = input
            .split_whitespace()
            .map(|part| Self::parse_compound(input, part))
            .collect::<Result<Vec<_>>>()?;
        if parts.is_empty() {
            return Err(FxError::Selector(input.to_string()));
        }
        Ok(Self { parts })
    }

    fn parse_compound(input: &str, part: &str) -> Result<Compound> {
        let valid = |s: &str| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };

        let mut pieces = part.split('.');
        let tag = match pieces.next() {
            Some("") => None,
            Some(t) if valid(t) => Some(t.to_ascii_lowercase()),
            _ => return Err(FxError::Selector(input.to_string())),
        };
        let classes = pieces
            .map(|c| {
                if valid(c) {
                    Ok(c.to_string())
                } else {
                    Err(FxError::Selector(input.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Compound { tag, classes })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .parts
            .iter()
            .map(|p| {
                let classes = p.classes.iter().map(|c| format!(".{c}")).join("");
                format!("{}{}", p.tag.as_deref().unwrap_or(""), classes)
            })
            .join(" ");
        f.write_str(&text)
    }
}

/// Arena-backed document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("body")],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// True when the node is still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        false
    }

    pub fn create_element(&mut self, parent: NodeId, spec: NodeSpec) -> Option<NodeId> {
        self.node(parent)?;

        let mut node = Node::new(spec.tag);
        for class in &spec.classes {
            node.add_class(class);
        }
        for (name, value) in &spec.styles {
            node.set_style(name, value);
        }
        node.parent = Some(parent);

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.node_mut(parent)?.children.push(id);
        Some(id)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            match node.attrs.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => node.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Detaches every child of `id`
    pub fn clear_children(&mut self, id: NodeId) {
        let children = match self.node_mut(id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
            }
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Own text followed by descendants' text, in document order
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(node) = self.node(id) {
            out.push_str(&node.text);
            for child in &node.children {
                self.collect_text(*child, out);
            }
        }
    }

    /// Applies a mutation, returning the created node for `AppendChild`.
    /// Mutations aimed at unknown nodes are dropped.
    pub fn apply(&mut self, mutation: Mutation) -> Option<NodeId> {
        match mutation {
            Mutation::AppendChild { parent, node } => self.create_element(parent, node),
            Mutation::SetText { node, text } => {
                self.clear_children(node);
                if let Some(n) = self.node_mut(node) {
                    n.text = text;
                }
                None
            }
            Mutation::AppendText { node, text } => {
                if let Some(n) = self.node_mut(node) {
                    n.text.push_str(&text);
                }
                None
            }
            Mutation::AddClass { node, class } => {
                if let Some(n) = self.node_mut(node) {
                    n.add_class(&class);
                }
                None
            }
            Mutation::RemoveClass { node, class } => {
                if let Some(n) = self.node_mut(node) {
                    n.remove_class(&class);
                }
                None
            }
        }
    }

    pub fn apply_all(&mut self, mutations: impl IntoIterator<Item = Mutation>) -> Vec<NodeId> {
        mutations
            .into_iter()
            .filter_map(|m| self.apply(m))
            .collect()
    }

    /// All attached nodes in document (pre-order) order, root excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        let Some((last, ancestors)) = selector.parts.split_last() else {
            return false;
        };
        let Some(node) = self.node(id) else {
            return false;
        };
        if !last.matches(node) {
            return false;
        }

        // Right to left; greedy ancestor matching is exact for descendant-only chains.
        let mut cursor = node.parent;
        for compound in ancestors.iter().rev() {
            loop {
                let Some(current) = cursor.and_then(|c| self.node(c).map(|n| (c, n))) else {
                    return false;
                };
                cursor = current.1.parent;
                if current.0 != self.root && compound.matches(current.1) {
                    break;
                }
            }
        }
        true
    }

    pub fn select_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.matches(*id, selector))
            .collect()
    }

    pub fn select(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    /// First match, or `None` when nothing matches or the selector is unsupported
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        match Selector::parse(selector) {
            Ok(sel) => self.select(&sel),
            Err(err) => {
                tracing::warn!(%err, "ignoring selector");
                None
            }
        }
    }

    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(sel) => self.select_all(&sel),
            Err(err) => {
                tracing::warn!(%err, "ignoring selector");
                Vec::new()
            }
        }
    }
}
