//! A minimal document tree for the scanner to walk and rewrite.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Only what scanning needs is modeled: elements with a tag,
//! classes and attributes, and text nodes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Handle to a node of one [`Document`].
///
/// Ids are only meaningful for the document that issued them; passing a
/// foreign id to a document method panics like an out-of-range index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An element's tag, classes and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !self.has_class(&class) {
            self.classes.push(class);
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Nodes added under `target` by one structural mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

/// An arena-backed document with a `body` root element.
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
        let root = Node {
            kind: NodeKind::Element(Element::new("body")),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// A document with one `<p>` per non-empty line of `text`.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            doc.append_element_with_text(root, "p", line);
        }
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes ever created, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent.
    ///
    /// Appending a node under itself or its own descendant leaves the tree
    /// unchanged and returns a record with nothing added.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> MutationRecord {
        if self.contains(child, parent) {
            log::warn!("refusing to append {:?} inside its own subtree", child);
            return MutationRecord {
                target: parent,
                added: Vec::new(),
            };
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        MutationRecord {
            target: parent,
            added: vec![child],
        }
    }

    /// Create `<tag>text</tag>` under `parent` and return the element.
    pub fn append_element_with_text(
        &mut self,
        parent: NodeId,
        tag: impl Into<String>,
        text: impl Into<String>,
    ) -> NodeId {
        let element = self.create_element(tag);
        let text = self.create_text(text);
        self.append_child(element, text);
        self.append_child(parent, element);
        element
    }

    /// Put `new` where `old` is in its parent's children. `old` ends up detached.
    /// Returns `false` if `old` has no parent or sits inside `new`.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.nodes[old.0].parent else {
            return false;
        };
        if self.contains(new, old) {
            return false;
        }
        self.detach(new);
        let children = &mut self.nodes[parent.0].children;
        match children.iter().position(|&c| c == old) {
            Some(pos) => children[pos] = new,
            None => return false,
        }
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        true
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Whether `node` is `ancestor` or lies somewhere below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|n| n == ancestor)
    }

    /// `id` itself or its nearest ancestor element carrying `class`.
    pub fn closest_with_class(&self, id: NodeId, class: &str) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.element(n).is_some_and(|e| e.has_class(class)))
    }

    /// `id` and every node below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node.0].children.iter().rev());
        }
        out
    }

    /// Elements under `root` (inclusive) that carry `class`, in document order.
    pub fn elements_with_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&n| self.element(n).is_some_and(|e| e.has_class(class)))
            .collect()
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Serialize the subtree at `id` as HTML-like markup.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                if !element.classes.is_empty() {
                    let _ = write!(out, " class=\"{}\"", escape(&element.classes.join(" ")));
                }
                for (name, value) in &element.attributes {
                    let _ = write!(out, " {}=\"{}\"", name, escape(value));
                }
                out.push('>');
                for &child in &self.nodes[id.0].children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_text_content() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element_with_text(root, "P", "Total: ");
        let b = doc.append_element_with_text(p, "b", "$5");

        assert_eq!(doc.element(p).unwrap().tag(), "p");
        assert_eq!(doc.text_content(root), "Total: $5");
        assert_eq!(doc.ancestors(b).collect::<Vec<_>>(), vec![p, root]);
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.append_element_with_text(root, "p", "a");
        let second = doc.append_element_with_text(root, "p", "b");
        let replacement = doc.create_element("span");

        assert!(doc.replace_child(first, replacement));
        assert_eq!(doc.children(root), &[replacement, second]);
        assert_eq!(doc.parent(first), None);
        assert!(!doc.replace_child(first, second));
    }

    #[test]
    fn test_append_moves_node() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(root, a);
        doc.append_child(root, b);
        let record = doc.append_child(b, a);

        assert_eq!(record.target, b);
        assert_eq!(doc.children(root), &[b]);
        assert_eq!(doc.parent(a), Some(b));
    }

    #[test]
    fn test_append_into_own_subtree_is_refused() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.create_element("div");
        let inner = doc.create_element("p");
        doc.append_child(root, outer);
        doc.append_child(outer, inner);
        let markup = doc.to_markup(root);

        let record = doc.append_child(inner, outer);
        assert!(record.added.is_empty());
        assert!(doc.append_child(outer, outer).added.is_empty());
        assert!(!doc.replace_child(inner, outer));

        assert_eq!(doc.parent(outer), Some(root));
        assert_eq!(doc.parent(inner), Some(outer));
        assert_eq!(doc.ancestors(inner).collect::<Vec<_>>(), vec![outer, root]);
        assert_eq!(doc.to_markup(root), markup);
        assert!(doc.contains(root, inner));
        assert!(!doc.contains(inner, outer));
    }

    #[test]
    fn test_closest_with_class() {
        let mut doc = Document::new();
        let root = doc.root();
        let wrapper = doc.create_element("span");
        doc.element_mut(wrapper).unwrap().add_class("marked");
        doc.append_child(root, wrapper);
        let text = doc.create_text("x");
        doc.append_child(wrapper, text);

        assert_eq!(doc.closest_with_class(text, "marked"), Some(wrapper));
        assert_eq!(doc.closest_with_class(wrapper, "marked"), Some(wrapper));
        assert_eq!(doc.closest_with_class(root, "marked"), None);
    }

    #[test]
    fn test_from_text_and_markup() {
        let doc = Document::from_text("Fish & chips: £7\n\n<cheap>\n");
        assert_eq!(doc.children(doc.root()).len(), 2);
        assert_eq!(
            doc.to_markup(doc.root()),
            "<body><p>Fish &amp; chips: £7</p><p>&lt;cheap&gt;</p></body>"
        );
    }
}
