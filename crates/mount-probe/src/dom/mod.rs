//! Arena render tree.
//!
//! Nodes live in a single `Vec` owned by a [`Document`] and are addressed by
//! [`NodeId`]. Removing a node detaches it from its parent but keeps its slot,
//! so a wrapper that still holds the id reads the node's last state instead
//! of dangling. Slots are never reused: the arena grows with every node
//! created and is freed only when the document is dropped with its app.
//!
//! Elements carry live DOM properties (`value`, `checked`, `selected`) that
//! are separate from attributes. Serialization shows attributes only, the
//! same way `outerHTML` does on the platform.

mod selector;

pub use selector::SelectorList;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::result::MountResult;

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Listener attached to an element for a platform event
pub type DomListener = Rc<dyn Fn(&DomEvent)>;

/// A platform event delivered to element listeners.
///
/// `value` and `checked` are read from the target when the event is
/// dispatched, so listeners implementing two-way binding can read them
/// without touching the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Event type (`click`, `input`, `change`, ...)
    pub kind: String,
    /// Node the event was dispatched on
    pub target: NodeId,
    /// Target `value` property at dispatch time
    pub value: String,
    /// Target `checked` property at dispatch time
    pub checked: bool,
}

/// Element payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    value: String,
    checked: bool,
    selected: bool,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            value: String::new(),
            checked: false,
            selected: false,
        }
    }

    /// Lower-cased tag name
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value, if present
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attributes in insertion order
    #[must_use]
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Class tokens in attribute order, without duplicates
    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for token in self.attr("class").unwrap_or_default().split_whitespace() {
            if !out.iter().any(|c| c == token) {
                out.push(token.to_string());
            }
        }
        out
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Mount container; serializes as its children
    Container,
    /// Element node
    Element(ElementData),
    /// Text node
    Text(String),
}

struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    listeners: Vec<(String, DomListener)>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            kind,
            listeners: Vec::new(),
        }
    }
}

/// The rendered tree of one mounted application
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("html", &self.inner_html(self.root))
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only the mount container
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Container)],
            root: NodeId(0),
        }
    }

    /// The mount container
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Node payload
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    /// Element payload, `None` for text nodes and the container
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    /// Lower-cased tag name of an element
    #[must_use]
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag)
    }

    /// True for element nodes
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(Node::new(NodeKind::Element(ElementData::new(tag))));
        id
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(NodeKind::Text(text.to_string())));
        id
    }

    /// Insert `child` under `parent`, before `anchor` or at the end.
    ///
    /// A child that is already attached elsewhere is moved.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, anchor: Option<NodeId>) {
        self.remove(child);
        let Some(parent_node) = self.node_mut(parent) else {
            return;
        };
        let position = anchor
            .and_then(|a| parent_node.children.iter().position(|c| *c == a))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Slots allocated so far, detached nodes included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Detach a node from its parent. Its slot stays allocated.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Parent node, if attached
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Parent node if it is an element
    #[must_use]
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    /// Child nodes in order
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Element children in order
    #[must_use]
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Previous sibling that is an element
    #[must_use]
    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|c| *c == id)?;
        siblings[..position]
            .iter()
            .rev()
            .copied()
            .find(|c| self.is_element(*c))
    }

    /// Next sibling of any kind
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|c| *c == id)?;
        siblings.get(position + 1).copied()
    }

    /// True when the node is reachable from the mount container
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Elements below `id` in document order, excluding `id` itself
    #[must_use]
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(id) {
            self.collect_elements(*child, &mut out);
        }
        out
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if self.is_element(id) {
            out.push(id);
        }
        for child in self.children(id) {
            self.collect_elements(*child, out);
        }
    }

    // =========================================================================
    // Attributes and properties
    // =========================================================================

    /// Attribute value, if present
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|el| el.attr(name))
            .map(ToOwned::to_owned)
    }

    /// All attributes, keyed by name
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> BTreeMap<String, String> {
        self.element(id)
            .map(|el| el.attrs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Class tokens of an element
    #[must_use]
    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.element(id).map(ElementData::classes).unwrap_or_default()
    }

    /// Set an attribute; `value`, `checked` and `selected` also seed the
    /// matching property the way parsing markup would
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        match el.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => el.attrs.push((name.clone(), value.to_string())),
        }
        match name.as_str() {
            "value" => el.value = value.to_string(),
            "checked" => el.checked = true,
            "selected" => el.selected = true,
            _ => {}
        }
    }

    /// Remove an attribute
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(key, _)| key != name);
        }
    }

    /// Replace the attribute list, preserving properties
    pub fn sync_attributes(&mut self, id: NodeId, attrs: &[(String, String)]) {
        let stale: Vec<String> = self
            .element(id)
            .map(|el| {
                el.attrs
                    .iter()
                    .filter(|(key, _)| !attrs.iter().any(|(k, _)| k == key))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        for key in stale {
            self.remove_attribute(id, &key);
        }
        for (key, value) in attrs {
            if self.attribute(id, key).as_deref() != Some(value.as_str()) {
                self.set_attribute(id, key, value);
            }
        }
    }

    /// Replace the data of a text node
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(node) = self.node_mut(id) {
            if let NodeKind::Text(existing) = &mut node.kind {
                text.clone_into(existing);
            }
        }
    }

    /// `value` property. A `select` reports its selected option's value, an
    /// `option` without a value property falls back to its text.
    #[must_use]
    pub fn value(&self, id: NodeId) -> String {
        match self.tag_name(id) {
            Some("select") => {
                let options = self.options(id);
                options
                    .iter()
                    .copied()
                    .find(|o| self.is_selected(*o))
                    .or_else(|| options.first().copied())
                    .map(|o| self.value(o))
                    .unwrap_or_default()
            }
            Some("option") => match self.element(id) {
                Some(el) if el.attr("value").is_some() || !el.value.is_empty() => el.value.clone(),
                _ => self.text_content(id).trim().to_string(),
            },
            Some(_) => self.element(id).map(|el| el.value.clone()).unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Assign the `value` property. On a `select` this selects the first
    /// option whose value matches and deselects the rest.
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if self.tag_name(id) == Some("select") {
            let mut matched = false;
            for option in self.options(id) {
                let hit = !matched && self.value(option) == value;
                matched |= hit;
                if let Some(el) = self.element_mut(option) {
                    el.selected = hit;
                }
            }
            return;
        }
        if let Some(el) = self.element_mut(id) {
            el.value = value.to_string();
        }
    }

    /// `checked` property
    #[must_use]
    pub fn is_checked(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|el| el.checked)
    }

    /// Assign the `checked` property. Checking a radio unchecks the other
    /// radios sharing its `name` under the same container.
    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        let group = self
            .element(id)
            .filter(|el| el.attr("type") == Some("radio") && checked)
            .and_then(|el| el.attr("name").map(ToOwned::to_owned));
        if let Some(name) = group {
            for other in self.descendant_elements(self.root) {
                let same_group = self.element(other).is_some_and(|el| {
                    el.tag == "input"
                        && el.attr("type") == Some("radio")
                        && el.attr("name") == Some(name.as_str())
                });
                if same_group && other != id {
                    if let Some(el) = self.element_mut(other) {
                        el.checked = false;
                    }
                }
            }
        }
        if let Some(el) = self.element_mut(id) {
            el.checked = checked;
        }
    }

    /// `selected` property of an option. The first option of a single
    /// select with nothing selected counts as selected, matching [`Self::value`].
    #[must_use]
    pub fn is_selected(&self, id: NodeId) -> bool {
        if self.element(id).is_some_and(|el| el.selected) {
            return true;
        }
        let Some(select) = self.owning_select(id) else {
            return false;
        };
        if self.attribute(select, "multiple").is_some() {
            return false;
        }
        let options = self.options(select);
        options.first() == Some(&id)
            && !options.iter().any(|o| self.element(*o).is_some_and(|el| el.selected))
    }

    /// Assign the `selected` property. Selecting an option of a single
    /// select deselects its siblings.
    pub fn set_selected(&mut self, id: NodeId, selected: bool) {
        if selected {
            if let Some(select) = self.owning_select(id) {
                if self.attribute(select, "multiple").is_none() {
                    for option in self.options(select) {
                        if let Some(el) = self.element_mut(option) {
                            el.selected = false;
                        }
                    }
                }
            }
        }
        if let Some(el) = self.element_mut(id) {
            el.selected = selected;
        }
    }

    /// The `select` owning an option, looking past one `optgroup`
    #[must_use]
    pub fn owning_select(&self, option: NodeId) -> Option<NodeId> {
        let mut parent = self.parent_element(option)?;
        if self.tag_name(parent) == Some("optgroup") {
            parent = self.parent_element(parent)?;
        }
        (self.tag_name(parent) == Some("select")).then_some(parent)
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendant_elements(select)
            .into_iter()
            .filter(|o| self.tag_name(*o) == Some("option"))
            .collect()
    }

    // =========================================================================
    // Text and markup
    // =========================================================================

    /// Concatenated text of the node and its descendants
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => text.clone(),
            Some(_) => self
                .children(id)
                .iter()
                .map(|c| self.text_content(*c))
                .collect(),
            None => String::new(),
        }
    }

    /// Serialized markup of the node itself
    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, &mut out);
        out
    }

    /// Serialized markup of the node's children
    #[must_use]
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize(*child, &mut out);
        }
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => escape_text(text, out),
            Some(NodeKind::Container) => {
                for child in self.children(id) {
                    self.serialize(*child, out);
                }
            }
            Some(NodeKind::Element(el)) => {
                out.push('<');
                out.push_str(&el.tag);
                for (key, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(&el.tag) {
                    return;
                }
                for child in self.children(id) {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
            None => {}
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// First element below `scope` matching `selector`
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> MountResult<Option<NodeId>> {
        Ok(self.query_selector_all(scope, selector)?.into_iter().next())
    }

    /// Every element below `scope` matching `selector`, in document order
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> MountResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendant_elements(scope)
            .into_iter()
            .filter(|id| list.matches(self, *id))
            .collect())
    }

    /// True when the element matches `selector`
    pub fn matches(&self, id: NodeId, selector: &str) -> MountResult<bool> {
        let list = SelectorList::parse(selector)?;
        Ok(self.is_element(id) && list.matches(self, id))
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a listener on a node
    pub fn add_listener(&mut self, id: NodeId, kind: &str, listener: DomListener) {
        if let Some(node) = self.node_mut(id) {
            node.listeners.push((kind.to_string(), listener));
        }
    }

    /// Drop every listener on a node
    pub fn clear_listeners(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.listeners.clear();
        }
    }

    /// Listeners registered on a node for an event type
    #[must_use]
    pub fn listeners(&self, id: NodeId, kind: &str) -> Vec<DomListener> {
        self.node(id)
            .map(|n| {
                n.listeners
                    .iter()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, l)| Rc::clone(l))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of listeners registered on a node for an event type
    #[must_use]
    pub fn listener_count(&self, id: NodeId, kind: &str) -> usize {
        self.node(id)
            .map_or(0, |n| n.listeners.iter().filter(|(k, _)| k == kind).count())
    }
}

/// Dispatch a non-bubbling event on `target`.
///
/// Listeners are collected before any of them runs, so a listener may freely
/// mutate the tree. Returns how many listeners were invoked.
pub fn dispatch_event(tree: &RefCell<Document>, target: NodeId, kind: &str) -> usize {
    let (listeners, event) = {
        let doc = tree.borrow();
        let event = DomEvent {
            kind: kind.to_string(),
            target,
            value: doc.value(target),
            checked: doc.is_checked(target),
        };
        (doc.listeners(target, kind), event)
    };
    for listener in &listeners {
        listener(&event);
    }
    listeners.len()
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}
