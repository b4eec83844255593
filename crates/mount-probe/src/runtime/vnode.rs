//! Virtual nodes produced by render functions.
//!
//! ```text
//! h("ul").class("list").child(component(&item).prop("label", "a"))
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::component::ComponentDef;
use crate::dom::{DomEvent, DomListener};

/// An emitted event argument.
///
/// Arguments are shared, not copied, so a recorder sees the very value the
/// component passed ([`EventArg::ptr_eq`]).
#[derive(Clone)]
pub struct EventArg(Rc<dyn Any>);

impl EventArg {
    /// Wrap a value
    #[must_use]
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Wrap an already shared value without copying it
    #[must_use]
    pub fn shared(value: Rc<dyn Any>) -> Self {
        Self(value)
    }

    /// Borrow the value as `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// True when the value is a `T`
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// True when both arguments are the same allocation
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0).cast::<()>(),
            Rc::as_ptr(&other.0).cast::<()>(),
        )
    }

    /// True when the value is a `T` equal to `expected`
    #[must_use]
    pub fn eq_value<T: Any + PartialEq>(&self, expected: &T) -> bool {
        self.downcast_ref::<T>().is_some_and(|v| v == expected)
    }
}

impl fmt::Debug for EventArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! try_debug {
            ($($ty:ty),*) => {
                $(if let Some(v) = self.downcast_ref::<$ty>() {
                    return write!(f, "{v:?}");
                })*
            };
        }
        try_debug!(i32, i64, u32, u64, usize, f64, bool, String, &'static str, Value, ());
        write!(f, "EventArg(..)")
    }
}

macro_rules! event_arg_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for EventArg {
            fn from(value: $ty) -> Self {
                Self::new(value)
            }
        })*
    };
}

event_arg_from!(i32, i64, u32, u64, usize, f64, bool, String, &'static str, Value);

/// Build an argument list from heterogeneous values
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::EventArg>::new() };
    ($($arg:expr),+ $(,)?) => { ::std::vec![$($crate::EventArg::from($arg)),+] };
}

/// Listener on a component's emitted event
pub type EmitListener = Rc<dyn Fn(&[EventArg])>;

/// Slot content; receives the slot scope
pub type SlotFn = Rc<dyn Fn(&Value) -> Vec<VNode>>;

/// Named slots passed to a component
#[derive(Clone, Default)]
pub struct Slots {
    entries: Vec<(String, SlotFn)>,
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Slots {
    /// Name of the default slot
    pub const DEFAULT: &'static str = "default";

    /// No slots
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a scoped slot
    pub fn insert(&mut self, name: &str, slot: SlotFn) {
        self.entries.retain(|(n, _)| n != name);
        self.entries.push((name.to_string(), slot));
    }

    /// Add static slot content
    #[must_use]
    pub fn with_static(mut self, name: &str, content: Vec<VNode>) -> Self {
        self.insert(name, Rc::new(move |_: &Value| content.clone()));
        self
    }

    /// Look up a slot
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SlotFn> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot)
    }

    /// True when the slot was passed
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Slot names in insertion order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Render a slot with the given scope; empty if it was not passed
    #[must_use]
    pub fn render(&self, name: &str, scope: &Value) -> Vec<VNode> {
        self.get(name).map(|slot| slot(scope)).unwrap_or_default()
    }

    /// Keep only the default slot
    #[must_use]
    pub fn default_only(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(n, _)| n == Self::DEFAULT)
                .cloned()
                .collect(),
        }
    }

    /// True when no slots were passed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A virtual node
#[derive(Clone, Debug)]
pub enum VNode {
    /// Platform element
    Element(ElementNode),
    /// Text
    Text(String),
    /// Component to mount
    Component(ComponentNode),
    /// Several roots rendered in place
    Fragment(Vec<VNode>),
}

impl From<ElementNode> for VNode {
    fn from(node: ElementNode) -> Self {
        Self::Element(node)
    }
}

impl From<ComponentNode> for VNode {
    fn from(node: ComponentNode) -> Self {
        Self::Component(node)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// DOM properties set on an element, distinct from its attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementProps {
    /// `value`
    pub value: Option<String>,
    /// `checked`
    pub checked: Option<bool>,
    /// `selected`
    pub selected: Option<bool>,
}

/// Element vnode
#[derive(Clone)]
pub struct ElementNode {
    /// Tag name
    pub tag: String,
    /// Attributes in order
    pub attrs: Vec<(String, String)>,
    /// DOM properties
    pub props: ElementProps,
    /// Platform event listeners
    pub listeners: Vec<(String, DomListener)>,
    /// Children
    pub children: Vec<VNode>,
}

impl fmt::Debug for ElementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementNode")
            .field("tag", &self.tag)
            .field("attrs", &self.attrs)
            .field("props", &self.props)
            .field("listeners", &self.listeners.len())
            .field("children", &self.children)
            .finish()
    }
}

/// Start an element vnode
#[must_use]
pub fn h(tag: &str) -> ElementNode {
    ElementNode {
        tag: tag.to_string(),
        attrs: Vec::new(),
        props: ElementProps::default(),
        listeners: Vec::new(),
        children: Vec::new(),
    }
}

/// Text vnode
#[must_use]
pub fn text(content: impl Into<String>) -> VNode {
    VNode::Text(content.into())
}

/// Fragment vnode
#[must_use]
pub fn fragment(children: Vec<VNode>) -> VNode {
    VNode::Fragment(children)
}

impl ElementNode {
    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        set_attr(&mut self.attrs, name, value.into());
        self
    }

    /// Append a class
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        merge_class(&mut self.attrs, class);
        self
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Bind the `value` property
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.props.value = Some(value.into());
        self
    }

    /// Bind the `checked` property
    #[must_use]
    pub fn checked(mut self, checked: bool) -> Self {
        self.props.checked = Some(checked);
        self
    }

    /// Bind the `selected` property
    #[must_use]
    pub fn selected(mut self, selected: bool) -> Self {
        self.props.selected = Some(selected);
        self
    }

    /// Listen for a platform event
    #[must_use]
    pub fn on(mut self, event: &str, listener: impl Fn(&DomEvent) + 'static) -> Self {
        self.listeners.push((event.to_string(), Rc::new(listener)));
        self
    }

    /// Append a child
    #[must_use]
    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Append a text child
    #[must_use]
    pub fn text(self, content: impl Into<String>) -> Self {
        self.child(VNode::Text(content.into()))
    }
}

/// What a component vnode mounts
#[derive(Clone, Debug)]
pub enum ComponentTarget {
    /// A definition referenced directly
    Definition(ComponentDef),
    /// A name resolved through registrations at mount time
    Named(String),
}

/// Component vnode
#[derive(Clone)]
pub struct ComponentNode {
    /// Component to mount
    pub target: ComponentTarget,
    /// Static attributes as written at the call site
    pub attrs: Vec<(String, String)>,
    /// Bound props
    pub props: Map<String, Value>,
    /// Listeners on emitted events
    pub listeners: Vec<(String, EmitListener)>,
    /// Slot content
    pub slots: Slots,
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("target", &self.target)
            .field("attrs", &self.attrs)
            .field("props", &self.props)
            .field("listeners", &self.listeners.len())
            .field("slots", &self.slots)
            .finish()
    }
}

fn component_node(target: ComponentTarget) -> ComponentNode {
    ComponentNode {
        target,
        attrs: Vec::new(),
        props: Map::new(),
        listeners: Vec::new(),
        slots: Slots::new(),
    }
}

/// Component vnode referencing a definition
#[must_use]
pub fn component(def: &ComponentDef) -> ComponentNode {
    component_node(ComponentTarget::Definition(def.clone()))
}

/// Component vnode resolved by registered name
#[must_use]
pub fn resolve(name: &str) -> ComponentNode {
    component_node(ComponentTarget::Named(name.to_string()))
}

impl ComponentNode {
    /// Static attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        set_attr(&mut self.attrs, name, value.into());
        self
    }

    /// Static class
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        merge_class(&mut self.attrs, class);
        self
    }

    /// Bound prop
    #[must_use]
    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    /// Listen for an emitted event
    #[must_use]
    pub fn on(mut self, event: &str, listener: impl Fn(&[EventArg]) + 'static) -> Self {
        self.listeners.push((event.to_string(), Rc::new(listener)));
        self
    }

    /// Scoped slot
    #[must_use]
    pub fn slot(mut self, name: &str, slot: impl Fn(&Value) -> Vec<VNode> + 'static) -> Self {
        self.slots.insert(name, Rc::new(slot));
        self
    }

    /// Static default slot content
    #[must_use]
    pub fn default_slot(mut self, content: Vec<VNode>) -> Self {
        self.slots = self.slots.with_static(Slots::DEFAULT, content);
        self
    }

    /// Static named slot content
    #[must_use]
    pub fn named_slot(mut self, name: &str, content: Vec<VNode>) -> Self {
        self.slots = self.slots.with_static(name, content);
        self
    }
}

pub(crate) fn set_attr(attrs: &mut Vec<(String, String)>, name: &str, value: String) {
    match attrs.iter_mut().find(|(k, _)| k == name) {
        Some((_, existing)) => *existing = value,
        None => attrs.push((name.to_string(), value)),
    }
}

pub(crate) fn merge_class(attrs: &mut Vec<(String, String)>, class: &str) {
    match attrs.iter_mut().find(|(k, _)| k == "class") {
        Some((_, existing)) if !existing.is_empty() => {
            existing.push(' ');
            existing.push_str(class);
        }
        Some((_, existing)) => class.clone_into(existing),
        None => attrs.push(("class".to_string(), class.to_string())),
    }
}
