//! Component definitions.
//!
//! A [`ComponentDef`] is an immutable, cheaply cloned description of a
//! component: its name, declared props and emits, local registrations,
//! initial state, lifecycle hooks and render function. Two clones of one
//! definition share a [`ComponentId`], which is how stubs match components
//! by reference.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::app::InstanceHandle;
use super::vnode::{fragment, Slots, VNode};
use crate::naming::{camelize, names_match, pascal_case};

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a component definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Lifecycle stage a hook runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleHook {
    /// Before props and state are available to the render function
    BeforeCreate,
    /// Instance created, nothing rendered yet
    Created,
    /// About to render and insert the subtree
    BeforeMount,
    /// Subtree inserted (after every child's `Mounted`)
    Mounted,
    /// About to re-render
    BeforeUpdate,
    /// Re-render patched into the tree
    Updated,
    /// Removed from the tree (after every child's `Unmounted`)
    Unmounted,
}

/// Lifecycle callback
pub type Hook = Rc<dyn Fn(&InstanceHandle)>;

/// Render function
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

struct ComponentInner {
    id: ComponentId,
    name: Option<String>,
    functional: bool,
    props: Vec<String>,
    emits: Vec<String>,
    components: Vec<(String, ComponentDef)>,
    state: Value,
    hooks: Vec<(LifecycleHook, Hook)>,
    render: RenderFn,
}

/// A component definition
#[derive(Clone)]
pub struct ComponentDef(Rc<ComponentInner>);

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("functional", &self.0.functional)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ComponentDef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl ComponentDef {
    /// Identity shared by every clone
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.0.id
    }

    /// Declared name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// True for props-only components without state or hooks
    #[must_use]
    pub fn is_functional(&self) -> bool {
        self.0.functional
    }

    /// Declared prop names
    #[must_use]
    pub fn declared_props(&self) -> &[String] {
        &self.0.props
    }

    /// True when `name` is a declared prop in any casing
    #[must_use]
    pub fn declares_prop(&self, name: &str) -> bool {
        self.0.props.iter().any(|p| names_match(p, name))
    }

    /// Declared event names
    #[must_use]
    pub fn declared_emits(&self) -> &[String] {
        &self.0.emits
    }

    /// True when `event` is declared in any casing
    #[must_use]
    pub fn declares_emit(&self, event: &str) -> bool {
        self.0.emits.iter().any(|e| names_match(e, event))
    }

    /// Locally registered components
    #[must_use]
    pub fn components(&self) -> &[(String, ComponentDef)] {
        &self.0.components
    }

    /// Look up a local registration
    #[must_use]
    pub fn resolve_local(&self, name: &str) -> Option<(String, ComponentDef)> {
        lookup_registration(&self.0.components, name)
    }

    /// Initial state object
    #[must_use]
    pub fn initial_state(&self) -> Value {
        self.0.state.clone()
    }

    /// Hooks registered for a stage, in registration order
    #[must_use]
    pub fn hooks(&self, stage: LifecycleHook) -> Vec<Hook> {
        self.0
            .hooks
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, hook)| Rc::clone(hook))
            .collect()
    }

    /// Run the render function
    #[must_use]
    pub fn render(&self, ctx: &RenderContext) -> VNode {
        (self.0.render)(ctx)
    }
}

/// Find `name` in a registration list: exact key, then camelized, then
/// Pascal-cased. Returns the registration key with the definition.
#[must_use]
pub fn lookup_registration(
    registrations: &[(String, ComponentDef)],
    name: &str,
) -> Option<(String, ComponentDef)> {
    [name.to_string(), camelize(name), pascal_case(name)]
        .iter()
        .find_map(|candidate| registrations.iter().find(|(key, _)| key == candidate))
        .cloned()
}

/// Builder for [`ComponentDef`]
pub struct Component {
    name: Option<String>,
    props: Vec<String>,
    emits: Vec<String>,
    components: Vec<(String, ComponentDef)>,
    state: Map<String, Value>,
    hooks: Vec<(LifecycleHook, Hook)>,
    render: Option<RenderFn>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("emits", &self.emits)
            .finish_non_exhaustive()
    }
}

impl Component {
    fn with_name(name: Option<String>) -> Self {
        Self {
            name,
            props: Vec::new(),
            emits: Vec::new(),
            components: Vec::new(),
            state: Map::new(),
            hooks: Vec::new(),
            render: None,
        }
    }

    /// Start a named component
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::with_name(Some(name.to_string()))
    }

    /// Start a component without a declared name
    #[must_use]
    pub fn anonymous() -> Self {
        Self::with_name(None)
    }

    /// Functional component: render only, no state and no hooks
    #[must_use]
    pub fn functional(name: &str, render: impl Fn(&RenderContext) -> VNode + 'static) -> ComponentDef {
        ComponentDef(Rc::new(ComponentInner {
            id: ComponentId::next(),
            name: Some(name.to_string()),
            functional: true,
            props: Vec::new(),
            emits: Vec::new(),
            components: Vec::new(),
            state: Value::Object(Map::new()),
            hooks: Vec::new(),
            render: Rc::new(render),
        }))
    }

    /// Declare props
    #[must_use]
    pub fn props(mut self, names: &[&str]) -> Self {
        self.props.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Declare emitted events
    #[must_use]
    pub fn emits(mut self, events: &[&str]) -> Self {
        self.emits.extend(events.iter().map(|e| (*e).to_string()));
        self
    }

    /// Register a component for use with `resolve`
    #[must_use]
    pub fn component(mut self, key: &str, def: &ComponentDef) -> Self {
        self.components.push((key.to_string(), def.clone()));
        self
    }

    /// Initial state field
    #[must_use]
    pub fn state(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.state.insert(key.to_string(), value.into());
        self
    }

    /// Register a lifecycle hook
    #[must_use]
    pub fn on(mut self, stage: LifecycleHook, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.hooks.push((stage, Rc::new(hook)));
        self
    }

    /// `beforeCreate` hook
    #[must_use]
    pub fn before_create(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::BeforeCreate, hook)
    }

    /// `created` hook
    #[must_use]
    pub fn created(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::Created, hook)
    }

    /// `beforeMount` hook
    #[must_use]
    pub fn before_mount(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::BeforeMount, hook)
    }

    /// `mounted` hook
    #[must_use]
    pub fn mounted(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::Mounted, hook)
    }

    /// `beforeUpdate` hook
    #[must_use]
    pub fn before_update(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::BeforeUpdate, hook)
    }

    /// `updated` hook
    #[must_use]
    pub fn updated(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::Updated, hook)
    }

    /// `unmounted` hook
    #[must_use]
    pub fn unmounted(self, hook: impl Fn(&InstanceHandle) + 'static) -> Self {
        self.on(LifecycleHook::Unmounted, hook)
    }

    /// Render function
    #[must_use]
    pub fn render(mut self, render: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    /// Finish the definition. Without a render function it renders nothing.
    #[must_use]
    pub fn build(self) -> ComponentDef {
        ComponentDef(Rc::new(ComponentInner {
            id: ComponentId::next(),
            name: self.name,
            functional: false,
            props: self.props,
            emits: self.emits,
            components: self.components,
            state: Value::Object(self.state),
            hooks: self.hooks,
            render: self.render.unwrap_or_else(|| Rc::new(|_: &RenderContext| fragment(Vec::new()))),
        }))
    }
}

/// Inputs available to a render function
#[derive(Debug)]
pub struct RenderContext {
    pub(crate) props: Map<String, Value>,
    pub(crate) state: Value,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) slots: Slots,
    pub(crate) handle: InstanceHandle,
}

impl RenderContext {
    /// Prop value, looked up by exact then camelized name
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name).or_else(|| self.props.get(&camelize(name)))
    }

    /// Prop as a string, if it is one
    #[must_use]
    pub fn prop_str(&self, name: &str) -> Option<&str> {
        self.prop(name).and_then(Value::as_str)
    }

    /// Every prop
    #[must_use]
    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    /// State snapshot taken when the render started
    #[must_use]
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// One state field
    #[must_use]
    pub fn state_field(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Attributes that will fall through to the root element
    #[must_use]
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Slots passed by the parent
    #[must_use]
    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Render a slot without scope
    #[must_use]
    pub fn slot(&self, name: &str) -> Vec<VNode> {
        self.slots.render(name, &Value::Null)
    }

    /// Render the default slot
    #[must_use]
    pub fn default_slot(&self) -> Vec<VNode> {
        self.slot(Slots::DEFAULT)
    }

    /// Render a scoped slot
    #[must_use]
    pub fn scoped_slot(&self, name: &str, scope: &Value) -> Vec<VNode> {
        self.slots.render(name, scope)
    }

    /// True when the parent passed the slot
    #[must_use]
    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.has(name)
    }

    /// Handle to the rendering instance
    #[must_use]
    pub fn handle(&self) -> &InstanceHandle {
        &self.handle
    }
}
