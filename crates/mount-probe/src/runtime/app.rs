//! Mounted application: instances, rendering, patching and the update queue.
//!
//! Rules the runtime keeps:
//! - no `RefCell` borrow is held while a hook, render function, slot or
//!   listener runs, so user code may call back into the app freely;
//! - instance ids grow monotonically, so a parent always sorts before its
//!   children and the update queue flushes parent-first;
//! - patching is positional: a node keeps its identity as long as the vnode
//!   at its position has the same shape.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::component::{lookup_registration, ComponentDef, ComponentId, LifecycleHook, RenderContext};
use super::console::{self, ConsoleMessage, WarningKind};
use super::devtools::{self, DevtoolsEvent};
use super::vnode::{
    merge_class, set_attr, ComponentNode, ComponentTarget, ElementNode, EmitListener, EventArg,
    Slots, VNode,
};
use crate::dom::{self, Document, NodeId};
use crate::naming::{names_match, pascal_case};

/// Updates that keep re-queueing beyond this many rounds are dropped
/// Re-renders one instance may receive within a single flush
const MAX_RECURSIVE_UPDATES: usize = 100;

static NEXT_APP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a mounted application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppId(u64);

impl AppId {
    pub(crate) fn next() -> Self {
        Self(NEXT_APP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a component instance within its app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// A component about to be mounted, as seen by a [`ComponentInterceptor`]
#[derive(Debug, Clone, Copy)]
pub struct ComponentCandidate<'a> {
    /// The resolved definition
    pub def: &'a ComponentDef,
    /// Registration key it was resolved through, if any
    pub registered_as: Option<&'a str>,
}

/// Decides per component whether something else renders in its place
pub trait ComponentInterceptor {
    /// Return a replacement definition, or `None` to render `candidate`
    fn intercept(&self, candidate: &ComponentCandidate<'_>) -> Option<ComponentDef>;
}

/// Everything [`App::mount`] needs besides the root definition
#[derive(Clone, Default)]
pub struct MountPlan {
    /// Root props
    pub props: Map<String, Value>,
    /// Root static attributes
    pub attrs: Vec<(String, String)>,
    /// Root slots
    pub slots: Slots,
    /// App-wide registrations consulted after local ones
    pub components: Vec<(String, ComponentDef)>,
    /// Component interceptor
    pub interceptor: Option<Rc<dyn ComponentInterceptor>>,
}

impl fmt::Debug for MountPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountPlan")
            .field("props", &self.props)
            .field("attrs", &self.attrs)
            .field("slots", &self.slots)
            .field("components", &self.components.len())
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

impl MountPlan {
    /// Empty plan
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set root props
    #[must_use]
    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }

    /// Set root attributes
    #[must_use]
    pub fn with_attrs(mut self, attrs: Vec<(String, String)>) -> Self {
        self.attrs = attrs;
        self
    }

    /// Set root slots
    #[must_use]
    pub fn with_slots(mut self, slots: Slots) -> Self {
        self.slots = slots;
        self
    }

    /// Add an app-wide registration
    #[must_use]
    pub fn with_component(mut self, key: &str, def: &ComponentDef) -> Self {
        self.components.push((key.to_string(), def.clone()));
        self
    }

    /// Set the interceptor
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Rc<dyn ComponentInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }
}

/// What an instance rendered, mirroring its vnode tree
#[derive(Debug)]
enum Mounted {
    Element {
        node: NodeId,
        tag: String,
        children: Vec<Mounted>,
    },
    Text {
        node: NodeId,
    },
    Component {
        instance: InstanceId,
        source: ComponentId,
    },
    /// Children sit between two empty text anchors
    Fragment {
        start: NodeId,
        end: NodeId,
        children: Vec<Mounted>,
    },
}

pub(crate) struct Instance {
    def: ComponentDef,
    source: ComponentDef,
    registered_as: Option<String>,
    parent: Option<InstanceId>,
    props: RefCell<Map<String, Value>>,
    attrs: RefCell<Vec<(String, String)>>,
    slots: RefCell<Slots>,
    listeners: RefCell<Vec<(String, EmitListener)>>,
    state: RefCell<Value>,
    subtree: RefCell<Option<Mounted>>,
    mounted: Cell<bool>,
}

impl Instance {
    fn name(&self) -> Option<String> {
        self.def
            .name()
            .map(ToOwned::to_owned)
            .or_else(|| self.registered_as.clone())
    }
}

struct AppInner {
    id: AppId,
    document: Rc<RefCell<Document>>,
    instances: RefCell<BTreeMap<InstanceId, Rc<Instance>>>,
    queue: RefCell<BTreeSet<InstanceId>>,
    interceptor: RefCell<Option<Rc<dyn ComponentInterceptor>>>,
    components: RefCell<Vec<(String, ComponentDef)>>,
    root: Cell<Option<InstanceId>>,
    next_instance: Cell<u64>,
    flushing: Cell<bool>,
}

/// A mounted application
#[derive(Clone)]
pub struct App {
    inner: Rc<AppInner>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("id", &self.inner.id)
            .field("instances", &self.inner.instances.borrow().len())
            .field("root", &self.inner.root.get())
            .finish()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an empty application with its own document
    #[must_use]
    pub fn new() -> Self {
        let app = Self {
            inner: Rc::new(AppInner {
                id: AppId::next(),
                document: Rc::new(RefCell::new(Document::new())),
                instances: RefCell::new(BTreeMap::new()),
                queue: RefCell::new(BTreeSet::new()),
                interceptor: RefCell::new(None),
                components: RefCell::new(Vec::new()),
                root: Cell::new(None),
                next_instance: Cell::new(1),
                flushing: Cell::new(false),
            }),
        };
        devtools::notify(&DevtoolsEvent::AppInit { app: app.id() });
        app
    }

    fn from_weak(weak: &Weak<AppInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// App identity
    #[must_use]
    pub fn id(&self) -> AppId {
        self.inner.id
    }

    /// The render tree
    #[must_use]
    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.inner.document)
    }

    /// The mount container node
    #[must_use]
    pub fn container(&self) -> NodeId {
        self.inner.document.borrow().root()
    }

    /// Root instance, once mounted
    #[must_use]
    pub fn root_instance(&self) -> Option<InstanceId> {
        self.inner.root.get()
    }

    /// Mount `root` into the container and flush
    pub fn mount(&self, root: &ComponentDef, plan: MountPlan) -> InstanceId {
        *self.inner.interceptor.borrow_mut() = plan.interceptor;
        *self.inner.components.borrow_mut() = plan.components;
        let node = ComponentNode {
            target: ComponentTarget::Definition(root.clone()),
            attrs: plan.attrs,
            props: plan.props,
            listeners: Vec::new(),
            slots: plan.slots,
        };
        let container = self.container();
        tracing::debug!(app = ?self.id(), component = ?root.name(), "mounting root");
        let id = self.create_instance(root.clone(), None, node, container, None, None);
        self.inner.root.set(Some(id));
        self.flush();
        id
    }

    /// Unmount the root and everything below it
    pub fn unmount(&self) {
        if let Some(root) = self.inner.root.take() {
            tracing::debug!(app = ?self.id(), "unmounting root");
            self.unmount_instance(root);
        }
        self.inner.queue.borrow_mut().clear();
    }

    // =========================================================================
    // Instance access
    // =========================================================================

    fn instance(&self, id: InstanceId) -> Option<Rc<Instance>> {
        self.inner.instances.borrow().get(&id).cloned()
    }

    /// Handle for an instance
    #[must_use]
    pub fn handle(&self, id: InstanceId) -> InstanceHandle {
        InstanceHandle {
            app: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// True while the instance is in the tree
    #[must_use]
    pub fn is_mounted(&self, id: InstanceId) -> bool {
        self.instance(id).is_some_and(|i| i.mounted.get())
    }

    /// Declared name, else registration key
    #[must_use]
    pub fn instance_name(&self, id: InstanceId) -> Option<String> {
        self.instance(id).and_then(|i| i.name())
    }

    /// Definition the instance was created from, before interception
    #[must_use]
    pub fn instance_source(&self, id: InstanceId) -> Option<ComponentDef> {
        self.instance(id).map(|i| i.source.clone())
    }

    /// Definition actually rendering
    #[must_use]
    pub fn instance_def(&self, id: InstanceId) -> Option<ComponentDef> {
        self.instance(id).map(|i| i.def.clone())
    }

    /// Registration key the instance was resolved through
    #[must_use]
    pub fn instance_registered_as(&self, id: InstanceId) -> Option<String> {
        self.instance(id).and_then(|i| i.registered_as.clone())
    }

    /// Current props
    #[must_use]
    pub fn instance_props(&self, id: InstanceId) -> Map<String, Value> {
        self.instance(id)
            .map(|i| i.props.borrow().clone())
            .unwrap_or_default()
    }

    /// Current state
    #[must_use]
    pub fn instance_state(&self, id: InstanceId) -> Value {
        self.instance(id)
            .map(|i| i.state.borrow().clone())
            .unwrap_or(Value::Null)
    }

    /// Parent instance
    #[must_use]
    pub fn instance_parent(&self, id: InstanceId) -> Option<InstanceId> {
        self.instance(id).and_then(|i| i.parent)
    }

    /// Top-level DOM nodes of an instance, anchors excluded
    #[must_use]
    pub fn instance_nodes(&self, id: InstanceId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(instance) = self.instance(id) {
            if let Some(subtree) = instance.subtree.borrow().as_ref() {
                self.collect_nodes(subtree, &mut out);
            }
        }
        out
    }

    fn collect_nodes(&self, mounted: &Mounted, out: &mut Vec<NodeId>) {
        match mounted {
            Mounted::Element { node, .. } | Mounted::Text { node } => out.push(*node),
            Mounted::Fragment { children, .. } => {
                for child in children {
                    self.collect_nodes(child, out);
                }
            }
            Mounted::Component { instance, .. } => out.extend(self.instance_nodes(*instance)),
        }
    }

    /// Component instances rendered below `id`, depth-first in render order
    #[must_use]
    pub fn descendants(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants(&self, id: InstanceId, out: &mut Vec<InstanceId>) {
        for child in self.children_of(id) {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    /// Component instances rendered directly by `id`
    #[must_use]
    pub fn children_of(&self, id: InstanceId) -> Vec<InstanceId> {
        fn walk(mounted: &Mounted, out: &mut Vec<InstanceId>) {
            match mounted {
                Mounted::Component { instance, .. } => out.push(*instance),
                Mounted::Element { children, .. } | Mounted::Fragment { children, .. } => {
                    for child in children {
                        walk(child, out);
                    }
                }
                Mounted::Text { .. } => {}
            }
        }
        let mut out = Vec::new();
        if let Some(instance) = self.instance(id) {
            if let Some(subtree) = instance.subtree.borrow().as_ref() {
                walk(subtree, &mut out);
            }
        }
        out
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Queue an instance for re-render
    pub fn queue_update(&self, id: InstanceId) {
        if self.is_mounted(id) {
            self.inner.queue.borrow_mut().insert(id);
        }
    }

    /// Number of queued instances
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Re-render queued instances, parents first, until the queue is empty.
    ///
    /// An instance re-queued more than `MAX_RECURSIVE_UPDATES` times within
    /// one flush is treated as an update loop; the queue is dropped.
    pub fn flush(&self) {
        if self.inner.flushing.replace(true) {
            return;
        }
        let mut updates: BTreeMap<InstanceId, usize> = BTreeMap::new();
        loop {
            let next = self.inner.queue.borrow_mut().pop_first();
            let Some(id) = next else {
                break;
            };
            let count = updates.entry(id).or_insert(0);
            *count += 1;
            if *count > MAX_RECURSIVE_UPDATES {
                console::warn(
                    WarningKind::RecursiveUpdate,
                    format!(
                        "Maximum recursive updates exceeded in {id} ({MAX_RECURSIVE_UPDATES}); dropping queued updates"
                    ),
                );
                self.inner.queue.borrow_mut().clear();
                break;
            }
            self.update_instance(id);
        }
        tracing::trace!(app = ?self.id(), instances = updates.len(), "flushed");
        self.inner.flushing.set(false);
    }

    /// Merge props into an instance and queue it
    pub fn set_props(&self, id: InstanceId, props: Map<String, Value>) {
        if let Some(instance) = self.instance(id) {
            instance.props.borrow_mut().extend(props);
            self.queue_update(id);
        }
    }

    /// Dispatch a platform event on a node
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        let count = dom::dispatch_event(&self.inner.document, node, event);
        tracing::trace!(app = ?self.id(), event, listeners = count, "dispatched");
        count
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn emit(&self, id: InstanceId, event: &str, args: Vec<EventArg>) {
        let Some(instance) = self.instance(id) else {
            return;
        };
        devtools::notify(&DevtoolsEvent::ComponentEmit {
            app: self.id(),
            instance: id,
            event: event.to_string(),
            args: args.clone(),
        });
        let listeners: Vec<EmitListener> = instance
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| names_match(name, event))
            .map(|(_, l)| Rc::clone(l))
            .collect();
        if listeners.is_empty() && !instance.def.declares_emit(event) {
            console::write(
                &ConsoleMessage::warn(
                    WarningKind::UnhandledEmit,
                    format!(
                        "Component emitted event \"{event}\" but it is neither declared in the emits option nor as an \"on{}\" prop.",
                        pascal_case(event)
                    ),
                )
                .with_app(self.id()),
            );
        }
        for listener in listeners {
            listener(&args);
        }
    }

    // =========================================================================
    // Mounting
    // =========================================================================

    fn next_instance_id(&self) -> InstanceId {
        let id = self.inner.next_instance.get();
        self.inner.next_instance.set(id + 1);
        InstanceId(id)
    }

    fn resolve_target(
        &self,
        target: &ComponentTarget,
        owner: Option<InstanceId>,
    ) -> Option<(ComponentDef, Option<String>)> {
        match target {
            ComponentTarget::Definition(def) => Some((def.clone(), None)),
            ComponentTarget::Named(name) => {
                let mut cursor = owner;
                while let Some(id) = cursor {
                    let instance = self.instance(id)?;
                    if let Some((key, def)) = instance.def.resolve_local(name) {
                        return Some((def, Some(key)));
                    }
                    cursor = instance.parent;
                }
                lookup_registration(&self.inner.components.borrow(), name)
                    .map(|(key, def)| (def, Some(key)))
            }
        }
    }

    fn intercept(&self, def: &ComponentDef, registered_as: Option<&str>) -> Option<ComponentDef> {
        let interceptor = self.inner.interceptor.borrow().clone()?;
        interceptor.intercept(&ComponentCandidate { def, registered_as })
    }

    fn mount_vnode(
        &self,
        vnode: VNode,
        parent: NodeId,
        anchor: Option<NodeId>,
        owner: Option<InstanceId>,
    ) -> Mounted {
        match vnode {
            VNode::Text(content) => {
                let mut doc = self.inner.document.borrow_mut();
                let node = doc.create_text(&content);
                doc.insert_before(parent, node, anchor);
                Mounted::Text { node }
            }
            VNode::Element(element) => self.mount_element(element, parent, anchor, owner),
            VNode::Fragment(children) => {
                let (start, end) = {
                    let mut doc = self.inner.document.borrow_mut();
                    let start = doc.create_text("");
                    let end = doc.create_text("");
                    doc.insert_before(parent, start, anchor);
                    doc.insert_before(parent, end, anchor);
                    (start, end)
                };
                let children = children
                    .into_iter()
                    .map(|child| self.mount_vnode(child, parent, Some(end), owner))
                    .collect();
                Mounted::Fragment {
                    start,
                    end,
                    children,
                }
            }
            VNode::Component(node) => self.mount_component(node, parent, anchor, owner),
        }
    }

    fn mount_element(
        &self,
        element: ElementNode,
        parent: NodeId,
        anchor: Option<NodeId>,
        owner: Option<InstanceId>,
    ) -> Mounted {
        let node = {
            let mut doc = self.inner.document.borrow_mut();
            let node = doc.create_element(&element.tag);
            for (key, value) in &element.attrs {
                doc.set_attribute(node, key, value);
            }
            for (event, listener) in &element.listeners {
                doc.add_listener(node, event, Rc::clone(listener));
            }
            node
        };
        let children = element
            .children
            .into_iter()
            .map(|child| self.mount_vnode(child, node, None, owner))
            .collect();
        let mut doc = self.inner.document.borrow_mut();
        apply_props(&mut doc, node, &element.props);
        doc.insert_before(parent, node, anchor);
        Mounted::Element {
            node,
            tag: element.tag.to_ascii_lowercase(),
            children,
        }
    }

    fn mount_component(
        &self,
        node: ComponentNode,
        parent: NodeId,
        anchor: Option<NodeId>,
        owner: Option<InstanceId>,
    ) -> Mounted {
        let Some((source, registered_as)) = self.resolve_target(&node.target, owner) else {
            return self.mount_unresolved(node, parent, anchor, owner);
        };
        let source_id = source.id();
        let instance = self.create_instance(source, registered_as, node, parent, anchor, owner);
        Mounted::Component {
            instance,
            source: source_id,
        }
    }

    fn create_instance(
        &self,
        source: ComponentDef,
        registered_as: Option<String>,
        node: ComponentNode,
        parent: NodeId,
        anchor: Option<NodeId>,
        owner: Option<InstanceId>,
    ) -> InstanceId {
        let def = self
            .intercept(&source, registered_as.as_deref())
            .unwrap_or_else(|| source.clone());

        let (props, attrs) = split_attrs(&def, node.props, node.attrs);
        let id = self.next_instance_id();
        let instance = Rc::new(Instance {
            state: RefCell::new(def.initial_state()),
            def: def.clone(),
            source: source.clone(),
            registered_as,
            parent: owner,
            props: RefCell::new(props),
            attrs: RefCell::new(attrs),
            slots: RefCell::new(node.slots),
            listeners: RefCell::new(node.listeners),
            subtree: RefCell::new(None),
            mounted: Cell::new(false),
        });
        self.inner.instances.borrow_mut().insert(id, instance);
        tracing::trace!(
            app = ?self.id(),
            instance = %id,
            component = ?def.name(),
            stubbed = def.id() != source.id(),
            "mounting component"
        );

        let handle = self.handle(id);
        self.run_hooks(&def, LifecycleHook::BeforeCreate, &handle);
        self.run_hooks(&def, LifecycleHook::Created, &handle);
        let vnode = self.render_instance(id);
        self.run_hooks(&def, LifecycleHook::BeforeMount, &handle);
        let subtree = self.mount_vnode(vnode, parent, anchor, Some(id));
        if let Some(instance) = self.instance(id) {
            *instance.subtree.borrow_mut() = Some(subtree);
            instance.mounted.set(true);
        }
        self.run_hooks(&def, LifecycleHook::Mounted, &handle);
        devtools::notify(&DevtoolsEvent::ComponentAdded {
            app: self.id(),
            instance: id,
        });
        id
    }

    /// An unresolvable name renders as a plain element with its default slot
    fn mount_unresolved(
        &self,
        node: ComponentNode,
        parent: NodeId,
        anchor: Option<NodeId>,
        owner: Option<InstanceId>,
    ) -> Mounted {
        let name = match &node.target {
            ComponentTarget::Named(name) => name.clone(),
            ComponentTarget::Definition(def) => def.name().unwrap_or("anonymous").to_string(),
        };
        console::warn(
            WarningKind::UnresolvedComponent,
            format!("Failed to resolve component: {name}"),
        );
        self.mount_element(unresolved_element(&name, &node), parent, anchor, owner)
    }

    fn run_hooks(&self, def: &ComponentDef, stage: LifecycleHook, handle: &InstanceHandle) {
        for hook in def.hooks(stage) {
            hook(handle);
        }
    }

    fn render_instance(&self, id: InstanceId) -> VNode {
        let Some(instance) = self.instance(id) else {
            return VNode::Fragment(Vec::new());
        };
        let ctx = RenderContext {
            props: instance.props.borrow().clone(),
            state: instance.state.borrow().clone(),
            attrs: instance.attrs.borrow().clone(),
            slots: instance.slots.borrow().clone(),
            handle: self.handle(id),
        };
        let vnode = instance.def.render(&ctx);
        fallthrough(vnode, &ctx.attrs)
    }

    // =========================================================================
    // Patching
    // =========================================================================

    fn update_instance(&self, id: InstanceId) {
        let Some(instance) = self.instance(id) else {
            return;
        };
        if !instance.mounted.get() {
            return;
        }
        self.inner.queue.borrow_mut().remove(&id);
        let handle = self.handle(id);
        self.run_hooks(&instance.def, LifecycleHook::BeforeUpdate, &handle);
        let vnode = self.render_instance(id);
        let Some(old) = instance.subtree.borrow_mut().take() else {
            return;
        };
        let parent = self
            .first_node(&old)
            .and_then(|n| self.inner.document.borrow().parent(n))
            .unwrap_or_else(|| self.container());
        let patched = self.patch(old, vnode, parent, Some(id));
        *instance.subtree.borrow_mut() = Some(patched);
        self.run_hooks(&instance.def, LifecycleHook::Updated, &handle);
        devtools::notify(&DevtoolsEvent::ComponentUpdated {
            app: self.id(),
            instance: id,
        });
    }

    fn patch(&self, old: Mounted, new: VNode, parent: NodeId, owner: Option<InstanceId>) -> Mounted {
        match (old, new) {
            (Mounted::Text { node }, VNode::Text(content)) => {
                self.inner.document.borrow_mut().set_text(node, &content);
                Mounted::Text { node }
            }
            (
                Mounted::Element {
                    node,
                    tag,
                    children,
                },
                VNode::Element(element),
            ) if tag.eq_ignore_ascii_case(&element.tag) => {
                {
                    let mut doc = self.inner.document.borrow_mut();
                    doc.sync_attributes(node, &element.attrs);
                    doc.clear_listeners(node);
                    for (event, listener) in &element.listeners {
                        doc.add_listener(node, event, Rc::clone(listener));
                    }
                }
                let children = self.patch_children(children, element.children, node, None, owner);
                apply_props(&mut self.inner.document.borrow_mut(), node, &element.props);
                Mounted::Element {
                    node,
                    tag,
                    children,
                }
            }
            (
                Mounted::Fragment {
                    start,
                    end,
                    children,
                },
                VNode::Fragment(vnodes),
            ) => {
                let children = self.patch_children(children, vnodes, parent, Some(end), owner);
                Mounted::Fragment {
                    start,
                    end,
                    children,
                }
            }
            (Mounted::Component { instance, source }, VNode::Component(node))
                if self
                    .resolve_target(&node.target, owner)
                    .is_some_and(|(def, _)| def.id() == source) =>
            {
                self.update_child(instance, node);
                Mounted::Component { instance, source }
            }
            (old, new) => {
                let anchor = self.first_node(&old);
                let mounted = self.mount_vnode(new, parent, anchor, owner);
                self.unmount_tree(old);
                mounted
            }
        }
    }

    fn patch_children(
        &self,
        old: Vec<Mounted>,
        new: Vec<VNode>,
        parent: NodeId,
        end: Option<NodeId>,
        owner: Option<InstanceId>,
    ) -> Vec<Mounted> {
        let mut old = old.into_iter();
        let mut out = Vec::with_capacity(new.len());
        for vnode in new {
            match old.next() {
                Some(previous) => out.push(self.patch(previous, vnode, parent, owner)),
                None => out.push(self.mount_vnode(vnode, parent, end, owner)),
            }
        }
        for stale in old {
            self.unmount_tree(stale);
        }
        out
    }

    fn update_child(&self, id: InstanceId, node: ComponentNode) {
        let Some(instance) = self.instance(id) else {
            return;
        };
        let (props, attrs) = split_attrs(&instance.def, node.props, node.attrs);
        *instance.props.borrow_mut() = props;
        *instance.attrs.borrow_mut() = attrs;
        *instance.slots.borrow_mut() = node.slots;
        *instance.listeners.borrow_mut() = node.listeners;
        self.update_instance(id);
    }

    fn first_node(&self, mounted: &Mounted) -> Option<NodeId> {
        match mounted {
            Mounted::Element { node, .. } | Mounted::Text { node } => Some(*node),
            Mounted::Fragment { start, .. } => Some(*start),
            Mounted::Component { instance, .. } => {
                let instance = self.instance(*instance)?;
                let subtree = instance.subtree.borrow();
                subtree.as_ref().and_then(|m| self.first_node(m))
            }
        }
    }

    // =========================================================================
    // Unmounting
    // =========================================================================

    fn unmount_tree(&self, mounted: Mounted) {
        match mounted {
            Mounted::Text { node } => self.inner.document.borrow_mut().remove(node),
            Mounted::Element { node, children, .. } => {
                for child in children {
                    self.unmount_tree(child);
                }
                self.inner.document.borrow_mut().remove(node);
            }
            Mounted::Fragment {
                start,
                end,
                children,
            } => {
                for child in children {
                    self.unmount_tree(child);
                }
                let mut doc = self.inner.document.borrow_mut();
                doc.remove(start);
                doc.remove(end);
            }
            Mounted::Component { instance, .. } => self.unmount_instance(instance),
        }
    }

    fn unmount_instance(&self, id: InstanceId) {
        let Some(instance) = self.instance(id) else {
            return;
        };
        let subtree = instance.subtree.borrow_mut().take();
        if let Some(subtree) = subtree {
            self.unmount_tree(subtree);
        }
        instance.mounted.set(false);
        self.inner.queue.borrow_mut().remove(&id);
        self.run_hooks(&instance.def, LifecycleHook::Unmounted, &self.handle(id));
        self.inner.instances.borrow_mut().remove(&id);
        devtools::notify(&DevtoolsEvent::ComponentRemoved {
            app: self.id(),
            instance: id,
        });
    }
}

/// Declared static attributes become props; the rest fall through
fn split_attrs(
    def: &ComponentDef,
    mut props: Map<String, Value>,
    attrs: Vec<(String, String)>,
) -> (Map<String, Value>, Vec<(String, String)>) {
    let mut rest = Vec::new();
    for (key, value) in attrs {
        if def.declares_prop(&key) {
            props.entry(key).or_insert(Value::String(value));
        } else {
            rest.push((key, value));
        }
    }
    (props, rest)
}

/// Merge fallthrough attributes into a single root; `class` is appended
fn fallthrough(vnode: VNode, attrs: &[(String, String)]) -> VNode {
    if attrs.is_empty() {
        return vnode;
    }
    match vnode {
        VNode::Element(mut element) => {
            for (key, value) in attrs {
                if key == "class" {
                    merge_class(&mut element.attrs, value);
                } else {
                    set_attr(&mut element.attrs, key, value.clone());
                }
            }
            VNode::Element(element)
        }
        VNode::Component(mut node) => {
            for (key, value) in attrs {
                if key == "class" {
                    merge_class(&mut node.attrs, value);
                } else {
                    set_attr(&mut node.attrs, key, value.clone());
                }
            }
            VNode::Component(node)
        }
        other => other,
    }
}

fn unresolved_element(name: &str, node: &ComponentNode) -> ElementNode {
    ElementNode {
        tag: name.to_string(),
        attrs: node.attrs.clone(),
        props: super::vnode::ElementProps::default(),
        listeners: Vec::new(),
        children: node.slots.render(Slots::DEFAULT, &Value::Null),
    }
}

fn apply_props(doc: &mut Document, node: NodeId, props: &super::vnode::ElementProps) {
    if let Some(value) = &props.value {
        if doc.value(node) != *value {
            doc.set_value(node, value);
        }
    }
    if let Some(checked) = props.checked {
        if doc.is_checked(node) != checked {
            doc.set_checked(node, checked);
        }
    }
    if let Some(selected) = props.selected {
        if doc.is_selected(node) != selected {
            doc.set_selected(node, selected);
        }
    }
}

/// Handle to a component instance, given to hooks and render functions
#[derive(Clone)]
pub struct InstanceHandle {
    app: Weak<AppInner>,
    id: InstanceId,
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle").field("id", &self.id).finish()
    }
}

impl InstanceHandle {
    /// Instance identity
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Owning app, while it is alive
    #[must_use]
    pub fn app(&self) -> Option<App> {
        App::from_weak(&self.app)
    }

    /// Declared name, else registration key
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.app().and_then(|app| app.instance_name(self.id))
    }

    /// Current props
    #[must_use]
    pub fn props(&self) -> Map<String, Value> {
        self.app()
            .map(|app| app.instance_props(self.id))
            .unwrap_or_default()
    }

    /// One prop
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<Value> {
        self.props().get(name).cloned()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> Value {
        self.app()
            .map(|app| app.instance_state(self.id))
            .unwrap_or(Value::Null)
    }

    /// Mutate state and queue a re-render if mounted
    pub fn set_state(&self, update: impl FnOnce(&mut Value)) {
        let Some(app) = self.app() else {
            return;
        };
        let Some(instance) = app.instance(self.id) else {
            return;
        };
        update(&mut instance.state.borrow_mut());
        app.queue_update(self.id);
    }

    /// Set one state field
    pub fn set_field(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.set_state(|state| {
            if let Value::Object(map) = state {
                map.insert(key.to_string(), value);
            }
        });
    }

    /// Emit an event to the parent
    pub fn emit(&self, event: &str, args: Vec<EventArg>) {
        if let Some(app) = self.app() {
            app.emit(self.id, event, args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::component::Component;
    use crate::runtime::console::ConsoleCapture;
    use crate::runtime::vnode::{component, fragment, h, resolve, text};
    use serde_json::json;

    fn html(app: &App) -> String {
        let doc = app.document();
        let doc = doc.borrow();
        doc.inner_html(doc.root())
    }

    #[test]
    fn mounts_nested_components() {
        let child = Component::named("Child")
            .props(&["label"])
            .render(|ctx| h("span").text(ctx.prop_str("label").unwrap_or_default()).into())
            .build();
        let parent = Component::named("Parent")
            .render(move |_| h("div").child(component(&child).prop("label", "hi")).into())
            .build();
        let app = App::new();
        app.mount(&parent, MountPlan::new());
        assert_eq!(html(&app), "<div><span>hi</span></div>");
    }

    #[test]
    fn static_attrs_fall_through_and_merge_class() {
        let child = Component::named("Child")
            .props(&["title"])
            .render(|_| h("p").class("inner").into())
            .build();
        let parent = Component::named("Parent")
            .render(move |_| {
                component(&child)
                    .class("outer")
                    .attr("title", "declared")
                    .attr("data-x", "1")
                    .into()
            })
            .build();
        let app = App::new();
        app.mount(&parent, MountPlan::new());
        assert_eq!(html(&app), r#"<p class="inner outer" data-x="1"></p>"#);
    }

    #[test]
    fn resolves_through_owner_then_app_registrations() {
        let local = Component::named("Local").render(|_| h("i").into()).build();
        let global = Component::named("Global").render(|_| h("b").into()).build();
        let parent = Component::named("Parent")
            .component("Local", &local)
            .render(|_| h("div").child(resolve("local")).child(resolve("global-thing")).into())
            .build();
        let app = App::new();
        app.mount(&parent, MountPlan::new().with_component("GlobalThing", &global));
        assert_eq!(html(&app), "<div><i></i><b></b></div>");
    }

    #[test]
    fn unresolved_component_warns_and_renders_element() {
        let capture = ConsoleCapture::start();
        let parent = Component::named("Parent")
            .render(|_| resolve("missing-thing").default_slot(vec![text("x")]).into())
            .build();
        let app = App::new();
        app.mount(&parent, MountPlan::new());
        assert_eq!(html(&app), "<missing-thing>x</missing-thing>");
        assert_eq!(capture.of_kind(WarningKind::UnresolvedComponent).len(), 1);
    }

    #[test]
    fn state_change_patches_in_place() {
        let counter = Component::named("Counter")
            .state("count", 0)
            .render(|ctx| {
                let count = ctx.state_field("count").and_then(Value::as_i64).unwrap_or(0);
                h("button").text(count.to_string()).into()
            })
            .build();
        let app = App::new();
        let root = app.mount(&counter, MountPlan::new());
        let before = app.instance_nodes(root);

        app.handle(root).set_field("count", 3);
        assert_eq!(app.pending_updates(), 1);
        app.flush();

        assert_eq!(html(&app), "<button>3</button>");
        assert_eq!(app.instance_nodes(root), before);
    }

    #[test]
    fn fragment_roots_grow_and_shrink() {
        let list = Component::named("List")
            .state("items", json!(["a"]))
            .render(|ctx| {
                let items = ctx.state_field("items").and_then(Value::as_array).cloned().unwrap_or_default();
                fragment(
                    items
                        .iter()
                        .map(|i| h("li").text(i.as_str().unwrap_or_default()).into())
                        .collect(),
                )
            })
            .build();
        let app = App::new();
        let root = app.mount(&list, MountPlan::new());
        assert_eq!(html(&app), "<li>a</li>");

        app.handle(root).set_field("items", json!(["a", "b", "c"]));
        app.flush();
        assert_eq!(html(&app), "<li>a</li><li>b</li><li>c</li>");
        assert_eq!(app.instance_nodes(root).len(), 3);

        app.handle(root).set_field("items", json!(["z"]));
        app.flush();
        assert_eq!(html(&app), "<li>z</li>");
    }

    #[test]
    fn hooks_run_in_lifecycle_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let push = |tag: &'static str, log: &Rc<RefCell<Vec<&'static str>>>| {
            let log = Rc::clone(log);
            move |_: &InstanceHandle| log.borrow_mut().push(tag)
        };
        let child = Component::named("Child")
            .mounted(push("child mounted", &log))
            .unmounted(push("child unmounted", &log))
            .render(|_| h("span").into())
            .build();
        let parent = Component::named("Parent")
            .created(push("parent created", &log))
            .mounted(push("parent mounted", &log))
            .unmounted(push("parent unmounted", &log))
            .render(move |_| component(&child).into())
            .build();
        let app = App::new();
        app.mount(&parent, MountPlan::new());
        app.unmount();

        assert_eq!(
            *log.borrow(),
            vec![
                "parent created",
                "child mounted",
                "parent mounted",
                "child unmounted",
                "parent unmounted"
            ]
        );
        assert_eq!(html(&app), "");
    }

    #[test]
    fn emit_calls_listener_and_warns_when_unhandled() {
        let capture = ConsoleCapture::start();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let child = Component::named("Child")
            .emits(&["declared"])
            .mounted(|handle| {
                handle.emit("picked", crate::args![7]);
                handle.emit("declared", Vec::new());
                handle.emit("stray", Vec::new());
            })
            .build();
        let sink = Rc::clone(&seen);
        let parent = Component::named("Parent")
            .render(move |_| {
                let sink = Rc::clone(&sink);
                component(&child)
                    .on("picked", move |args| {
                        sink.borrow_mut().push(*args[0].downcast_ref::<i32>().unwrap());
                    })
                    .into()
            })
            .build();
        let app = App::new();
        app.mount(&parent, MountPlan::new());

        assert_eq!(*seen.borrow(), vec![7]);
        let warnings = capture.of_kind(WarningKind::UnhandledEmit);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].text.contains("\"stray\""));
    }

    #[test]
    fn runaway_updates_are_capped() {
        let capture = ConsoleCapture::start();
        let looping = Component::named("Looping")
            .state("n", 0)
            .updated(|handle| {
                let n = handle.state()["n"].as_i64().unwrap_or(0);
                handle.set_field("n", n + 1);
            })
            .render(|ctx| h("p").text(ctx.state()["n"].to_string()).into())
            .build();
        let app = App::new();
        let root = app.mount(&looping, MountPlan::new());
        app.handle(root).set_field("n", 1);
        app.flush();
        assert_eq!(capture.of_kind(WarningKind::RecursiveUpdate).len(), 1);
        assert_eq!(app.pending_updates(), 0);
    }

    #[test]
    fn wide_update_is_not_mistaken_for_a_loop() {
        let capture = ConsoleCapture::start();
        let item = Component::named("Item")
            .state("n", 0)
            .render(|ctx| h("i").text(ctx.state()["n"].to_string()).into())
            .build();
        let list = Component::named("List")
            .render(move |_| h("div").children((0..150).map(|_| component(&item).into())).into())
            .build();
        let app = App::new();
        let root = app.mount(&list, MountPlan::new());
        let items = app.children_of(root);
        assert_eq!(items.len(), 150);
        for id in &items {
            app.handle(*id).set_field("n", 1);
        }
        app.flush();
        assert!(capture.of_kind(WarningKind::RecursiveUpdate).is_empty());
        let tree = app.document();
        let doc = tree.borrow();
        let updated = items
            .iter()
            .filter(|id| doc.text_content(app.instance_nodes(**id)[0]) == "1")
            .count();
        assert_eq!(updated, 150);
    }

    struct SwapAll(ComponentDef);

    impl ComponentInterceptor for SwapAll {
        fn intercept(&self, candidate: &ComponentCandidate<'_>) -> Option<ComponentDef> {
            (candidate.def.name() == Some("Inner")).then(|| self.0.clone())
        }
    }

    #[test]
    fn interceptor_replaces_component() {
        let inner = Component::named("Inner").render(|_| h("real").into()).build();
        let fake = Component::named("Fake").render(|_| h("fake").into()).build();
        let outer = Component::named("Outer")
            .render(move |_| component(&inner).into())
            .build();
        let app = App::new();
        let root = app
            .mount(&outer, MountPlan::new().with_interceptor(Rc::new(SwapAll(fake))));
        assert_eq!(html(&app), "<fake></fake>");
        let child = app.children_of(root)[0];
        assert_eq!(app.instance_name(child).as_deref(), Some("Fake"));
        assert_eq!(app.instance_source(child).unwrap().name(), Some("Inner"));
    }
}
