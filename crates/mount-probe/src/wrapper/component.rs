//! Wrapper over a mounted component instance.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::{matches_or_warn, Descriptor, ElementWrapper, Found, NotFoundWrapper, WrapperApi};
use crate::dom::NodeId;
use crate::emit::{EmitRecorder, Emission, EmissionLog, EventCalls};
use crate::mount::MountId;
use crate::naming::names_match;
use crate::result::{MountError, MountResult};
use crate::runtime::{next_tick, App, ComponentDef, ComponentId, InstanceHandle, InstanceId};

/// How `find_component` identifies a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentQuery {
    /// Declared name or registration key, in any casing
    Name(String),
    /// Definition identity
    Reference(ComponentId),
}

impl From<&str> for ComponentQuery {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<&ComponentDef> for ComponentQuery {
    fn from(def: &ComponentDef) -> Self {
        Self::Reference(def.id())
    }
}

impl fmt::Display for ComponentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Reference(id) => write!(f, "{id}"),
        }
    }
}

/// Result of `find_component`
#[derive(Debug, Clone)]
pub enum FoundComponent {
    /// Matched instance
    Component(ComponentWrapper),
    /// Nothing matched
    Missing(NotFoundWrapper),
}

impl FoundComponent {
    /// True when a component matched
    #[must_use]
    pub fn exists(&self) -> bool {
        match self {
            Self::Component(c) => c.exists(),
            Self::Missing(_) => false,
        }
    }

    /// The wrapper, or the not-found error
    pub fn into_component(self) -> MountResult<ComponentWrapper> {
        match self {
            Self::Component(c) => Ok(c),
            Self::Missing(m) => Err(m.error_for("into_component")),
        }
    }
}

/// Wraps a mounted component instance.
///
/// The wrapper returned by [`crate::mount`] wraps the root and reports every
/// emission of the mount; wrappers from [`ComponentWrapper::find_component`]
/// report only their own instance's emissions.
#[derive(Clone)]
pub struct ComponentWrapper {
    app: App,
    instance: InstanceId,
    recorder: Rc<EmitRecorder>,
    mount_id: MountId,
    root: bool,
}

impl fmt::Debug for ComponentWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentWrapper")
            .field("mount_id", &self.mount_id)
            .field("instance", &self.instance)
            .field("name", &self.name())
            .field("root", &self.root)
            .finish()
    }
}

impl ComponentWrapper {
    pub(crate) fn root(app: App, instance: InstanceId, recorder: EmitRecorder, mount_id: MountId) -> Self {
        Self {
            app,
            instance,
            recorder: Rc::new(recorder),
            mount_id,
            root: true,
        }
    }

    fn child(&self, instance: InstanceId) -> Self {
        Self {
            app: self.app.clone(),
            instance,
            recorder: Rc::clone(&self.recorder),
            mount_id: self.mount_id,
            root: false,
        }
    }

    /// Mount this wrapper belongs to
    #[must_use]
    pub fn mount_id(&self) -> MountId {
        self.mount_id
    }

    /// The app hosting the mount
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Wrapped instance
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    /// Handle to the wrapped instance
    #[must_use]
    pub fn handle(&self) -> InstanceHandle {
        self.app.handle(self.instance)
    }

    /// Declared name, else registration key
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.app.instance_name(self.instance)
    }

    /// Current props
    #[must_use]
    pub fn props(&self) -> Map<String, Value> {
        self.app.instance_props(self.instance)
    }

    /// One prop
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<Value> {
        self.props().get(name).cloned()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> Value {
        self.app.instance_state(self.instance)
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.app.instance_nodes(self.instance)
    }

    fn root_element(&self) -> Option<NodeId> {
        let tree = self.app.document();
        let doc = tree.borrow();
        self.nodes().into_iter().find(|n| doc.is_element(*n))
    }

    /// First element root
    pub fn element(&self) -> MountResult<ElementWrapper> {
        self.root_element()
            .map(|node| ElementWrapper::new(self.app.clone(), node))
            .ok_or_else(|| MountError::InvalidState {
                message: format!(
                    "component {} has no element root",
                    self.name().unwrap_or_else(|| self.instance.to_string())
                ),
            })
    }

    /// Find or fail, see [`ElementWrapper::get`]
    pub fn get(&self, selector: &str) -> MountResult<ElementWrapper> {
        let nodes = self.query(selector)?;
        nodes
            .first()
            .map(|node| ElementWrapper::new(self.app.clone(), *node))
            .ok_or_else(|| NotFoundWrapper::new(Descriptor::Selector(selector.to_string())).error_for("get"))
    }

    /// Root nodes that match, followed by their matching descendants, in
    /// document order
    fn query(&self, selector: &str) -> MountResult<Vec<NodeId>> {
        let tree = self.app.document();
        let doc = tree.borrow();
        let mut out = Vec::new();
        for root in self.nodes() {
            if !doc.is_element(root) {
                continue;
            }
            if doc.matches(root, selector)? {
                out.push(root);
            }
            out.extend(doc.query_selector_all(root, selector)?);
        }
        Ok(out)
    }

    // =========================================================================
    // Emissions
    // =========================================================================

    fn emission_log(&self) -> EmissionLog {
        let log = self.recorder.log();
        if self.root {
            log
        } else {
            log.for_instance(self.instance)
        }
    }

    /// Argument lists per event name
    #[must_use]
    pub fn emitted(&self) -> BTreeMap<String, EventCalls> {
        self.emission_log().events().clone()
    }

    /// Argument lists for one event, `None` if it was never emitted
    #[must_use]
    pub fn emitted_event(&self, event: &str) -> Option<EventCalls> {
        self.emission_log().get(event).cloned()
    }

    /// Every emission in order
    #[must_use]
    pub fn emitted_order(&self) -> Vec<Emission> {
        self.emission_log().ordered().to_vec()
    }

    // =========================================================================
    // Component queries
    // =========================================================================

    fn matches_query(&self, instance: InstanceId, query: &ComponentQuery) -> bool {
        match query {
            ComponentQuery::Reference(id) => {
                self.app.instance_source(instance).is_some_and(|d| d.id() == *id)
                    || self.app.instance_def(instance).is_some_and(|d| d.id() == *id)
            }
            ComponentQuery::Name(name) => {
                let source_name = self
                    .app
                    .instance_source(instance)
                    .and_then(|d| d.name().map(ToOwned::to_owned));
                [
                    self.app.instance_name(instance),
                    source_name,
                    self.app.instance_registered_as(instance),
                ]
                .into_iter()
                .flatten()
                .any(|candidate| names_match(&candidate, name))
            }
        }
    }

    /// First descendant component matching `query`, depth-first
    #[must_use]
    pub fn find_component(&self, query: impl Into<ComponentQuery>) -> FoundComponent {
        let query = query.into();
        match self
            .app
            .descendants(self.instance)
            .into_iter()
            .find(|id| self.matches_query(*id, &query))
        {
            Some(id) => FoundComponent::Component(self.child(id)),
            None => FoundComponent::Missing(NotFoundWrapper::new(Descriptor::Component(query.to_string()))),
        }
    }

    /// Every descendant component matching `query`
    #[must_use]
    pub fn find_all_components(&self, query: impl Into<ComponentQuery>) -> Vec<Self> {
        let query = query.into();
        self.app
            .descendants(self.instance)
            .into_iter()
            .filter(|id| self.matches_query(*id, &query))
            .map(|id| self.child(id))
            .collect()
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Merge new props and re-render
    pub async fn set_props(&self, props: Map<String, Value>) -> MountResult<()> {
        if !self.exists() {
            return Err(MountError::InvalidState {
                message: "set_props() called on an unmounted component".to_string(),
            });
        }
        tracing::debug!(mount_id = %self.mount_id, instance = %self.instance, "setting props");
        self.app.set_props(self.instance, props);
        next_tick(&self.app).await;
        Ok(())
    }

    /// Unmount the whole tree and detach the emission recorder
    pub fn unmount(&self) -> MountResult<()> {
        if !self.root {
            return Err(MountError::InvalidState {
                message: "unmount() can only be called on the root wrapper".to_string(),
            });
        }
        tracing::debug!(mount_id = %self.mount_id, "unmounting");
        self.app.unmount();
        self.recorder.detach();
        Ok(())
    }
}

impl WrapperApi for ComponentWrapper {
    fn exists(&self) -> bool {
        self.app.is_mounted(self.instance)
    }

    fn text(&self) -> String {
        let tree = self.app.document();
        let doc = tree.borrow();
        self.nodes()
            .into_iter()
            .map(|n| doc.text_content(n))
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn html(&self) -> String {
        let tree = self.app.document();
        let doc = tree.borrow();
        self.nodes().into_iter().map(|n| doc.outer_html(n)).collect()
    }

    fn classes(&self) -> Vec<String> {
        self.element().map(|e| e.classes()).unwrap_or_default()
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        self.element().map(|e| e.attributes()).unwrap_or_default()
    }

    fn find(&self, selector: &str) -> Found {
        match matches_or_warn(self.query(selector)).first() {
            Some(node) => Found::Element(ElementWrapper::new(self.app.clone(), *node)),
            None => Found::Missing(NotFoundWrapper::new(Descriptor::Selector(selector.to_string()))),
        }
    }

    fn find_all(&self, selector: &str) -> Vec<ElementWrapper> {
        matches_or_warn(self.query(selector))
            .into_iter()
            .map(|node| ElementWrapper::new(self.app.clone(), node))
            .collect()
    }
}
