//! Mount orchestration.
//!
//! [`mount`] merges the thread-wide [`crate::config`] with the per-mount
//! [`MountingOptions`], creates an app whose component interceptor is a
//! [`StubResolver`], attaches an [`EmitRecorder`] and mounts the component.
//! The recorder is attached before the first render so emissions from
//! `created` and `mounted` hooks are recorded too.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{self, GlobalMountOptions};
use crate::emit::EmitRecorder;
use crate::runtime::{App, ComponentDef, MountPlan, Slots, VNode};
use crate::stubs::{StubResolver, Stubs};
use crate::wrapper::ComponentWrapper;

/// Identifier correlating the log lines of one mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountId(Uuid);

impl MountId {
    /// Fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-mount options
#[derive(Debug, Clone, Default)]
pub struct MountingOptions {
    /// Root props
    pub props: Map<String, Value>,
    /// Root static attributes
    pub attrs: Vec<(String, String)>,
    /// Root slots
    pub slots: Slots,
    /// Stubs and registrations for this mount; these win over [`crate::config`]
    pub global: GlobalMountOptions,
}

impl MountingOptions {
    /// Empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root prop
    #[must_use]
    pub fn with_prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    /// Replace the root props
    #[must_use]
    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }

    /// Add a root attribute
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    /// Static slot content
    #[must_use]
    pub fn with_slot(mut self, name: &str, content: Vec<VNode>) -> Self {
        self.slots = self.slots.with_static(name, content);
        self
    }

    /// Scoped slot
    #[must_use]
    pub fn with_scoped_slot(mut self, name: &str, slot: impl Fn(&Value) -> Vec<VNode> + 'static) -> Self {
        self.slots.insert(name, Rc::new(slot));
        self
    }

    /// Replace the global options for this mount
    #[must_use]
    pub fn with_global(mut self, global: GlobalMountOptions) -> Self {
        self.global = global;
        self
    }

    /// Set this mount's stub directives
    #[must_use]
    pub fn with_stubs(mut self, stubs: impl Into<Stubs>) -> Self {
        self.global.stubs = stubs.into();
        self
    }

    /// Register a component for this mount
    #[must_use]
    pub fn with_component(mut self, key: &str, def: &ComponentDef) -> Self {
        self.global.components.push((key.to_string(), def.clone()));
        self
    }
}

/// Mount `component` and wrap its root instance
#[must_use]
pub fn mount(component: &ComponentDef, options: MountingOptions) -> ComponentWrapper {
    let mount_id = MountId::new();
    let config = config::get();

    let mut components = options.global.components;
    components.extend(config.global.components);

    let resolver = StubResolver::new(
        mount_id,
        options.global.stubs,
        config.global.stubs,
        config.render_stub_default_slot,
    )
    .with_root(component.id());
    let plan = MountPlan {
        props: options.props,
        attrs: options.attrs,
        slots: options.slots,
        components,
        interceptor: Some(Rc::new(resolver)),
    };

    let app = App::new();
    let recorder = EmitRecorder::attach(app.id(), mount_id);
    tracing::debug!(
        %mount_id,
        component = component.name(),
        render_stub_default_slot = config.render_stub_default_slot,
        "mounting"
    );
    let root = app.mount(component, plan);
    ComponentWrapper::root(app, root, recorder, mount_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{h, text, Component};
    use crate::wrapper::WrapperApi;

    #[test]
    fn mount_ids_are_unique() {
        assert_ne!(MountId::new(), MountId::new());
        let id = MountId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn options_builder_collects_everything() {
        let def = Component::named("Foo").build();
        let options = MountingOptions::new()
            .with_prop("label", "x")
            .with_attr("id", "main")
            .with_slot("default", vec![text("hi")])
            .with_stubs(["Bar"])
            .with_component("Foo", &def);
        assert_eq!(options.props["label"], Value::from("x"));
        assert_eq!(options.attrs.len(), 1);
        assert!(options.slots.has("default"));
        assert_eq!(options.global.stubs.len(), 1);
        assert_eq!(options.global.components.len(), 1);
    }

    #[test]
    fn mount_renders_root_with_props_and_slots() {
        let card = Component::named("Card")
            .props(&["title"])
            .render(|ctx| {
                h("article")
                    .child(h("h1").text(ctx.prop_str("title").unwrap_or_default()))
                    .children(ctx.default_slot())
                    .into()
            })
            .build();
        let wrapper = mount(
            &card,
            MountingOptions::new()
                .with_prop("title", "Hello")
                .with_attr("class", "card")
                .with_slot("default", vec![text("body")]),
        );
        assert_eq!(wrapper.html(), r#"<article class="card"><h1>Hello</h1>body</article>"#);
        assert_eq!(wrapper.name().as_deref(), Some("Card"));
        assert_eq!(wrapper.prop("title"), Some(Value::from("Hello")));
    }

    #[test]
    fn mount_level_registration_wins_over_config() {
        let from_config = Component::named("Widget").render(|_| h("old").into()).build();
        let from_mount = Component::named("Widget").render(|_| h("new").into()).build();
        config::update(|c| c.global.components.push(("Widget".to_string(), from_config)));
        let parent = Component::named("Parent")
            .render(|_| crate::runtime::resolve("widget").into())
            .build();
        let wrapper = mount(&parent, MountingOptions::new().with_component("Widget", &from_mount));
        assert_eq!(wrapper.html(), "<new></new>");
        config::reset();
    }
}
