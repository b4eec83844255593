//! Host runtime.
//!
//! A small component runtime that mount-probe drives: definitions, vnodes,
//! an app that mounts and patches them into a [`crate::dom::Document`], a
//! devtools channel and a diagnostic console. It has no template compiler
//! and patches positionally.

pub mod app;
pub mod component;
pub mod console;
pub mod devtools;
pub mod vnode;

pub use app::{
    App, AppId, ComponentCandidate, ComponentInterceptor, InstanceHandle, InstanceId, MountPlan,
};
pub use component::{Component, ComponentDef, ComponentId, LifecycleHook, RenderContext};
pub use vnode::{
    component, fragment, h, resolve, text, ComponentNode, ComponentTarget, ElementNode, EventArg,
    Slots, VNode,
};

/// Resolve once every queued update of `app` has been applied
pub async fn next_tick(app: &App) {
    app.flush();
}
