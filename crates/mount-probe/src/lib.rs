//! mount-probe: mount components into a virtual tree and assert on them
//!
//! Mounts a component definition into an in-memory render tree, replaces
//! child components with inert stubs on request, and records every event a
//! component emits. Tests then inspect the output through wrappers and drive
//! form controls the way a user would.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   MOUNT-PROBE Architecture                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ mount()    │    │ Stub       │    │ Host       │            │
//! │   │ + options  │───►│ Resolver   │───►│ Runtime    │            │
//! │   │ + config   │    │            │    │ (App)      │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │         │                                   │ devtools          │
//! │         │           ┌────────────┐    ┌─────▼──────┐            │
//! │         └──────────►│ Wrappers   │◄───│ Emit       │            │
//! │                     │ (find/set) │    │ Recorder   │            │
//! │                     └─────┬──────┘    └────────────┘            │
//! │                           │                                     │
//! │                     ┌─────▼──────┐                              │
//! │                     │ Document   │                              │
//! │                     │ (arena)    │                              │
//! │                     └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use mount_probe::{h, mount, Component, MountingOptions, WrapperApi};
//!
//! let greeting = Component::named("Greeting")
//!     .props(&["name"])
//!     .render(|ctx| h("p").text(format!("Hi {}", ctx.prop_str("name").unwrap_or_default())).into())
//!     .build();
//! let wrapper = mount(&greeting, MountingOptions::new().with_prop("name", "Ada"));
//! assert_eq!(wrapper.html(), "<p>Hi Ada</p>");
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Thread-wide defaults merged into every mount
pub mod config;

/// Arena render tree and selector matching
#[allow(clippy::missing_const_for_fn, clippy::doc_markdown)]
pub mod dom;

#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod emit;

mod mount;

/// Component name normalization
pub mod naming;

mod result;

/// Host component runtime
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod runtime;

#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod stubs;

#[allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::missing_const_for_fn)]
mod wrapper;

pub use config::{Config, ConfigFlags, GlobalMountOptions};
pub use dom::{Document, DomEvent, NodeId, SelectorList};
pub use emit::{EmitRecorder, Emission, EmissionLog, EventCalls};
pub use mount::{mount, MountId, MountingOptions};
pub use result::{MountError, MountResult};
pub use runtime::console::{ConsoleCapture, ConsoleMessage, ConsoleSeverity, WarningKind};
pub use runtime::{
    component, fragment, h, next_tick, resolve, text, App, AppId, Component, ComponentDef,
    ComponentId, ComponentNode, ElementNode, EventArg, InstanceHandle, InstanceId, LifecycleHook,
    RenderContext, Slots, VNode,
};
pub use stubs::{StubDirective, StubResolver, StubTarget, Stubs};
pub use wrapper::{
    ComponentQuery, ComponentWrapper, Descriptor, ElementWrapper, Found, FoundComponent,
    NotFoundWrapper, WrapperApi,
};
