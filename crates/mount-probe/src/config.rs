//! Thread-local configuration shared by every mount on the thread.
//!
//! ```ignore
//! config::set_render_stub_default_slot(true);
//! config::update(|c| c.global.stubs = Stubs::from(["Foo"]));
//! // ... mount and assert ...
//! config::reset();
//! ```

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::runtime::ComponentDef;
use crate::stubs::Stubs;

/// Options applied to every component in a mount
#[derive(Debug, Clone, Default)]
pub struct GlobalMountOptions {
    /// Stub directives
    pub stubs: Stubs,
    /// Component registrations available to `resolve`
    pub components: Vec<(String, ComponentDef)>,
}

impl GlobalMountOptions {
    /// Empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stub directives
    #[must_use]
    pub fn with_stubs(mut self, stubs: impl Into<Stubs>) -> Self {
        self.stubs = stubs.into();
        self
    }

    /// Register a component
    #[must_use]
    pub fn with_component(mut self, key: &str, def: &ComponentDef) -> Self {
        self.components.push((key.to_string(), def.clone()));
        self
    }
}

/// Flags that can be loaded from a settings file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigFlags {
    /// Auto-generated stubs render their default slot
    pub render_stub_default_slot: bool,
}

/// Thread-wide mount configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Options merged into every mount
    pub global: GlobalMountOptions,
    /// Auto-generated stubs render their default slot
    pub render_stub_default_slot: bool,
}

impl Config {
    /// Set global options
    #[must_use]
    pub fn with_global(mut self, global: GlobalMountOptions) -> Self {
        self.global = global;
        self
    }

    /// Set stub default-slot rendering
    #[must_use]
    pub fn with_render_stub_default_slot(mut self, enabled: bool) -> Self {
        self.render_stub_default_slot = enabled;
        self
    }

    /// Apply loaded flags
    #[must_use]
    pub fn with_flags(mut self, flags: ConfigFlags) -> Self {
        self.render_stub_default_slot = flags.render_stub_default_slot;
        self
    }

    /// Serializable flags
    #[must_use]
    pub fn flags(&self) -> ConfigFlags {
        ConfigFlags {
            render_stub_default_slot: self.render_stub_default_slot,
        }
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Snapshot of the current configuration
#[must_use]
pub fn get() -> Config {
    CONFIG.with(|c| c.borrow().clone())
}

/// Mutate the configuration
pub fn update(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|c| f(&mut c.borrow_mut()));
}

/// Restore defaults
pub fn reset() {
    CONFIG.with(|c| *c.borrow_mut() = Config::default());
}

/// Toggle stub default-slot rendering
pub fn set_render_stub_default_slot(enabled: bool) {
    update(|c| c.render_stub_default_slot = enabled);
}

/// Current stub default-slot rendering flag
#[must_use]
pub fn render_stub_default_slot() -> bool {
    CONFIG.with(|c| c.borrow().render_stub_default_slot)
}
