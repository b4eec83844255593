//! Stub resolution.
//!
//! Decides, for every component about to be mounted, whether it renders
//! normally, is replaced by a user-supplied definition, or is swapped for an
//! auto-generated placeholder.
//!
//! ## Match order
//!
//! Per-mount directives are consulted before global ones. Within a scope the
//! reducer tries, in order:
//!
//! 1. reference identity ([`StubTarget::ByReference`])
//! 2. normalized name ([`StubTarget::ByName`]) against the declared name and
//!    the registration key
//! 3. the wildcard ([`StubTarget::All`])
//!
//! The first hit wins. [`StubDirective::Render`] is a hit too, which is how
//! a per-mount entry opts a component out of a global stub.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::mount::MountId;
use crate::naming::{names_match, stub_tag};
use crate::runtime::{h, Component, ComponentCandidate, ComponentDef, ComponentId, ComponentInterceptor};

/// Which components a directive applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubTarget {
    /// One definition, by identity
    ByReference(ComponentId),
    /// Declared name or registration key, in any casing
    ByName(String),
    /// Every component
    All,
}

impl StubTarget {
    fn same_target(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ByReference(a), Self::ByReference(b)) => a == b,
            (Self::ByName(a), Self::ByName(b)) => names_match(a, b),
            (Self::All, Self::All) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByReference(id) => write!(f, "{id}"),
            Self::ByName(name) => write!(f, "{name}"),
            Self::All => write!(f, "*"),
        }
    }
}

/// What to do with a matched component
#[derive(Debug, Clone)]
pub enum StubDirective {
    /// Render an auto-generated placeholder
    Auto,
    /// Render this definition instead
    Replace(ComponentDef),
    /// Render the real component
    Render,
}

/// Ordered stub directives for one scope
#[derive(Debug, Clone, Default)]
pub struct Stubs {
    entries: Vec<(StubTarget, StubDirective)>,
}

impl Stubs {
    /// No directives
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive; an existing entry for the same target is replaced
    #[must_use]
    pub fn with(mut self, target: StubTarget, directive: StubDirective) -> Self {
        self.set(target, directive);
        self
    }

    /// In-place form of [`Stubs::with`]
    pub fn set(&mut self, target: StubTarget, directive: StubDirective) {
        match self.entries.iter_mut().find(|(t, _)| t.same_target(&target)) {
            Some((_, existing)) => *existing = directive,
            None => self.entries.push((target, directive)),
        }
    }

    /// Auto-stub by name
    #[must_use]
    pub fn stub(self, name: &str) -> Self {
        self.with(StubTarget::ByName(name.to_string()), StubDirective::Auto)
    }

    /// Auto-stub by reference
    #[must_use]
    pub fn stub_component(self, def: &ComponentDef) -> Self {
        self.with(StubTarget::ByReference(def.id()), StubDirective::Auto)
    }

    /// Replace by name
    #[must_use]
    pub fn replace(self, name: &str, replacement: &ComponentDef) -> Self {
        self.with(
            StubTarget::ByName(name.to_string()),
            StubDirective::Replace(replacement.clone()),
        )
    }

    /// Replace by reference
    #[must_use]
    pub fn replace_component(self, def: &ComponentDef, replacement: &ComponentDef) -> Self {
        self.with(
            StubTarget::ByReference(def.id()),
            StubDirective::Replace(replacement.clone()),
        )
    }

    /// Never stub the named component
    #[must_use]
    pub fn render(self, name: &str) -> Self {
        self.with(StubTarget::ByName(name.to_string()), StubDirective::Render)
    }

    /// Never stub this definition
    #[must_use]
    pub fn render_component(self, def: &ComponentDef) -> Self {
        self.with(StubTarget::ByReference(def.id()), StubDirective::Render)
    }

    /// Auto-stub everything not matched more specifically
    #[must_use]
    pub fn all(self) -> Self {
        self.with(StubTarget::All, StubDirective::Auto)
    }

    /// Append another scope's entries, letting them win on conflicts
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        for (target, directive) in &other.entries {
            self.set(target.clone(), directive.clone());
        }
        self
    }

    /// Entries in insertion order
    #[must_use]
    pub fn entries(&self) -> &[(StubTarget, StubDirective)] {
        &self.entries
    }

    /// True without entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Directive for a candidate: reference, then name, then wildcard
    #[must_use]
    pub fn lookup(&self, candidate: &ComponentCandidate<'_>) -> Option<&StubDirective> {
        let id = candidate.def.id();
        let names: Vec<&str> = candidate
            .def
            .name()
            .into_iter()
            .chain(candidate.registered_as)
            .collect();

        let by_reference = || {
            self.entries.iter().find_map(|(target, directive)| match target {
                StubTarget::ByReference(r) if *r == id => Some(directive),
                _ => None,
            })
        };
        let by_name = || {
            self.entries.iter().find_map(|(target, directive)| match target {
                StubTarget::ByName(n) if names.iter().any(|c| names_match(n, c)) => Some(directive),
                _ => None,
            })
        };
        let wildcard = || {
            self.entries.iter().find_map(|(target, directive)| match target {
                StubTarget::All => Some(directive),
                _ => None,
            })
        };
        by_reference().or_else(by_name).or_else(wildcard)
    }
}

impl<const N: usize> From<[&str; N]> for Stubs {
    fn from(names: [&str; N]) -> Self {
        names.into_iter().collect()
    }
}

impl<'a> FromIterator<&'a str> for Stubs {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::stub)
    }
}

/// Interceptor applying per-mount and global [`Stubs`] to one mount
pub struct StubResolver {
    mount_id: MountId,
    mount: Stubs,
    global: Stubs,
    render_default_slot: bool,
    root: Option<ComponentId>,
    cache: RefCell<HashMap<(ComponentId, String), ComponentDef>>,
}

impl fmt::Debug for StubResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubResolver")
            .field("mount_id", &self.mount_id)
            .field("mount", &self.mount.len())
            .field("global", &self.global.len())
            .field("render_default_slot", &self.render_default_slot)
            .field("root", &self.root)
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}

impl StubResolver {
    /// Resolver for one mount
    #[must_use]
    pub fn new(mount_id: MountId, mount: Stubs, global: Stubs, render_default_slot: bool) -> Self {
        Self {
            mount_id,
            mount,
            global,
            render_default_slot,
            root: None,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Never stub `root`, the component being mounted
    #[must_use]
    pub fn with_root(mut self, root: ComponentId) -> Self {
        self.root = Some(root);
        self
    }

    /// Winning directive across both scopes
    #[must_use]
    pub fn decide(&self, candidate: &ComponentCandidate<'_>) -> Option<&StubDirective> {
        if self.root == Some(candidate.def.id()) {
            return None;
        }
        self.mount
            .lookup(candidate)
            .or_else(|| self.global.lookup(candidate))
    }

    /// Placeholder definition for `def` under its resolved name, created
    /// once per mount. A nameless definition registered under two keys gets
    /// one stub per key.
    fn auto_stub(&self, def: &ComponentDef, registered_as: Option<&str>) -> ComponentDef {
        let name = def
            .name()
            .or(registered_as)
            .unwrap_or("anonymous")
            .to_string();
        let key = (def.id(), name);
        if let Some(stub) = self.cache.borrow().get(&key) {
            return stub.clone();
        }
        let name = key.1.clone();
        let tag = stub_tag(&name);
        let render_default_slot = self.render_default_slot;
        let props: Vec<&str> = def.declared_props().iter().map(String::as_str).collect();
        let stub = Component::named(&name)
            .props(&props)
            .render(move |ctx| {
                let children = if render_default_slot {
                    ctx.default_slot()
                } else {
                    Vec::new()
                };
                h(&tag).children(children).into()
            })
            .build();
        self.cache.borrow_mut().insert(key, stub.clone());
        stub
    }
}

impl ComponentInterceptor for StubResolver {
    fn intercept(&self, candidate: &ComponentCandidate<'_>) -> Option<ComponentDef> {
        let directive = self.decide(candidate)?;
        let component = candidate.def.name().or(candidate.registered_as);
        match directive {
            StubDirective::Render => {
                tracing::trace!(mount_id = %self.mount_id, component, "rendering real component");
                None
            }
            StubDirective::Replace(replacement) => {
                tracing::debug!(
                    mount_id = %self.mount_id,
                    component,
                    replacement = replacement.name(),
                    "replacing component"
                );
                Some(replacement.clone())
            }
            StubDirective::Auto => {
                tracing::debug!(mount_id = %self.mount_id, component, "auto-stubbing component");
                Some(self.auto_stub(candidate.def, candidate.registered_as))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate<'a>(def: &'a ComponentDef, registered_as: Option<&'a str>) -> ComponentCandidate<'a> {
        ComponentCandidate { def, registered_as }
    }

    #[test]
    fn array_syntax_auto_stubs_each_name() {
        let stubs = Stubs::from(["foo", "BarBaz"]);
        assert_eq!(stubs.len(), 2);
        let bar = Component::named("bar-baz").build();
        assert!(matches!(stubs.lookup(&candidate(&bar, None)), Some(StubDirective::Auto)));
    }

    #[test]
    fn reference_beats_name_beats_wildcard() {
        let foo = Component::named("Foo").build();
        let replacement = Component::named("Fake").build();
        let stubs = Stubs::new()
            .all()
            .render("Foo")
            .replace_component(&foo, &replacement);
        assert!(matches!(
            stubs.lookup(&candidate(&foo, None)),
            Some(StubDirective::Replace(def)) if *def == replacement
        ));

        let other_foo = Component::named("Foo").build();
        assert!(matches!(stubs.lookup(&candidate(&other_foo, None)), Some(StubDirective::Render)));

        let bar = Component::named("Bar").build();
        assert!(matches!(stubs.lookup(&candidate(&bar, None)), Some(StubDirective::Auto)));
    }

    #[test]
    fn registration_key_matches_nameless_component() {
        let nameless = Component::anonymous().build();
        let stubs = Stubs::new().stub("Foo");
        assert!(stubs.lookup(&candidate(&nameless, Some("foo"))).is_some());
        assert!(stubs.lookup(&candidate(&nameless, None)).is_none());
    }

    #[test]
    fn later_entry_replaces_same_target() {
        let stubs = Stubs::new().stub("foo-bar").render("FooBar");
        assert_eq!(stubs.len(), 1);
        let def = Component::named("fooBar").build();
        assert!(matches!(stubs.lookup(&candidate(&def, None)), Some(StubDirective::Render)));
    }

    #[test]
    fn mount_scope_overrides_global() {
        let foo = Component::named("Foo").build();
        let resolver = StubResolver::new(
            MountId::new(),
            Stubs::new().render("Foo"),
            Stubs::new().stub("Foo"),
            false,
        );
        assert!(resolver.intercept(&candidate(&foo, None)).is_none());

        let global_only = StubResolver::new(MountId::new(), Stubs::new(), Stubs::new().stub("Foo"), false);
        let stub = global_only.intercept(&candidate(&foo, None)).unwrap();
        assert_eq!(stub.name(), Some("Foo"));
        assert_ne!(stub.id(), foo.id());
    }

    #[test]
    fn auto_stub_is_cached_per_definition() {
        let foo = Component::named("Foo").props(&["label"]).build();
        let resolver = StubResolver::new(MountId::new(), Stubs::new().all(), Stubs::new(), false);
        let first = resolver.intercept(&candidate(&foo, None)).unwrap();
        let second = resolver.intercept(&candidate(&foo, None)).unwrap();
        assert_eq!(first, second);
        assert!(first.declares_prop("label"));
    }

    #[test]
    fn nameless_definition_gets_one_stub_per_key() {
        let nameless = Component::anonymous().build();
        let resolver = StubResolver::new(MountId::new(), Stubs::new().all(), Stubs::new(), false);
        let hello = resolver.intercept(&candidate(&nameless, Some("Hello"))).unwrap();
        let world = resolver.intercept(&candidate(&nameless, Some("World"))).unwrap();
        assert_eq!(hello.name(), Some("Hello"));
        assert_eq!(world.name(), Some("World"));
        assert_eq!(resolver.intercept(&candidate(&nameless, Some("Hello"))).unwrap(), hello);
    }

    #[test]
    fn mounted_root_is_never_stubbed() {
        let root = Component::named("App").build();
        let resolver = StubResolver::new(MountId::new(), Stubs::new().all(), Stubs::new(), false)
            .with_root(root.id());
        assert!(resolver.intercept(&candidate(&root, None)).is_none());
        let child = Component::named("Child").build();
        assert!(resolver.intercept(&candidate(&child, None)).is_some());
    }

    #[test]
    fn merged_lets_other_scope_win() {
        let base = Stubs::new().stub("Foo").stub("Bar");
        let merged = base.merged(&Stubs::new().render("foo"));
        assert_eq!(merged.len(), 2);
        let foo = Component::named("Foo").build();
        assert!(matches!(merged.lookup(&candidate(&foo, None)), Some(StubDirective::Render)));
    }

    #[test]
    fn target_display() {
        assert_eq!(StubTarget::All.to_string(), "*");
        assert_eq!(StubTarget::ByName("Foo".to_string()).to_string(), "Foo");
    }
}
