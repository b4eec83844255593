//! Wrappers over rendered output.
//!
//! Every wrapper implements the read-side [`WrapperApi`]. Interactions
//! (`set_value`, `trigger`, ...) exist only on [`ElementWrapper`] and on the
//! runtime-checked [`Found`] returned by `find`, which fails them with
//! [`MountError::NotFound`] when the query matched nothing.

mod component;
mod element;
mod not_found;

pub use component::{ComponentQuery, ComponentWrapper, FoundComponent};
pub use element::ElementWrapper;
pub use not_found::NotFoundWrapper;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::result::{MountError, MountResult};

/// What a failed query searched for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Descriptor {
    /// CSS selector
    Selector(String),
    /// Component name or reference
    Component(String),
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(selector) => write!(f, "{selector}"),
            Self::Component(component) => write!(f, "component {component}"),
        }
    }
}

/// Read-side inspection shared by every wrapper
pub trait WrapperApi {
    /// True when the wrapper refers to something rendered
    fn exists(&self) -> bool;

    /// Trimmed text content
    fn text(&self) -> String;

    /// Serialized outer markup
    fn html(&self) -> String;

    /// Class names in order
    fn classes(&self) -> Vec<String>;

    /// True when the class is present
    fn has_class(&self, name: &str) -> bool {
        self.classes().iter().any(|c| c == name)
    }

    /// Every attribute
    fn attributes(&self) -> BTreeMap<String, String>;

    /// One attribute
    fn attribute(&self, key: &str) -> Option<String> {
        self.attributes().remove(key)
    }

    /// First match below this wrapper
    fn find(&self, selector: &str) -> Found;

    /// Every match below this wrapper, in document order
    fn find_all(&self, selector: &str) -> Vec<ElementWrapper>;
}

/// Result of `find`: a wrapped element or the sentinel for no match
#[derive(Debug, Clone)]
pub enum Found {
    /// Matched element
    Element(ElementWrapper),
    /// Nothing matched
    Missing(NotFoundWrapper),
}

impl Found {
    /// The element, or the not-found error
    pub fn into_element(self) -> MountResult<ElementWrapper> {
        match self {
            Self::Element(element) => Ok(element),
            Self::Missing(missing) => Err(missing.error()),
        }
    }

    /// Borrow the element if one matched
    #[must_use]
    pub fn element(&self) -> Option<&ElementWrapper> {
        match self {
            Self::Element(element) => Some(element),
            Self::Missing(_) => None,
        }
    }

    /// True when nothing matched
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }

    fn require(&self, operation: &str) -> MountResult<&ElementWrapper> {
        match self {
            Self::Element(element) => Ok(element),
            Self::Missing(missing) => Err(missing.error_for(operation)),
        }
    }

    /// See [`ElementWrapper::set_value`]
    pub async fn set_value(&self, value: &str) -> MountResult<()> {
        self.require("set_value")?.set_value(value).await
    }

    /// See [`ElementWrapper::set_checked`]
    pub async fn set_checked(&self, checked: bool) -> MountResult<()> {
        self.require("set_checked")?.set_checked(checked).await
    }

    /// See [`ElementWrapper::set_selected`]
    pub async fn set_selected(&self) -> MountResult<()> {
        self.require("set_selected")?.set_selected().await
    }

    /// See [`ElementWrapper::trigger`]
    pub async fn trigger(&self, event: &str) -> MountResult<()> {
        self.require("trigger")?.trigger(event).await
    }

    /// `value` property, failing when nothing matched
    pub fn value(&self) -> MountResult<String> {
        Ok(self.require("value")?.value())
    }
}

impl WrapperApi for Found {
    fn exists(&self) -> bool {
        match self {
            Self::Element(e) => e.exists(),
            Self::Missing(m) => m.exists(),
        }
    }

    fn text(&self) -> String {
        match self {
            Self::Element(e) => e.text(),
            Self::Missing(m) => m.text(),
        }
    }

    fn html(&self) -> String {
        match self {
            Self::Element(e) => e.html(),
            Self::Missing(m) => m.html(),
        }
    }

    fn classes(&self) -> Vec<String> {
        match self {
            Self::Element(e) => e.classes(),
            Self::Missing(m) => m.classes(),
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        match self {
            Self::Element(e) => e.attributes(),
            Self::Missing(m) => m.attributes(),
        }
    }

    fn find(&self, selector: &str) -> Found {
        match self {
            Self::Element(e) => e.find(selector),
            Self::Missing(m) => m.find(selector),
        }
    }

    fn find_all(&self, selector: &str) -> Vec<ElementWrapper> {
        match self {
            Self::Element(e) => e.find_all(selector),
            Self::Missing(m) => m.find_all(selector),
        }
    }
}

/// Treat a selector error as "no match" for the infallible read APIs
pub(crate) fn matches_or_warn(result: MountResult<Vec<crate::dom::NodeId>>) -> Vec<crate::dom::NodeId> {
    match result {
        Ok(nodes) => nodes,
        Err(err) => {
            if let MountError::InvalidSelector { selector, message } = &err {
                tracing::warn!(selector = selector.as_str(), "{message}; treating as no match");
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_display() {
        assert_eq!(Descriptor::Selector("#a".into()).to_string(), "#a");
        assert_eq!(Descriptor::Component("Foo".into()).to_string(), "component Foo");
    }

    #[tokio::test]
    async fn missing_found_fails_interactions() {
        let found = Found::Missing(NotFoundWrapper::new(Descriptor::Selector("#nope".into())));
        assert!(!found.exists());
        assert!(found.is_missing());
        let err = found.set_value("x").await.unwrap_err();
        assert_eq!(
            err,
            MountError::NotFound {
                descriptor: Descriptor::Selector("#nope".into()),
                operation: "set_value".into(),
            }
        );
        assert!(found.trigger("click").await.is_err());
        assert!(found.value().is_err());
        assert!(found.into_element().is_err());
    }
}
