//! Null-object wrapper returned when a query matches nothing.

use std::collections::BTreeMap;

use super::{Descriptor, ElementWrapper, Found, WrapperApi};
use crate::result::MountError;

/// Sentinel carrying the query that failed. Reads are empty; it has no
/// interactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundWrapper {
    descriptor: Descriptor,
}

impl NotFoundWrapper {
    /// Sentinel for a failed query
    #[must_use]
    pub fn new(descriptor: Descriptor) -> Self {
        Self { descriptor }
    }

    /// What was searched for
    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Error raised when a match was demanded
    #[must_use]
    pub fn error(&self) -> MountError {
        self.error_for("into_element")
    }

    pub(crate) fn error_for(&self, operation: &str) -> MountError {
        MountError::NotFound {
            descriptor: self.descriptor.clone(),
            operation: operation.to_string(),
        }
    }
}

impl WrapperApi for NotFoundWrapper {
    fn exists(&self) -> bool {
        false
    }

    fn text(&self) -> String {
        String::new()
    }

    fn html(&self) -> String {
        String::new()
    }

    fn classes(&self) -> Vec<String> {
        Vec::new()
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn find(&self, _selector: &str) -> Found {
        Found::Missing(self.clone())
    }

    fn find_all(&self, _selector: &str) -> Vec<ElementWrapper> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_empty() {
        let missing = NotFoundWrapper::new(Descriptor::Selector(".gone".into()));
        assert!(!missing.exists());
        assert_eq!(missing.text(), "");
        assert_eq!(missing.html(), "");
        assert!(missing.classes().is_empty());
        assert!(!missing.has_class("gone"));
        assert!(missing.attributes().is_empty());
        assert_eq!(missing.attribute("id"), None);
        assert!(missing.find_all("div").is_empty());
    }

    #[test]
    fn find_keeps_original_descriptor() {
        let missing = NotFoundWrapper::new(Descriptor::Selector(".gone".into()));
        match missing.find("span") {
            Found::Missing(inner) => assert_eq!(inner.descriptor(), &Descriptor::Selector(".gone".into())),
            Found::Element(_) => panic!("expected a missing wrapper"),
        }
    }

    #[test]
    fn error_references_descriptor() {
        let missing = NotFoundWrapper::new(Descriptor::Component("Foo".into()));
        let message = missing.error().to_string();
        assert!(message.contains("component Foo"), "{message}");
    }
}
