//! Result and error types for mount-probe.

use thiserror::Error;

use crate::wrapper::Descriptor;

/// Result type for mount-probe operations
pub type MountResult<T> = Result<T, MountError>;

/// Errors that can occur while inspecting or driving a mounted tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    /// Interaction called on an incompatible element, or an invalid state
    /// transition was requested (e.g. unchecking a radio)
    #[error("wrapper.{operation}() failed: {message}")]
    Interaction {
        /// Operation that was attempted
        operation: String,
        /// Error message
        message: String,
    },

    /// Content or interaction demanded from a query that matched nothing
    #[error("Cannot call {operation} on an empty wrapper: {descriptor} does not exist")]
    NotFound {
        /// What was searched for
        descriptor: Descriptor,
        /// Operation that required a match
        operation: String,
    },

    /// Selector could not be parsed
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// Selector text
        selector: String,
        /// Error message
        message: String,
    },

    /// Operation called on a tree or instance that is no longer mounted
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },
}

impl MountError {
    pub(crate) fn interaction(operation: &str, message: impl Into<String>) -> Self {
        Self::Interaction {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_selector(selector: &str, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    /// True for errors caused by calling an interaction on the wrong kind of element
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Interaction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_error_names_operation() {
        let err = MountError::interaction("set_checked", "not an input");
        assert_eq!(err.to_string(), "wrapper.set_checked() failed: not an input");
        assert!(err.is_usage_error());
    }

    #[test]
    fn not_found_error_references_descriptor() {
        let err = MountError::NotFound {
            descriptor: Descriptor::Selector("#missing".to_string()),
            operation: "set_value".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("#missing"));
        assert!(message.contains("set_value"));
        assert!(!err.is_usage_error());
    }

    #[test]
    fn invalid_selector_display() {
        let err = MountError::invalid_selector("div[", "unterminated attribute");
        assert_eq!(
            err.to_string(),
            "Invalid selector 'div[': unterminated attribute"
        );
    }
}
