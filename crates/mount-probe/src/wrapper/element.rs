//! Wrapper over a single rendered node.
//!
//! The wrapper holds the app and a [`NodeId`], so every read goes to the live
//! tree: a re-render that patches the node is visible through wrappers taken
//! before it.

use std::cell::Ref;
use std::collections::BTreeMap;
use std::fmt;

use super::{matches_or_warn, Descriptor, Found, NotFoundWrapper, WrapperApi};
use crate::dom::{Document, NodeId};
use crate::result::{MountError, MountResult};
use crate::runtime::{next_tick, App};

/// Wraps exactly one rendered node
#[derive(Clone)]
pub struct ElementWrapper {
    app: App,
    node: NodeId,
}

impl fmt::Debug for ElementWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementWrapper")
            .field("node", &self.node)
            .field("html", &self.html())
            .finish()
    }
}

impl PartialEq for ElementWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.app.id() == other.app.id() && self.node == other.node
    }
}

impl ElementWrapper {
    /// Wrap a node of `app`'s tree
    #[must_use]
    pub fn new(app: App, node: NodeId) -> Self {
        Self { app, node }
    }

    /// The wrapped node
    #[must_use]
    pub fn element_id(&self) -> NodeId {
        self.node
    }

    fn with_doc<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let tree = self.app.document();
        let doc: Ref<'_, Document> = tree.borrow();
        f(&doc)
    }

    fn wrap_all(&self, nodes: Vec<NodeId>) -> Vec<Self> {
        nodes
            .into_iter()
            .map(|node| Self::new(self.app.clone(), node))
            .collect()
    }

    /// Lower-cased tag name; empty for text nodes
    #[must_use]
    pub fn tag_name(&self) -> String {
        self.with_doc(|doc| doc.tag_name(self.node).unwrap_or_default().to_string())
    }

    /// `value` property
    #[must_use]
    pub fn value(&self) -> String {
        self.with_doc(|doc| doc.value(self.node))
    }

    /// `checked` property
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.with_doc(|doc| doc.is_checked(self.node))
    }

    /// `selected` property
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.with_doc(|doc| doc.is_selected(self.node))
    }

    /// True while the node is attached under the mount container
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.with_doc(|doc| doc.is_connected(self.node))
    }

    /// False when the node or an ancestor is hidden with `display: none` or
    /// the `hidden` attribute
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.with_doc(|doc| {
            let mut cursor = Some(self.node);
            while let Some(node) = cursor {
                if doc.attribute(node, "hidden").is_some() {
                    return false;
                }
                if doc
                    .attribute(node, "style")
                    .is_some_and(|style| hides_element(&style))
                {
                    return false;
                }
                cursor = doc.parent_element(node);
            }
            doc.is_connected(self.node)
        })
    }

    /// Like [`WrapperApi::find`], but a missing match or an invalid selector
    /// is an error
    pub fn get(&self, selector: &str) -> MountResult<Self> {
        let found = self.with_doc(|doc| doc.query_selector(self.node, selector))?;
        found
            .map(|node| Self::new(self.app.clone(), node))
            .ok_or_else(|| NotFoundWrapper::new(Descriptor::Selector(selector.to_string())).error_for("get"))
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Set the `checked` state of an input and dispatch `change`.
    ///
    /// Unchecking a radio is an error. Setting the current state again is a
    /// no-op and dispatches nothing.
    pub async fn set_checked(&self, checked: bool) -> MountResult<()> {
        let (tag, kind, current) = self.with_doc(|doc| {
            (
                doc.tag_name(self.node).unwrap_or_default().to_string(),
                doc.attribute(self.node, "type").unwrap_or_default(),
                doc.is_checked(self.node),
            )
        });
        if tag != "input" {
            return Err(MountError::interaction(
                "set_checked",
                format!(
                    "You need to call set_checked on an input element. You called it on a {}",
                    tag.to_uppercase()
                ),
            ));
        }
        if kind == "radio" && !checked {
            return Err(MountError::interaction(
                "set_checked",
                "set_checked(false) cannot be called on an <input type=\"radio\"> element",
            ));
        }
        if current == checked {
            next_tick(&self.app).await;
            return Ok(());
        }
        self.app
            .document()
            .borrow_mut()
            .set_checked(self.node, checked);
        self.trigger("change").await
    }

    /// Set the value of a form control the way a user would.
    ///
    /// - `option`: [`ElementWrapper::set_selected`]
    /// - checkbox or radio `input`: `set_checked(true)`
    /// - other `input` and `textarea`: assign, dispatch `input`
    /// - `select`: select the matching option, dispatch `change`
    pub async fn set_value(&self, value: &str) -> MountResult<()> {
        let (tag, kind) = self.with_doc(|doc| {
            (
                doc.tag_name(self.node).unwrap_or_default().to_string(),
                doc.attribute(self.node, "type").unwrap_or_default(),
            )
        });
        match tag.as_str() {
            "option" => self.set_selected().await,
            "input" if kind == "checkbox" || kind == "radio" => self.set_checked(true).await,
            "input" | "textarea" | "select" => {
                self.app.document().borrow_mut().set_value(self.node, value);
                let event = if tag == "select" { "change" } else { "input" };
                self.trigger(event).await
            }
            _ => Err(MountError::interaction(
                "set_value",
                format!("set_value() cannot be called on a <{tag}> element"),
            )),
        }
    }

    /// Select an option and dispatch `change` on its `select`, looking past
    /// an `optgroup`. Already selected options are left alone.
    pub async fn set_selected(&self) -> MountResult<()> {
        let (tag, selected, target) = self.with_doc(|doc| {
            (
                doc.tag_name(self.node).unwrap_or_default().to_string(),
                doc.is_selected(self.node),
                doc.owning_select(self.node)
                    .or_else(|| doc.parent_element(self.node)),
            )
        });
        match tag.as_str() {
            "select" => {
                return Err(MountError::interaction(
                    "set_selected",
                    "set_selected() cannot be called on select. Call it on one of its options",
                ))
            }
            "option" => {}
            other => {
                return Err(MountError::interaction(
                    "set_selected",
                    format!("set_selected() must be called on an option element, not <{other}>"),
                ))
            }
        }
        if selected {
            next_tick(&self.app).await;
            return Ok(());
        }
        self.app
            .document()
            .borrow_mut()
            .set_selected(self.node, true);
        match target {
            Some(select) => Self::new(self.app.clone(), select).trigger("change").await,
            None => {
                next_tick(&self.app).await;
                Ok(())
            }
        }
    }

    /// Dispatch a non-bubbling event on the node, then flush pending updates
    pub async fn trigger(&self, event: &str) -> MountResult<()> {
        self.app.dispatch(self.node, event);
        next_tick(&self.app).await;
        Ok(())
    }
}

fn hides_element(style: &str) -> bool {
    style.split(';').any(|declaration| {
        let mut parts = declaration.splitn(2, ':');
        let property = parts.next().unwrap_or_default().trim();
        let value = parts.next().unwrap_or_default().trim();
        property.eq_ignore_ascii_case("display") && value.eq_ignore_ascii_case("none")
    })
}

impl WrapperApi for ElementWrapper {
    fn exists(&self) -> bool {
        true
    }

    fn text(&self) -> String {
        self.with_doc(|doc| doc.text_content(self.node).trim().to_string())
    }

    fn html(&self) -> String {
        self.with_doc(|doc| doc.outer_html(self.node))
    }

    fn classes(&self) -> Vec<String> {
        self.with_doc(|doc| doc.classes(self.node))
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        self.with_doc(|doc| doc.attributes(self.node))
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.with_doc(|doc| doc.attribute(self.node, key))
    }

    fn find(&self, selector: &str) -> Found {
        let nodes = matches_or_warn(self.with_doc(|doc| doc.query_selector_all(self.node, selector)));
        match nodes.first() {
            Some(node) => Found::Element(Self::new(self.app.clone(), *node)),
            None => Found::Missing(NotFoundWrapper::new(Descriptor::Selector(selector.to_string()))),
        }
    }

    fn find_all(&self, selector: &str) -> Vec<ElementWrapper> {
        let nodes = matches_or_warn(self.with_doc(|doc| doc.query_selector_all(self.node, selector)));
        self.wrap_all(nodes)
    }
}
