//! Integration tests for element interactions
//!
//! Drives form controls through mounted components and checks both the
//! events delivered to listeners and the re-rendered markup.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mount_probe::{h, mount, Component, ComponentDef, MountError, MountingOptions, WrapperApi};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value};

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (Rc::clone(&count), count)
}

// ============================================================================
// set_checked
// ============================================================================

#[tokio::test]
async fn test_unchecking_radio_is_an_error() {
    let form = Component::named("Form")
        .render(|_| h("input").attr("type", "radio").attr("name", "pick").into())
        .build();
    let wrapper = mount(&form, MountingOptions::new());
    let radio = wrapper.get("input").unwrap();
    let err = radio.set_checked(false).await.unwrap_err();
    assert!(err.is_usage_error());
    assert!(err.to_string().contains("radio"), "{err}");
}

#[tokio::test]
async fn test_set_checked_on_checked_box_dispatches_nothing() {
    let (calls, seen) = counter();
    let form = Component::named("Form")
        .render(move |_| {
            let calls = Rc::clone(&calls);
            h("input")
                .attr("type", "checkbox")
                .checked(true)
                .on("change", move |_| calls.set(calls.get() + 1))
                .into()
        })
        .build();
    let wrapper = mount(&form, MountingOptions::new());
    let checkbox = wrapper.get("input").unwrap();
    assert!(checkbox.is_checked());

    checkbox.set_checked(true).await.unwrap();
    assert_eq!(seen.get(), 0);

    checkbox.set_checked(false).await.unwrap();
    assert_eq!(seen.get(), 1);
    assert!(!checkbox.is_checked());
}

#[tokio::test]
async fn test_set_checked_requires_input() {
    let form = Component::named("Form").render(|_| h("div").into()).build();
    let wrapper = mount(&form, MountingOptions::new());
    let err = wrapper.get("div").unwrap().set_checked(true).await.unwrap_err();
    assert_eq!(
        err,
        MountError::Interaction {
            operation: "set_checked".to_string(),
            message: "You need to call set_checked on an input element. You called it on a DIV".to_string(),
        }
    );
}

#[tokio::test]
async fn test_checking_radio_unchecks_its_group() {
    let form = Component::named("Form")
        .render(|_| {
            h("form")
                .child(h("input").attr("type", "radio").attr("name", "size").id("small").checked(true))
                .child(h("input").attr("type", "radio").attr("name", "size").id("large"))
                .into()
        })
        .build();
    let wrapper = mount(&form, MountingOptions::new());
    wrapper.get("#large").unwrap().set_checked(true).await.unwrap();
    assert!(wrapper.get("#large").unwrap().is_checked());
    assert!(!wrapper.get("#small").unwrap().is_checked());
}

// ============================================================================
// set_value and set_selected
// ============================================================================

fn bound_input() -> ComponentDef {
    Component::named("Bound")
        .state("text", "")
        .render(|ctx| {
            let handle = ctx.handle().clone();
            let current = ctx
                .state_field("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            h("div")
                .child(
                    h("input")
                        .value(current.clone())
                        .on("input", move |event| handle.set_field("text", event.value.clone())),
                )
                .child(h("p").text(current))
                .into()
        })
        .build()
}

#[tokio::test]
async fn test_set_value_dispatches_input_and_rerenders() {
    let wrapper = mount(&bound_input(), MountingOptions::new());
    let input = wrapper.find("input");
    input.set_value("hello").await.unwrap();
    assert_eq!(input.value().unwrap(), "hello");
    assert_eq!(wrapper.find("p").text(), "hello");
}

#[tokio::test]
async fn test_set_value_on_missing_element_names_operation() {
    let wrapper = mount(&bound_input(), MountingOptions::new());
    let err = wrapper.find("textarea").set_value("x").await.unwrap_err();
    assert!(matches!(err, MountError::NotFound { ref operation, .. } if operation == "set_value"));
}

#[tokio::test]
async fn test_set_value_rejects_non_form_elements() {
    let wrapper = mount(&bound_input(), MountingOptions::new());
    let err = wrapper.get("p").unwrap().set_value("x").await.unwrap_err();
    assert_eq!(err.to_string(), "wrapper.set_value() failed: set_value() cannot be called on a <p> element");
}

fn select_form(log: Rc<RefCell<Vec<String>>>) -> ComponentDef {
    Component::named("Picker")
        .render(move |_| {
            let log = Rc::clone(&log);
            h("select")
                .on("change", move |event| log.borrow_mut().push(event.value.clone()))
                .child(h("option").attr("value", "a").text("A"))
                .child(
                    h("optgroup")
                        .attr("label", "more")
                        .child(h("option").attr("value", "b").text("B"))
                        .child(h("option").attr("value", "c").text("C")),
                )
                .into()
        })
        .build()
}

#[tokio::test]
async fn test_selecting_option_in_optgroup_fires_change_on_select() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let wrapper = mount(&select_form(Rc::clone(&log)), MountingOptions::new());

    let option = wrapper.get("option[value=c]").unwrap();
    option.set_selected().await.unwrap();
    assert!(option.is_selected());
    assert_eq!(*log.borrow(), vec!["c".to_string()]);

    // Selecting the same option again is a no-op.
    option.set_selected().await.unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[tokio::test]
async fn test_selecting_implicit_first_option_dispatches_nothing() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let wrapper = mount(&select_form(Rc::clone(&log)), MountingOptions::new());
    assert_eq!(wrapper.get("select").unwrap().value(), "a");

    let first = wrapper.get("option[value=a]").unwrap();
    assert!(first.is_selected());
    first.set_selected().await.unwrap();
    assert!(log.borrow().is_empty());
}

#[tokio::test]
async fn test_set_value_on_select_picks_matching_option() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let wrapper = mount(&select_form(Rc::clone(&log)), MountingOptions::new());
    let select = wrapper.get("select").unwrap();
    select.set_value("b").await.unwrap();
    assert_eq!(select.value(), "b");
    assert!(wrapper.get("option[value=b]").unwrap().is_selected());
    assert_eq!(*log.borrow(), vec!["b".to_string()]);
}

#[tokio::test]
async fn test_set_selected_on_select_is_an_error() {
    let wrapper = mount(&select_form(Rc::new(RefCell::new(Vec::new()))), MountingOptions::new());
    let err = wrapper.get("select").unwrap().set_selected().await.unwrap_err();
    assert!(err.to_string().contains("Call it on one of its options"), "{err}");
}

// ============================================================================
// trigger
// ============================================================================

#[tokio::test]
async fn test_disabled_input_still_receives_input_event() {
    let (calls, seen) = counter();
    let form = Component::named("Form")
        .render(move |_| {
            let calls = Rc::clone(&calls);
            h("input")
                .attr("disabled", "")
                .on("input", move |_| calls.set(calls.get() + 1))
                .into()
        })
        .build();
    let wrapper = mount(&form, MountingOptions::new());
    let input = wrapper.get("input").unwrap();
    input.set_value("typed").await.unwrap();
    assert_eq!(input.value(), "typed");
    assert_eq!(seen.get(), 1);

    wrapper.find("input").trigger("input").await.unwrap();
    assert_eq!(seen.get(), 2);
}

#[tokio::test]
async fn test_trigger_flushes_state_updates() {
    let clicker = Component::named("Clicker")
        .state("count", 0)
        .render(|ctx| {
            let handle = ctx.handle().clone();
            let count = ctx.state_field("count").and_then(Value::as_i64).unwrap_or_default();
            h("button")
                .on("click", move |_| {
                    let next = handle.state()["count"].as_i64().unwrap_or_default() + 1;
                    handle.set_field("count", next);
                })
                .text(count.to_string())
                .into()
        })
        .build();
    let wrapper = mount(&clicker, MountingOptions::new());
    let button = wrapper.get("button").unwrap();
    button.trigger("click").await.unwrap();
    button.trigger("click").await.unwrap();
    assert_eq!(wrapper.text(), "2");
}

// ============================================================================
// Props
// ============================================================================

#[tokio::test]
async fn test_set_props_rerenders_in_place() {
    let label = Component::named("Label")
        .props(&["text"])
        .render(|ctx| h("span").text(ctx.prop_str("text").unwrap_or_default()).into())
        .build();
    let wrapper = mount(&label, MountingOptions::new().with_prop("text", "before"));
    let span = wrapper.get("span").unwrap();

    let mut props = Map::new();
    props.insert("text".to_string(), Value::from("after"));
    wrapper.set_props(props).await.unwrap();

    assert_eq!(wrapper.html(), "<span>after</span>");
    assert!(span.is_connected());
    assert_eq!(span.text(), "after");
}

#[test]
fn test_visibility_follows_hidden_ancestors() {
    let panel = Component::named("Panel")
        .render(|_| {
            h("div")
                .child(h("section").attr("style", "display: none").child(h("p").id("inner")))
                .child(h("p").id("outer"))
                .into()
        })
        .build();
    let wrapper = mount(&panel, MountingOptions::new());
    assert!(!wrapper.get("#inner").unwrap().is_visible());
    assert!(wrapper.get("#outer").unwrap().is_visible());
}

#[test]
fn test_find_all_returns_document_order() {
    let list = Component::named("List")
        .render(|_| {
            h("ul")
                .child(h("li").class("item").text("one"))
                .child(h("li").class("item").text("two"))
                .child(h("li").text("three"))
                .into()
        })
        .build();
    let wrapper = mount(&list, MountingOptions::new());
    let texts: Vec<String> = wrapper.find_all("li.item").iter().map(WrapperApi::text).collect();
    assert_eq!(texts, vec!["one".to_string(), "two".to_string()]);
    assert!(!wrapper.find(".missing").exists());
    assert_eq!(wrapper.find_all("li:not(.item)").len(), 1);
}
