// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end behavior of inflated documents.

use std::rc::Rc;

use understory_component::{ComponentType, CoreComponent, Document, PropertyKey, RootConfig};
use understory_object::{Metrics, Object};

fn inflate(json: &str, payload: &Object) -> Document {
    Document::inflate(json, payload, RootConfig::new(Metrics::new(400.0, 600.0)))
        .expect("document inflates")
}

#[test]
fn bound_text_follows_its_data() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "parameters": ["a"],
                "item": {"type": "Text", "id": "sum", "text": "${a+1}"}
            }
        }"#,
        &Object::from(1),
    );
    let text = document.find_component_by_id("sum").unwrap();
    assert_eq!(text.get_calculated(PropertyKey::Text), Object::from("2"));
    assert!(text.has_upstream(PropertyKey::Text));
    assert!(text.dirty_properties().is_empty(), "inflation leaves nothing dirty");

    assert!(document.update_data("a", Object::from(5)));
    assert_eq!(text.get_calculated(PropertyKey::Text), Object::from("6"));
    assert_eq!(text.dirty_properties(), [PropertyKey::Text, PropertyKey::VisualHash]);

    let dirty = document.dirty_components();
    assert_eq!(dirty.len(), 1);
    assert!(Rc::ptr_eq(&dirty[0], &text));
    assert_eq!(text.serialize_dirty()["text"], "6");
    assert!(document.dirty_components().is_empty());
}

#[test]
fn writing_the_same_value_leaves_nothing_dirty() {
    let document = inflate(
        r#"{"mainTemplate": {"item": {"type": "Text", "id": "t", "text": "same"}}}"#,
        &Object::Null,
    );
    let text = document.find_component_by_id("t").unwrap();
    assert!(text.set_property(PropertyKey::Text, Object::from("same")));
    assert!(text.dirty_properties().is_empty());
    assert!(document.dirty_components().is_empty());
}

#[test]
fn direct_writes_cut_the_binding() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "parameters": ["a"],
                "item": {"type": "Text", "id": "t", "text": "${a}"}
            }
        }"#,
        &Object::from("bound"),
    );
    let text = document.find_component_by_id("t").unwrap();
    assert!(text.set_property(PropertyKey::Text, Object::from("manual")));
    assert!(!text.has_upstream(PropertyKey::Text));
    document.update_data("a", Object::from("ignored"));
    assert_eq!(text.get_calculated(PropertyKey::Text), Object::from("manual"));
}

#[test]
fn opacity_binding_controls_display() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "parameters": ["checked"],
                "item": {
                    "type": "Container", "id": "parent",
                    "items": [
                        {"type": "Frame", "id": "shown", "height": 10},
                        {"type": "Frame", "id": "toggled", "height": 10, "opacity": "${checked ? 1 : 0}"}
                    ]
                }
            }
        }"#,
        &Object::from(false),
    );
    document.layout();
    let parent = document.find_component_by_id("parent").unwrap();
    let toggled = document.find_component_by_id("toggled").unwrap();
    assert!(!toggled.is_displayable());
    assert_eq!(parent.displayed_child_count(), 1);
    assert!(!parent.is_displayed_children_stale());

    assert!(document.update_data("checked", Object::from(true)));
    assert!(toggled.is_displayable());
    assert!(parent.is_displayed_children_stale());
    assert_eq!(parent.displayed_child_count(), 2);
    assert_eq!(parent.displayed_child_at(1).unwrap().id(), "toggled");
}

const FOCUS_DOC: &str = r#"{
    "mainTemplate": {
        "item": {
            "type": "Container",
            "items": [
                {"type": "TouchWrapper", "id": "first", "item": {"type": "Frame"}},
                {"type": "Frame", "id": "box", "item": {"type": "TouchWrapper", "id": "second", "item": {"type": "Frame"}}},
                {"type": "TouchWrapper", "id": "third", "disabled": true, "item": {"type": "Frame"}}
            ]
        }
    }
}"#;

#[test]
fn removing_the_focused_component_moves_focus_forward() {
    let document = inflate(FOCUS_DOC, &Object::Null);
    let first = document.find_component_by_id("first").unwrap();
    let second = document.find_component_by_id("second").unwrap();
    assert!(document.set_focus(&second));
    assert!(second.is_focused());

    let holder = document.find_component_by_id("box").unwrap();
    assert!(holder.remove());
    let focused = document.focused().unwrap();
    assert!(Rc::ptr_eq(&focused, &first), "disabled components are skipped");
    assert!(first.is_focused());
    assert!(!second.is_focused());
}

#[test]
fn removing_the_last_focusable_component_clears_focus() {
    let document = inflate(FOCUS_DOC, &Object::Null);
    let first = document.find_component_by_id("first").unwrap();
    let second = document.find_component_by_id("second").unwrap();
    second.release();
    assert!(document.set_focus(&first));
    assert!(first.remove());
    assert!(document.focused().is_none());
    assert!(!first.is_focused());

    let third = document.find_component_by_id("third").unwrap();
    assert!(!document.set_focus(&third), "disabled components cannot take focus");
}

#[test]
fn focus_next_walks_tab_order() {
    let document = inflate(FOCUS_DOC, &Object::Null);
    assert_eq!(document.focus_next().unwrap().id(), "first");
    assert_eq!(document.focus_next().unwrap().id(), "second");
    assert_eq!(document.focus_next().unwrap().id(), "first");
    document.clear_focus();
    assert!(document.focused().is_none());
}

#[test]
fn children_changes_reach_the_handler() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "item": {
                    "type": "Container", "id": "list",
                    "items": [
                        {"type": "Text", "id": "a", "text": "a"},
                        {"type": "Text", "id": "b", "text": "b"},
                        {"type": "Text", "id": "log", "text": "none"}
                    ],
                    "onChildrenChanged": [
                        {"type": "SetValue", "componentId": "log", "property": "text", "value": "${event.changes[0].action}:${event.changes[0].index}"}
                    ]
                }
            }
        }"#,
        &Object::Null,
    );
    let list = document.find_component_by_id("list").unwrap();
    let a = document.find_component_by_id("a").unwrap();
    assert!(list.remove_child(&a));
    document.process_children_changes();
    let log = document.find_component_by_id("log").unwrap();
    assert_eq!(log.get_calculated(PropertyKey::Text), Object::from("remove:0"));
    assert!(list.take_children_changes().is_empty());
}

#[test]
fn children_are_limited_by_type() {
    let document = inflate(
        r#"{"mainTemplate": {"item": {"type": "Frame", "item": {"type": "Text"}}}}"#,
        &Object::Null,
    );
    let frame = document.top();
    assert_eq!(frame.component_type(), ComponentType::Frame);
    let child = frame.child_at(0).unwrap();
    assert!(child.remove());
    assert!(frame.insert_child(&child, 0));
    let other = document.top().child_at(0).unwrap();
    assert!(!frame.insert_child(&other, 1), "already attached");
}

#[test]
fn released_components_are_unreachable() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "item": {"type": "Container", "items": [{"type": "Text", "id": "gone", "text": "x"}]}
            }
        }"#,
        &Object::Null,
    );
    let gone = document.find_component_by_id("gone").unwrap();
    let uid = gone.uid();
    gone.release();
    assert!(gone.is_released());
    assert!(gone.parent().is_none());
    assert_eq!(document.top().child_count(), 0);
    assert!(document.find_component_by_uid(uid).is_none());
    assert!(document.find_component_by_id("gone").is_none());
}

fn text_of(document: &Document, id: &str) -> Object {
    document
        .find_component_by_id(id)
        .map(|c: Rc<CoreComponent>| c.get_calculated(PropertyKey::Text))
        .unwrap_or_default()
}

#[test]
fn styles_follow_state() {
    let document = inflate(
        r##"{
            "styles": {
                "base": {"values": {"opacity": 0.5}},
                "button": {
                    "extend": "base",
                    "values": [
                        {"color": "#ff0000"},
                        {"when": "${state.disabled}", "color": "#00ff00"}
                    ]
                }
            },
            "mainTemplate": {
                "item": {"type": "Text", "id": "t", "style": "button", "text": "styled"}
            }
        }"##,
        &Object::Null,
    );
    let text = document.top();
    assert_eq!(text_of(&document, "t"), Object::from("styled"));
    assert_eq!(text.get_calculated(PropertyKey::Opacity), Object::from(0.5));
    let red = Object::from("#ff0000").as_color();
    assert_eq!(text.get_calculated(PropertyKey::Color), Object::from(red));
    assert!(text.set_property(PropertyKey::Disabled, Object::from(true)));
    let green = Object::from("#00ff00").as_color();
    assert_eq!(text.get_calculated(PropertyKey::Color), Object::from(green));
}

#[test]
fn focus_skips_scrolling_containers() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "item": {
                    "type": "Container",
                    "items": [
                        {"type": "ScrollView", "id": "scroller", "item": {"type": "TouchWrapper", "id": "inner", "item": {"type": "Frame"}}},
                        {"type": "Sequence", "id": "list", "items": [{"type": "EditText", "id": "field"}]}
                    ]
                }
            }
        }"#,
        &Object::Null,
    );
    let scroller = document.find_component_by_id("scroller").unwrap();
    assert!(!scroller.is_focusable());
    assert!(!document.set_focus(&scroller));
    assert_eq!(document.focus_next().unwrap().id(), "inner");
    assert_eq!(document.focus_next().unwrap().id(), "field");
    assert_eq!(document.focus_next().unwrap().id(), "inner");
}

const LIST_DOC: &str = r#"{
    "mainTemplate": {
        "item": {
            "type": "Container",
            "items": [{
                "type": "Sequence", "id": "list", "height": 120,
                "items": [
                    {"type": "Frame", "id": "f0", "height": 50},
                    {"type": "Frame", "id": "f1", "height": 50},
                    {"type": "Frame", "id": "f2", "height": 50},
                    {"type": "Frame", "id": "f3", "height": 50},
                    {"type": "Frame", "id": "f4", "height": 50}
                ]
            }]
        }
    }
}"#;

fn displayed_ids(component: &CoreComponent) -> Vec<String> {
    component
        .displayed_children()
        .iter()
        .map(|child| child.id().to_owned())
        .collect()
}

#[test]
fn scrolling_changes_the_displayed_children() {
    let document = inflate(LIST_DOC, &Object::Null);
    document.layout();
    let list = document.find_component_by_id("list").unwrap();
    assert_eq!(list.displayed_child_count(), 3);
    assert_eq!(displayed_ids(&list), ["f0", "f1", "f2"]);

    // f2 ends exactly at the top of the viewport [150, 270] and is not displayed.
    assert!(list.scroll_to(150.0));
    assert_eq!(list.displayed_child_count(), 2);
    assert_eq!(displayed_ids(&list), ["f3", "f4"]);

    assert!(list.scroll_to(149.0));
    assert_eq!(displayed_ids(&list), ["f2", "f3", "f4"]);

    assert!(list.scroll_to(0.0));
    assert_eq!(list.displayed_child_count(), 3);
    assert_eq!(displayed_ids(&list), ["f0", "f1", "f2"]);
}

#[test]
fn scroll_writes_before_layout_wait_for_it() {
    let document = inflate(LIST_DOC, &Object::Null);
    let list = document.find_component_by_id("list").unwrap();
    assert!(list.scroll_to(150.0));
    assert_eq!(list.get_calculated(PropertyKey::ScrollPosition), Object::from(0.0));

    document.layout();
    assert_eq!(list.get_calculated(PropertyKey::ScrollPosition), Object::from(150.0));
    assert_eq!(displayed_ids(&list), ["f3", "f4"]);

    assert!(list.scroll_to(50.0));
    assert_eq!(list.get_calculated(PropertyKey::ScrollPosition), Object::from(50.0));
}

#[test]
fn nested_bindings_in_entities_stay_live() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "parameters": ["a"],
                "item": {
                    "type": "Frame", "id": "f",
                    "entities": ["${a}", 2],
                    "padding": ["${a}"]
                }
            }
        }"#,
        &Object::from(1),
    );
    let frame = document.find_component_by_id("f").unwrap();
    let entities = |value: i32| Object::from(vec![Object::from(value), Object::from(2)]);
    assert_eq!(frame.get_calculated(PropertyKey::Entities), entities(1));
    assert!(frame.has_upstream(PropertyKey::Entities));

    assert!(document.update_data("a", Object::from(7)));
    assert_eq!(frame.get_calculated(PropertyKey::Entities), entities(7));
    assert!(frame.dirty_properties().contains(&PropertyKey::Entities));

    // Padding arrays are evaluated once.
    assert!(!frame.has_upstream(PropertyKey::Padding));
    assert_eq!(
        frame.get_calculated(PropertyKey::Padding),
        Object::from(vec![Object::from(1)])
    );
}

fn inner_bounds(component: &CoreComponent) -> kurbo::Rect {
    match component.get_calculated(PropertyKey::InnerBounds) {
        Object::Rect(rect) => rect,
        other => panic!("inner bounds missing: {other}"),
    }
}

#[test]
fn padding_array_fills_the_sides() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "item": {
                    "type": "Container",
                    "items": [
                        {"type": "Frame", "id": "pair", "width": 100, "height": 100, "padding": [10, 20]},
                        {"type": "Frame", "id": "mixed", "width": 100, "height": 100, "padding": [10, 10, 10, 10], "paddingTop": 0}
                    ]
                }
            }
        }"#,
        &Object::Null,
    );
    document.layout();
    let pair = document.find_component_by_id("pair").unwrap();
    let mixed = document.find_component_by_id("mixed").unwrap();
    assert_eq!(inner_bounds(&pair), kurbo::Rect::new(10.0, 20.0, 100.0, 100.0));
    assert_eq!(inner_bounds(&mixed), kurbo::Rect::new(10.0, 0.0, 90.0, 90.0));

    assert!(pair.set_property(PropertyKey::Padding, Object::from(vec![Object::from(5)])));
    document.layout();
    assert_eq!(inner_bounds(&pair), kurbo::Rect::new(5.0, 0.0, 100.0, 100.0));
}

#[test]
fn row_baselines_line_up() {
    let document = inflate(
        r#"{
            "mainTemplate": {
                "item": {
                    "type": "Container", "direction": "row", "alignItems": "baseline",
                    "items": [
                        {"type": "Text", "id": "small", "text": "a", "fontSize": 20},
                        {"type": "Text", "id": "large", "text": "b", "fontSize": 40},
                        {"type": "Frame", "id": "box", "width": 10, "height": 10, "alignSelf": "start"}
                    ]
                }
            }
        }"#,
        &Object::Null,
    );
    document.layout();
    let small = document.find_component_by_id("small").unwrap();
    let large = document.find_component_by_id("large").unwrap();
    let frame = document.find_component_by_id("box").unwrap();
    assert_eq!(small.bounds().height(), 25.0);
    assert_eq!(large.bounds().height(), 50.0);
    // Baselines sit one font size below the top of each line box.
    assert_eq!(small.bounds().y0 + 20.0, large.bounds().y0 + 40.0);
    assert_eq!(large.bounds().y0, 0.0);
    assert_eq!(frame.bounds().y0, 0.0);
}
