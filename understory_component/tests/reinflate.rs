// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Re-inflation and host text fields.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use understory_component::{
    ChangedCallback, Document, EditText, EditTextFactory, FocusCallback, PropertyKey, RootConfig,
    SubmitCallback,
};
use understory_object::{Metrics, Object};

const PRESERVING: &str = r#"{
    "mainTemplate": {
        "parameters": ["title"],
        "item": {
            "type": "Container", "id": "root",
            "bind": {"name": "counter", "value": 1},
            "preserve": ["counter"],
            "items": [
                {"type": "Text", "id": "label", "text": "default", "preserve": ["text"]},
                {"type": "Text", "id": "plain", "text": "default"},
                {"type": "Text", "id": "count", "text": "${counter}"},
                {"type": "Text", "id": "title", "text": "${title}"}
            ]
        }
    }
}"#;

fn text(document: &Document, id: &str) -> Object {
    document
        .find_component_by_id(id)
        .unwrap()
        .get_calculated(PropertyKey::Text)
}

#[test]
fn preserved_values_survive_reinflation() {
    let mut document =
        Document::inflate(PRESERVING, &Object::from("first"), RootConfig::default()).unwrap();
    let old_label = document.find_component_by_id("label").unwrap();
    assert!(old_label.set_property(PropertyKey::Text, Object::from("X")));
    let plain = document.find_component_by_id("plain").unwrap();
    assert!(plain.set_property(PropertyKey::Text, Object::from("Y")));
    assert!(document.top().set_property_by_name("counter", Object::from(7)));
    assert!(document.update_data("title", Object::from("second")));

    document
        .reinflate_with_config(RootConfig::new(Metrics::new(320.0, 480.0)))
        .unwrap();

    assert!(old_label.is_released());
    assert_eq!(text(&document, "label"), Object::from("X"));
    assert_eq!(text(&document, "plain"), Object::from("default"));
    assert_eq!(text(&document, "count"), Object::from("7"));
    assert_eq!(text(&document, "title"), Object::from("second"));
    assert_eq!(document.config().metrics().width, 320.0);

    // The preserved binding is still live in the new tree.
    assert!(document.top().set_property_by_name("counter", Object::from(8)));
    assert_eq!(text(&document, "count"), Object::from("8"));
}

#[derive(Debug, Default)]
struct Field {
    focused: Cell<Option<bool>>,
    released: Cell<bool>,
}

#[derive(Debug)]
struct FieldHandle(Rc<Field>);

impl EditText for FieldHandle {
    fn release(&self) {
        self.0.released.set(true);
    }

    fn set_focus(&self, focused: bool) {
        self.0.focused.set(Some(focused));
    }
}

#[derive(Default)]
struct Host {
    field: Rc<Field>,
    callbacks: RefCell<Option<(SubmitCallback, ChangedCallback, FocusCallback)>>,
}

impl core::fmt::Debug for Host {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Host").field("field", &self.field).finish_non_exhaustive()
    }
}

impl EditTextFactory for Host {
    fn create_edit_text(
        &self,
        submit: SubmitCallback,
        changed: ChangedCallback,
        focus: FocusCallback,
    ) -> Box<dyn EditText> {
        *self.callbacks.borrow_mut() = Some((submit, changed, focus));
        Box::new(FieldHandle(self.field.clone()))
    }
}

#[test]
fn host_fields_drive_their_component() {
    let host = Rc::new(Host::default());
    let document = Document::inflate(
        r#"{
            "mainTemplate": {
                "item": {
                    "type": "Container",
                    "items": [
                        {
                            "type": "EditText", "id": "input", "text": "",
                            "onTextChange": [{"type": "SetValue", "componentId": "echo", "property": "text", "value": "${event.source.text}"}],
                            "onSubmit": [{"type": "SetValue", "componentId": "echo", "property": "text", "value": "submitted"}]
                        },
                        {"type": "Text", "id": "echo", "text": ""}
                    ]
                }
            }
        }"#,
        &Object::Null,
        RootConfig::default().with_edit_text_factory(host.clone()),
    )
    .unwrap();
    let input = document.find_component_by_id("input").unwrap();
    let (submit, changed, focus) = host.callbacks.borrow().clone().unwrap();

    changed("hello");
    assert_eq!(input.get_calculated(PropertyKey::Text), Object::from("hello"));
    assert_eq!(text(&document, "echo"), Object::from("hello"));

    submit();
    assert_eq!(text(&document, "echo"), Object::from("submitted"));

    focus(true);
    assert!(input.is_focused());
    assert_eq!(host.field.focused.get(), None, "host focus is not echoed back");

    document.clear_focus();
    assert!(!input.is_focused());
    assert_eq!(host.field.focused.get(), Some(false));

    assert!(document.set_focus(&input));
    assert_eq!(host.field.focused.get(), Some(true));

    input.release();
    assert!(host.field.released.get());
    assert!(document.focused().is_none());
    changed("ignored");
    assert_eq!(text(&document, "echo"), Object::from("submitted"));
}
