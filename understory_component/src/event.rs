// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event handlers and the commands they run.
//!
//! A handler is a command array stored in a `Command` property such as `onPress`. It runs in
//! an event context: a child of the component's context holding an `event` constant whose
//! `source` is a read-only [`ComponentView`] of the component.

use std::rc::{Rc, Weak};

use understory_binding::{
    Context, property_as_boolean, property_as_recursive, property_as_string,
};
use understory_object::{Object, ObjectMap, ObjectView};

use crate::{ComponentType, CoreComponent, PropertyKey, StateFlags};

/// A read-only view of a component for expressions, e.g. `${event.source.text}`.
///
/// The view does not keep the component alive. Once it is gone every key reads as null and
/// the view has no keys.
#[derive(Debug)]
pub struct ComponentView {
    component: Weak<CoreComponent>,
}

impl ComponentView {
    /// A view of `component`.
    #[must_use]
    pub fn new(component: &Rc<CoreComponent>) -> Self {
        Self {
            component: Rc::downgrade(component),
        }
    }
}

impl ObjectView for ComponentView {
    fn get(&self, key: &str) -> Object {
        let Some(component) = self.component.upgrade() else {
            return Object::Null;
        };
        match key {
            "id" => Object::from(component.id()),
            "uid" => Object::from(component.uid().to_string()),
            "type" => Object::from(component.component_type().name()),
            "focused" => Object::from(component.is_focused()),
            "pressed" => Object::from(component.state().contains(StateFlags::PRESSED)),
            _ => PropertyKey::from_name(key)
                .map(|key| component.get_calculated(key))
                .unwrap_or_default(),
        }
    }

    fn keys(&self) -> Vec<String> {
        let Some(component) = self.component.upgrade() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = ["id", "uid", "type", "focused", "pressed"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        keys.extend(
            component
                .calculated()
                .into_iter()
                .map(|(key, _)| key.name().to_owned()),
        );
        keys
    }
}

impl CoreComponent {
    /// Searches this subtree for the first component with document id `id`.
    #[must_use]
    pub fn find_component_by_id(&self, id: &str) -> Option<Rc<Self>> {
        if id.is_empty() {
            return None;
        }
        let mut stack: Vec<Rc<Self>> = self.self_rc().into_iter().collect();
        while let Some(component) = stack.pop() {
            if component.id() == id {
                return Some(component);
            }
            stack.extend(component.children().into_iter().rev());
        }
        None
    }

    /// A child of this component's context holding `event`.
    #[must_use]
    pub fn create_event_context(&self, handler: &str, extras: ObjectMap) -> Rc<Context> {
        let context = Context::create_child(self.context());
        let mut event = extras;
        if let Some(this) = self.self_rc() {
            event.insert(
                "source".into(),
                Object::View(Rc::new(ComponentView::new(&this))),
            );
        }
        event.insert("handler".into(), Object::from(handler));
        context.put_constant("event", Object::from(event));
        context
    }

    /// Runs the command array stored in `key`. Returns `false` if there was nothing to run.
    pub fn execute_handler(&self, key: PropertyKey, extras: ObjectMap) -> bool {
        let commands = self.get_calculated(key).as_array();
        if commands.is_empty() {
            return false;
        }
        tracing::debug!(uid = self.uid(), handler = %key, count = commands.len(), "running handler");
        let context = self.create_event_context(key.name(), extras);
        for command in &commands {
            self.run_command(&context, command);
        }
        true
    }

    fn run_command(&self, context: &Context, command: &Object) {
        if !property_as_boolean(context, command, "when", true) {
            return;
        }
        let kind = property_as_string(context, command, "type", "");
        match kind.as_str() {
            "SetValue" => {
                let id = property_as_string(context, command, "componentId", "");
                let property = property_as_string(context, command, "property", "");
                let value = property_as_recursive(context, command, "value");
                let target = if id.is_empty() {
                    self.self_rc()
                } else {
                    self.doc
                        .top()
                        .and_then(|top| top.find_component_by_id(&id))
                };
                match target {
                    Some(target) => {
                        target.set_property_by_name(&property, value);
                    }
                    None => self.console(format!("Unable to find component '{id}'")),
                }
            }
            "Sequential" => {
                for nested in command.get("commands").as_array() {
                    self.run_command(context, &nested);
                }
            }
            "Idle" => {}
            other => self.console(format!("Unknown command type '{other}'")),
        }
    }

    /// Host press on a `TouchWrapper`. Disabled components ignore it.
    pub fn press(&self) -> bool {
        if self.component_type() != ComponentType::TouchWrapper
            || self.state().contains(StateFlags::DISABLED)
        {
            return false;
        }
        self.execute_handler(PropertyKey::OnPress, ObjectMap::new())
    }

    /// The host field was submitted.
    pub(crate) fn submit(&self) {
        if self.component_type() == ComponentType::EditText {
            self.execute_handler(PropertyKey::OnSubmit, ObjectMap::new());
        }
    }

    /// The user edited the host field.
    pub(crate) fn host_text_changed(&self, text: &str) {
        if self.component_type() != ComponentType::EditText {
            return;
        }
        let Some(def) = self.find_def(PropertyKey::Text) else {
            return;
        };
        self.remove_upstream(PropertyKey::Text);
        if self.handle_property_change(def, Object::from(text)) {
            self.execute_handler(PropertyKey::OnTextChange, ObjectMap::new());
        }
    }

    /// Runs `onMount` the first time the component is laid out.
    pub(crate) fn run_on_mount(&self) {
        if self.is_mounted() {
            return;
        }
        self.set_mounted();
        self.execute_handler(PropertyKey::OnMount, ObjectMap::new());
    }

    /// Delivers pending child changes to `onChildrenChanged` as `event.changes`.
    pub(crate) fn dispatch_children_changed(&self) {
        let changes = self.take_children_changes();
        if changes.is_empty() {
            return;
        }
        let mut extras = ObjectMap::new();
        extras.insert("changes".into(), Object::from(changes));
        self.execute_handler(PropertyKey::OnChildrenChanged, extras);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, RootConfig};

    const DOC: &str = r#"{
        "mainTemplate": {
            "item": {
                "type": "Container",
                "items": [
                    {
                        "type": "TouchWrapper", "id": "button",
                        "onPress": [
                            {"type": "SetValue", "componentId": "label", "property": "text", "value": "pressed ${event.source.id}"},
                            {"type": "SetValue", "when": false, "componentId": "label", "property": "opacity", "value": 0},
                            {"type": "Bogus"}
                        ],
                        "item": {"type": "Frame"}
                    },
                    {"type": "Text", "id": "label", "text": "idle"}
                ]
            }
        }
    }"#;

    #[test]
    fn press_runs_set_value() {
        let document = Document::inflate(DOC, &Object::Null, RootConfig::default()).unwrap();
        let button = document.find_component_by_id("button").unwrap();
        let label = document.find_component_by_id("label").unwrap();
        assert!(button.press());
        assert_eq!(label.get_calculated(PropertyKey::Text), Object::from("pressed button"));
        assert_eq!(label.get_calculated(PropertyKey::Opacity), Object::from(1.0));
        assert!(document.session().contains("Unknown command type 'Bogus'"));
    }

    #[test]
    fn disabled_wrappers_ignore_presses() {
        let document = Document::inflate(DOC, &Object::Null, RootConfig::default()).unwrap();
        let button = document.find_component_by_id("button").unwrap();
        assert!(button.set_property(PropertyKey::Disabled, Object::from(true)));
        assert!(!button.press());
    }

    #[test]
    fn views_degrade_once_the_component_is_gone() {
        let document = Document::inflate(DOC, &Object::Null, RootConfig::default()).unwrap();
        let label = document.find_component_by_id("label").unwrap();
        let view = ComponentView::new(&label);
        assert_eq!(view.get("text"), Object::from("idle"));
        assert!(view.keys().iter().any(|k| k == "uid"));
        drop(label);
        drop(document);
        assert_eq!(view.get("text"), Object::Null);
        assert!(view.keys().is_empty());
    }
}
