// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named document styles.
//!
//! A style has an optional `extend` list of parent styles and a `values` list of property
//! blocks. Each block may carry a `when` guard evaluated against the component `state`, so
//! the resolved map changes as a component becomes pressed, checked, or disabled.

use std::rc::Rc;

use bitflags::bitflags;
use understory_binding::{Context, evaluate_recursive, property_as_boolean};
use understory_object::{Object, ObjectMap};

bitflags! {
    /// Interaction state of a component, exposed to styles as the `state` map.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StateFlags: u8 {
        /// `checked` is true.
        const CHECKED = 0x01;
        /// `disabled` is true.
        const DISABLED = 0x02;
        /// Being pressed.
        const PRESSED = 0x04;
        /// Holding keyboard focus.
        const FOCUSED = 0x08;
        /// Under the pointer.
        const HOVER = 0x10;
    }
}

impl StateFlags {
    /// The `state` map seen by style guards.
    #[must_use]
    pub fn to_object(self) -> Object {
        let mut map = ObjectMap::new();
        for (name, flag) in [
            ("checked", Self::CHECKED),
            ("disabled", Self::DISABLED),
            ("pressed", Self::PRESSED),
            ("focused", Self::FOCUSED),
            ("hover", Self::HOVER),
        ] {
            map.insert(name.into(), Object::from(self.contains(flag)));
        }
        Object::from(map)
    }
}

/// The `styles` section of a document.
#[derive(Clone, Debug, Default)]
pub struct Styles {
    definitions: ObjectMap,
}

impl Styles {
    /// Reads the `styles` section. Anything but a map yields no styles.
    #[must_use]
    pub fn new(section: &Object) -> Self {
        Self {
            definitions: section.as_map().cloned().unwrap_or_default(),
        }
    }

    /// Returns `true` if `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Resolves `name` for a component in `context` with the given state.
    ///
    /// Extended styles apply first, then matching `values` blocks in order; later blocks win.
    #[must_use]
    pub fn resolve(&self, name: &str, context: &Rc<Context>, state: StateFlags) -> ObjectMap {
        let mut result = ObjectMap::new();
        if name.is_empty() || !self.contains(name) {
            return result;
        }
        let guard_context = Context::create_child(context);
        guard_context.put_constant("state", state.to_object());
        let mut visiting = Vec::new();
        self.apply(name, &guard_context, &mut result, &mut visiting);
        result
    }

    fn apply(
        &self,
        name: &str,
        context: &Context,
        result: &mut ObjectMap,
        visiting: &mut Vec<String>,
    ) {
        let Some(definition) = self.definitions.get(name) else {
            return;
        };
        if visiting.iter().any(|v| v == name) {
            context
                .session()
                .console(format!("Style '{name}' extends itself"));
            return;
        }
        visiting.push(name.to_owned());
        for parent in definition.get("extend").as_array() {
            if let Some(parent) = parent.as_str() {
                self.apply(parent, context, result, visiting);
            }
        }
        for block in definition.get("values").as_array() {
            if !property_as_boolean(context, &block, "when", true) {
                continue;
            }
            if let Some(entries) = block.as_map() {
                for (key, value) in entries.iter().filter(|(k, _)| *k != "when") {
                    result.insert(key.clone(), evaluate_recursive(context, value));
                }
            }
        }
        visiting.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles() -> Styles {
        Styles::new(
            &Object::from_json_str(
                r##"{
                    "base": {"values": [{"color": "#ffffff", "fontSize": 20}]},
                    "button": {
                        "extend": "base",
                        "values": [
                            {"opacity": 0.8},
                            {"when": "${state.pressed}", "color": "#ff0000"},
                            {"when": "${state.disabled}", "opacity": 0.3}
                        ]
                    },
                    "loop": {"extend": ["loop"], "values": {"x": 1}}
                }"##,
            )
            .unwrap(),
        )
    }

    #[test]
    fn extend_then_values() {
        let context = Context::create_test_context();
        let resolved = styles().resolve("button", &context, StateFlags::empty());
        assert_eq!(resolved.get("color"), Some(&Object::from("#ffffff")));
        assert_eq!(resolved.get("fontSize"), Some(&Object::from(20)));
        assert_eq!(resolved.get("opacity"), Some(&Object::from(0.8)));
    }

    #[test]
    fn state_guards() {
        let context = Context::create_test_context();
        let resolved = styles().resolve(
            "button",
            &context,
            StateFlags::PRESSED | StateFlags::DISABLED,
        );
        assert_eq!(resolved.get("color"), Some(&Object::from("#ff0000")));
        assert_eq!(resolved.get("opacity"), Some(&Object::from(0.3)));
    }

    #[test]
    fn unknown_and_cyclic_styles() {
        let context = Context::create_test_context();
        assert!(styles().resolve("missing", &context, StateFlags::empty()).is_empty());
        let resolved = styles().resolve("loop", &context, StateFlags::empty());
        assert_eq!(resolved.get("x"), Some(&Object::from(1)));
        assert!(context.session().contains("extends itself"));
    }
}
