// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout parameters and the property bag passed to a layout call.

use std::rc::Rc;

use understory_object::{Object, ObjectMap};

use crate::{
    BindingType, Context, ContextDependant, evaluate_recursive, is_evaluable, parse_and_evaluate,
};

/// A declared layout parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub binding_type: BindingType,
    /// Value used when the caller does not supply one. Evaluated in the new frame.
    pub default: Object,
}

impl Parameter {
    /// An untyped parameter with a null default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding_type: BindingType::Any,
            default: Object::Null,
        }
    }

    /// Parses `"name"` or `{"name": ..., "type": ..., "default": ...}`.
    ///
    /// Returns `None` for anything without a usable name.
    #[must_use]
    pub fn from_object(object: &Object) -> Option<Self> {
        if let Some(name) = object.as_str() {
            return (!name.is_empty()).then(|| Self::new(name));
        }
        let name = object.get("name").as_string();
        if name.is_empty() {
            return None;
        }
        let binding_type = object
            .get("type")
            .as_str()
            .and_then(BindingType::from_name)
            .unwrap_or_default();
        Some(Self {
            name,
            binding_type,
            default: object.get("default"),
        })
    }
}

/// Ordered list of parameters declared by a layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterArray(Vec<Parameter>);

impl ParameterArray {
    /// Parses a single parameter or an array of them, skipping unusable entries.
    #[must_use]
    pub fn from_object(object: &Object) -> Self {
        let items = if object.is_array() {
            object.as_array()
        } else if object.is_null() {
            Vec::new()
        } else {
            vec![object.clone()]
        };
        Self(items.iter().filter_map(Parameter::from_object).collect())
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Raw properties supplied to a layout or component, before evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    values: ObjectMap,
}

impl Properties {
    /// An empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every entry of a map, replacing existing ones. Non-maps are ignored.
    pub fn emplace_map(&mut self, object: &Object) {
        if let Some(map) = object.as_map() {
            for (name, value) in map {
                self.values.insert(name.clone(), value.clone());
            }
        }
    }

    /// Sets one entry.
    pub fn emplace(&mut self, name: impl Into<String>, value: Object) {
        self.values.insert(name.into(), value);
    }

    /// The raw value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.values.get(name)
    }

    /// Returns `true` if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Removes and returns `name`.
    pub fn remove(&mut self, name: &str) -> Option<Object> {
        self.values.remove(name)
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.values.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes `parameter` from the bag and defines it in `context`.
    ///
    /// A supplied value is evaluated in `context`; if it is a live expression and the slot is
    /// user writable, a [`ContextDependant`] keeps it current. A missing value falls back to
    /// the parameter default. The declared type converts the result either way.
    pub fn add_to_context(
        &mut self,
        context: &Rc<Context>,
        parameter: &Parameter,
        user_writeable: bool,
    ) {
        let function = parameter.binding_type.binding_function();
        let value = match self.values.remove(&parameter.name) {
            Some(raw) if is_evaluable(&raw) && raw.is_string() => {
                let result = parse_and_evaluate(context, &raw, true);
                let value = function.call(context, &result.value);
                if user_writeable && result.is_dynamic() {
                    context.put_user_writeable(&parameter.name, value);
                    if let Some(expression) = result.expression {
                        ContextDependant::create(
                            context,
                            &parameter.name,
                            context,
                            expression,
                            function,
                            result.symbols,
                        );
                    }
                    return;
                }
                value
            }
            Some(raw) => function.call(context, &evaluate_recursive(context, &raw)),
            None => function.call(context, &evaluate_recursive(context, &parameter.default)),
        };
        if user_writeable {
            context.put_user_writeable(&parameter.name, value);
        } else {
            context.put_constant(&parameter.name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_from_strings_and_maps() {
        let params = ParameterArray::from_object(
            &Object::from_json_str(
                r#"["title", {"name": "count", "type": "number", "default": 3}, {"type": "string"}, 4]"#,
            )
            .unwrap(),
        );
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "count"]);
        let count = params.iter().nth(1).unwrap();
        assert_eq!(count.binding_type, BindingType::Number);
        assert_eq!(count.default, Object::from(3));
        assert_eq!(ParameterArray::from_object(&Object::from("solo")).len(), 1);
    }

    #[test]
    fn supplied_values_are_bound() {
        let outer = Context::create_test_context();
        outer.put_user_writeable("n", Object::from(1));
        let inner = Context::create_child(&outer);
        let mut props = Properties::new();
        props.emplace("label", Object::from("N=${n}"));

        props.add_to_context(&inner, &Parameter::new("label"), true);
        assert!(!props.contains("label"));
        assert_eq!(inner.opt("label"), Object::from("N=1"));

        outer.user_update_and_recalculate("n", Object::from(2));
        assert_eq!(inner.opt("label"), Object::from("N=2"));
    }

    #[test]
    fn defaults_and_types_apply() {
        let context = Context::create_test_context();
        let mut props = Properties::new();
        props.emplace("size", Object::from("12"));
        let size = Parameter {
            name: "size".into(),
            binding_type: BindingType::Number,
            default: Object::Null,
        };
        let missing = Parameter {
            name: "missing".into(),
            binding_type: BindingType::String,
            default: Object::from(5),
        };
        props.add_to_context(&context, &size, false);
        props.add_to_context(&context, &missing, false);
        assert_eq!(context.opt("size"), Object::from(12));
        assert_eq!(context.opt("missing"), Object::from("5"));
        assert!(!context.is_mutable("size"));
    }
}
