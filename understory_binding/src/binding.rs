// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declared value types and their conversions.

use core::fmt;
use std::rc::Rc;

use understory_object::{Object, ObjectMap};

use crate::Context;

/// The type a parameter or `bind` entry declares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// No conversion.
    #[default]
    Any,
    /// Stringified.
    String,
    /// Floating point.
    Number,
    /// Truncated toward zero.
    Integer,
    /// Truthiness.
    Boolean,
    /// Parsed colour.
    Color,
    /// Parsed dimension.
    Dimension,
    /// Wrapped into an array if it is not one.
    Array,
    /// Maps pass through; anything else becomes an empty map.
    Map,
}

impl BindingType {
    /// Looks up a type by its document name. Unknown names yield `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "any" | "object" => Self::Any,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "color" => Self::Color,
            "dimension" => Self::Dimension,
            "array" => Self::Array,
            "map" => Self::Map,
            _ => return None,
        })
    }

    /// Converts `value` to this type.
    #[must_use]
    pub fn convert(self, context: &Context, value: &Object) -> Object {
        match self {
            Self::Any => value.clone(),
            Self::String => Object::from(value.as_string()),
            Self::Number => Object::from(value.as_number()),
            Self::Integer => Object::from(value.as_int() as f64),
            Self::Boolean => Object::from(value.truthy()),
            Self::Color => Object::from(value.as_color()),
            Self::Dimension => Object::from(value.as_dimension(context.metrics())),
            Self::Array if value.is_array() => value.clone(),
            Self::Array if value.is_null() => Object::empty_array(),
            Self::Array => Object::from(value.as_array()),
            Self::Map if value.is_map() => value.clone(),
            Self::Map => Object::from(ObjectMap::new()),
        }
    }

    /// A binding function applying [`convert`](Self::convert).
    #[must_use]
    pub fn binding_function(self) -> BindingFunction {
        match self {
            Self::Any => BindingFunction::default(),
            _ => BindingFunction::new(move |context, value| self.convert(context, value)),
        }
    }
}

/// Conversion applied to each freshly evaluated binding value.
#[derive(Clone)]
pub struct BindingFunction(Rc<dyn Fn(&Context, &Object) -> Object>);

impl BindingFunction {
    /// Wraps a conversion closure.
    pub fn new(function: impl Fn(&Context, &Object) -> Object + 'static) -> Self {
        Self(Rc::new(function))
    }

    /// Applies the conversion.
    #[must_use]
    pub fn call(&self, context: &Context, value: &Object) -> Object {
        (self.0)(context, value)
    }
}

impl Default for BindingFunction {
    fn default() -> Self {
        Self::new(|_, value| value.clone())
    }
}

impl fmt::Debug for BindingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BindingFunction")
    }
}

#[cfg(test)]
mod tests {
    use understory_object::{Color, Dimension};

    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(BindingType::from_name("Number"), Some(BindingType::Number));
        assert_eq!(BindingType::from_name("object"), Some(BindingType::Any));
        assert_eq!(BindingType::from_name("float"), None);
    }

    #[test]
    fn conversions() {
        let context = Context::create_test_context();
        let convert = |t: BindingType, v: Object| t.convert(&context, &v);
        assert_eq!(convert(BindingType::String, Object::from(12)), Object::from("12"));
        assert_eq!(convert(BindingType::Number, Object::from("2.5")), Object::from(2.5));
        assert_eq!(convert(BindingType::Integer, Object::from(-2.5)), Object::from(-2));
        assert_eq!(convert(BindingType::Boolean, Object::from("")), Object::from(false));
        assert_eq!(
            convert(BindingType::Color, Object::from("#ff0000")),
            Object::from(Color::from_rgba(0xff00_00ff))
        );
        assert_eq!(
            convert(BindingType::Dimension, Object::from("50%")),
            Object::from(Dimension::Relative(50.0))
        );
        assert_eq!(convert(BindingType::Array, Object::Null), Object::empty_array());
        assert_eq!(
            convert(BindingType::Array, Object::from(3)),
            Object::from(vec![Object::from(3)])
        );
        assert_eq!(convert(BindingType::Map, Object::from(3)), Object::empty_map());
    }
}
