// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion between [`Object`] and `serde_json` values.

use std::rc::Rc;

use serde_json::{Map, Number, Value};

use crate::{Object, ObjectError, ObjectMap};

impl Object {
    /// Parses JSON text into an object tree.
    pub fn from_json_str(text: &str) -> Result<Self, ObjectError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from(&value))
    }

    /// Converts to a JSON value.
    ///
    /// Colors and dimensions use their text forms, rectangles become `[x, y, width, height]`,
    /// transforms become their six affine coefficients, and non-finite numbers become null.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Value::String(s.to_string()),
            Self::Array(a) => Value::Array(a.iter().map(Self::to_json).collect()),
            Self::LiveArray(a) => Value::Array(a.snapshot().iter().map(Self::to_json).collect()),
            Self::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            Self::View(v) => Value::Object(
                v.keys()
                    .into_iter()
                    .map(|k| {
                        let value = v.get(&k).to_json();
                        (k, value)
                    })
                    .collect(),
            ),
            Self::Color(c) => Value::String(c.to_string()),
            Self::Dimension(d) => match d {
                crate::Dimension::Absolute(v) => number_to_json(*v),
                _ => Value::String(d.to_string()),
            },
            Self::Rect(r) => Value::Array(
                [r.x0, r.y0, r.width(), r.height()]
                    .into_iter()
                    .map(number_to_json)
                    .collect(),
            ),
            Self::Transform(t) => {
                Value::Array(t.as_coeffs().into_iter().map(number_to_json).collect())
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, reason = "only integral values in i64 range are cast")]
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&Value> for Object {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(Rc::from(s.as_str())),
            Value::Array(a) => Self::Array(Rc::new(a.iter().map(Self::from).collect())),
            Value::Object(m) => Self::Map(Rc::new(
                m.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect::<ObjectMap>(),
            )),
        }
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use serde_json::json;

    use crate::{Color, Dimension};

    use super::*;

    #[test]
    fn json_shapes_survive() {
        let source = json!({"a": [1, 2.5, "x", null, true], "b": {"c": "d"}});
        let object = Object::from(&source);
        assert_eq!(object.get("a").at(1), Object::from(2.5));
        assert_eq!(object.to_json(), source);
    }

    #[test]
    fn typed_payloads_use_text_forms() {
        assert_eq!(Object::from(Color::WHITE).to_json(), json!("#ffffffff"));
        assert_eq!(Object::from(Dimension::Relative(50.0)).to_json(), json!("50%"));
        assert_eq!(Object::from(Dimension::Absolute(12.0)).to_json(), json!(12));
        assert_eq!(
            Object::from(Rect::new(1.0, 2.0, 11.0, 22.0)).to_json(),
            json!([1, 2, 10, 20])
        );
        assert_eq!(Object::from(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(matches!(Object::from_json_str("{"), Err(ObjectError::Json(_))));
    }
}
