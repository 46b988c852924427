// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Object`] tagged union.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::BTreeMap;
use std::rc::Rc;

use kurbo::{Affine, Rect};

use crate::{Color, Dimension, LiveArray, Metrics};

/// Ordered string-keyed map of objects.
pub type ObjectMap = BTreeMap<String, Object>;

/// Array of objects.
pub type ObjectArray = Vec<Object>;

/// A read-only map whose entries are computed on demand by the host.
///
/// Views back values such as `event.source`, where the underlying component may be released
/// while the view is still reachable from an expression. Implementations return
/// [`Object::Null`] for any key they cannot resolve.
pub trait ObjectView: fmt::Debug {
    /// Returns the value for `key`, or null.
    fn get(&self, key: &str) -> Object;

    /// Returns the keys this view exposes.
    fn keys(&self) -> Vec<String>;
}

/// A dynamic, cheaply clonable value.
#[derive(Clone, Debug, Default)]
pub enum Object {
    /// The absent value.
    #[default]
    Null,
    /// A boolean.
    Boolean(bool),
    /// A double precision number.
    Number(f64),
    /// A shared string.
    String(Rc<str>),
    /// A shared array.
    Array(Rc<ObjectArray>),
    /// A shared map.
    Map(Rc<ObjectMap>),
    /// A color.
    Color(Color),
    /// A dimension.
    Dimension(Dimension),
    /// A rectangle in dp.
    Rect(Rect),
    /// A 2D affine transform.
    Transform(Affine),
    /// A host-backed read-only map.
    View(Rc<dyn ObjectView>),
    /// A shared mutable array.
    LiveArray(Rc<LiveArray>),
}

/// Formats a number the way document authors expect: integral values carry no fraction.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        if value == 0.0 {
            "0".to_owned()
        } else {
            format!("{value:.0}")
        }
    } else {
        format!("{value}")
    }
}

impl Object {
    /// An empty array.
    #[must_use]
    pub fn empty_array() -> Self {
        Self::Array(Rc::new(Vec::new()))
    }

    /// An empty map.
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(Rc::new(ObjectMap::new()))
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Color(_) => "color",
            Self::Dimension(_) => "dimension",
            Self::Rect(_) => "rect",
            Self::Transform(_) => "transform",
            Self::View(_) => "view",
            Self::LiveArray(_) => "liveArray",
        }
    }

    /// Returns `true` for [`Object::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for strings.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Returns `true` for numbers.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Returns `true` for booleans.
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean(_))
    }

    /// Returns `true` for arrays and live arrays.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_) | Self::LiveArray(_))
    }

    /// Returns `true` for maps and views.
    #[must_use]
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_) | Self::View(_))
    }

    /// The string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The map payload, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&ObjectMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The live array payload, if this is a live array.
    #[must_use]
    pub fn as_live_array(&self) -> Option<&Rc<LiveArray>> {
        match self {
            Self::LiveArray(a) => Some(a),
            _ => None,
        }
    }

    /// Truthiness used by conditionals and `when` guards.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Color(c) => !c.is_transparent(),
            Self::Dimension(d) => match d {
                Dimension::Auto => true,
                Dimension::Absolute(v) | Dimension::Relative(v) => *v != 0.0,
            },
            Self::Array(_)
            | Self::Map(_)
            | Self::Rect(_)
            | Self::Transform(_)
            | Self::View(_)
            | Self::LiveArray(_) => true,
        }
    }

    /// Alias for [`Object::truthy`].
    #[must_use]
    pub fn as_boolean(&self) -> bool {
        self.truthy()
    }

    /// Numeric interpretation. Unparseable text and non-numeric values are `NaN`; null is zero.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            Self::Dimension(d) => d.value(),
            _ => f64::NAN,
        }
    }

    /// Integer interpretation, truncating toward zero. `NaN` becomes zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "saturating float to int conversion")]
    pub fn as_int(&self) -> i64 {
        let n = self.as_number();
        if n.is_nan() { 0 } else { n as i64 }
    }

    /// Text interpretation.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.to_string(),
            Self::Color(c) => c.to_string(),
            Self::Dimension(d) => d.to_string(),
            _ => self.to_json().to_string(),
        }
    }

    /// Color interpretation. Unparseable values become transparent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "packed colors are 32 bits")]
    pub fn as_color(&self) -> Color {
        match self {
            Self::Color(c) => *c,
            Self::String(s) => Color::parse(s).unwrap_or(Color::TRANSPARENT),
            Self::Number(n) if n.is_finite() && *n >= 0.0 => Color::from_rgba(*n as u32),
            _ => Color::TRANSPARENT,
        }
    }

    /// Dimension interpretation. Unparseable values become auto.
    #[must_use]
    pub fn as_dimension(&self, metrics: &Metrics) -> Dimension {
        match self {
            Self::Dimension(d) => *d,
            Self::Number(n) if n.is_finite() => Dimension::Absolute(*n),
            Self::String(s) => Dimension::parse(s, metrics).unwrap_or(Dimension::Auto),
            _ => Dimension::Auto,
        }
    }

    /// Snapshot of the elements of an array or live array. Null is empty and any other value is
    /// wrapped in a single element array.
    #[must_use]
    pub fn as_array(&self) -> ObjectArray {
        match self {
            Self::Null => Vec::new(),
            Self::Array(a) => a.as_ref().clone(),
            Self::LiveArray(a) => a.snapshot(),
            other => vec![other.clone()],
        }
    }

    /// Member lookup for maps and views; null for everything else.
    #[must_use]
    pub fn get(&self, key: &str) -> Self {
        match self {
            Self::Map(m) => m.get(key).cloned().unwrap_or_default(),
            Self::View(v) => v.get(key),
            _ => Self::Null,
        }
    }

    /// Returns `true` if a map or view exposes `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        match self {
            Self::Map(m) => m.contains_key(key),
            Self::View(v) => v.keys().iter().any(|k| k == key),
            _ => false,
        }
    }

    /// Element lookup for arrays and live arrays. Negative indices count from the end.
    #[must_use]
    pub fn at(&self, index: i64) -> Self {
        let len = self.len();
        let resolved = if index < 0 {
            usize::try_from(index.unsigned_abs())
                .ok()
                .and_then(|back| len.checked_sub(back))
        } else {
            usize::try_from(index).ok()
        };
        let Some(i) = resolved else {
            return Self::Null;
        };
        match self {
            Self::Array(a) => a.get(i).cloned().unwrap_or_default(),
            Self::LiveArray(a) => a.at(i).unwrap_or_default(),
            _ => Self::Null,
        }
    }

    /// Element count of arrays, maps, and views; character count of strings; zero otherwise.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Array(a) => a.len(),
            Self::Map(m) => m.len(),
            Self::View(v) => v.keys().len(),
            Self::LiveArray(a) => a.len(),
            Self::String(s) => s.chars().count(),
            _ => 0,
        }
    }

    /// Returns `true` if [`Object::len`] is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Color(a), Self::Color(b)) => a == b,
            (Self::Dimension(a), Self::Dimension(b)) => a == b,
            (Self::Rect(a), Self::Rect(b)) => a == b,
            (Self::Transform(a), Self::Transform(b)) => a == b,
            (Self::View(a), Self::View(b)) => Rc::ptr_eq(a, b),
            (Self::LiveArray(a), Self::LiveArray(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn hash_f64<H: Hasher>(value: f64, state: &mut H) {
    // -0.0 and 0.0 compare equal, so they must hash equal.
    let normalized = if value == 0.0 { 0.0 } else { value };
    normalized.to_bits().hash(state);
}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(b) => b.hash(state),
            Self::Number(n) => hash_f64(*n, state),
            Self::String(s) => s.hash(state),
            Self::Array(a) => a.hash(state),
            Self::Map(m) => m.hash(state),
            Self::Color(c) => c.hash(state),
            Self::Dimension(d) => {
                core::mem::discriminant(d).hash(state);
                hash_f64(d.value(), state);
            }
            Self::Rect(r) => {
                for v in [r.x0, r.y0, r.x1, r.y1] {
                    hash_f64(v, state);
                }
            }
            Self::Transform(t) => {
                for v in t.as_coeffs() {
                    hash_f64(v, state);
                }
            }
            Self::View(v) => Rc::as_ptr(v).cast::<()>().hash(state),
            Self::LiveArray(a) => Rc::as_ptr(a).hash(state),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Object {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<usize> for Object {
    #[allow(clippy::cast_precision_loss, reason = "indices stay far below 2^52")]
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<ObjectArray> for Object {
    fn from(value: ObjectArray) -> Self {
        Self::Array(Rc::new(value))
    }
}

impl From<ObjectMap> for Object {
    fn from(value: ObjectMap) -> Self {
        Self::Map(Rc::new(value))
    }
}

impl From<Color> for Object {
    fn from(value: Color) -> Self {
        Self::Color(value)
    }
}

impl From<Dimension> for Object {
    fn from(value: Dimension) -> Self {
        Self::Dimension(value)
    }
}

impl From<Rect> for Object {
    fn from(value: Rect) -> Self {
        Self::Rect(value)
    }
}

impl From<Affine> for Object {
    fn from(value: Affine) -> Self {
        Self::Transform(value)
    }
}

impl From<Rc<LiveArray>> for Object {
    fn from(value: Rc<LiveArray>) -> Self {
        Self::LiveArray(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting_drops_integral_fraction() {
        assert_eq!(Object::from(2.0).as_string(), "2");
        assert_eq!(Object::from(-0.0).as_string(), "0");
        assert_eq!(Object::from(2.5).as_string(), "2.5");
        assert_eq!(Object::from(f64::NAN).as_string(), "NaN");
    }

    #[test]
    fn coercions_fall_back() {
        assert!(Object::from("fuzzy").as_number().is_nan());
        assert_eq!(Object::from(" 12 ").as_number(), 12.0);
        assert_eq!(Object::Null.as_number(), 0.0);
        assert_eq!(Object::from(true).as_number(), 1.0);
        assert_eq!(Object::from("not a color").as_color(), Color::TRANSPARENT);
        assert_eq!(Object::from("nope").as_dimension(&Metrics::default()), Dimension::Auto);
        assert_eq!(Object::from(7.9).as_int(), 7);
    }

    #[test]
    fn truthiness_per_tag() {
        assert!(!Object::Null.truthy());
        assert!(!Object::from(0).truthy());
        assert!(!Object::from(f64::NAN).truthy());
        assert!(!Object::from("").truthy());
        assert!(Object::from("x").truthy());
        assert!(Object::empty_array().truthy());
        assert!(!Object::from(Color::TRANSPARENT).truthy());
    }

    #[test]
    fn deep_equality_for_containers() {
        let a = Object::from(vec![Object::from(1), Object::from("two")]);
        let b = Object::from(vec![Object::from(1), Object::from("two")]);
        assert_eq!(a, b);
        assert_ne!(a, Object::from(vec![Object::from(1)]));
        assert_ne!(Object::from(1), Object::from("1"));
    }

    #[test]
    fn member_and_index_access() {
        let mut map = ObjectMap::new();
        map.insert("k".into(), Object::from(vec![Object::from(10), Object::from(20)]));
        let obj = Object::from(map);
        assert_eq!(obj.get("k").at(1), Object::from(20));
        assert_eq!(obj.get("k").at(-1), Object::from(20));
        assert_eq!(obj.get("k").at(5), Object::Null);
        assert_eq!(obj.get("missing"), Object::Null);
        assert_eq!(Object::from("abc").get("k"), Object::Null);
    }
}
