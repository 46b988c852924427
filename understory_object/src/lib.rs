// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Object: the dynamic value type of a declarative UI document.
//!
//! Every property value, binding result, and piece of document data flowing through the engine is
//! an [`Object`]. Objects are cheap to clone: arrays and maps are shared behind [`Rc`](std::rc::Rc),
//! and the scalar variants are `Copy` payloads.
//!
//! ## Variants
//!
//! | Variant | Payload |
//! |---------|---------|
//! | `Null` | nothing |
//! | `Boolean` | `bool` |
//! | `Number` | `f64` |
//! | `String` | shared `str` |
//! | `Array` / `Map` | shared [`ObjectArray`] / [`ObjectMap`] |
//! | `Color` | [`Color`] (RGBA8) |
//! | `Dimension` | [`Dimension`] (absolute, relative, auto) |
//! | `Rect` / `Transform` | [`kurbo::Rect`] / [`kurbo::Affine`] |
//! | `View` | host-backed read-only map ([`ObjectView`]) |
//! | `LiveArray` | shared mutable array with change listeners ([`LiveArray`]) |
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_object::{Color, Metrics, Object};
//!
//! let data = Object::from_json_str(r##"{"name": "Sam", "count": 3, "tint": "#ff000080"}"##).unwrap();
//! assert_eq!(data.get("name").as_string(), "Sam");
//! assert_eq!(data.get("count").as_number(), 3.0);
//! assert_eq!(data.get("tint").as_color(), Color::from_rgba8(255, 0, 0, 128));
//!
//! let width = Object::from("50%").as_dimension(&Metrics::default());
//! assert!(width.is_relative());
//! ```
//!
//! Coercions never fail: a value that cannot be interpreted as the requested type produces a
//! neutral fallback (`NaN`, empty string, transparent, auto).

mod color;
mod dimension;
mod error;
mod json;
mod live_array;
mod object;

pub use color::Color;
pub use dimension::{Dimension, Metrics};
pub use error::ObjectError;
pub use live_array::{LiveArray, LiveArrayChange, LiveArrayListener};
pub use object::{Object, ObjectArray, ObjectMap, ObjectView, format_number};
