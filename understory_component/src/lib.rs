// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Component: the live component tree of a declarative UI document.
//!
//! A [`Document`] parses document JSON, builds a root [`Context`](understory_binding::Context)
//! and inflates the main template into a tree of [`CoreComponent`]s. Every component property
//! is described by a row of the property table ([`PropDef`]): its flags decide whether it is
//! read from the document, styled, bindable, laid out, or reported to the host as dirty.
//!
//! Property strings containing `${...}` become [`ComponentDependant`]s, so writing a bound
//! context value updates the components that read it. Layout is delegated to [`taffy`], text
//! measurement to the host through [`TextMeasurement`], and native text fields through
//! [`EditTextFactory`].
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_component::{Document, PropertyKey, RootConfig};
//! use understory_object::Object;
//!
//! let json = r#"{
//!     "mainTemplate": {
//!         "item": {
//!             "type": "Container",
//!             "bind": {"name": "count", "value": 1},
//!             "items": {"type": "Text", "id": "label", "text": "${count + 1}"}
//!         }
//!     }
//! }"#;
//! let document = Document::inflate(json, &Object::Null, RootConfig::default()).unwrap();
//! let label = document.find_component_by_id("label").unwrap();
//! assert_eq!(label.get_calculated(PropertyKey::Text), Object::from("2"));
//!
//! document.top().set_property_by_name("count", Object::from(5));
//! assert_eq!(label.get_calculated(PropertyKey::Text), Object::from("6"));
//! assert_eq!(document.dirty_components().len(), 1);
//! ```
//!
//! ## Host loop
//!
//! A host typically calls [`Document::layout`] after changes, sends
//! [`CoreComponent::serialize_dirty`] for each of [`Document::dirty_components`], and calls
//! [`Document::process_children_changes`] once per frame.
//!
//! ## Threading
//!
//! Everything is single threaded. Callbacks handed to host text fields and data sources must
//! be invoked on the thread that owns the document.

mod builder;
mod component;
mod component_dependant;
mod config;
mod document;
mod edit_text;
mod event;
mod focus;
mod layout;
mod measure;
mod property;
mod rebuilder;
mod serialize;
mod sticky;
mod style;

pub use component::CoreComponent;
pub use component_dependant::ComponentDependant;
pub use config::{DataSourceProvider, RootConfig};
pub use document::{Document, InflateError};
pub use edit_text::{ChangedCallback, EditText, EditTextFactory, FocusCallback, SubmitCallback};
pub use event::ComponentView;
pub use measure::{FixedAdvanceMeasure, MeasureMode, TextMeasurement, TextRequest};
pub use property::{
    ComponentType, LayoutFn, PropDef, PropFlags, PropKind, PropertyKey, TriggerFn, all_defs,
    find_def,
};
pub use style::{StateFlags, Styles};
