// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Binding: `${...}` expressions, scoped contexts, and dependency propagation.
//!
//! A document's data lives in a chain of [`Context`] frames. Strings containing `${...}` are
//! parsed into an [`Expression`] and evaluated against a context; evaluation records every
//! writable slot it reads in a [`BoundSymbolSet`]. When that set is non-empty, a
//! [`Dependant`] is created and attached as a downstream listener on each of those slots.
//!
//! Writing a slot enqueues its downstream dependants into the root's [`DependantManager`],
//! which drains them in creation order. Each recalculation pushes a fresh value into its
//! target (a context slot here, a component property in `understory_component`) and may
//! rewire itself if the expression read a different set of symbols this time.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_binding::{BindingFunction, Context, ContextDependant, parse_and_evaluate};
//! use understory_object::Object;
//!
//! let root = Context::create_test_context();
//! root.put_user_writeable("a", Object::from(1));
//!
//! // `b` follows `a + 1`.
//! let parsed = parse_and_evaluate(&root, &Object::from("${a + 1}"), false);
//! root.put_user_writeable("b", parsed.value.clone());
//! let expression = parsed.expression.unwrap();
//! ContextDependant::create(&root, "b", &root, expression, BindingFunction::default(), parsed.symbols);
//!
//! assert_eq!(root.opt("b"), Object::from(2));
//! root.user_update_and_recalculate("a", Object::from(5));
//! assert_eq!(root.opt("b"), Object::from(6));
//! ```
//!
//! ## Threading
//!
//! Everything here is single threaded (`Rc`, `RefCell`). Host callbacks that touch contexts
//! must be marshaled onto the engine thread first.

mod binding;
mod context;
mod context_dependant;
mod dependant;
mod evaluate;
pub mod expression;
mod properties;
mod session;
mod symbol;

pub use binding::{BindingFunction, BindingType};
pub use context::{Context, ContextLookup, RootData, SlotAccess};
pub use context_dependant::ContextDependant;
pub use dependant::{Dependant, DependantCore, DependantManager};
pub use evaluate::{
    Evaluation, ParseResult, apply_data_binding, arrayify, arrayify_property, evaluate,
    evaluate_recursive, is_evaluable, parse_and_evaluate, parse_and_evaluate_nested,
    property_as_boolean, property_as_double, property_as_int, property_as_object,
    property_as_recursive, property_as_string,
};
pub use expression::{Expression, ParseError};
pub use properties::{Parameter, ParameterArray, Properties};
pub use session::Session;
pub use symbol::{BoundSymbolSet, SymbolReference};
