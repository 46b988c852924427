// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Symbol references captured while evaluating expressions.

use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use understory_object::Object;

use crate::Context;

/// A named slot in a specific context frame.
///
/// The frame is held weakly: a reference to a dropped frame resolves to nothing.
#[derive(Clone, Debug)]
pub struct SymbolReference {
    context: Weak<Context>,
    name: Rc<str>,
}

impl SymbolReference {
    /// Refers to `name` in `context`.
    #[must_use]
    pub fn new(context: &Rc<Context>, name: &str) -> Self {
        Self {
            context: Rc::downgrade(context),
            name: Rc::from(name),
        }
    }

    /// The frame that owns the slot, if still alive.
    #[must_use]
    pub fn context(&self) -> Option<Rc<Context>> {
        self.context.upgrade()
    }

    /// The slot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value of the slot, or null if the frame is gone.
    #[must_use]
    pub fn value(&self) -> Object {
        self.context().map(|c| c.opt(&self.name)).unwrap_or_default()
    }
}

impl PartialEq for SymbolReference {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Weak::ptr_eq(&self.context, &other.context)
    }
}

impl Eq for SymbolReference {}

/// The set of slots an expression read during one evaluation.
///
/// Insertion order is kept for deterministic attachment; equality ignores order.
#[derive(Clone, Debug, Default)]
pub struct BoundSymbolSet {
    symbols: SmallVec<[SymbolReference; 4]>,
}

impl BoundSymbolSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol unless already present.
    pub fn insert(&mut self, symbol: SymbolReference) {
        if !self.symbols.contains(&symbol) {
            self.symbols.push(symbol);
        }
    }

    /// Adds every symbol of `other`.
    pub fn extend(&mut self, other: &Self) {
        for symbol in other.iter() {
            self.insert(symbol.clone());
        }
    }

    /// Returns `true` if `name` in `context` is a member.
    #[must_use]
    pub fn contains(&self, context: &Rc<Context>, name: &str) -> bool {
        self.symbols
            .iter()
            .any(|s| s.name() == name && s.context.as_ptr() == Rc::as_ptr(context))
    }

    /// Iterates the members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolReference> {
        self.symbols.iter()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl PartialEq for BoundSymbolSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.symbols.iter().all(|s| other.symbols.contains(s))
    }
}

impl Eq for BoundSymbolSet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_equality_ignores_order() {
        let context = Context::create_test_context();
        let a = SymbolReference::new(&context, "a");
        let b = SymbolReference::new(&context, "b");

        let mut first = BoundSymbolSet::new();
        first.insert(a.clone());
        first.insert(b.clone());
        first.insert(a.clone());
        assert_eq!(first.len(), 2, "duplicates are dropped");

        let mut second = BoundSymbolSet::new();
        second.insert(b);
        second.insert(a);
        assert_eq!(first, second);
        assert!(first.contains(&context, "a"));
    }

    #[test]
    fn same_name_in_different_frames_differs() {
        let root = Context::create_test_context();
        let child = Context::create_child(&root);
        assert_ne!(SymbolReference::new(&root, "x"), SymbolReference::new(&child, "x"));
    }

    #[test]
    fn dead_frames_resolve_to_null() {
        let symbol = {
            let context = Context::create_test_context();
            context.put_user_writeable("x", Object::from(3));
            let symbol = SymbolReference::new(&context, "x");
            assert_eq!(symbol.value(), Object::from(3));
            symbol
        };
        assert!(symbol.context().is_none());
        assert_eq!(symbol.value(), Object::Null);
    }
}
