// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scoped variable storage and the registration point for dependants.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use hashbrown::{HashMap, HashSet};
use understory_object::{Metrics, Object, ObjectMap};

use crate::{Dependant, DependantManager, Session};

/// State shared by every context descending from one root.
#[derive(Debug)]
pub struct RootData {
    manager: DependantManager,
    session: Rc<Session>,
    metrics: Metrics,
}

impl RootData {
    /// Creates root state for a viewport.
    #[must_use]
    pub fn new(metrics: Metrics, session: Rc<Session>) -> Rc<Self> {
        Rc::new(Self {
            manager: DependantManager::new(),
            session,
            metrics,
        })
    }

    /// The shared dependency queue.
    #[must_use]
    pub fn dependant_manager(&self) -> &DependantManager {
        &self.manager
    }

    /// The console sink.
    #[must_use]
    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    /// Viewport metrics.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Who may write a slot after it is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotAccess {
    /// Never changes.
    Constant,
    /// Writable by document commands and the host.
    UserWriteable,
    /// Writable only by the engine.
    SystemWriteable,
}

impl SlotAccess {
    /// Returns `true` unless the slot is constant.
    #[must_use]
    pub fn is_mutable(self) -> bool {
        !matches!(self, Self::Constant)
    }
}

type ChangeHandler = Rc<dyn Fn(&Object)>;

struct ContextSlot {
    value: Object,
    access: SlotAccess,
    /// Dependants recalculated when this slot changes. Owned here.
    downstream: Vec<Rc<dyn Dependant>>,
    /// The dependant that writes this slot, if any.
    upstream: Option<Weak<dyn Dependant>>,
    on_change: Option<ChangeHandler>,
}

/// The frame holding a name, with the value and access found there.
#[derive(Clone, Debug)]
pub struct ContextLookup {
    context: Rc<Context>,
    value: Object,
    access: SlotAccess,
}

impl ContextLookup {
    /// The frame that owns the slot.
    #[must_use]
    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    /// The slot value.
    #[must_use]
    pub fn value(&self) -> &Object {
        &self.value
    }

    /// The slot access.
    #[must_use]
    pub fn access(&self) -> SlotAccess {
        self.access
    }
}

/// A data-binding scope frame.
///
/// Frames form a chain toward the root; lookups walk the chain and inner frames may shadow
/// outer names. A frame is kept alive by whatever holds an `Rc` to it (components, child
/// frames); dependants refer to frames weakly.
pub struct Context {
    parent: Option<Rc<Self>>,
    root: Rc<RootData>,
    slots: RefCell<HashMap<String, ContextSlot>>,
    dirty: RefCell<HashSet<String>>,
    self_weak: Weak<Self>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl Context {
    fn new(parent: Option<Rc<Self>>, root: Rc<RootData>) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            parent,
            root,
            slots: RefCell::new(HashMap::new()),
            dirty: RefCell::new(HashSet::new()),
            self_weak: self_weak.clone(),
        })
    }

    /// Creates a root frame and publishes the `viewport` constant.
    #[must_use]
    pub fn create_root(root: Rc<RootData>) -> Rc<Self> {
        let context = Self::new(None, root);
        let metrics = *context.metrics();
        let mut viewport = ObjectMap::new();
        viewport.insert("width".into(), Object::from(metrics.width));
        viewport.insert("height".into(), Object::from(metrics.height));
        viewport.insert("dpi".into(), Object::from(metrics.dpi));
        viewport.insert("pixelWidth".into(), Object::from(metrics.dp_to_px(metrics.width)));
        viewport.insert("pixelHeight".into(), Object::from(metrics.dp_to_px(metrics.height)));
        context.put_constant("viewport", Object::from(viewport));
        context
    }

    /// Creates a root frame with default metrics and a fresh session.
    #[must_use]
    pub fn create_test_context() -> Rc<Self> {
        Self::create_root(RootData::new(Metrics::default(), Rc::new(Session::new())))
    }

    /// Creates a frame whose lookups fall back to `parent`.
    #[must_use]
    pub fn create_child(parent: &Rc<Self>) -> Rc<Self> {
        Self::new(Some(parent.clone()), parent.root.clone())
    }

    /// The enclosing frame.
    #[must_use]
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// State shared with every frame of this root.
    #[must_use]
    pub fn root_data(&self) -> &Rc<RootData> {
        &self.root
    }

    /// The console sink.
    #[must_use]
    pub fn session(&self) -> &Rc<Session> {
        self.root.session()
    }

    /// Viewport metrics.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        self.root.metrics()
    }

    /// The shared dependency queue.
    #[must_use]
    pub fn dependant_manager(&self) -> &DependantManager {
        self.root.dependant_manager()
    }

    /// Walks the chain for `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ContextLookup> {
        let mut current = Some(self);
        while let Some(frame) = current {
            if let Some(slot) = frame.slots.borrow().get(name) {
                return Some(ContextLookup {
                    context: frame.self_weak.upgrade()?,
                    value: slot.value.clone(),
                    access: slot.access,
                });
            }
            current = frame.parent.as_deref();
        }
        None
    }

    /// The frame holding `name`.
    #[must_use]
    pub fn find_context_containing(&self, name: &str) -> Option<Rc<Self>> {
        self.find(name).map(|found| found.context)
    }

    /// The value of `name` anywhere in the chain, or null.
    #[must_use]
    pub fn opt(&self, name: &str) -> Object {
        self.find(name).map(|found| found.value).unwrap_or_default()
    }

    /// Returns `true` if `name` resolves anywhere in the chain.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.has_local(name) || self.parent.as_ref().is_some_and(|p| p.has(name))
    }

    /// Returns `true` if this frame defines `name`.
    #[must_use]
    pub fn has_local(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Returns `true` if this frame defines `name` as writable.
    #[must_use]
    pub fn is_mutable(&self, name: &str) -> bool {
        self.slots.borrow().get(name).is_some_and(|s| s.access.is_mutable())
    }

    /// Returns `true` if the slot `name` resolves to is user writable.
    #[must_use]
    pub fn is_user_writeable(&self, name: &str) -> bool {
        self.find(name)
            .is_some_and(|found| found.access == SlotAccess::UserWriteable)
    }

    /// Names defined in this frame, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn put(&self, name: &str, value: Object, access: SlotAccess, on_change: Option<ChangeHandler>) -> bool {
        let mut slots = self.slots.borrow_mut();
        if slots.contains_key(name) {
            tracing::debug!(name, "slot already defined in this frame");
            return false;
        }
        slots.insert(
            name.to_owned(),
            ContextSlot {
                value,
                access,
                downstream: Vec::new(),
                upstream: None,
                on_change,
            },
        );
        true
    }

    /// Defines a constant. Returns `false` if the name already exists in this frame.
    pub fn put_constant(&self, name: &str, value: Object) -> bool {
        self.put(name, value, SlotAccess::Constant, None)
    }

    /// Defines a user-writable slot. Returns `false` if the name already exists in this frame.
    pub fn put_user_writeable(&self, name: &str, value: Object) -> bool {
        self.put(name, value, SlotAccess::UserWriteable, None)
    }

    /// Defines a user-writable slot that calls `on_change` whenever its value changes.
    pub fn put_user_writeable_with_handler(
        &self,
        name: &str,
        value: Object,
        on_change: Rc<dyn Fn(&Object)>,
    ) -> bool {
        self.put(name, value, SlotAccess::UserWriteable, Some(on_change))
    }

    /// Defines a slot only the engine may write.
    pub fn put_system_writeable(&self, name: &str, value: Object) -> bool {
        self.put(name, value, SlotAccess::SystemWriteable, None)
    }

    /// Defines or replaces a resource constant such as `@brandColor`.
    pub fn put_resource(&self, name: &str, value: Object) {
        let mut slots = self.slots.borrow_mut();
        match slots.get_mut(name) {
            Some(slot) => {
                slot.value = value;
                slot.access = SlotAccess::Constant;
            }
            None => {
                slots.insert(
                    name.to_owned(),
                    ContextSlot {
                        value,
                        access: SlotAccess::Constant,
                        downstream: Vec::new(),
                        upstream: None,
                        on_change: None,
                    },
                );
            }
        }
    }

    /// Writes `value` into this frame's slot, returning its listeners if the value changed.
    fn set_local(&self, name: &str, value: &Object) -> Option<(Vec<Rc<dyn Dependant>>, Option<ChangeHandler>)> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(name)?;
        if slot.value == *value {
            return None;
        }
        slot.value = value.clone();
        Some((slot.downstream.clone(), slot.on_change.clone()))
    }

    /// Applies a document or host write to the nearest frame defining `name`.
    ///
    /// Read-only slots are refused with a console message. A successful write cuts any
    /// binding that was driving the slot, then drains the dependency queue. Returns `true` if
    /// the name was found.
    pub fn user_update_and_recalculate(&self, name: &str, value: Object) -> bool {
        let access = self.slots.borrow().get(name).map(|s| s.access);
        match access {
            Some(SlotAccess::UserWriteable) => {
                self.remove_upstream(name);
                if let Some((downstream, on_change)) = self.set_local(name, &value) {
                    tracing::debug!(name, listeners = downstream.len(), "user update");
                    for dependant in downstream {
                        dependant.enqueue();
                    }
                    self.dependant_manager().process_dependencies(true);
                    if let Some(handler) = on_change {
                        handler(&value);
                    }
                }
                true
            }
            Some(_) => {
                self.session()
                    .console(format!("Data-binding field '{name}' is read-only"));
                true
            }
            None => self
                .parent
                .as_ref()
                .is_some_and(|p| p.user_update_and_recalculate(name, value)),
        }
    }

    /// Applies an engine write to a writable slot of this frame and drains the queue.
    ///
    /// Returns `false` if this frame has no writable slot `name`.
    pub fn system_update_and_recalculate(&self, name: &str, value: Object, use_dirty_flag: bool) -> bool {
        if !self.is_mutable(name) {
            return false;
        }
        self.propagate(name, value, use_dirty_flag);
        self.dependant_manager().process_dependencies(use_dirty_flag);
        true
    }

    /// Stores a recalculated value and enqueues its listeners without draining.
    pub fn propagate(&self, name: &str, value: Object, use_dirty_flag: bool) {
        let Some((downstream, on_change)) = self.set_local(name, &value) else {
            return;
        };
        if use_dirty_flag {
            self.dirty.borrow_mut().insert(name.to_owned());
        }
        for dependant in downstream {
            dependant.enqueue();
        }
        if let Some(handler) = on_change {
            handler(&value);
        }
    }

    /// Names changed by propagation with the dirty flag since the last call.
    pub fn take_dirty(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dirty.borrow_mut().drain().collect();
        names.sort();
        names
    }

    /// Registers `dependant` as a listener of `name` in this frame.
    pub fn add_downstream(&self, name: &str, dependant: Rc<dyn Dependant>) {
        let mut slots = self.slots.borrow_mut();
        let Some(slot) = slots.get_mut(name) else {
            tracing::debug!(name, "listener for a missing slot ignored");
            return;
        };
        let order = dependant.order();
        debug_assert!(
            !slot.downstream.iter().any(|d| d.order() == order),
            "dependant registered twice on '{name}'"
        );
        slot.downstream.push(dependant);
    }

    /// Unregisters the dependant with sort key `order` from `name`.
    pub fn remove_downstream(&self, name: &str, order: u64) {
        let removed = {
            let mut slots = self.slots.borrow_mut();
            slots.get_mut(name).and_then(|slot| {
                let index = slot.downstream.iter().position(|d| d.order() == order)?;
                Some(slot.downstream.remove(index))
            })
        };
        // Dropped outside the borrow: this may be the last strong reference.
        drop(removed);
    }

    /// Records the dependant that writes `name`.
    pub fn add_upstream(&self, name: &str, dependant: Weak<dyn Dependant>) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(name) {
            debug_assert!(
                slot.upstream.as_ref().is_none_or(|w| w.strong_count() == 0),
                "slot '{name}' already has an upstream dependant"
            );
            slot.upstream = Some(dependant);
        }
    }

    /// Detaches the dependant that writes `name`, if any.
    pub fn remove_upstream(&self, name: &str) {
        let upstream = self
            .slots
            .borrow_mut()
            .get_mut(name)
            .and_then(|slot| slot.upstream.take());
        if let Some(dependant) = upstream.and_then(|w| w.upgrade()) {
            dependant.detach();
        }
    }

    /// Number of listeners registered on `name` in this frame.
    #[must_use]
    pub fn count_downstream(&self, name: &str) -> usize {
        self.slots.borrow().get(name).map_or(0, |s| s.downstream.len())
    }

    /// Number of live dependants writing `name` in this frame (zero or one).
    #[must_use]
    pub fn count_upstream(&self, name: &str) -> usize {
        self.slots
            .borrow()
            .get(name)
            .and_then(|s| s.upstream.as_ref())
            .map_or(0, |w| usize::from(w.strong_count() > 0))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // Dependants writing into this frame have nowhere to go; unhook them from their sources.
        let upstream: Vec<Rc<dyn Dependant>> = self
            .slots
            .get_mut()
            .values_mut()
            .filter_map(|slot| slot.upstream.take())
            .filter_map(|weak| weak.upgrade())
            .collect();
        for dependant in upstream {
            dependant.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::{BindingFunction, ContextDependant, parse_and_evaluate};

    fn bind(target: &Rc<Context>, name: &str, source: &Rc<Context>, text: &str) {
        let parsed = parse_and_evaluate(source, &Object::from(text), false);
        target.put_user_writeable(name, parsed.value.clone());
        if let Some(expression) = parsed.expression.filter(|_| !parsed.symbols.is_empty()) {
            ContextDependant::create(
                target,
                name,
                source,
                expression,
                BindingFunction::default(),
                parsed.symbols,
            );
        }
    }

    #[test]
    fn lookup_walks_the_chain_and_shadows() {
        let root = Context::create_test_context();
        root.put_constant("a", Object::from(1));
        root.put_constant("b", Object::from(2));
        let child = Context::create_child(&root);
        child.put_constant("a", Object::from(10));

        assert_eq!(child.opt("a"), Object::from(10));
        assert_eq!(child.opt("b"), Object::from(2));
        assert_eq!(child.opt("c"), Object::Null);
        assert!(child.has("b") && !child.has_local("b"));
        assert!(Rc::ptr_eq(&child.find_context_containing("b").unwrap(), &root));
        assert!(root.has("viewport"));
    }

    #[test]
    fn put_does_not_overwrite() {
        let context = Context::create_test_context();
        assert!(context.put_constant("a", Object::from(1)));
        assert!(!context.put_user_writeable("a", Object::from(2)));
        assert_eq!(context.opt("a"), Object::from(1));
        context.put_resource("a", Object::from(3));
        assert_eq!(context.opt("a"), Object::from(3));
    }

    #[test]
    fn chained_binding_updates() {
        let context = Context::create_test_context();
        context.put_user_writeable("a", Object::from(1));
        bind(&context, "b", &context, "${a}");
        bind(&context, "c", &context, "${b * 2}");
        assert_eq!(context.opt("c"), Object::from(2));

        assert!(context.user_update_and_recalculate("a", Object::from(7)));
        assert_eq!(context.opt("b"), Object::from(7));
        assert_eq!(context.opt("c"), Object::from(14));
        assert_eq!(context.count_downstream("a"), 1);
        assert_eq!(context.count_upstream("b"), 1);
    }

    #[test]
    fn expressions_over_context_values() {
        let context = Context::create_test_context();
        context.put_user_writeable("a", Object::from(1));
        context.put_user_writeable("c", Object::from(3));
        bind(&context, "plus", &context, "${a + 10}");
        bind(&context, "min", &context, "${Math.min(a, 100)}");
        bind(&context, "product", &context, "${a * c}");

        context.user_update_and_recalculate("a", Object::from(200));
        assert_eq!(context.opt("plus"), Object::from(210));
        assert_eq!(context.opt("min"), Object::from(100));
        assert_eq!(context.opt("product"), Object::from(600));

        context.user_update_and_recalculate("a", Object::from("fuzzy"));
        assert_eq!(context.opt("plus"), Object::from("fuzzy10"));
        assert!(context.opt("product").as_number().is_nan());
    }

    #[test]
    fn user_write_breaks_the_chain() {
        let context = Context::create_test_context();
        context.put_user_writeable("a", Object::from(1));
        bind(&context, "b", &context, "${a}");
        assert_eq!(context.count_downstream("a"), 1);

        context.user_update_and_recalculate("b", Object::from(99));
        assert_eq!(context.count_downstream("a"), 0);
        assert_eq!(context.count_upstream("b"), 0);

        context.user_update_and_recalculate("a", Object::from(5));
        assert_eq!(context.opt("b"), Object::from(99));
    }

    #[test]
    fn dropping_the_target_frees_the_dependant() {
        let first = Context::create_test_context();
        first.put_user_writeable("source", Object::from(1));
        let second = Context::create_child(&first);
        bind(&second, "target", &first, "${source}");
        assert_eq!(first.count_downstream("source"), 1);

        drop(second);
        assert_eq!(first.count_downstream("source"), 0);
    }

    #[test]
    fn read_only_writes_are_refused() {
        let root = Context::create_test_context();
        root.put_constant("k", Object::from(1));
        let child = Context::create_child(&root);
        assert!(child.user_update_and_recalculate("k", Object::from(2)));
        assert_eq!(root.opt("k"), Object::from(1));
        assert!(root.session().contains("Data-binding field 'k' is read-only"));
        assert!(!child.user_update_and_recalculate("nope", Object::from(2)));
    }

    #[test]
    fn same_value_does_not_cascade() {
        let context = Context::create_test_context();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        context.put_user_writeable_with_handler(
            "a",
            Object::from(1),
            Rc::new(move |_| counter.set(counter.get() + 1)),
        );
        context.user_update_and_recalculate("a", Object::from(1));
        assert_eq!(calls.get(), 0);
        context.user_update_and_recalculate("a", Object::from(2));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn system_slots_refuse_user_writes() {
        let context = Context::create_test_context();
        context.put_system_writeable("index", Object::from(0));
        bind(&context, "label", &context, "Item ${index}");
        context.user_update_and_recalculate("index", Object::from(4));
        assert_eq!(context.opt("label"), Object::from("Item 0"));

        assert!(context.system_update_and_recalculate("index", Object::from(4), true));
        assert_eq!(context.opt("label"), Object::from("Item 4"));
        assert_eq!(context.take_dirty(), vec!["index".to_owned(), "label".to_owned()]);
        assert!(context.take_dirty().is_empty());
    }

    #[test]
    fn dynamic_branches_rewire() {
        let context = Context::create_test_context();
        context.put_user_writeable("flag", Object::from(true));
        context.put_user_writeable("x", Object::from("x1"));
        context.put_user_writeable("y", Object::from("y1"));
        bind(&context, "out", &context, "${flag ? x : y}");
        assert_eq!(context.count_downstream("x"), 1);
        assert_eq!(context.count_downstream("y"), 0);

        context.user_update_and_recalculate("flag", Object::from(false));
        assert_eq!(context.opt("out"), Object::from("y1"));
        assert_eq!(context.count_downstream("x"), 0);
        assert_eq!(context.count_downstream("y"), 1);

        context.user_update_and_recalculate("y", Object::from("y2"));
        assert_eq!(context.opt("out"), Object::from("y2"));
        context.user_update_and_recalculate("x", Object::from("x2"));
        assert_eq!(context.opt("out"), Object::from("y2"));
    }
}
