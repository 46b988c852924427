// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The component tree node.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use hashbrown::HashMap;
use kurbo::{Affine, Rect, Vec2};
use smallvec::SmallVec;
use taffy::NodeId;
use taffy::style::{FlexDirection, LengthPercentageAuto, Style};
use understory_binding::{
    Context, Dependant, evaluate, evaluate_recursive, is_evaluable, parse_and_evaluate_nested,
};
use understory_object::{Dimension, Object, ObjectMap};

use crate::document::DocumentData;
use crate::property::{
    self, ComponentType, LayoutFn, PADDING_SIDES, PropDef, PropFlags, PropKind, PropertyKey,
    layout_f32,
};
use crate::rebuilder::LayoutRebuilder;
use crate::sticky::INSET_KEYS;
use crate::{ComponentDependant, EditText, StateFlags, TextRequest};

bitflags! {
    /// Cache and lifecycle bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct CoreFlags: u8 {
        const DISPLAYED_CHILDREN_STALE = 0x01;
        const GLOBAL_TO_LOCAL_STALE = 0x02;
        const VISUAL_CONTEXT_DIRTY = 0x04;
        const MOUNTED = 0x08;
        const RELEASED = 0x10;
    }
}

/// A live node of an inflated document.
///
/// Parents own their children; children, dependants and event views refer back weakly.
/// Property values live in a single map keyed by [`PropertyKey`]; every write funnels through
/// one choke point whose side effects are selected by the property's [`PropFlags`].
pub struct CoreComponent {
    self_weak: Weak<Self>,
    pub(crate) doc: Rc<DocumentData>,
    component_type: ComponentType,
    parent_type: Cell<Option<ComponentType>>,
    uid: u64,
    id: String,
    path: String,
    context: Rc<Context>,

    calculated: RefCell<BTreeMap<PropertyKey, Object>>,
    assigned: RefCell<BTreeSet<PropertyKey>>,
    dirty: RefCell<BTreeSet<PropertyKey>>,
    held_until_layout: RefCell<Vec<(PropertyKey, Object)>>,
    upstream: RefCell<HashMap<PropertyKey, Weak<dyn Dependant>>>,
    state: Cell<StateFlags>,
    flags: Cell<CoreFlags>,

    parent: RefCell<Weak<Self>>,
    children: RefCell<Vec<Rc<Self>>>,
    displayed_children: RefCell<Vec<Weak<Self>>>,
    global_to_local: Cell<Affine>,
    layout_node: Cell<Option<NodeId>>,

    pub(crate) sticky_descendants: RefCell<Vec<Weak<Self>>>,
    pub(crate) sticky_offset: Cell<Vec2>,
    pub(crate) children_changes: RefCell<Vec<Object>>,
    pub(crate) edit_text: RefCell<Option<Box<dyn EditText>>>,
    pub(crate) rebuilder: RefCell<Option<Rc<LayoutRebuilder>>>,
}

impl fmt::Debug for CoreComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreComponent")
            .field("type", &self.component_type)
            .field("uid", &self.uid)
            .field("id", &self.id)
            .field("path", &self.path)
            .field("children", &self.children.borrow().len())
            .finish_non_exhaustive()
    }
}

impl CoreComponent {
    /// Creates a detached component and assigns its properties from `raw`.
    pub(crate) fn create(
        doc: &Rc<DocumentData>,
        context: Rc<Context>,
        component_type: ComponentType,
        parent_type: Option<ComponentType>,
        id: String,
        path: String,
        raw: &Object,
    ) -> Rc<Self> {
        let uid = doc.next_uid();
        let component = Rc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            doc: doc.clone(),
            component_type,
            parent_type: Cell::new(parent_type),
            uid,
            id,
            path,
            context,
            calculated: RefCell::new(BTreeMap::new()),
            assigned: RefCell::new(BTreeSet::new()),
            dirty: RefCell::new(BTreeSet::new()),
            held_until_layout: RefCell::new(Vec::new()),
            upstream: RefCell::new(HashMap::new()),
            state: Cell::new(StateFlags::empty()),
            flags: Cell::new(
                CoreFlags::DISPLAYED_CHILDREN_STALE
                    | CoreFlags::GLOBAL_TO_LOCAL_STALE
                    | CoreFlags::VISUAL_CONTEXT_DIRTY,
            ),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            displayed_children: RefCell::new(Vec::new()),
            global_to_local: Cell::new(Affine::IDENTITY),
            layout_node: Cell::new(None),
            sticky_descendants: RefCell::new(Vec::new()),
            sticky_offset: Cell::new(Vec2::ZERO),
            children_changes: RefCell::new(Vec::new()),
            edit_text: RefCell::new(None),
            rebuilder: RefCell::new(None),
        });
        doc.register(&component);
        let node = doc
            .layout
            .borrow_mut()
            .new_node(initial_style(component_type), Rc::downgrade(&component));
        component.layout_node.set(node);
        component.assign_properties(raw);
        component.initialize();
        tracing::debug!(uid, kind = %component_type, path = %component.path, "component created");
        component
    }

    fn assign_properties(self: &Rc<Self>, raw: &Object) {
        let style_name = match raw.get("style") {
            Object::Null => String::new(),
            style => evaluate(&self.context, &style).as_string(),
        };
        let styled = self
            .doc
            .styles
            .resolve(&style_name, &self.context, self.state.get());
        for def in property::all_defs(self.component_type, self.parent_type.get()) {
            let name = def.key.name();
            let value = if def.flags.contains(PropFlags::IN) && raw.has(name) {
                self.assign_from_document(def, &raw.get(name))
            } else if let Some(value) = styled
                .get(name)
                .filter(|_| def.flags.contains(PropFlags::STYLED))
            {
                self.convert_or_default(def, value)
            } else {
                if def.flags.contains(PropFlags::REQUIRED) {
                    self.console(format!("Missing required property '{name}'"));
                }
                def.default_value()
            };
            self.calculated.borrow_mut().insert(def.key, value);
        }
        let user = user_properties(&self.context, raw);
        if !user.is_empty() {
            self.calculated
                .borrow_mut()
                .insert(PropertyKey::User, Object::from(user));
        }
    }

    fn assign_from_document(self: &Rc<Self>, def: &PropDef, raw: &Object) -> Object {
        self.assigned.borrow_mut().insert(def.key);
        if def.kind == PropKind::Command {
            return Object::from(raw.as_array());
        }
        let tracked = raw.is_string() || def.flags.contains(PropFlags::EVALUATED);
        if def.flags.contains(PropFlags::DYNAMIC) && tracked && is_evaluable(raw) {
            let result = parse_and_evaluate_nested(&self.context, raw, true);
            let value = self.convert_or_default(def, &result.value);
            if result.is_dynamic() {
                if let Some(expression) = result.expression {
                    ComponentDependant::create(
                        self,
                        def.key,
                        &self.context,
                        expression,
                        result.symbols,
                    );
                }
            }
            return value;
        }
        self.convert_or_default(def, &evaluate_recursive(&self.context, raw))
    }

    fn convert_or_default(&self, def: &PropDef, value: &Object) -> Object {
        def.convert(value, self.context.metrics()).unwrap_or_else(|| {
            self.console(format!("Invalid value for property '{}': {value}", def.key));
            def.default_value()
        })
    }

    /// Pushes assigned values into the layout node and derives state.
    fn initialize(self: &Rc<Self>) {
        let metrics = *self.context.metrics();
        let defs: SmallVec<[&PropDef; 32]> = property::all_defs(self.component_type, self.parent_type.get())
            .filter(|d| d.flags.contains(PropFlags::LAYOUT) && d.layout.is_some())
            .collect();
        self.update_layout_style(|style| {
            for def in &defs {
                if let Some(layout) = def.layout {
                    let value = self.calculated.borrow().get(&def.key).cloned().unwrap_or_default();
                    layout(style, &value, &metrics);
                }
            }
        });
        self.apply_padding();
        if self.is_sticky() {
            self.apply_layout_insets();
        }
        if self.find_def(PropertyKey::VisualHash).is_some() {
            let digest = self.visual_hash_digest();
            self.calculated.borrow_mut().insert(PropertyKey::VisualHash, digest);
        }
        self.sync_state_from_properties();
        self.recompute_transform();
        if self.component_type == ComponentType::EditText {
            if let Some(factory) = self.doc.config.edit_text_factory() {
                let handle = crate::edit_text::create_for(factory.as_ref(), self.self_weak.clone());
                *self.edit_text.borrow_mut() = Some(handle);
            }
        }
    }

    /// Runtime id, unique within the document.
    #[must_use]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Document-assigned id, possibly empty.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Component type.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Document path of the JSON this component was inflated from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The data-binding frame of this component.
    #[must_use]
    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    /// Current interaction state.
    #[must_use]
    pub fn state(&self) -> StateFlags {
        self.state.get()
    }

    pub(crate) fn self_rc(&self) -> Option<Rc<Self>> {
        self.self_weak.upgrade()
    }

    pub(crate) fn layout_node(&self) -> Option<NodeId> {
        self.layout_node.get()
    }

    pub(crate) fn console(&self, message: impl AsRef<str>) {
        self.doc.session.console_at(&self.path, message);
    }

    fn has_flag(&self, flag: CoreFlags) -> bool {
        self.flags.get().contains(flag)
    }

    fn set_flag(&self, flag: CoreFlags, on: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, on);
        self.flags.set(flags);
    }

    /// Returns `true` once [`release`](Self::release) has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.has_flag(CoreFlags::RELEASED)
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.has_flag(CoreFlags::MOUNTED)
    }

    pub(crate) fn set_mounted(&self) {
        self.set_flag(CoreFlags::MOUNTED, true);
    }

    // Properties

    /// Resolves the definition of `key` for this component and its current parent.
    #[must_use]
    pub fn find_def(&self, key: PropertyKey) -> Option<&'static PropDef> {
        property::find_def(self.component_type, self.parent_type.get(), key)
    }

    /// The current value of `key`, or null if the component does not carry it.
    #[must_use]
    pub fn get_calculated(&self, key: PropertyKey) -> Object {
        self.calculated.borrow().get(&key).cloned().unwrap_or_default()
    }

    /// Every property and its current value.
    #[must_use]
    pub fn calculated(&self) -> Vec<(PropertyKey, Object)> {
        self.calculated
            .borrow()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Returns `true` if `key` was set by the document or a command rather than a default or style.
    #[must_use]
    pub fn is_assigned(&self, key: PropertyKey) -> bool {
        self.assigned.borrow().contains(&key)
    }

    /// Returns `true` if a live binding currently drives `key`.
    #[must_use]
    pub fn has_upstream(&self, key: PropertyKey) -> bool {
        self.upstream
            .borrow()
            .get(&key)
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Sets a dynamic property, cutting any binding that was driving it.
    ///
    /// Returns `false` and reports on the console if the key is not a dynamic property of
    /// this component or the value cannot be converted. A child inheriting its parent's state
    /// ignores writes to the mirrored state properties. Properties that depend on laid out
    /// children, such as the scroll position, are held until the next layout pass.
    pub fn set_property(&self, key: PropertyKey, value: Object) -> bool {
        let Some(def) = self.find_def(key) else {
            self.console(format!("Invalid property key '{key}' for {}", self.component_type));
            return false;
        };
        if !def.flags.contains(PropFlags::DYNAMIC) {
            self.console(format!("Property '{key}' is not dynamic"));
            return false;
        }
        if def.flags.contains(PropFlags::MIXED_STATE) && self.inherits_parent_state() {
            tracing::debug!(uid = self.uid, %key, "write ignored, state is inherited");
            return false;
        }
        let Some(value) = def.convert(&value, self.context.metrics()) else {
            self.console(format!("Invalid value for property '{key}': {value}"));
            return false;
        };
        self.remove_upstream(key);
        self.assigned.borrow_mut().insert(key);
        if def.flags.contains(PropFlags::SET_AFTER_LAYOUT) && !self.is_laid_out() {
            tracing::debug!(uid = self.uid, %key, "write held until layout");
            let mut held = self.held_until_layout.borrow_mut();
            held.retain(|(k, _)| *k != key);
            held.push((key, value));
            return true;
        }
        self.handle_property_change(def, value);
        true
    }

    /// Applies writes held by [`set_property`](Self::set_property) until the first layout.
    pub(crate) fn apply_held_writes(&self) {
        let held = core::mem::take(&mut *self.held_until_layout.borrow_mut());
        for (key, value) in held {
            if let Some(def) = self.find_def(key) {
                self.handle_property_change(def, value);
            }
        }
    }

    /// Sets a property or, failing that, a writable binding visible from this component.
    pub fn set_property_by_name(&self, name: &str, value: Object) -> bool {
        if let Some(key) = PropertyKey::from_name(name) {
            if self.find_def(key).is_some() {
                return self.set_property(key, value);
            }
        }
        if self.context.is_user_writeable(name) {
            return self.context.user_update_and_recalculate(name, value);
        }
        self.console(format!("Unknown property name '{name}'"));
        false
    }

    /// Applies a recalculated binding value. Only bound properties accept updates.
    pub(crate) fn update_property(&self, key: PropertyKey, value: &Object) {
        if !self.is_assigned(key) {
            return;
        }
        let Some(def) = self.find_def(key) else {
            return;
        };
        let value = self.convert_or_default(def, value);
        self.handle_property_change(def, value);
    }

    pub(crate) fn set_upstream(&self, key: PropertyKey, dependant: Weak<dyn Dependant>) {
        self.upstream.borrow_mut().insert(key, dependant);
    }

    /// Detaches the binding driving `key`, if any.
    pub(crate) fn remove_upstream(&self, key: PropertyKey) {
        let upstream = self.upstream.borrow_mut().remove(&key);
        if let Some(dependant) = upstream.and_then(|w| w.upgrade()) {
            dependant.detach();
        }
    }

    fn remove_all_upstream(&self) {
        let upstream: Vec<_> = self.upstream.borrow_mut().drain().map(|(_, w)| w).collect();
        for dependant in upstream.iter().filter_map(Weak::upgrade) {
            dependant.detach();
        }
    }

    /// Stores `value` and runs every side effect its definition asks for.
    ///
    /// Returns `false` if the value did not change.
    pub(crate) fn handle_property_change(&self, def: &PropDef, value: Object) -> bool {
        let key = def.key;
        let previous = {
            let mut calculated = self.calculated.borrow_mut();
            if calculated.get(&key) == Some(&value) {
                return false;
            }
            calculated.insert(key, value.clone())
        };
        tracing::trace!(uid = self.uid, %key, %value, "property changed");

        let flags = def.flags;
        if flags.contains(PropFlags::OUT) {
            self.mark_dirty(key);
        }
        if flags.contains(PropFlags::LAYOUT) && !(INSET_KEYS.contains(&key) && self.is_sticky()) {
            if let Some(layout) = def.layout {
                let metrics = *self.context.metrics();
                self.update_layout_style(|style| layout(style, &value, &metrics));
            }
        }
        if flags.contains(PropFlags::TEXT_HASH) {
            self.mark_layout_dirty();
        }
        if flags.contains(PropFlags::VISUAL_HASH) {
            self.set_runtime(PropertyKey::VisualHash, self.visual_hash_digest());
        }
        if flags.contains(PropFlags::VISUAL_CONTEXT) {
            self.mark_visual_context_dirty();
        }
        if flags.contains(PropFlags::MIXED_STATE) {
            self.propagate_mixed_state(key, &value);
        }
        if key == PropertyKey::Position {
            self.sticky_transition(previous.as_ref(), &value);
        }
        if let Some(trigger) = def.trigger {
            trigger(self);
        }
        true
    }

    fn mark_dirty(&self, key: PropertyKey) {
        if self.dirty.borrow_mut().insert(key) {
            self.doc.mark_dirty(self.uid);
        }
    }

    /// Output properties changed since the last [`clear_dirty`](Self::clear_dirty).
    #[must_use]
    pub fn dirty_properties(&self) -> Vec<PropertyKey> {
        self.dirty.borrow().iter().copied().collect()
    }

    /// Forgets every dirty property.
    pub fn clear_dirty(&self) {
        self.dirty.borrow_mut().clear();
    }

    pub(crate) fn take_dirty(&self) -> BTreeSet<PropertyKey> {
        core::mem::take(&mut *self.dirty.borrow_mut())
    }

    // State

    /// Returns `true` if this component mirrors its parent's checked, disabled and pressed state.
    #[must_use]
    pub fn inherits_parent_state(&self) -> bool {
        self.get_calculated(PropertyKey::InheritParentState).truthy()
    }

    /// Recomputes the checked and disabled bits after the properties changed.
    pub(crate) fn sync_state_from_properties(&self) {
        let mut state = self.state.get();
        state.set(StateFlags::CHECKED, self.get_calculated(PropertyKey::Checked).truthy());
        state.set(StateFlags::DISABLED, self.get_calculated(PropertyKey::Disabled).truthy());
        self.apply_state(state);
    }

    /// Sets or clears a transient state bit such as pressed or hover.
    pub fn set_state(&self, flag: StateFlags, on: bool) {
        let mut state = self.state.get();
        state.set(flag, on);
        self.apply_state(state);
        if flag.contains(StateFlags::PRESSED) {
            for child in self.children() {
                if child.inherits_parent_state() {
                    child.set_state(StateFlags::PRESSED, on);
                }
            }
        }
    }

    fn apply_state(&self, state: StateFlags) {
        let previous = self.state.replace(state);
        if previous == state {
            return;
        }
        tracing::debug!(uid = self.uid, ?state, "state changed");
        if state.contains(StateFlags::DISABLED) && state.contains(StateFlags::FOCUSED) {
            self.doc.focus.clear_focus();
        }
        self.mark_visual_context_dirty();
        self.restyle();
    }

    fn propagate_mixed_state(&self, key: PropertyKey, value: &Object) {
        for child in self.children() {
            if !child.inherits_parent_state() {
                continue;
            }
            if let Some(def) = child.find_def(key) {
                child.handle_property_change(def, value.clone());
            }
        }
    }

    /// Copies the parent's mixed state into a child that inherits it.
    fn inherit_state_from(&self, parent: &Self) {
        if !self.inherits_parent_state() {
            return;
        }
        for key in [PropertyKey::Checked, PropertyKey::Disabled] {
            if let Some(def) = self.find_def(key) {
                self.handle_property_change(def, parent.get_calculated(key));
            }
        }
        self.set_state(
            StateFlags::PRESSED,
            parent.state().contains(StateFlags::PRESSED),
        );
    }

    /// Re-resolves styled properties that were not assigned directly.
    pub(crate) fn restyle(&self) {
        let name = self.get_calculated(PropertyKey::Style).as_string();
        let values: ObjectMap = self.doc.styles.resolve(&name, &self.context, self.state.get());
        for def in property::all_defs(self.component_type, self.parent_type.get()) {
            if !def.flags.contains(PropFlags::STYLED) || self.is_assigned(def.key) {
                continue;
            }
            let value = values
                .get(def.key.name())
                .map_or_else(|| def.default_value(), |v| self.convert_or_default(def, v));
            self.handle_property_change(def, value);
        }
    }

    // Tree

    /// The parent, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<Rc<Self>> {
        self.parent.borrow().upgrade()
    }

    /// A snapshot of the children.
    #[must_use]
    pub fn children(&self) -> Vec<Rc<Self>> {
        self.children.borrow().clone()
    }

    /// Number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// Child at `index`.
    #[must_use]
    pub fn child_at(&self, index: usize) -> Option<Rc<Self>> {
        self.children.borrow().get(index).cloned()
    }

    /// Position of `child` among the children.
    #[must_use]
    pub fn index_of(&self, child: &Self) -> Option<usize> {
        self.children
            .borrow()
            .iter()
            .position(|c| core::ptr::eq(c.as_ref(), child))
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        let mut current = Some(other.self_rc());
        while let Some(Some(component)) = current {
            if core::ptr::eq(component.as_ref(), self) {
                return true;
            }
            current = Some(component.parent());
        }
        false
    }

    /// Returns `true` if a list rebuilder manages the children.
    #[must_use]
    pub fn has_rebuilder(&self) -> bool {
        self.rebuilder.borrow().is_some()
    }

    /// Inserts `child` at `index` (clamped). Fails if the child already has a parent, this
    /// type cannot hold more children, or a rebuilder manages the children.
    pub fn insert_child(&self, child: &Rc<Self>, index: usize) -> bool {
        if self.has_rebuilder() {
            self.console("Children are managed by a data source");
            return false;
        }
        self.attach_child(child, index)
    }

    /// Removes `child`. Fails if it is not a child or a rebuilder manages the children.
    pub fn remove_child(&self, child: &Rc<Self>) -> bool {
        if self.has_rebuilder() {
            self.console("Children are managed by a data source");
            return false;
        }
        self.detach_child(child).is_some()
    }

    /// Removes this component from its parent.
    pub fn remove(&self) -> bool {
        match (self.parent(), self.self_rc()) {
            (Some(parent), Some(this)) => parent.remove_child(&this),
            _ => false,
        }
    }

    pub(crate) fn attach_child(&self, child: &Rc<Self>, index: usize) -> bool {
        if child.parent().is_some() || child.is_released() || child.is_ancestor_of(self) {
            return false;
        }
        if self
            .component_type
            .max_children()
            .is_some_and(|max| self.child_count() >= max)
        {
            self.console(format!("{} cannot hold more children", self.component_type));
            return false;
        }
        let index = index.min(self.child_count());
        *child.parent.borrow_mut() = self.self_weak.clone();
        child.parent_type.set(Some(self.component_type));
        self.children.borrow_mut().insert(index, child.clone());
        if let (Some(parent_node), Some(child_node)) = (self.layout_node(), child.layout_node()) {
            self.doc
                .layout
                .borrow_mut()
                .insert_child(parent_node, index, child_node);
        }
        child.mark_added(self);
        self.refresh_child_spacing();
        self.notify_child_changed(index, child.uid, "insert");
        self.mark_displayed_children_stale();
        self.mark_visual_context_dirty();
        true
    }

    pub(crate) fn detach_child(&self, child: &Rc<Self>) -> Option<usize> {
        let index = self.index_of(child)?;
        self.doc.focus.handle_removal(&self.doc, child);
        self.children.borrow_mut().remove(index);
        if let (Some(parent_node), Some(child_node)) = (self.layout_node(), child.layout_node()) {
            self.doc
                .layout
                .borrow_mut()
                .remove_child(parent_node, child_node);
        }
        child.mark_removed();
        *child.parent.borrow_mut() = Weak::new();
        self.refresh_child_spacing();
        self.notify_child_changed(index, child.uid, "remove");
        self.mark_displayed_children_stale();
        self.mark_visual_context_dirty();
        Some(index)
    }

    fn mark_added(&self, parent: &Self) {
        self.inherit_state_from(parent);
        self.register_sticky_subtree();
        self.mark_global_to_local_stale();
    }

    fn mark_removed(&self) {
        self.unregister_sticky_subtree();
        for def in property::all_defs(self.component_type, self.parent_type.get()) {
            if def.flags.contains(PropFlags::RESET_ON_REMOVE) {
                self.handle_property_change(def, def.default_value());
            }
        }
        self.mark_global_to_local_stale();
    }

    fn notify_child_changed(&self, index: usize, uid: u64, action: &str) {
        let mut change = ObjectMap::new();
        change.insert("index".into(), Object::from(index));
        change.insert("uid".into(), Object::from(uid.to_string()));
        change.insert("action".into(), Object::from(action));
        self.children_changes.borrow_mut().push(Object::from(change));
        self.doc.mark_children_changed(self.uid);
    }

    /// Pending `{index, uid, action}` child change records, drained.
    pub fn take_children_changes(&self) -> Vec<Object> {
        core::mem::take(&mut *self.children_changes.borrow_mut())
    }

    /// Releases this subtree permanently: children first, then bindings, host resources and
    /// the layout node.
    pub fn release(&self) {
        if self.is_released() {
            return;
        }
        if let Some(this) = self.self_rc() {
            match self.parent() {
                Some(parent) => {
                    parent.detach_child(&this);
                }
                None => self.doc.focus.handle_removal(&self.doc, &this),
            }
        }
        self.release_subtree();
    }

    fn release_subtree(&self) {
        self.set_flag(CoreFlags::RELEASED, true);
        self.rebuilder.borrow_mut().take();
        let children = core::mem::take(&mut *self.children.borrow_mut());
        for child in &children {
            *child.parent.borrow_mut() = Weak::new();
            child.release_subtree();
        }
        self.displayed_children.borrow_mut().clear();
        self.remove_all_upstream();
        if let Some(edit_text) = self.edit_text.borrow_mut().take() {
            edit_text.release();
        }
        if let Some(node) = self.layout_node.take() {
            self.doc.layout.borrow_mut().remove(node);
        }
        self.doc.unregister(self.uid);
        tracing::debug!(uid = self.uid, "component released");
    }

    // Layout

    pub(crate) fn update_layout_style(&self, apply: impl FnOnce(&mut Style)) {
        if let Some(node) = self.layout_node() {
            self.doc.layout.borrow_mut().update_style(node, apply);
        }
    }

    pub(crate) fn mark_layout_dirty(&self) {
        if let Some(node) = self.layout_node() {
            self.doc.layout.borrow_mut().mark_dirty(node);
        }
    }

    /// Sizes an auto-sized root to the viewport.
    pub(crate) fn fill_viewport(&self) {
        let metrics = *self.context.metrics();
        let width_auto = self.get_calculated(PropertyKey::Width).as_dimension(&metrics).is_auto();
        let height_auto = self.get_calculated(PropertyKey::Height).as_dimension(&metrics).is_auto();
        self.update_layout_style(|style| {
            if width_auto {
                style.size.width = taffy::style::Dimension::length(layout_f32(metrics.width));
            }
            if height_auto {
                style.size.height = taffy::style::Dimension::length(layout_f32(metrics.height));
            }
        });
    }

    /// Writes a layout result back into the properties.
    pub(crate) fn apply_layout(&self, bounds: Rect, inner: Rect) {
        let bounds_changed = self.set_runtime(PropertyKey::Bounds, Object::from(bounds));
        self.set_runtime(PropertyKey::InnerBounds, Object::from(inner));
        self.set_runtime(PropertyKey::LaidOut, Object::from(true));
        if bounds_changed {
            self.recompute_transform();
            self.mark_global_to_local_stale();
            self.mark_displayed_children_stale();
            if let Some(parent) = self.parent() {
                parent.mark_displayed_children_stale();
            }
        }
    }

    fn set_runtime(&self, key: PropertyKey, value: Object) -> bool {
        self.find_def(key)
            .is_some_and(|def| self.handle_property_change(def, value))
    }

    /// Returns `true` after the first layout pass that included this component.
    #[must_use]
    pub fn is_laid_out(&self) -> bool {
        self.get_calculated(PropertyKey::LaidOut).truthy()
    }

    /// Bounds relative to the parent, in dp.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self.get_calculated(PropertyKey::Bounds) {
            Object::Rect(rect) => rect,
            _ => Rect::ZERO,
        }
    }

    /// The current output transform, including any sticky offset.
    #[must_use]
    pub fn transform(&self) -> Affine {
        match self.get_calculated(PropertyKey::Transform) {
            Object::Transform(transform) => transform,
            _ => Affine::IDENTITY,
        }
    }

    pub(crate) fn text_request(&self) -> TextRequest {
        let metrics = self.context.metrics();
        let font_size = match self.get_calculated(PropertyKey::FontSize).as_dimension(metrics) {
            Dimension::Absolute(size) => size,
            _ => 40.0,
        };
        TextRequest {
            text: self.get_calculated(PropertyKey::Text).as_string(),
            font_size,
            max_lines: u32::try_from(self.get_calculated(PropertyKey::MaxLines).as_int())
                .unwrap_or(0),
        }
    }

    /// Pushes padding into the layout node. An assigned per-side property wins over the
    /// matching `padding` array entry; missing entries are zero.
    pub(crate) fn apply_padding(&self) {
        let metrics = *self.context.metrics();
        let common = self.get_calculated(PropertyKey::Padding).as_array();
        let sides: SmallVec<[(LayoutFn, Object); 4]> = PADDING_SIDES
            .iter()
            .enumerate()
            .map(|(index, (key, layout))| {
                let value = if self.is_assigned(*key) {
                    self.get_calculated(*key)
                } else {
                    common.get(index).cloned().unwrap_or_else(|| Object::from(0))
                };
                (*layout, value)
            })
            .collect();
        self.update_layout_style(|style| {
            for (layout, value) in &sides {
                layout(style, value, &metrics);
            }
        });
    }

    /// Digest of every appearance property, as a hex string. Equal digests render the same.
    fn visual_hash_digest(&self) -> Object {
        let mut hasher = DefaultHasher::new();
        for def in property::all_defs(self.component_type, self.parent_type.get())
            .filter(|def| def.flags.contains(PropFlags::VISUAL_HASH))
        {
            def.key.hash(&mut hasher);
            self.get_calculated(def.key).to_string().hash(&mut hasher);
        }
        Object::from(format!("{:016x}", hasher.finish()))
    }

    /// Spacing is a leading margin along the parent's main axis, skipped for the first child.
    pub(crate) fn apply_spacing(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        let metrics = *self.context.metrics();
        let spacing = match self.get_calculated(PropertyKey::Spacing).as_dimension(&metrics) {
            Dimension::Absolute(v) if parent.index_of(self).is_some_and(|i| i > 0) => v,
            _ => 0.0,
        };
        let margin = LengthPercentageAuto::length(layout_f32(spacing));
        let zero = LengthPercentageAuto::length(0.0);
        let direction = parent.main_axis();
        self.update_layout_style(|style| {
            style.margin.top = zero;
            style.margin.left = zero;
            style.margin.bottom = zero;
            style.margin.right = zero;
            match direction {
                FlexDirection::Column => style.margin.top = margin,
                FlexDirection::Row => style.margin.left = margin,
                FlexDirection::ColumnReverse => style.margin.bottom = margin,
                FlexDirection::RowReverse => style.margin.right = margin,
            }
        });
    }

    pub(crate) fn main_axis(&self) -> FlexDirection {
        let direction = if self.component_type == ComponentType::Sequence {
            self.get_calculated(PropertyKey::ScrollDirection)
        } else {
            self.get_calculated(PropertyKey::Direction)
        };
        match direction.as_str() {
            Some("row" | "horizontal") => FlexDirection::Row,
            Some("rowReverse") => FlexDirection::RowReverse,
            Some("columnReverse") => FlexDirection::ColumnReverse,
            _ => FlexDirection::Column,
        }
    }

    pub(crate) fn refresh_child_spacing(&self) {
        for child in self.children() {
            child.apply_spacing();
        }
    }

    // Visibility

    /// Returns `true` if `display` is normal and the component is not fully transparent.
    #[must_use]
    pub fn is_displayable(&self) -> bool {
        self.get_calculated(PropertyKey::Display).as_str() == Some("normal")
            && self.get_calculated(PropertyKey::Opacity).as_number() > 0.0
    }

    /// Invalidates the displayed children list. Recomputed lazily on the next read.
    pub fn mark_displayed_children_stale(&self) {
        self.set_flag(CoreFlags::DISPLAYED_CHILDREN_STALE, true);
    }

    /// Returns `true` if the displayed children list needs recomputing.
    #[must_use]
    pub fn is_displayed_children_stale(&self) -> bool {
        self.has_flag(CoreFlags::DISPLAYED_CHILDREN_STALE)
    }

    pub(crate) fn mark_visibility_changed(&self) {
        if let Some(parent) = self.parent() {
            parent.mark_displayed_children_stale();
        }
        self.mark_visual_context_dirty();
    }

    /// The scrolled viewport of this component in its own coordinates.
    fn viewport(&self) -> Rect {
        let size = self.bounds().size();
        Rect::from_origin_size(self.scroll_offset().to_point(), size)
    }

    fn ensure_displayed_children(&self) {
        if !self.is_displayed_children_stale() {
            return;
        }
        let check_bounds = self.is_laid_out();
        let viewport = self.viewport();
        let mut displayed = Vec::new();
        let mut sticky: SmallVec<[Weak<Self>; 2]> = SmallVec::new();
        for child in self.children.borrow().iter() {
            if !child.is_displayable() {
                continue;
            }
            if child.is_sticky() {
                sticky.push(Rc::downgrade(child));
                continue;
            }
            if check_bounds {
                let rect = child.bounds();
                let local = Affine::translate(rect.origin().to_vec2())
                    * child.transform()
                    * Affine::translate(-rect.origin().to_vec2());
                let visible = local.transform_rect_bbox(rect);
                if !overlaps(visible, viewport) {
                    continue;
                }
            }
            displayed.push(Rc::downgrade(child));
        }
        displayed.extend(sticky);
        *self.displayed_children.borrow_mut() = displayed;
        self.set_flag(CoreFlags::DISPLAYED_CHILDREN_STALE, false);
    }

    /// Number of children currently visible in the viewport, sticky ones included.
    #[must_use]
    pub fn displayed_child_count(&self) -> usize {
        self.ensure_displayed_children();
        self.displayed_children.borrow().len()
    }

    /// Displayed child at `index`; sticky children come last.
    #[must_use]
    pub fn displayed_child_at(&self, index: usize) -> Option<Rc<Self>> {
        self.ensure_displayed_children();
        self.displayed_children.borrow().get(index).and_then(Weak::upgrade)
    }

    /// Every displayed child in drawing order.
    #[must_use]
    pub fn displayed_children(&self) -> Vec<Rc<Self>> {
        self.ensure_displayed_children();
        self.displayed_children
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn mark_visual_context_dirty(&self) {
        let mut current = self.self_rc();
        while let Some(component) = current {
            if component.has_flag(CoreFlags::VISUAL_CONTEXT_DIRTY) {
                break;
            }
            component.set_flag(CoreFlags::VISUAL_CONTEXT_DIRTY, true);
            current = component.parent();
        }
    }

    /// Returns `true` if the visual context of this subtree changed since it was serialized.
    #[must_use]
    pub fn is_visual_context_dirty(&self) -> bool {
        self.has_flag(CoreFlags::VISUAL_CONTEXT_DIRTY)
    }

    pub(crate) fn clear_visual_context_dirty(&self) {
        self.set_flag(CoreFlags::VISUAL_CONTEXT_DIRTY, false);
        for child in self.children.borrow().iter() {
            child.clear_visual_context_dirty();
        }
    }

    // Transforms and scrolling

    /// Recomputes the output transform from `transform` and the sticky offset.
    pub(crate) fn recompute_transform(&self) {
        let metrics = *self.context.metrics();
        let assigned = self.get_calculated(PropertyKey::TransformAssigned);
        let center = self.bounds().size().to_vec2() * 0.5;
        let local = transform_from_ops(&assigned, &metrics);
        let output = Affine::translate(self.sticky_offset.get())
            * Affine::translate(center)
            * local
            * Affine::translate(-center);
        if self.set_runtime(PropertyKey::Transform, Object::from(output)) {
            self.mark_global_to_local_stale();
            if let Some(parent) = self.parent() {
                parent.mark_displayed_children_stale();
            }
        }
    }

    /// Offset of the content under the viewport for scrollable types.
    #[must_use]
    pub fn scroll_offset(&self) -> Vec2 {
        if !self.component_type.is_scrollable() {
            return Vec2::ZERO;
        }
        let position = self.get_calculated(PropertyKey::ScrollPosition).as_number();
        if self.get_calculated(PropertyKey::ScrollDirection).as_str() == Some("horizontal") {
            Vec2::new(position, 0.0)
        } else {
            Vec2::new(0.0, position)
        }
    }

    pub(crate) fn handle_scroll(&self) {
        self.mark_displayed_children_stale();
        for child in self.children.borrow().iter() {
            child.mark_global_to_local_stale();
        }
        self.update_sticky_children();
        self.mark_visual_context_dirty();
    }

    /// Invalidates the cached global-to-local transform of this component only.
    pub(crate) fn mark_global_to_local_stale(&self) {
        self.set_flag(CoreFlags::GLOBAL_TO_LOCAL_STALE, true);
    }

    /// Maps this component's coordinates into its parent's.
    fn to_parent(&self) -> Affine {
        let parent_scroll = self.parent().map_or(Vec2::ZERO, |p| p.scroll_offset());
        Affine::translate(-parent_scroll)
            * Affine::translate(self.bounds().origin().to_vec2())
            * self.transform()
    }

    /// The transform from document coordinates into this component's coordinates.
    ///
    /// Ancestors are brought up to date first; recomputing a changed value invalidates the
    /// children, so staleness travels down lazily at read time.
    #[must_use]
    pub fn global_to_local(&self) -> Affine {
        let parent = self.parent();
        let parent_global = parent.as_ref().map_or(Affine::IDENTITY, |p| p.global_to_local());
        if self.has_flag(CoreFlags::GLOBAL_TO_LOCAL_STALE) {
            let local_to_global = parent_global.inverse() * self.to_parent();
            let updated = local_to_global.inverse();
            self.set_flag(CoreFlags::GLOBAL_TO_LOCAL_STALE, false);
            if updated != self.global_to_local.replace(updated) {
                for child in self.children.borrow().iter() {
                    child.mark_global_to_local_stale();
                }
            }
        }
        self.global_to_local.get()
    }

    /// The transform from this component's coordinates into document coordinates.
    #[must_use]
    pub fn local_to_global(&self) -> Affine {
        self.global_to_local().inverse()
    }

    /// Sets the scroll position of a scrollable component.
    pub fn scroll_to(&self, position: f64) -> bool {
        self.component_type.is_scrollable()
            && self.set_property(PropertyKey::ScrollPosition, Object::from(position))
    }
}

impl Drop for CoreComponent {
    fn drop(&mut self) {
        let upstream: Vec<_> = self.upstream.get_mut().drain().map(|(_, w)| w).collect();
        for dependant in upstream.iter().filter_map(Weak::upgrade) {
            dependant.detach();
        }
        if let Some(node) = self.layout_node.take() {
            if let Ok(mut layout) = self.doc.layout.try_borrow_mut() {
                layout.remove(node);
            }
        }
        if let Some(edit_text) = self.edit_text.get_mut().take() {
            edit_text.release();
        }
        self.doc.unregister(self.uid);
    }
}

fn initial_style(component_type: ComponentType) -> Style {
    let mut style = Style {
        flex_direction: FlexDirection::Column,
        flex_shrink: 0.0,
        ..Style::DEFAULT
    };
    if component_type.is_scrollable() {
        style.overflow.y = taffy::style::Overflow::Scroll;
    }
    style
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// `-user-` prefixed properties, evaluated, without the prefix.
fn user_properties(context: &Context, raw: &Object) -> ObjectMap {
    raw.as_map()
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| {
                    let name = name.strip_prefix("-user-")?;
                    Some((name.to_owned(), evaluate_recursive(context, value)))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Composes `[{"rotate": 45}, {"translateX": 10}, ...]` left to right.
fn transform_from_ops(ops: &Object, metrics: &understory_object::Metrics) -> Affine {
    let dimension = |value: &Object| value.as_dimension(metrics).value();
    let mut transform = Affine::IDENTITY;
    for op in ops.as_array() {
        let Some(entries) = op.as_map() else {
            continue;
        };
        for (name, value) in entries {
            let step = match name.as_str() {
                "rotate" => Affine::rotate(value.as_number().to_radians()),
                "scale" => Affine::scale(value.as_number()),
                "scaleX" => Affine::scale_non_uniform(value.as_number(), 1.0),
                "scaleY" => Affine::scale_non_uniform(1.0, value.as_number()),
                "translateX" => Affine::translate((dimension(value), 0.0)),
                "translateY" => Affine::translate((0.0, dimension(value))),
                "skewX" => Affine::skew(value.as_number().to_radians().tan(), 0.0),
                "skewY" => Affine::skew(0.0, value.as_number().to_radians().tan()),
                _ => continue,
            };
            transform = transform * step;
        }
    }
    transform
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_ops_compose_in_order() {
        let metrics = understory_object::Metrics::default();
        let ops = Object::from_json_str(r#"[{"translateX": 10}, {"scale": 2}]"#).unwrap();
        let transform = transform_from_ops(&ops, &metrics);
        assert_eq!(transform * kurbo::Point::new(1.0, 1.0), kurbo::Point::new(12.0, 2.0));
        assert_eq!(transform_from_ops(&Object::Null, &metrics), Affine::IDENTITY);
    }

    #[test]
    fn overlap_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(overlaps(a, Rect::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!overlaps(a, Rect::new(10.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn user_properties_strip_the_prefix() {
        let context = Context::create_test_context();
        context.put_constant("n", Object::from(2));
        let raw = Object::from_json_str(r#"{"-user-count": "${n * 2}", "text": "x"}"#).unwrap();
        let user = user_properties(&context, &raw);
        assert_eq!(user.len(), 1);
        assert_eq!(user.get("count"), Some(&Object::from(4)));
    }
}
