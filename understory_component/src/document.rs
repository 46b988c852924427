// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The document root: parsing, the root context, and whole-tree operations.

use core::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use kurbo::{Point, Rect};
use thiserror::Error;
use understory_binding::{
    Context, ParameterArray, RootData, Session, arrayify, evaluate_recursive,
    property_as_boolean,
};
use understory_object::{Object, ObjectError, ObjectMap};

use crate::builder::Builder;
use crate::focus::FocusManager;
use crate::layout::{LayoutTree, align_baselines, layout_to_inner_rect, layout_to_rect};
use crate::{CoreComponent, RootConfig, Styles};

/// Structural failure to produce a document.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InflateError {
    /// The document text could not be read.
    #[error("document is not valid JSON: {0}")]
    Json(#[from] ObjectError),
    /// There is no `mainTemplate` map.
    #[error("document has no mainTemplate")]
    MissingMainTemplate,
    /// The main template produced no component.
    #[error("main template produced no component")]
    NoTopComponent,
}

/// State shared by every component of one document.
#[derive(Debug)]
pub(crate) struct DocumentData {
    pub(crate) config: RootConfig,
    pub(crate) session: Rc<Session>,
    pub(crate) styles: Styles,
    pub(crate) layouts: ObjectMap,
    pub(crate) layout: RefCell<LayoutTree>,
    pub(crate) focus: FocusManager,
    next_uid: Cell<u64>,
    registry: RefCell<HashMap<u64, Weak<CoreComponent>>>,
    dirty: RefCell<BTreeSet<u64>>,
    children_changed: RefCell<BTreeSet<u64>>,
    top: RefCell<Weak<CoreComponent>>,
}

impl DocumentData {
    fn new(config: RootConfig, session: Rc<Session>, json: &Object) -> Rc<Self> {
        Rc::new(Self {
            config,
            session,
            styles: Styles::new(&json.get("styles")),
            layouts: json.get("layouts").as_map().cloned().unwrap_or_default(),
            layout: RefCell::new(LayoutTree::new()),
            focus: FocusManager::new(),
            next_uid: Cell::new(1),
            registry: RefCell::new(HashMap::new()),
            dirty: RefCell::new(BTreeSet::new()),
            children_changed: RefCell::new(BTreeSet::new()),
            top: RefCell::new(Weak::new()),
        })
    }

    pub(crate) fn next_uid(&self) -> u64 {
        let uid = self.next_uid.get();
        self.next_uid.set(uid + 1);
        uid
    }

    pub(crate) fn register(&self, component: &Rc<CoreComponent>) {
        self.registry
            .borrow_mut()
            .insert(component.uid(), Rc::downgrade(component));
    }

    /// Also reached from `Drop`, possibly while the registry is being read.
    pub(crate) fn unregister(&self, uid: u64) {
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            registry.remove(&uid);
        }
        if let Ok(mut dirty) = self.dirty.try_borrow_mut() {
            dirty.remove(&uid);
        }
        if let Ok(mut changed) = self.children_changed.try_borrow_mut() {
            changed.remove(&uid);
        }
    }

    pub(crate) fn mark_dirty(&self, uid: u64) {
        self.dirty.borrow_mut().insert(uid);
    }

    pub(crate) fn mark_children_changed(&self, uid: u64) {
        self.children_changed.borrow_mut().insert(uid);
    }

    pub(crate) fn top(&self) -> Option<Rc<CoreComponent>> {
        self.top
            .borrow()
            .upgrade()
            .filter(|top| !top.is_released())
    }

    fn component(&self, uid: u64) -> Option<Rc<CoreComponent>> {
        self.registry
            .borrow()
            .get(&uid)
            .and_then(Weak::upgrade)
            .filter(|component| !component.is_released())
    }

    fn components(&self, uids: BTreeSet<u64>) -> Vec<Rc<CoreComponent>> {
        uids.into_iter().filter_map(|uid| self.component(uid)).collect()
    }

    /// Forgets every pending change, including the per-component dirty sets.
    fn clear_all_changes(&self) {
        let all: Vec<Rc<CoreComponent>> = self
            .registry
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for component in &all {
            component.clear_dirty();
            component.take_children_changes();
        }
        self.dirty.borrow_mut().clear();
        self.children_changed.borrow_mut().clear();
    }
}

/// An inflated document and its live component tree.
///
/// ```rust
/// use understory_component::{Document, PropertyKey, RootConfig};
/// use understory_object::Object;
///
/// let json = r#"{
///     "mainTemplate": {
///         "parameters": ["payload"],
///         "item": {"type": "Text", "text": "Hello ${payload.name}"}
///     }
/// }"#;
/// let payload = Object::from_json_str(r#"{"name": "world"}"#).unwrap();
/// let document = Document::inflate(json, &payload, RootConfig::default()).unwrap();
/// assert_eq!(document.top().get_calculated(PropertyKey::Text), Object::from("Hello world"));
/// ```
#[derive(Debug)]
pub struct Document {
    doc: Rc<DocumentData>,
    json: Object,
    context: Rc<Context>,
    top: Rc<CoreComponent>,
}

impl Document {
    /// Parses `json` and inflates its main template.
    ///
    /// `payload` feeds the main template parameters: a single parameter receives the whole
    /// payload, several parameters each read the payload entry of the same name.
    pub fn inflate(json: &str, payload: &Object, config: RootConfig) -> Result<Self, InflateError> {
        let json = Object::from_json_str(json)?;
        let parameters = ParameterArray::from_object(&json.get("mainTemplate").get("parameters"));
        let values: Vec<(String, Object)> = parameters
            .iter()
            .map(|parameter| {
                let value = if parameters.len() == 1 {
                    payload.clone()
                } else {
                    payload.get(&parameter.name)
                };
                let value = if value.is_null() {
                    parameter.default.clone()
                } else {
                    value
                };
                (parameter.name.clone(), value)
            })
            .collect();
        Self::build(json, &values, config, Rc::new(Session::new()), None)
    }

    fn build(
        json: Object,
        parameters: &[(String, Object)],
        config: RootConfig,
        session: Rc<Session>,
        old: Option<Rc<CoreComponent>>,
    ) -> Result<Self, InflateError> {
        let template = json.get("mainTemplate");
        if !template.is_map() {
            return Err(InflateError::MissingMainTemplate);
        }
        let doc = DocumentData::new(config, session, &json);
        let root = Context::create_root(RootData::new(*doc.config.metrics(), doc.session.clone()));
        root.put_constant("environment", doc.config.environment());
        add_resources(&root, &json.get("resources"));

        let context = Context::create_child(&root);
        for (name, value) in parameters {
            context.put_user_writeable(name, value.clone());
        }

        let top = Builder::new(&doc, old)
            .inflate(&context, &template)
            .ok_or(InflateError::NoTopComponent)?;
        *doc.top.borrow_mut() = Rc::downgrade(&top);
        doc.clear_all_changes();
        tracing::debug!(uid = top.uid(), kind = %top.component_type(), "document inflated");
        Ok(Self {
            doc,
            json,
            context,
            top,
        })
    }

    /// Inflates the same document again, keeping data written through
    /// [`update_data`](Self::update_data) and values named by `preserve` lists.
    pub fn reinflate(&mut self) -> Result<(), InflateError> {
        self.reinflate_with_config(self.doc.config.clone())
    }

    /// Like [`reinflate`](Self::reinflate) with a new configuration, e.g. a resized viewport.
    ///
    /// On failure the current tree is kept.
    pub fn reinflate_with_config(&mut self, config: RootConfig) -> Result<(), InflateError> {
        let parameters: Vec<(String, Object)> =
            ParameterArray::from_object(&self.json.get("mainTemplate").get("parameters"))
                .iter()
                .map(|parameter| (parameter.name.clone(), self.context.opt(&parameter.name)))
                .collect();
        let rebuilt = Self::build(
            self.json.clone(),
            &parameters,
            config,
            self.doc.session.clone(),
            Some(self.top.clone()),
        )?;
        drop(core::mem::replace(self, rebuilt));
        Ok(())
    }

    /// The top component.
    #[must_use]
    pub fn top(&self) -> Rc<CoreComponent> {
        self.top.clone()
    }

    /// The console sink of this document.
    #[must_use]
    pub fn session(&self) -> &Rc<Session> {
        &self.doc.session
    }

    /// The configuration the document was inflated with.
    #[must_use]
    pub fn config(&self) -> &RootConfig {
        &self.doc.config
    }

    /// The context frame holding the main template parameters.
    #[must_use]
    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    /// Runs a layout pass at the viewport size and writes the results back.
    ///
    /// Components laid out for the first time run `onMount` afterwards.
    pub fn layout(&self) {
        let top = &self.top;
        let Some(root) = top.layout_node() else {
            return;
        };
        top.fill_viewport();
        let metrics = *self.doc.config.metrics();
        let result = self.doc.layout.borrow_mut().compute(
            root,
            metrics.width,
            metrics.height,
            self.doc.config.text_measurement(),
        );
        if let Err(error) = result {
            tracing::warn!(%error, "layout pass failed");
            return;
        }
        let mut visited = Vec::new();
        let mut stack = vec![top.clone()];
        while let Some(component) = stack.pop() {
            let layout = component
                .layout_node()
                .and_then(|node| self.doc.layout.borrow().layout(node));
            if let Some(layout) = layout {
                component.apply_layout(layout_to_rect(&layout), layout_to_inner_rect(&layout));
            }
            stack.extend(component.children().into_iter().rev());
            visited.push(component);
        }
        let measurement = self.doc.config.text_measurement();
        for component in &visited {
            align_baselines(component, &**measurement);
        }
        for component in &visited {
            component.apply_held_writes();
        }
        for component in visited.iter().filter(|c| c.component_type().is_scrollable()) {
            component.update_sticky_children();
        }
        for component in &visited {
            if !component.is_released() {
                component.run_on_mount();
            }
        }
        tracing::debug!(components = visited.len(), "layout pass complete");
    }

    /// Searches the tree for the first component with document id `id`.
    #[must_use]
    pub fn find_component_by_id(&self, id: &str) -> Option<Rc<CoreComponent>> {
        self.top.find_component_by_id(id)
    }

    /// The live component with runtime id `uid`.
    #[must_use]
    pub fn find_component_by_uid(&self, uid: u64) -> Option<Rc<CoreComponent>> {
        self.doc.component(uid)
    }

    /// The deepest displayed component under `point`, in document coordinates.
    #[must_use]
    pub fn find_component_at_position(&self, point: Point) -> Option<Rc<CoreComponent>> {
        if !self.top.is_displayable() {
            return None;
        }
        hit_test(&self.top, point)
    }

    /// Components with dirty output properties, in creation order.
    #[must_use]
    pub fn dirty_components(&self) -> Vec<Rc<CoreComponent>> {
        let dirty = self.doc.dirty.borrow().clone();
        self.doc
            .components(dirty)
            .into_iter()
            .filter(|component| !component.dirty_properties().is_empty())
            .collect()
    }

    /// Clears every dirty property of every component.
    pub fn clear_dirty(&self) {
        let dirty = core::mem::take(&mut *self.doc.dirty.borrow_mut());
        for component in self.doc.components(dirty) {
            component.clear_dirty();
        }
    }

    /// Delivers pending child changes to `onChildrenChanged` handlers.
    pub fn process_children_changes(&self) {
        let changed = core::mem::take(&mut *self.doc.children_changed.borrow_mut());
        for component in self.doc.components(changed) {
            component.dispatch_children_changed();
        }
    }

    /// Writes a main template parameter, recalculating everything bound to it.
    pub fn update_data(&self, name: &str, value: Object) -> bool {
        self.context.user_update_and_recalculate(name, value)
    }

    /// The visual context of the whole tree.
    #[must_use]
    pub fn visual_context(&self) -> serde_json::Value {
        self.top.serialize_visual_context()
    }

    /// Moves keyboard focus to `component`.
    pub fn set_focus(&self, component: &Rc<CoreComponent>) -> bool {
        self.doc.focus.set_focus(component)
    }

    /// Clears keyboard focus.
    pub fn clear_focus(&self) {
        self.doc.focus.clear_focus();
    }

    /// The focused component, if any.
    #[must_use]
    pub fn focused(&self) -> Option<Rc<CoreComponent>> {
        self.doc.focus.focused()
    }

    /// Moves focus to the next focusable component in tab order, wrapping around.
    pub fn focus_next(&self) -> Option<Rc<CoreComponent>> {
        self.doc.focus.focus_next(&self.top)
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        self.top.release();
    }
}

/// Publishes `resources` blocks as `@name` constants. Later blocks win; a block with a false
/// `when` is skipped.
fn add_resources(root: &Rc<Context>, resources: &Object) {
    let metrics = *root.metrics();
    for block in arrayify(root, resources) {
        if !block.is_map() || !property_as_boolean(root, &block, "when", true) {
            continue;
        }
        for (group, entries) in block.as_map().into_iter().flatten() {
            let Some(entries) = entries.as_map() else {
                continue;
            };
            for (name, raw) in entries {
                let value = evaluate_recursive(root, raw);
                let value = match group.as_str() {
                    "colors" => Object::from(value.as_color()),
                    "dimensions" => Object::from(value.as_dimension(&metrics)),
                    _ => value,
                };
                root.put_resource(&format!("@{name}"), value);
            }
        }
    }
}

fn hit_test(component: &Rc<CoreComponent>, point: Point) -> Option<Rc<CoreComponent>> {
    let local = component.global_to_local() * point;
    if !Rect::from_origin_size(Point::ZERO, component.bounds().size()).contains(local) {
        return None;
    }
    component
        .displayed_children()
        .iter()
        .rev()
        .find_map(|child| hit_test(child, point))
        .or_else(|| Some(component.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyKey;
    use understory_object::Metrics;

    #[test]
    fn structural_failures_are_errors() {
        assert!(matches!(
            Document::inflate("{", &Object::Null, RootConfig::default()),
            Err(InflateError::Json(_))
        ));
        assert_eq!(
            Document::inflate("{}", &Object::Null, RootConfig::default()).err(),
            Some(InflateError::MissingMainTemplate)
        );
        assert_eq!(
            Document::inflate(
                r#"{"mainTemplate": {"item": {"type": "Nope"}}}"#,
                &Object::Null,
                RootConfig::default()
            )
            .err(),
            Some(InflateError::NoTopComponent)
        );
    }

    #[test]
    fn resources_and_environment_are_visible() {
        let document = Document::inflate(
            r#"{
                "resources": [
                    {"strings": {"greeting": "hi"}, "dimensions": {"gap": 8}},
                    {"when": false, "strings": {"greeting": "ignored"}}
                ],
                "mainTemplate": {
                    "item": {"type": "Text", "text": "${@greeting} ${environment.agentName}"}
                }
            }"#,
            &Object::Null,
            RootConfig::default().with_agent("Tester", "1"),
        )
        .unwrap();
        assert_eq!(
            document.top().get_calculated(PropertyKey::Text),
            Object::from("hi Tester")
        );
        assert_eq!(
            document.context().opt("@gap"),
            Object::from(understory_object::Dimension::Absolute(8.0))
        );
    }

    #[test]
    fn several_parameters_read_the_payload_by_name() {
        let payload = Object::from_json_str(r#"{"a": "x", "b": "y"}"#).unwrap();
        let document = Document::inflate(
            r#"{"mainTemplate": {"parameters": ["a", "b"], "item": {"type": "Text", "text": "${a}${b}"}}}"#,
            &payload,
            RootConfig::default(),
        )
        .unwrap();
        assert_eq!(document.top().get_calculated(PropertyKey::Text), Object::from("xy"));
        assert!(document.update_data("b", Object::from("z")));
        assert_eq!(document.top().get_calculated(PropertyKey::Text), Object::from("xz"));
        assert_eq!(document.dirty_components().len(), 1);
        document.clear_dirty();
        assert!(document.dirty_components().is_empty());
    }

    #[test]
    fn layout_positions_children_and_hit_tests() {
        let document = Document::inflate(
            r#"{
                "mainTemplate": {
                    "item": {
                        "type": "Container", "id": "root",
                        "items": [
                            {"type": "Frame", "id": "a", "height": 40},
                            {"type": "Frame", "id": "b", "height": 60}
                        ]
                    }
                }
            }"#,
            &Object::Null,
            RootConfig::new(Metrics::new(200.0, 300.0)),
        )
        .unwrap();
        document.layout();
        let top = document.top();
        assert_eq!(top.bounds(), Rect::new(0.0, 0.0, 200.0, 300.0));
        let b = document.find_component_by_id("b").unwrap();
        assert_eq!(b.bounds(), Rect::new(0.0, 40.0, 200.0, 100.0));
        assert!(b.is_laid_out());
        let hit = document.find_component_at_position(Point::new(10.0, 50.0)).unwrap();
        assert_eq!(hit.id(), "b");
        let hit = document.find_component_at_position(Point::new(10.0, 200.0)).unwrap();
        assert_eq!(hit.id(), "root");
        assert!(document.find_component_at_position(Point::new(500.0, 10.0)).is_none());
        assert_eq!(document.find_component_by_uid(b.uid()).unwrap().id(), "b");
    }
}
