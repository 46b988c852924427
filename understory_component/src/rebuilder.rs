// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Children generated from a live data array.
//!
//! Each data row gets its own context frame with system-writable `data`, `index` and
//! `length`, and one child inflated from the first matching item template. Inserted rows are
//! inflated in place, removed rows release their child, and an updated row rewrites `data` so
//! its bindings recalculate without rebuilding the child.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use understory_binding::{Context, Properties};
use understory_object::{LiveArray, LiveArrayChange, LiveArrayListener, Object};

use crate::builder::Builder;
use crate::{CoreComponent, DataSourceProvider};

#[derive(Debug)]
struct Row {
    context: Rc<Context>,
    component: Option<Weak<CoreComponent>>,
}

impl Row {
    fn component(&self) -> Option<Rc<CoreComponent>> {
        self.component.as_ref().and_then(Weak::upgrade)
    }
}

/// Keeps a component's children in step with a [`LiveArray`].
pub(crate) struct LayoutRebuilder {
    parent: Weak<CoreComponent>,
    context: Rc<Context>,
    array: Rc<LiveArray>,
    templates: Vec<Object>,
    path: String,
    provider: Option<Rc<dyn DataSourceProvider>>,
    rows: RefCell<Vec<Row>>,
    has_first: Cell<bool>,
    has_last: Cell<bool>,
}

impl fmt::Debug for LayoutRebuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutRebuilder")
            .field("path", &self.path)
            .field("rows", &self.rows.borrow().len())
            .field("array", &self.array.len())
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl LayoutRebuilder {
    /// Creates a rebuilder for `parent` and subscribes it to `array`.
    pub(crate) fn create(
        parent: &Rc<CoreComponent>,
        context: &Rc<Context>,
        array: Rc<LiveArray>,
        templates: Vec<Object>,
        path: String,
        provider: Option<Rc<dyn DataSourceProvider>>,
    ) -> Rc<Self> {
        let rebuilder = Rc::new(Self {
            parent: Rc::downgrade(parent),
            context: context.clone(),
            array,
            templates,
            path,
            provider,
            rows: RefCell::new(Vec::new()),
            has_first: Cell::new(false),
            has_last: Cell::new(false),
        });
        let listener: Rc<dyn LiveArrayListener> = rebuilder.clone();
        rebuilder.array.add_listener(Rc::downgrade(&listener));
        rebuilder
    }

    /// Inflates one child per row.
    pub(crate) fn build(&self, builder: &Builder, has_first: bool) {
        self.has_first.set(has_first);
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        let length = self.array.len();
        for index in 0..length {
            let row = self.inflate_row(builder, &parent, index, length);
            if let Some(child) = row.component() {
                parent.attach_child(&child, parent.child_count());
            }
            self.rows.borrow_mut().push(row);
        }
        tracing::debug!(uid = parent.uid(), rows = length, "data children built");
    }

    pub(crate) fn set_first_last(&self, has_first: bool, has_last: bool) {
        self.has_first.set(has_first);
        self.has_last.set(has_last);
    }

    fn inflate_row(
        &self,
        builder: &Builder,
        parent: &CoreComponent,
        index: usize,
        length: usize,
    ) -> Row {
        let context = Context::create_child(&self.context);
        context.put_system_writeable("data", self.array.at(index).unwrap_or_default());
        context.put_system_writeable("index", Object::from(index));
        context.put_system_writeable("length", Object::from(length));
        let component = builder
            .expand_single_component_from_array(
                &context,
                &self.templates,
                Properties::new(),
                Some(parent.component_type()),
                &self.path,
            )
            .map(|child| Rc::downgrade(&child));
        Row { context, component }
    }

    /// Child position of the first component at or after data row `row`.
    fn child_position(&self, row: usize) -> usize {
        let before = self.rows.borrow()[..row]
            .iter()
            .filter(|r| r.component().is_some())
            .count();
        before + usize::from(self.has_first.get())
    }

    fn insert_rows(&self, parent: &Rc<CoreComponent>, index: usize, count: usize) {
        let builder = Builder::new(&parent.doc, None);
        let length = self.array.len();
        for offset in 0..count {
            let at = index + offset;
            if at > self.rows.borrow().len() {
                break;
            }
            let row = self.inflate_row(&builder, parent, at, length);
            let child = row.component();
            let position = self.child_position(at);
            self.rows.borrow_mut().insert(at, row);
            if let Some(child) = child {
                parent.attach_child(&child, position);
            }
        }
    }

    fn remove_rows(&self, index: usize, count: usize) {
        let removed: Vec<Row> = {
            let mut rows = self.rows.borrow_mut();
            let end = (index + count).min(rows.len());
            if index >= end {
                return;
            }
            rows.drain(index..end).collect()
        };
        for row in removed {
            if let Some(child) = row.component() {
                child.release();
            }
        }
    }

    fn update_row(&self, index: usize) {
        let context = self.rows.borrow().get(index).map(|r| r.context.clone());
        if let (Some(context), Some(data)) = (context, self.array.at(index)) {
            context.system_update_and_recalculate("data", data, true);
        }
    }

    /// Rewrites `index` and `length` in every row.
    fn renumber(&self) {
        let contexts: Vec<Rc<Context>> =
            self.rows.borrow().iter().map(|r| r.context.clone()).collect();
        let length = contexts.len();
        for (index, context) in contexts.iter().enumerate() {
            context.system_update_and_recalculate("index", Object::from(index), true);
            context.system_update_and_recalculate("length", Object::from(length), true);
        }
    }

    /// The host showed row `index`; a data source may fetch around it.
    pub(crate) fn report_loaded(&self, index: usize) {
        if let Some(provider) = &self.provider {
            provider.ensure(index);
        }
    }
}

impl LiveArrayListener for LayoutRebuilder {
    fn live_array_changed(&self, _array: &LiveArray, change: LiveArrayChange) {
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        if parent.is_released() {
            return;
        }
        tracing::debug!(uid = parent.uid(), ?change, "rebuilding data children");
        match change {
            LiveArrayChange::Inserted { index, count } => {
                self.insert_rows(&parent, index, count);
                self.renumber();
            }
            LiveArrayChange::Removed { index, count } => {
                self.remove_rows(index, count);
                self.renumber();
            }
            LiveArrayChange::Updated { index } => self.update_row(index),
        }
    }
}

impl CoreComponent {
    /// The host displayed data child `index`. Forwarded to the data source, if any.
    pub fn report_loaded(&self, index: usize) {
        let rebuilder = self.rebuilder.borrow().clone();
        if let Some(rebuilder) = rebuilder {
            rebuilder.report_loaded(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, PropertyKey, RootConfig};

    #[derive(Debug, Default)]
    struct Pager {
        array: RefCell<Option<Rc<LiveArray>>>,
        ensured: RefCell<Vec<usize>>,
    }

    impl DataSourceProvider for Pager {
        fn create(&self, source: &Object) -> Option<Rc<LiveArray>> {
            let array = LiveArray::new(source.get("items").as_array());
            *self.array.borrow_mut() = Some(array.clone());
            Some(array)
        }

        fn ensure(&self, index: usize) {
            self.ensured.borrow_mut().push(index);
            if let Some(array) = self.array.borrow().as_ref() {
                array.push(Object::from(format!("more{index}")));
            }
        }
    }

    const DOC: &str = r#"{
        "mainTemplate": {
            "parameters": ["payload"],
            "item": {
                "type": "Sequence", "id": "list",
                "data": "${payload.rows}",
                "items": {"type": "Text", "text": "${index}:${data}"}
            }
        }
    }"#;

    fn texts(component: &CoreComponent) -> Vec<String> {
        component
            .children()
            .iter()
            .map(|c| c.get_calculated(PropertyKey::Text).as_string())
            .collect()
    }

    #[test]
    fn rows_follow_the_array() {
        let rows = LiveArray::new(vec![Object::from("a"), Object::from("b")]);
        let mut payload = understory_object::ObjectMap::new();
        payload.insert("rows".into(), Object::from(rows.clone()));
        let document = Document::inflate(DOC, &Object::from(payload), RootConfig::default()).unwrap();
        let list = document.top();
        assert_eq!(texts(&list), ["0:a", "1:b"]);
        assert!(list.has_rebuilder());

        rows.insert(0, Object::from("z"));
        assert_eq!(texts(&list), ["0:z", "1:a", "2:b"]);

        rows.remove(1);
        assert_eq!(texts(&list), ["0:z", "1:b"]);

        rows.update(1, Object::from("q"));
        assert_eq!(texts(&list), ["0:z", "1:q"]);

        let stray = list.child_at(0).unwrap();
        assert!(!list.remove_child(&stray), "children belong to the data source");
    }

    #[test]
    fn data_sources_hear_about_loaded_rows() {
        let pager = Rc::new(Pager::default());
        let config = RootConfig::default().with_data_source("pager", pager.clone());
        let document = Document::inflate(
            r#"{
                "mainTemplate": {
                    "item": {
                        "type": "Sequence",
                        "data": {"type": "pager", "items": ["x"]},
                        "items": {"type": "Text", "text": "${data}"}
                    }
                }
            }"#,
            &Object::Null,
            config,
        )
        .unwrap();
        let list = document.top();
        assert_eq!(list.child_count(), 1);
        list.report_loaded(0);
        assert_eq!(*pager.ensured.borrow(), [0]);
        assert_eq!(texts(&list), ["x", "more0"]);
    }
}
