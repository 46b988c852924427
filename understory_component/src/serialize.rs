// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON views of components for the view host.

use serde_json::{Map, Value};
use understory_object::Object;

use crate::{ComponentType, CoreComponent, PropFlags, PropertyKey, StateFlags};

impl CoreComponent {
    fn identity(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("uid".into(), Value::String(self.uid().to_string()));
        map.insert("id".into(), Value::String(self.id().to_owned()));
        map.insert("type".into(), Value::String(self.component_type().name().to_owned()));
        if self.doc.config.track_provenance() {
            map.insert("__path".into(), Value::String(self.path().to_owned()));
        }
        map
    }

    /// Output and runtime-state properties of this subtree, children nested.
    #[must_use]
    pub fn serialize(&self) -> Value {
        self.serialize_filtered(|flags| {
            flags.intersects(PropFlags::OUT.union(PropFlags::RUNTIME_STATE))
        })
    }

    /// Every property of this subtree, for debugging.
    #[must_use]
    pub fn serialize_all(&self) -> Value {
        self.serialize_filtered(|_| true)
    }

    fn serialize_filtered(&self, include: fn(PropFlags) -> bool) -> Value {
        let mut map = self.identity();
        for (key, value) in self.calculated() {
            if self.find_def(key).is_some_and(|def| include(def.flags)) {
                map.insert(key.name().to_owned(), value.to_json());
            }
        }
        let children: Vec<Value> = self
            .children()
            .iter()
            .map(|child| child.serialize_filtered(include))
            .collect();
        map.insert("children".into(), Value::Array(children));
        Value::Object(map)
    }

    /// The dirty output properties of this component alone, clearing them.
    #[must_use]
    pub fn serialize_dirty(&self) -> Value {
        let mut map = Map::new();
        map.insert("uid".into(), Value::String(self.uid().to_string()));
        for key in self.take_dirty() {
            map.insert(key.name().to_owned(), self.get_calculated(key).to_json());
        }
        Value::Object(map)
    }

    /// What is visible and actionable in this subtree, clearing the visual context flags.
    #[must_use]
    pub fn serialize_visual_context(&self) -> Value {
        let result = self.visual_context_node();
        self.clear_visual_context_dirty();
        result
    }

    fn visual_context_node(&self) -> Value {
        let mut map = Map::new();
        map.insert("uid".into(), Value::String(self.uid().to_string()));
        if !self.id().is_empty() {
            map.insert("id".into(), Value::String(self.id().to_owned()));
        }
        map.insert("type".into(), Value::String(visual_type(self).to_owned()));
        let opacity = self.get_calculated(PropertyKey::Opacity).as_number();
        if opacity < 1.0 {
            map.insert("opacity".into(), Object::from(opacity).to_json());
        }
        if self.get_calculated(PropertyKey::Display).as_str() == Some("invisible") {
            map.insert("visibility".into(), Value::String("invisible".into()));
        }
        map.insert(
            "position".into(),
            Object::from(self.local_to_global().transform_rect_bbox(
                kurbo::Rect::from_origin_size(kurbo::Point::ZERO, self.bounds().size()),
            ))
            .to_json(),
        );
        let transform = self.transform();
        if transform != kurbo::Affine::IDENTITY {
            map.insert("transform".into(), Object::from(transform).to_json());
        }
        let tags = self.tags();
        if !tags.is_empty() {
            map.insert("tags".into(), Value::Object(tags));
        }
        let children: Vec<Value> = self
            .displayed_children()
            .iter()
            .map(|child| child.visual_context_node())
            .collect();
        if !children.is_empty() {
            map.insert("children".into(), Value::Array(children));
        }
        Value::Object(map)
    }

    fn tags(&self) -> Map<String, Value> {
        let mut tags = Map::new();
        let state = self.state();
        if state.contains(StateFlags::CHECKED) {
            tags.insert("checked".into(), Value::Bool(true));
        }
        if state.contains(StateFlags::DISABLED) {
            tags.insert("disabled".into(), Value::Bool(true));
        }
        if state.contains(StateFlags::FOCUSED) {
            tags.insert("focused".into(), Value::Bool(true));
        }
        if self.component_type() == ComponentType::TouchWrapper {
            tags.insert("clickable".into(), Value::Bool(true));
        }
        if self.component_type().is_scrollable() {
            let mut scroll = Map::new();
            scroll.insert(
                "direction".into(),
                self.get_calculated(PropertyKey::ScrollDirection).to_json(),
            );
            scroll.insert(
                "position".into(),
                self.get_calculated(PropertyKey::ScrollPosition).to_json(),
            );
            tags.insert("scrollable".into(), Value::Object(scroll));
        }
        let label = self.get_calculated(PropertyKey::AccessibilityLabel).as_string();
        if !label.is_empty() {
            tags.insert("label".into(), Value::String(label));
        }
        tags
    }
}

fn visual_type(component: &CoreComponent) -> &'static str {
    match component.component_type() {
        ComponentType::Text | ComponentType::EditText => "text",
        ComponentType::Image => "graphic",
        _ if component.child_count() == 0 => "empty",
        _ => "mixed",
    }
}
