// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inflation of document JSON into components.
//!
//! A `type` names either a component type or a layout from the document's `layouts` section.
//! Layouts open a new context frame holding their parameters and expand their own `item`
//! with the caller's remaining properties laid over it. Components get a frame of their own
//! for `bind` entries, then their children.
//!
//! When re-inflating, an old tree can be supplied. Components whose `preserve` list names a
//! binding or property copy the old value from the old component with the same id: bindings
//! before the children are built, properties after.

use core::cell::Cell;
use std::rc::Rc;

use understory_binding::{
    BindingType, Context, ContextDependant, ParameterArray, Properties, arrayify,
    arrayify_property, evaluate, parse_and_evaluate, property_as_boolean, property_as_string,
};
use understory_object::{LiveArray, Object, ObjectMap};

use crate::document::DocumentData;
use crate::rebuilder::LayoutRebuilder;
use crate::{ComponentType, CoreComponent, DataSourceProvider, PropertyKey};

/// Deepest allowed layout nesting.
const MAX_DEPTH: usize = 64;

/// Keys of an instantiating item that never flow into a layout's inner component.
const NOT_FORWARDED: &[&str] = &["type", "when", "bind"];

/// Expands JSON into components for one document.
#[derive(Debug)]
pub(crate) struct Builder {
    doc: Rc<DocumentData>,
    old: Option<Rc<CoreComponent>>,
    depth: Cell<usize>,
}

impl Builder {
    pub(crate) fn new(doc: &Rc<DocumentData>, old: Option<Rc<CoreComponent>>) -> Self {
        Self {
            doc: doc.clone(),
            old,
            depth: Cell::new(0),
        }
    }

    /// Expands `mainTemplate` with the main parameters already in `context`.
    pub(crate) fn inflate(
        &self,
        context: &Rc<Context>,
        template: &Object,
    ) -> Option<Rc<CoreComponent>> {
        let path = add_property("_main/mainTemplate", template, &["item", "items"]);
        self.expand_single_component_from_array(
            context,
            &arrayify_property(context, template, &["item", "items"]),
            Properties::new(),
            None,
            &path,
        )
    }

    /// Expands the first item whose `when` guard holds. Non-maps are skipped; no match is not
    /// an error.
    pub(crate) fn expand_single_component_from_array(
        &self,
        context: &Rc<Context>,
        items: &[Object],
        properties: Properties,
        parent_type: Option<ComponentType>,
        path: &str,
    ) -> Option<Rc<CoreComponent>> {
        let (index, item) = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_map())
            .find(|(_, item)| property_as_boolean(context, item, "when", true))?;
        self.expand_single_component(
            context,
            item,
            properties,
            parent_type,
            &format!("{path}/{index}"),
        )
    }

    /// Expands one component or layout instance.
    pub(crate) fn expand_single_component(
        &self,
        context: &Rc<Context>,
        item: &Object,
        properties: Properties,
        parent_type: Option<ComponentType>,
        path: &str,
    ) -> Option<Rc<CoreComponent>> {
        let type_name = property_as_string(context, item, "type", "");
        if type_name.is_empty() {
            context.session().console_at(path, "Invalid type in component");
            return None;
        }
        if let Some(component_type) = ComponentType::from_name(&type_name) {
            return Some(self.make_component(
                context,
                component_type,
                item,
                properties,
                parent_type,
                path,
            ));
        }
        if let Some(layout) = self.doc.layouts.get(&type_name) {
            let mut properties = properties;
            emplace_missing(&mut properties, item);
            return self.expand_layout(context, &type_name, layout, properties, parent_type);
        }
        context.session().console_at(
            path,
            format!("Unable to find layout or component '{type_name}'"),
        );
        None
    }

    fn expand_layout(
        &self,
        context: &Rc<Context>,
        name: &str,
        layout: &Object,
        mut properties: Properties,
        parent_type: Option<ComponentType>,
    ) -> Option<Rc<CoreComponent>> {
        let path = format!("_layouts/{name}");
        if !layout.is_map() {
            context
                .session()
                .console_at(&path, "Layout inflation for one of the components failed");
            return None;
        }
        if self.depth.get() >= MAX_DEPTH {
            context
                .session()
                .console_at(&path, format!("Layout '{name}' nests too deeply"));
            return None;
        }
        tracing::debug!(layout = name, "expanding layout");
        let expanded = Context::create_child(context);
        for parameter in ParameterArray::from_object(&layout.get("parameters")).iter() {
            properties.add_to_context(&expanded, parameter, true);
        }
        attach_bindings(&expanded, layout);
        self.depth.set(self.depth.get() + 1);
        let result = self.expand_single_component_from_array(
            &expanded,
            &arrayify_property(&expanded, layout, &["item", "items"]),
            properties,
            parent_type,
            &add_property(&path, layout, &["item", "items"]),
        );
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn make_component(
        &self,
        context: &Rc<Context>,
        component_type: ComponentType,
        item: &Object,
        mut properties: Properties,
        parent_type: Option<ComponentType>,
        path: &str,
    ) -> Rc<CoreComponent> {
        emplace_missing(&mut properties, item);
        let raw: ObjectMap = properties
            .iter()
            .filter(|(name, _)| !NOT_FORWARDED.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let raw = Object::from(raw);

        let expanded = Context::create_child(context);
        attach_bindings(&expanded, item);

        let id = property_as_string(&expanded, &raw, "id", "");
        let component = CoreComponent::create(
            &self.doc,
            expanded.clone(),
            component_type,
            parent_type,
            id,
            path.to_owned(),
            &raw,
        );

        let old = self
            .old
            .as_ref()
            .and_then(|old| old.find_component_by_id(component.id()));
        if let Some(old) = &old {
            copy_preserved(&component, old, Preserve::Bindings);
        }
        self.populate(&expanded, item, &component, path);
        component.take_children_changes();
        if let Some(old) = &old {
            copy_preserved(&component, old, Preserve::Properties);
        }
        component
    }

    fn populate(
        &self,
        context: &Rc<Context>,
        item: &Object,
        component: &Rc<CoreComponent>,
        path: &str,
    ) {
        let component_type = component.component_type();
        match component_type.max_children() {
            Some(0) => {}
            Some(1) => {
                let child = self.expand_single_component_from_array(
                    context,
                    &arrayify_property(context, item, &["item", "items"]),
                    Properties::new(),
                    Some(component_type),
                    &add_property(path, item, &["item", "items"]),
                );
                if let Some(child) = child {
                    component.attach_child(&child, 0);
                }
            }
            _ => self.populate_multi_child(context, item, component, path),
        }
    }

    fn populate_multi_child(
        &self,
        context: &Rc<Context>,
        item: &Object,
        component: &Rc<CoreComponent>,
        path: &str,
    ) {
        let component_type = Some(component.component_type());
        let first = self.expand_single_component_from_array(
            context,
            &arrayify_property(context, item, &["firstItem"]),
            Properties::new(),
            component_type,
            &format!("{path}/firstItem"),
        );
        let has_first = first.is_some();
        if let Some(first) = first {
            component.attach_child(&first, 0);
        }

        let items = arrayify_property(context, item, &["item", "items"]);
        let mut rebuilder = None;
        if !items.is_empty() {
            let child_path = add_property(path, item, &["item", "items"]);
            match self.data_array(context, item) {
                Some((array, provider)) => {
                    let built = LayoutRebuilder::create(
                        component,
                        context,
                        array,
                        items,
                        child_path,
                        provider,
                    );
                    built.build(self, has_first);
                    rebuilder = Some(built);
                }
                None => {
                    let length = items.len();
                    let mut index = 0_usize;
                    for (position, element) in items.iter().enumerate() {
                        let child_context = Context::create_child(context);
                        child_context.put_constant("index", Object::from(index));
                        child_context.put_constant("length", Object::from(length));
                        let child = self.expand_single_component_from_array(
                            &child_context,
                            &arrayify(context, element),
                            Properties::new(),
                            component_type,
                            &format!("{child_path}/{position}"),
                        );
                        if let Some(child) = child {
                            component.attach_child(&child, component.child_count());
                            index += 1;
                        }
                    }
                }
            }
        }

        let last = self.expand_single_component_from_array(
            context,
            &arrayify_property(context, item, &["lastItem"]),
            Properties::new(),
            component_type,
            &format!("{path}/lastItem"),
        );
        let has_last = last.is_some();
        if let Some(last) = last {
            component.attach_child(&last, component.child_count());
        }
        if let Some(rebuilder) = rebuilder {
            rebuilder.set_first_last(has_first, has_last);
            *component.rebuilder.borrow_mut() = Some(rebuilder);
        }
    }

    /// The live array behind `data`, if any. Plain arrays are wrapped so the rebuilder can
    /// manage them the same way.
    fn data_array(
        &self,
        context: &Rc<Context>,
        item: &Object,
    ) -> Option<(Rc<LiveArray>, Option<Rc<dyn DataSourceProvider>>)> {
        let raw = item.get("data");
        if raw.is_null() {
            return None;
        }
        match evaluate(context, &raw) {
            Object::LiveArray(array) => Some((array, None)),
            source @ Object::Map(_) => {
                let name = source.get("type").as_string();
                let Some(provider) = self.doc.config.data_source(&name).cloned() else {
                    context
                        .session()
                        .console(format!("Unknown data source '{name}'"));
                    return None;
                };
                let array = provider.create(&source)?;
                Some((array, Some(provider)))
            }
            _ => {
                let items = arrayify(context, &raw);
                (!items.is_empty()).then(|| (LiveArray::new(items), None))
            }
        }
    }
}

/// Adds the entries of `item` that `properties` does not already hold. Entries supplied by an
/// instantiating item win over the layout's own.
fn emplace_missing(properties: &mut Properties, item: &Object) {
    if let Some(map) = item.as_map() {
        for (name, value) in map {
            if !properties.contains(name) {
                properties.emplace(name.clone(), value.clone());
            }
        }
    }
}

/// `path` extended by whichever of `names` is present in `item`.
fn add_property(path: &str, item: &Object, names: &[&str]) -> String {
    match names.iter().find(|name| item.has(name)) {
        Some(name) => format!("{path}/{name}"),
        None => path.to_owned(),
    }
}

/// Defines each `bind` entry of `item` as a user-writable slot of `context`.
pub(crate) fn attach_bindings(context: &Rc<Context>, item: &Object) {
    for binding in arrayify_property(context, item, &["bind"]) {
        let name = property_as_string(context, &binding, "name", "");
        if name.is_empty() || !binding.has("value") {
            continue;
        }
        if context.has_local(&name) {
            context
                .session()
                .console(format!("Duplicate binding name '{name}'"));
            continue;
        }
        let binding_type = binding
            .get("type")
            .as_str()
            .and_then(BindingType::from_name)
            .unwrap_or_default();
        let function = binding_type.binding_function();
        let result = parse_and_evaluate(context, &binding.get("value"), true);
        context.put_user_writeable(&name, function.call(context, &result.value));
        if result.is_dynamic() {
            if let Some(expression) = result.expression {
                ContextDependant::create(
                    context,
                    &name,
                    context,
                    expression,
                    function,
                    result.symbols,
                );
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Preserve {
    Bindings,
    Properties,
}

/// Copies the values named by the new component's `preserve` list from `old`.
fn copy_preserved(component: &CoreComponent, old: &CoreComponent, what: Preserve) {
    let preserved = component.get_calculated(PropertyKey::Preserve).as_array();
    let old_context = old.context();
    for name in preserved.iter().filter_map(Object::as_str) {
        let local = old_context.has_local(name);
        let value = match (what, local) {
            (Preserve::Bindings, true) => old_context.opt(name),
            (Preserve::Properties, false) => match PropertyKey::from_name(name) {
                Some(key) => old.get_calculated(key),
                None => continue,
            },
            _ => continue,
        };
        tracing::debug!(uid = component.uid(), name, "preserving");
        component.set_property_by_name(name, value);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, PropertyKey, RootConfig};
    use understory_object::Object;

    fn inflate(json: &str) -> Document {
        Document::inflate(json, &Object::Null, RootConfig::default()).unwrap()
    }

    #[test]
    fn when_picks_the_first_match() {
        let document = inflate(
            r#"{
                "mainTemplate": {
                    "items": [
                        {"type": "Text", "when": false, "text": "a"},
                        {"type": "Text", "when": "${1 < 2}", "text": "b"},
                        {"type": "Text", "text": "c"}
                    ]
                }
            }"#,
        );
        assert_eq!(document.top().get_calculated(PropertyKey::Text), Object::from("b"));
    }

    #[test]
    fn layouts_take_parameters_and_forward_the_rest() {
        let document = inflate(
            r#"{
                "layouts": {
                    "Label": {
                        "parameters": ["caption", {"name": "size", "type": "number", "default": 12}],
                        "item": {"type": "Text", "text": "${caption}", "fontSize": "${size}", "id": "inner"}
                    }
                },
                "mainTemplate": {
                    "item": {"type": "Container", "items": {"type": "Label", "caption": "hi", "id": "outer"}}
                }
            }"#,
        );
        let label = document.find_component_by_id("outer").unwrap();
        assert_eq!(label.get_calculated(PropertyKey::Text), Object::from("hi"));
        assert_eq!(
            label.get_calculated(PropertyKey::FontSize),
            Object::from(understory_object::Dimension::Absolute(12.0))
        );
        assert_eq!(label.path(), "_layouts/Label/item/0");
    }

    #[test]
    fn bad_types_are_reported() {
        let document = inflate(
            r#"{
                "mainTemplate": {
                    "item": {"type": "Container", "items": [{"text": "x"}, {"type": "Nope"}, {"type": "Text"}]}
                }
            }"#,
        );
        assert_eq!(document.top().child_count(), 1);
        assert!(document.session().contains("Invalid type in component"));
        assert!(document.session().contains("Unable to find layout or component 'Nope'"));
    }

    #[test]
    fn items_see_index_and_length() {
        let document = inflate(
            r#"{
                "mainTemplate": {
                    "item": {
                        "type": "Container",
                        "items": [{"type": "Text", "text": "${index}/${length}"}, {"type": "Text", "text": "${index}/${length}"}]
                    }
                }
            }"#,
        );
        let second = document.top().child_at(1).unwrap();
        assert_eq!(second.get_calculated(PropertyKey::Text), Object::from("1/2"));
    }

    #[test]
    fn bindings_are_live_and_unique() {
        let document = inflate(
            r#"{
                "mainTemplate": {
                    "item": {
                        "type": "Container",
                        "bind": [
                            {"name": "count", "value": 2, "type": "number"},
                            {"name": "double", "value": "${count * 2}"},
                            {"name": "count", "value": 7}
                        ],
                        "items": {"type": "Text", "id": "t", "text": "${double}"}
                    }
                }
            }"#,
        );
        let text = document.find_component_by_id("t").unwrap();
        assert_eq!(text.get_calculated(PropertyKey::Text), Object::from("4"));
        assert!(document.session().contains("Duplicate binding name 'count'"));
        assert!(document.top().set_property_by_name("count", Object::from(5)));
        assert_eq!(text.get_calculated(PropertyKey::Text), Object::from("10"));
    }

    #[test]
    fn first_and_last_items_wrap_the_children() {
        let document = inflate(
            r#"{
                "mainTemplate": {
                    "item": {
                        "type": "Container",
                        "firstItem": {"type": "Text", "id": "first"},
                        "lastItem": {"type": "Text", "id": "last"},
                        "items": [{"type": "Frame"}, {"type": "Frame"}]
                    }
                }
            }"#,
        );
        let top = document.top();
        assert_eq!(top.child_count(), 4);
        assert_eq!(top.child_at(0).unwrap().id(), "first");
        assert_eq!(top.child_at(3).unwrap().id(), "last");
    }
}
