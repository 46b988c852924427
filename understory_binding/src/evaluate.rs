// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluation entry points used by inflation and dependants.

use understory_object::{Object, ObjectArray, ObjectMap};

use crate::{BindingFunction, BoundSymbolSet, Context, Expression};

/// A value and the writable slots read to produce it.
#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    /// The computed value.
    pub value: Object,
    /// Writable slots read during evaluation.
    pub symbols: BoundSymbolSet,
}

/// Result of [`parse_and_evaluate`].
#[derive(Clone, Debug, Default)]
pub struct ParseResult {
    /// The computed value, or the input itself if it was not an expression.
    pub value: Object,
    /// The parsed expression, if the input contained `${...}`.
    pub expression: Option<Expression>,
    /// Writable slots read during evaluation.
    pub symbols: BoundSymbolSet,
}

impl ParseResult {
    /// Returns `true` if the value may change later, i.e. a dependant is worth creating.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.expression.is_some() && !self.symbols.is_empty()
    }
}

/// Returns `true` if `object` is, or contains, a string with a `${` segment.
#[must_use]
pub fn is_evaluable(object: &Object) -> bool {
    match object {
        Object::String(s) => s.contains("${"),
        Object::Array(items) => items.iter().any(is_evaluable),
        Object::Map(map) => map.values().any(is_evaluable),
        _ => false,
    }
}

/// Parses and evaluates a string property value.
///
/// Non-strings and plain strings are returned unchanged, except that a bare `@name` resolves
/// to the resource of that name when one is defined. Syntax errors are reported on the
/// session console and the original string is kept.
pub fn parse_and_evaluate(context: &Context, object: &Object, optimize: bool) -> ParseResult {
    let Some(text) = object.as_str() else {
        return ParseResult {
            value: object.clone(),
            ..ParseResult::default()
        };
    };
    match Expression::parse(text) {
        Ok(Some(expression)) => evaluate_parsed(context, expression, optimize),
        Ok(None) => ParseResult {
            value: resolve_resource(context, text).unwrap_or_else(|| object.clone()),
            ..ParseResult::default()
        },
        Err(error) => {
            context
                .session()
                .console(format!("Syntax error in '{text}': {error}"));
            ParseResult {
                value: object.clone(),
                ..ParseResult::default()
            }
        }
    }
}

/// Like [`parse_and_evaluate`], but arrays and maps become a single expression tracking every
/// nested string.
pub fn parse_and_evaluate_nested(
    context: &Context,
    object: &Object,
    optimize: bool,
) -> ParseResult {
    if object.is_string() {
        return parse_and_evaluate(context, object, optimize);
    }
    match Expression::parse_nested(object) {
        Ok(Some(expression)) => evaluate_parsed(context, expression, optimize),
        Ok(None) => ParseResult {
            value: evaluate_recursive(context, object),
            ..ParseResult::default()
        },
        Err(error) => {
            context
                .session()
                .console(format!("Syntax error in '{object}': {error}"));
            ParseResult {
                value: evaluate_recursive(context, object),
                ..ParseResult::default()
            }
        }
    }
}

fn evaluate_parsed(context: &Context, expression: Expression, optimize: bool) -> ParseResult {
    let expression = if optimize {
        expression.optimized()
    } else {
        expression
    };
    let Evaluation { value, symbols } = expression.evaluate(context);
    ParseResult {
        value,
        expression: Some(expression),
        symbols,
    }
}

fn resolve_resource(context: &Context, text: &str) -> Option<Object> {
    if text.len() > 1 && text.starts_with('@') {
        context.find(text).map(|found| found.value().clone())
    } else {
        None
    }
}

/// Evaluates `object` once, discarding dependency information.
#[must_use]
pub fn evaluate(context: &Context, object: &Object) -> Object {
    parse_and_evaluate(context, object, false).value
}

/// Evaluates every string inside arrays and maps as well.
#[must_use]
pub fn evaluate_recursive(context: &Context, object: &Object) -> Object {
    match object {
        Object::Array(items) => Object::from(
            items
                .iter()
                .map(|item| evaluate_recursive(context, item))
                .collect::<ObjectArray>(),
        ),
        Object::Map(map) => Object::from(
            map.iter()
                .map(|(k, v)| (k.clone(), evaluate_recursive(context, v)))
                .collect::<ObjectMap>(),
        ),
        other => evaluate(context, other),
    }
}

/// Re-evaluates a tracked expression and applies its conversion.
#[must_use]
pub fn apply_data_binding(
    context: &Context,
    expression: &Expression,
    binding_function: &BindingFunction,
) -> Evaluation {
    let Evaluation { value, symbols } = expression.evaluate(context);
    Evaluation {
        value: binding_function.call(context, &value),
        symbols,
    }
}

/// Evaluated member `name` of `map`, or null.
#[must_use]
pub fn property_as_object(context: &Context, map: &Object, name: &str) -> Object {
    evaluate(context, &map.get(name))
}

/// Member `name` of `map` with every nested string evaluated.
#[must_use]
pub fn property_as_recursive(context: &Context, map: &Object, name: &str) -> Object {
    evaluate_recursive(context, &map.get(name))
}

/// Evaluated member `name` as a boolean, or `default` if absent.
#[must_use]
pub fn property_as_boolean(context: &Context, map: &Object, name: &str, default: bool) -> bool {
    if map.has(name) {
        property_as_object(context, map, name).truthy()
    } else {
        default
    }
}

/// Evaluated member `name` as a number, or `default` if absent.
#[must_use]
pub fn property_as_double(context: &Context, map: &Object, name: &str, default: f64) -> f64 {
    if map.has(name) {
        property_as_object(context, map, name).as_number()
    } else {
        default
    }
}

/// Evaluated member `name` as an integer, or `default` if absent.
#[must_use]
pub fn property_as_int(context: &Context, map: &Object, name: &str, default: i64) -> i64 {
    if map.has(name) {
        property_as_object(context, map, name).as_int()
    } else {
        default
    }
}

/// Evaluated member `name` as text, or `default` if absent.
#[must_use]
pub fn property_as_string(context: &Context, map: &Object, name: &str, default: &str) -> String {
    if map.has(name) {
        property_as_object(context, map, name).as_string()
    } else {
        default.to_owned()
    }
}

/// Flattens `object` into a list of items.
///
/// A single value becomes a one item list. Array elements are evaluated one by one and any
/// element that evaluates to an array is spliced in. Nulls are dropped.
#[must_use]
pub fn arrayify(context: &Context, object: &Object) -> ObjectArray {
    let mut result = Vec::new();
    let mut push = |value: Object| match value {
        Object::Null => {}
        Object::Array(items) => result.extend(items.iter().filter(|i| !i.is_null()).cloned()),
        Object::LiveArray(items) => result.extend(items.snapshot()),
        other => result.push(other),
    };
    match object {
        Object::Array(items) => {
            for item in items.iter() {
                push(evaluate(context, item));
            }
        }
        other => push(evaluate(context, other)),
    }
    result
}

/// [`arrayify`] applied to the first of `names` present in `map`.
#[must_use]
pub fn arrayify_property(context: &Context, map: &Object, names: &[&str]) -> ObjectArray {
    names
        .iter()
        .find(|name| map.has(name))
        .map(|name| arrayify(context, &map.get(name)))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(json: &str) -> Object {
        Object::from_json_str(json).unwrap()
    }

    #[test]
    fn evaluability() {
        assert!(is_evaluable(&Object::from("${a}")));
        assert!(!is_evaluable(&Object::from("a")));
        assert!(is_evaluable(&map(r#"{"x": [1, "${b}"]}"#)));
        assert!(!is_evaluable(&Object::from(3)));
    }

    #[test]
    fn parse_and_evaluate_tracks_writable_symbols() {
        let context = Context::create_test_context();
        context.put_constant("k", Object::from(1));
        context.put_user_writeable("w", Object::from(2));

        let result = parse_and_evaluate(&context, &Object::from("${k + w}"), false);
        assert_eq!(result.value, Object::from(3));
        assert_eq!(result.symbols.len(), 1);
        assert!(result.is_dynamic());

        let constant = parse_and_evaluate(&context, &Object::from("${k * 5}"), false);
        assert!(constant.expression.is_some());
        assert!(!constant.is_dynamic());

        let plain = parse_and_evaluate(&context, &Object::from("text"), false);
        assert!(plain.expression.is_none());
        assert_eq!(plain.value, Object::from("text"));
    }

    #[test]
    fn nested_values_track_symbols() {
        let context = Context::create_test_context();
        context.put_user_writeable("w", Object::from(2));
        let nested = map(r#"["${w}", {"k": "${w * 2}"}]"#);
        let result = parse_and_evaluate_nested(&context, &nested, true);
        assert_eq!(result.value, map(r#"[2, {"k": 4}]"#));
        assert!(result.is_dynamic());

        let fixed = parse_and_evaluate_nested(&context, &map(r#"[1, "a"]"#), true);
        assert!(fixed.expression.is_none());
        assert_eq!(fixed.value, map(r#"[1, "a"]"#));
    }

    #[test]
    fn syntax_errors_go_to_the_console() {
        let context = Context::create_test_context();
        let value = evaluate(&context, &Object::from("${1 +}"));
        assert_eq!(value, Object::from("${1 +}"));
        assert!(context.session().contains("Syntax error"));
    }

    #[test]
    fn bare_resources_resolve() {
        let context = Context::create_test_context();
        context.put_resource("@accent", Object::from("#ff0000"));
        assert_eq!(evaluate(&context, &Object::from("@accent")), Object::from("#ff0000"));
        assert_eq!(evaluate(&context, &Object::from("@missing")), Object::from("@missing"));
        assert_eq!(evaluate(&context, &Object::from("${@accent}")), Object::from("#ff0000"));
    }

    #[test]
    fn recursive_evaluation() {
        let context = Context::create_test_context();
        context.put_constant("n", Object::from(4));
        let value = evaluate_recursive(&context, &map(r#"{"a": ["${n}", 2], "b": "${n + 1}"}"#));
        assert_eq!(value, map(r#"{"a": [4, 2], "b": 5}"#));
    }

    #[test]
    fn property_helpers() {
        let context = Context::create_test_context();
        context.put_constant("on", Object::from(true));
        let props = map(r#"{"when": "${on}", "size": "${2 * 2}", "label": "hi"}"#);
        assert!(property_as_boolean(&context, &props, "when", false));
        assert!(property_as_boolean(&context, &props, "absent", true));
        assert_eq!(property_as_int(&context, &props, "size", 0), 4);
        assert!((property_as_double(&context, &props, "size", 0.0) - 4.0).abs() < f64::EPSILON);
        assert_eq!(property_as_string(&context, &props, "label", ""), "hi");
        assert_eq!(property_as_string(&context, &props, "none", "dflt"), "dflt");
    }

    #[test]
    fn arrayify_splices() {
        let context = Context::create_test_context();
        context.put_constant("pair", map("[1, 2]"));
        assert_eq!(
            arrayify(&context, &map(r#"["${pair}", 3, null]"#)),
            vec![Object::from(1), Object::from(2), Object::from(3)]
        );
        assert_eq!(arrayify(&context, &Object::from("x")), vec![Object::from("x")]);

        let props = map(r#"{"item": "single", "data": [7]}"#);
        assert_eq!(
            arrayify_property(&context, &props, &["items", "item"]),
            vec![Object::from("single")]
        );
        assert!(arrayify_property(&context, &props, &["children"]).is_empty());
    }
}
