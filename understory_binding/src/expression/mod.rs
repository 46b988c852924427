// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data-binding expressions.
//!
//! A binding string mixes literal text with `${...}` segments:
//!
//! - `"${a + 1}"` is a single segment and evaluates to a typed value (here a number).
//! - `"Count: ${a}"` mixes text and segments and always evaluates to a string.
//! - `"plain"` has no segment and is not an expression at all.
//!
//! Inside a segment the grammar is a small JavaScript-like language: literals, identifiers,
//! member access, indexing, calls into the built-in `Math`, `String`, and `Array` tables,
//! array and map literals, unary `! - +`, arithmetic, comparisons, `&&`, `||`, `??`, and the
//! ternary operator. String literals may themselves contain `${...}` segments.

mod functions;
mod lexer;
mod node;
mod parser;

use std::rc::Rc;

use thiserror::Error;

use understory_object::Object;

use crate::{Context, Evaluation};

pub(crate) use node::Node;

/// Syntax error in a data-binding string. Positions are byte offsets into the string.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ParseError {
    /// A character that starts no token.
    #[error("unexpected character '{found}' at {position}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset.
        position: usize,
    },
    /// A numeric literal that does not parse.
    #[error("invalid number '{literal}' at {position}")]
    InvalidNumber {
        /// The literal text.
        literal: String,
        /// Byte offset.
        position: usize,
    },
    /// A string literal without its closing quote.
    #[error("unterminated string starting at {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// A `${` without its closing `}`.
    #[error("unterminated data-binding starting at {position}")]
    UnterminatedBinding {
        /// Byte offset of the `${`.
        position: usize,
    },
    /// A token in a place the grammar does not allow.
    #[error("unexpected {found} at {position}, expected {expected}")]
    UnexpectedToken {
        /// Description of the token.
        found: String,
        /// What the parser was looking for.
        expected: &'static str,
        /// Byte offset.
        position: usize,
    },
    /// The segment ended in the middle of an expression.
    #[error("unexpected end of expression at {position}")]
    UnexpectedEnd {
        /// Byte offset.
        position: usize,
    },
    /// A call to something that is not a built-in function.
    #[error("unknown function '{name}'")]
    UnknownFunction {
        /// The dotted name that was called.
        name: String,
    },
}

/// A parsed data-binding string, shareable between dependants.
#[derive(Clone, Debug)]
pub struct Expression {
    root: Rc<Node>,
    source: Rc<str>,
}

impl Expression {
    /// Parses `text`. Returns `Ok(None)` if the text contains no `${` segment.
    pub fn parse(text: &str) -> Result<Option<Self>, ParseError> {
        Ok(parser::parse_template(text)?.map(|root| Self {
            root: Rc::new(root),
            source: Rc::from(text),
        }))
    }

    /// Parses every string nested in an array or map, keeping the container shape.
    ///
    /// Returns `Ok(None)` if no string inside `object` contains a `${` segment.
    pub fn parse_nested(object: &Object) -> Result<Option<Self>, ParseError> {
        Ok(nested_node(object)?.map(|root| Self {
            root: Rc::new(root),
            source: Rc::from(object.to_string()),
        }))
    }

    /// The original binding string.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates against `context`, recording every writable slot read.
    #[must_use]
    pub fn evaluate(&self, context: &Context) -> Evaluation {
        let mut scope = node::Scope::new(Some(context));
        let value = self.root.eval(&mut scope);
        Evaluation {
            value,
            symbols: scope.into_symbols(),
        }
    }

    /// Returns a copy with every sub-expression that reads no symbol folded to a constant.
    #[must_use]
    pub fn optimized(&self) -> Self {
        Self {
            root: Rc::new(self.root.as_ref().clone().fold()),
            source: self.source.clone(),
        }
    }

    /// Returns `true` if the whole expression is a constant.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self.root.as_ref(), Node::Constant(_))
    }
}

fn nested_node(object: &Object) -> Result<Option<Node>, ParseError> {
    match object {
        Object::String(text) => parser::parse_template(text),
        Object::Array(items) => {
            let mut found = false;
            let mut nodes = Vec::with_capacity(items.len());
            for item in items.iter() {
                match nested_node(item)? {
                    Some(node) => {
                        found = true;
                        nodes.push(node);
                    }
                    None => nodes.push(Node::Constant(item.clone())),
                }
            }
            Ok(found.then_some(Node::Array(nodes)))
        }
        Object::Map(map) => {
            let mut found = false;
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map.iter() {
                let node = match nested_node(value)? {
                    Some(node) => {
                        found = true;
                        node
                    }
                    None => Node::Constant(value.clone()),
                };
                entries.push((Rc::from(key.as_str()), node));
            }
            Ok(found.then_some(Node::Map(entries)))
        }
        _ => Ok(None),
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(context: &Context, text: &str) -> Object {
        Expression::parse(text).unwrap().unwrap().evaluate(context).value
    }

    #[test]
    fn nested_strings_keep_their_container() {
        let context = Context::create_test_context();
        context.put_constant("n", Object::from(2));
        let object =
            Object::from_json_str(r#"["${n + 1}", 5, {"k": "v${n}", "p": "plain"}]"#).unwrap();
        let expression = Expression::parse_nested(&object).unwrap().unwrap();
        let expected = Object::from_json_str(r#"[3, 5, {"k": "v2", "p": "plain"}]"#).unwrap();
        assert_eq!(expression.evaluate(&context).value, expected);
        let plain = Object::from_json_str(r#"["a", {"b": 1}]"#).unwrap();
        assert!(Expression::parse_nested(&plain).unwrap().is_none());
    }

    #[test]
    fn plain_text_is_not_an_expression() {
        assert!(Expression::parse("hello").unwrap().is_none());
        assert!(Expression::parse("cost $5").unwrap().is_none());
    }

    #[test]
    fn single_segment_keeps_type() {
        let context = Context::create_test_context();
        assert_eq!(eval(&context, "${1 + 2}"), Object::from(3));
        assert_eq!(eval(&context, "${true && 'x'}"), Object::from("x"));
        assert_eq!(eval(&context, "${[1, 2][1]}"), Object::from(2));
        assert_eq!(eval(&context, "${{'a': 4}.a}"), Object::from(4));
    }

    #[test]
    fn mixed_segments_concatenate() {
        let context = Context::create_test_context();
        context.put_constant("name", Object::from("Ada"));
        assert_eq!(eval(&context, "Hi ${name}, ${2 * 3}!"), Object::from("Hi Ada, 6!"));
        assert_eq!(eval(&context, "${'nested ${name}'}"), Object::from("nested Ada"));
    }

    #[test]
    fn operators() {
        let context = Context::create_test_context();
        assert_eq!(eval(&context, "${'fuzzy' + 10}"), Object::from("fuzzy10"));
        assert!(eval(&context, "${'fuzzy' * 10}").as_number().is_nan());
        assert_eq!(eval(&context, "${7 % 4}"), Object::from(3));
        assert_eq!(eval(&context, "${-(2 + 3)}"), Object::from(-5));
        assert_eq!(eval(&context, "${!0}"), Object::from(true));
        assert_eq!(eval(&context, "${2 < 10 && 'b' > 'a'}"), Object::from(true));
        assert_eq!(eval(&context, "${1 == 1 ? 'y' : 'n'}"), Object::from("y"));
        assert_eq!(eval(&context, "${null ?? 'fallback'}"), Object::from("fallback"));
        assert_eq!(eval(&context, "${0 || 'other'}"), Object::from("other"));
        assert_eq!(eval(&context, "${'abc'.length}"), Object::from(3));
        assert_eq!(eval(&context, "${missing.deep[3]}"), Object::Null);
    }

    #[test]
    fn builtins() {
        let context = Context::create_test_context();
        assert_eq!(eval(&context, "${Math.min(4, 100)}"), Object::from(4));
        assert_eq!(eval(&context, "${Math.max(4, 100, 7)}"), Object::from(100));
        assert_eq!(eval(&context, "${Math.round(2.5)}"), Object::from(3));
        assert_eq!(eval(&context, "${Math.clamp(0, 12, 10)}"), Object::from(10));
        assert_eq!(eval(&context, "${String.toUpperCase('abc')}"), Object::from("ABC"));
        assert_eq!(eval(&context, "${String.slice('abcdef', 1, -1)}"), Object::from("bcde"));
        assert_eq!(eval(&context, "${Array.indexOf([3, 4, 5], 5)}"), Object::from(2));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(
            Expression::parse("${1 +}"),
            Err(ParseError::UnexpectedToken { .. } | ParseError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            Expression::parse("${Nope.fn(1)}"),
            Err(ParseError::UnknownFunction { .. })
        ));
        assert!(matches!(
            Expression::parse("${a b}"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Expression::parse("${a"),
            Err(ParseError::UnterminatedBinding { .. })
        ));
    }

    #[test]
    fn folding_removes_pure_subtrees() {
        let folded = Expression::parse("${Math.max(1, 2) * 3}").unwrap().unwrap().optimized();
        assert!(folded.is_constant());
        let partial = Expression::parse("${a + 2 * 3}").unwrap().unwrap().optimized();
        assert!(!partial.is_constant());
    }
}
