// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Expression tree and its evaluator.

use core::cmp::Ordering;
use std::rc::Rc;

use understory_object::{Object, ObjectMap};

use super::functions::Builtin;
use crate::{BoundSymbolSet, Context, SymbolReference};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Clone, Debug)]
pub(crate) enum Node {
    Constant(Object),
    Symbol(Rc<str>),
    Member(Box<Node>, Rc<str>),
    Index(Box<Node>, Box<Node>),
    Call(Builtin, Vec<Node>),
    Array(Vec<Node>),
    Map(Vec<(Rc<str>, Node)>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Coalesce(Box<Node>, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
    Concat(Vec<Node>),
}

/// Evaluation state: the context symbols resolve against and the slots read so far.
pub(crate) struct Scope<'a> {
    context: Option<&'a Context>,
    symbols: BoundSymbolSet,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(context: Option<&'a Context>) -> Self {
        Self {
            context,
            symbols: BoundSymbolSet::new(),
        }
    }

    pub(crate) fn into_symbols(self) -> BoundSymbolSet {
        self.symbols
    }

    fn lookup(&mut self, name: &str) -> Object {
        let Some(context) = self.context else {
            return Object::Null;
        };
        match context.find(name) {
            Some(found) => {
                // Constants never change, so reading one creates no dependency.
                if found.access().is_mutable() {
                    self.symbols.insert(SymbolReference::new(found.context(), name));
                }
                found.value().clone()
            }
            None => Object::Null,
        }
    }
}

impl Node {
    pub(crate) fn eval(&self, scope: &mut Scope<'_>) -> Object {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Symbol(name) => scope.lookup(name),
            Self::Member(object, name) => member(&object.eval(scope), name),
            Self::Index(object, index) => {
                let object = object.eval(scope);
                let index = index.eval(scope);
                if index.is_number() {
                    object.at(index.as_int())
                } else {
                    member(&object, &index.as_string())
                }
            }
            Self::Call(function, args) => {
                let args: Vec<Object> = args.iter().map(|a| a.eval(scope)).collect();
                function(&args)
            }
            Self::Array(items) => Object::from(items.iter().map(|i| i.eval(scope)).collect::<Vec<_>>()),
            Self::Map(entries) => Object::from(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.eval(scope)))
                    .collect::<ObjectMap>(),
            ),
            Self::Unary(op, operand) => {
                let value = operand.eval(scope);
                match op {
                    UnaryOp::Not => Object::from(!value.truthy()),
                    UnaryOp::Negate => Object::from(-value.as_number()),
                    UnaryOp::Plus => Object::from(value.as_number()),
                }
            }
            Self::Binary(op, left, right) => {
                let left = left.eval(scope);
                let right = right.eval(scope);
                binary(*op, &left, &right)
            }
            Self::And(left, right) => {
                let left = left.eval(scope);
                if left.truthy() { right.eval(scope) } else { left }
            }
            Self::Or(left, right) => {
                let left = left.eval(scope);
                if left.truthy() { left } else { right.eval(scope) }
            }
            Self::Coalesce(left, right) => {
                let left = left.eval(scope);
                if left.is_null() { right.eval(scope) } else { left }
            }
            Self::Ternary(condition, when_true, when_false) => {
                if condition.eval(scope).truthy() {
                    when_true.eval(scope)
                } else {
                    when_false.eval(scope)
                }
            }
            Self::Concat(parts) => {
                let mut text = String::new();
                for part in parts {
                    text.push_str(&part.eval(scope).as_string());
                }
                Object::from(text)
            }
        }
    }

    /// Folds every subtree that reads no symbol into a constant.
    pub(crate) fn fold(self) -> Self {
        let folded = match self {
            Self::Constant(_) | Self::Symbol(_) => return self,
            Self::Member(object, name) => Self::Member(Box::new(object.fold()), name),
            Self::Index(object, index) => {
                Self::Index(Box::new(object.fold()), Box::new(index.fold()))
            }
            Self::Call(function, args) => Self::Call(function, args.into_iter().map(Self::fold).collect()),
            Self::Array(items) => Self::Array(items.into_iter().map(Self::fold).collect()),
            Self::Map(entries) => Self::Map(entries.into_iter().map(|(k, v)| (k, v.fold())).collect()),
            Self::Unary(op, operand) => Self::Unary(op, Box::new(operand.fold())),
            Self::Binary(op, left, right) => {
                Self::Binary(op, Box::new(left.fold()), Box::new(right.fold()))
            }
            Self::And(left, right) => Self::And(Box::new(left.fold()), Box::new(right.fold())),
            Self::Or(left, right) => Self::Or(Box::new(left.fold()), Box::new(right.fold())),
            Self::Coalesce(left, right) => {
                Self::Coalesce(Box::new(left.fold()), Box::new(right.fold()))
            }
            Self::Ternary(condition, when_true, when_false) => Self::Ternary(
                Box::new(condition.fold()),
                Box::new(when_true.fold()),
                Box::new(when_false.fold()),
            ),
            Self::Concat(parts) => Self::Concat(parts.into_iter().map(Self::fold).collect()),
        };
        if folded.children_constant() {
            let mut scope = Scope::new(None);
            Self::Constant(folded.eval(&mut scope))
        } else {
            folded
        }
    }

    fn children_constant(&self) -> bool {
        let constant = |n: &Self| matches!(n, Self::Constant(_));
        match self {
            Self::Constant(_) => true,
            Self::Symbol(_) => false,
            Self::Member(object, _) | Self::Unary(_, object) => constant(object),
            Self::Index(a, b)
            | Self::Binary(_, a, b)
            | Self::And(a, b)
            | Self::Or(a, b)
            | Self::Coalesce(a, b) => constant(a) && constant(b),
            Self::Ternary(a, b, c) => constant(a) && constant(b) && constant(c),
            Self::Call(_, items) | Self::Array(items) | Self::Concat(items) => items.iter().all(constant),
            Self::Map(entries) => entries.iter().all(|(_, v)| constant(v)),
        }
    }
}

fn member(object: &Object, name: &str) -> Object {
    if name == "length" && (object.is_array() || object.is_string()) {
        return Object::from(object.len());
    }
    object.get(name)
}

fn compare(left: &Object, right: &Object) -> Option<Ordering> {
    match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => left.as_number().partial_cmp(&right.as_number()),
    }
}

fn binary(op: BinaryOp, left: &Object, right: &Object) -> Object {
    match op {
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Object::from(format!("{}{}", left.as_string(), right.as_string()))
        }
        BinaryOp::Add => Object::from(left.as_number() + right.as_number()),
        BinaryOp::Sub => Object::from(left.as_number() - right.as_number()),
        BinaryOp::Mul => Object::from(left.as_number() * right.as_number()),
        BinaryOp::Div => Object::from(left.as_number() / right.as_number()),
        BinaryOp::Rem => Object::from(left.as_number() % right.as_number()),
        BinaryOp::Lt => Object::from(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Object::from(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Le => Object::from(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Ge => Object::from(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Object::from(left == right),
        BinaryOp::Ne => Object::from(left != right),
    }
}
