// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recursive descent parser producing [`Node`] trees.

use std::rc::Rc;

use understory_object::Object;

use super::functions;
use super::lexer::{Spanned, Token, tokenize_segment};
use super::node::{BinaryOp, Node, UnaryOp};
use super::ParseError;

/// Splits `text` into literal runs and `${...}` segments.
///
/// Returns `Ok(None)` when there is no segment.
pub(crate) fn parse_template(text: &str) -> Result<Option<Node>, ParseError> {
    if !text.contains("${") {
        return Ok(None);
    }
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find("${") {
        let at = cursor + found;
        literal.push_str(&text[cursor..at]);
        let (tokens, end) = tokenize_segment(text, at + 2)?;
        let node = Parser::new(tokens, end).parse_segment()?;
        if !literal.is_empty() {
            parts.push(Node::Constant(Object::from(core::mem::take(&mut literal))));
        }
        parts.push(node);
        cursor = end;
    }
    literal.push_str(&text[cursor..]);
    if !literal.is_empty() {
        parts.push(Node::Constant(Object::from(literal)));
    }
    Ok(Some(match parts.len() {
        1 => parts.remove(0),
        _ => Node::Concat(parts),
    }))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn parse_segment(mut self) -> Result<Node, ParseError> {
        if self.tokens.is_empty() {
            return Ok(Node::Constant(Object::from("")));
        }
        let node = self.ternary()?;
        match self.tokens.get(self.pos) {
            Some((token, position)) => Err(ParseError::UnexpectedToken {
                found: token.describe(),
                expected: "end of expression",
                position: *position,
            }),
            None => Ok(node),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<Spanned, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd { position: self.end })?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ParseError> {
        let (found, position) = self.next()?;
        if &found == token {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: found.describe(),
                expected,
                position,
            })
        }
    }

    fn ternary(&mut self) -> Result<Node, ParseError> {
        let condition = self.coalesce()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let when_true = self.ternary()?;
        self.expect(&Token::Colon, "':'")?;
        let when_false = self.ternary()?;
        Ok(Node::Ternary(
            Box::new(condition),
            Box::new(when_true),
            Box::new(when_false),
        ))
    }

    fn coalesce(&mut self) -> Result<Node, ParseError> {
        let mut left = self.or()?;
        while self.eat(&Token::Coalesce) {
            let right = self.or()?;
            left = Node::Coalesce(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Node, ParseError> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            let right = self.and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Node, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        operators: &[(Token, BinaryOp)],
        operand: fn(&mut Self) -> Result<Node, ParseError>,
    ) -> Result<Node, ParseError> {
        let mut left = operand(self)?;
        'outer: loop {
            for (token, op) in operators {
                if self.eat(token) {
                    let right = operand(self)?;
                    left = Node::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Node, ParseError> {
        self.binary_level(
            &[(Token::EqEq, BinaryOp::Eq), (Token::NotEq, BinaryOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Node, ParseError> {
        self.binary_level(
            &[
                (Token::LessEq, BinaryOp::Le),
                (Token::GreaterEq, BinaryOp::Ge),
                (Token::Less, BinaryOp::Lt),
                (Token::Greater, BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Node, ParseError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Node, ParseError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Negate,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        Ok(Node::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> Result<Node, ParseError> {
        let mut node = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let (token, position) = self.next()?;
                let Token::Ident(name) = token else {
                    return Err(ParseError::UnexpectedToken {
                        found: token.describe(),
                        expected: "property name",
                        position,
                    });
                };
                node = Node::Member(Box::new(node), Rc::from(name.as_str()));
            } else if self.eat(&Token::LBracket) {
                let index = self.ternary()?;
                self.expect(&Token::RBracket, "']'")?;
                node = Node::Index(Box::new(node), Box::new(index));
            } else if self.eat(&Token::LParen) {
                let name = qualified_name(&node).unwrap_or_default();
                let function = functions::lookup(&name)
                    .ok_or_else(|| ParseError::UnknownFunction { name: name.clone() })?;
                let args = self.list(&Token::RParen, "')'")?;
                node = Node::Call(function, args);
            } else {
                return Ok(node);
            }
        }
    }

    fn list(&mut self, close: &Token, expected: &'static str) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.ternary()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma, expected)?;
        }
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let (token, position) = self.next()?;
        match token {
            Token::Number(n) => Ok(Node::Constant(Object::from(n))),
            Token::Str(s) => Ok(parse_template(&s)?.unwrap_or_else(|| Node::Constant(Object::from(s)))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Node::Constant(Object::from(true)),
                "false" => Node::Constant(Object::from(false)),
                "null" => Node::Constant(Object::Null),
                _ => Node::Symbol(Rc::from(name.as_str())),
            }),
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Node::Array(self.list(&Token::RBracket, "']'")?)),
            Token::LBrace => self.map_literal(),
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: "a value",
                position,
            }),
        }
    }

    fn map_literal(&mut self) -> Result<Node, ParseError> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Node::Map(entries));
        }
        loop {
            let (token, position) = self.next()?;
            let key = match token {
                Token::Str(s) | Token::Ident(s) => s,
                other => {
                    return Err(ParseError::UnexpectedToken {
                        found: other.describe(),
                        expected: "map key",
                        position,
                    });
                }
            };
            self.expect(&Token::Colon, "':'")?;
            entries.push((Rc::from(key.as_str()), self.ternary()?));
            if self.eat(&Token::RBrace) {
                return Ok(Node::Map(entries));
            }
            self.expect(&Token::Comma, "'}'")?;
        }
    }
}

/// `Math.min` style dotted name of a symbol or member chain.
fn qualified_name(node: &Node) -> Option<String> {
    match node {
        Node::Symbol(name) => Some(name.to_string()),
        Node::Member(object, name) => Some(format!("{}.{name}", qualified_name(object)?)),
        _ => None,
    }
}
