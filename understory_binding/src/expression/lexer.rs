// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tokenizer for the inside of a `${...}` segment.

use super::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Question,
    Colon,
    Coalesce,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Str(s) => format!("string '{s}'"),
            Self::Ident(s) => format!("identifier '{s}'"),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Dot => ".",
            Self::Comma => ",",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Coalesce => "??",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEq => "<=",
            Self::GreaterEq => ">=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Number(_) | Self::Str(_) | Self::Ident(_) => "",
        }
    }
}

/// A token and the byte offset where it starts in the full binding string.
pub(crate) type Spanned = (Token, usize);

/// Tokenizes from `start` (just past `${`) up to the matching `}`.
///
/// Returns the tokens and the byte offset just past the closing brace.
pub(crate) fn tokenize_segment(text: &str, start: usize) -> Result<(Vec<Spanned>, usize), ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0_usize;
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
            }
            b'}' if depth == 0 => return Ok((tokens, i + 1)),
            b'{' => {
                depth += 1;
                tokens.push((Token::LBrace, i));
                i += 1;
            }
            b'}' => {
                depth -= 1;
                tokens.push((Token::RBrace, i));
                i += 1;
            }
            b'0'..=b'9' => {
                let begin = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal = &text[begin..i];
                let value = literal.parse().map_err(|_| ParseError::InvalidNumber {
                    literal: literal.to_owned(),
                    position: begin,
                })?;
                tokens.push((Token::Number(value), begin));
            }
            b'\'' | b'"' => {
                let (value, next) = read_string(text, i)?;
                tokens.push((Token::Str(value), i));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'@' => {
                let begin = i;
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push((Token::Ident(text[begin..i].to_owned()), begin));
            }
            _ => {
                let next = bytes.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    (b'?', Some(b'?')) => (Token::Coalesce, 2),
                    (b'<', Some(b'=')) => (Token::LessEq, 2),
                    (b'>', Some(b'=')) => (Token::GreaterEq, 2),
                    (b'=', Some(b'=')) => (Token::EqEq, 2),
                    (b'!', Some(b'=')) => (Token::NotEq, 2),
                    (b'&', Some(b'&')) => (Token::AndAnd, 2),
                    (b'|', Some(b'|')) => (Token::OrOr, 2),
                    (b'(', _) => (Token::LParen, 1),
                    (b')', _) => (Token::RParen, 1),
                    (b'[', _) => (Token::LBracket, 1),
                    (b']', _) => (Token::RBracket, 1),
                    (b'.', _) => (Token::Dot, 1),
                    (b',', _) => (Token::Comma, 1),
                    (b'?', _) => (Token::Question, 1),
                    (b':', _) => (Token::Colon, 1),
                    (b'+', _) => (Token::Plus, 1),
                    (b'-', _) => (Token::Minus, 1),
                    (b'*', _) => (Token::Star, 1),
                    (b'/', _) => (Token::Slash, 1),
                    (b'%', _) => (Token::Percent, 1),
                    (b'!', _) => (Token::Bang, 1),
                    (b'<', _) => (Token::Less, 1),
                    (b'>', _) => (Token::Greater, 1),
                    _ => {
                        let found = text[i..].chars().next().unwrap_or('?');
                        return Err(ParseError::UnexpectedChar { found, position: i });
                    }
                };
                tokens.push((token, i));
                i += width;
            }
        }
    }
    Err(ParseError::UnterminatedBinding {
        position: start.saturating_sub(2),
    })
}

/// Reads a quoted string starting at the quote character `text[start]`.
fn read_string(text: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut chars = text[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ParseError::UnterminatedString { position: start });
    };
    let mut value = String::new();
    let mut escaped = false;
    for (offset, c) in chars {
        if escaped {
            value.push(match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((value, start + offset + c.len_utf8()));
        } else {
            value.push(c);
        }
    }
    Err(ParseError::UnterminatedString { position: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token> {
        tokenize_segment(text, 0).unwrap().0.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            kinds("a.b >= 1.5e1 ?? 'x}y' }"),
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("b".into()),
                Token::GreaterEq,
                Token::Number(15.0),
                Token::Coalesce,
                Token::Str("x}y".into()),
            ]
        );
    }

    #[test]
    fn reports_end_offset() {
        let (_, end) = tokenize_segment("${a} tail", 2).unwrap();
        assert_eq!(&"${a} tail"[end..], " tail");
    }

    #[test]
    fn errors() {
        assert!(matches!(
            tokenize_segment("a + 1", 0),
            Err(ParseError::UnterminatedBinding { .. })
        ));
        assert!(matches!(
            tokenize_segment("'abc }", 0),
            Err(ParseError::UnterminatedString { .. })
        ));
        assert!(matches!(
            tokenize_segment("a # b }", 0),
            Err(ParseError::UnexpectedChar { found: '#', .. })
        ));
    }
}
