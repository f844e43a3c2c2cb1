//! DSL lexer: turns source text into a flat token stream with source
//! positions (spec.md §4.8, §6 "DSL (bit-level significant for interop)").
//!
//! Comments begin with `#` and run to end of line. Strings are
//! double-quoted and may not contain `"` or `,`. Numbers use the flexible
//! UK format from [`crate::number::parse_flexible_number`] — the lexer
//! only decides *where* a number token ends; the actual digit-grouping
//! rules live in that parser.

use crate::number::parse_flexible_number;
use crate::parser::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Percent,
    Slash,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

pub fn lex(source: &str) -> (Vec<PositionedToken>, Vec<ParseError>) {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;

    let advance = |i: &mut usize, line: &mut usize, col: &mut usize, chars: &[char]| {
        if chars[*i] == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
        *i += 1;
    };

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut col, &chars);
            continue;
        }

        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                advance(&mut i, &mut line, &mut col, &chars);
            }
            continue;
        }

        let start_line = line;
        let start_col = col;

        if c == '"' {
            advance(&mut i, &mut line, &mut col, &chars);
            let mut s = String::new();
            let mut closed = false;
            while i < chars.len() {
                if chars[i] == '"' {
                    advance(&mut i, &mut line, &mut col, &chars);
                    closed = true;
                    break;
                }
                if chars[i] == ',' {
                    errors.push(ParseError::new(
                        start_line,
                        start_col,
                        "string literal must not contain ','".to_string(),
                    ));
                }
                s.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            if !closed {
                errors.push(ParseError::new(start_line, start_col, "unterminated string literal".to_string()));
            }
            tokens.push(PositionedToken { token: Token::Str(s), line: start_line, col: start_col });
            continue;
        }

        if c == '%' {
            advance(&mut i, &mut line, &mut col, &chars);
            tokens.push(PositionedToken { token: Token::Percent, line: start_line, col: start_col });
            continue;
        }

        if c == '/' {
            advance(&mut i, &mut line, &mut col, &chars);
            tokens.push(PositionedToken { token: Token::Slash, line: start_line, col: start_col });
            continue;
        }

        if c == ',' {
            advance(&mut i, &mut line, &mut col, &chars);
            tokens.push(PositionedToken { token: Token::Comma, line: start_line, col: start_col });
            continue;
        }

        // A number starts with a digit, or a sign directly followed by a
        // digit. A lone '-' used as a word separator is not a number.
        let looks_numeric = c.is_ascii_digit()
            || ((c == '-' || c == '+') && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()));

        if looks_numeric {
            let mut raw = String::new();
            raw.push(c);
            advance(&mut i, &mut line, &mut col, &chars);
            loop {
                if i >= chars.len() {
                    break;
                }
                let cur = chars[i];
                if cur.is_ascii_digit() {
                    raw.push(cur);
                    advance(&mut i, &mut line, &mut col, &chars);
                } else if cur == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                    raw.push(cur);
                    advance(&mut i, &mut line, &mut col, &chars);
                } else if cur == ',' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                    // Only part of the number when it's bracketed by
                    // digits on both sides (thousands grouping); a comma
                    // before a digit but after whitespace is a list
                    // separator, not part of this token.
                    if raw.chars().last().is_some_and(|p| p.is_ascii_digit()) {
                        raw.push(cur);
                        advance(&mut i, &mut line, &mut col, &chars);
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
            match parse_flexible_number(&raw) {
                Ok(value) => tokens.push(PositionedToken { token: Token::Number(value), line: start_line, col: start_col }),
                Err(e) => errors.push(ParseError::new(start_line, start_col, e.to_string())),
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut raw = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-') {
                raw.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            tokens.push(PositionedToken { token: Token::Ident(raw), line: start_line, col: start_col });
            continue;
        }

        errors.push(ParseError::new(start_line, start_col, format!("unexpected character '{c}'")));
        advance(&mut i, &mut line, &mut col, &chars);
    }

    tokens.push(PositionedToken { token: Token::Eof, line, col });
    (tokens, errors)
}
