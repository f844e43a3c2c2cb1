//! `ParseError` / `ParseResult`: the parser's diagnostic type (spec.md
//! §7 "ErrParse"). Unlike `EngineError`, parse errors accumulate — the
//! parser keeps going after a recoverable failure and reports everything
//! it found in one pass.

use serde::{Deserialize, Serialize};

use crate::ast::ParsedProgram;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{line}:{col}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self { line, col, message: message.into() }
    }
}

/// The parser's output: accumulated diagnostics plus, if parsing reached
/// a usable state, the program itself. `program` can be `Some` even when
/// `errors` is non-empty, for DSL documents where some blocks fail to
/// parse but enough of the document recovered to build a partial program —
/// callers should still treat a non-empty `errors` as failure for `run`,
/// per spec.md §6 (exit code 2), but `validate` wants to report every
/// diagnostic in one pass.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub program: Option<ParsedProgram>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.program.is_some()
    }
}
