//! Typed engine errors (spec.md §7).
//!
//! `EngineError` covers every runtime failure the interpreter, recalculator,
//! displacement executor, and runner can produce. DSL syntax errors are a
//! separate type, `ParseError` (see `parser::error`), since the parser
//! accumulates them into a `ParseResult` rather than failing fast.

use crate::model::scope::Scope;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("unknown substance '{substance}' in application '{application}'")]
    UnknownSubstance {
        application: String,
        substance: String,
    },

    #[error("cannot write a non-zero value to disabled stream '{stream}' in {scope}")]
    StreamNotEnabled { scope: Scope, stream: String },

    #[error("conversion between kg and units requires a non-zero initial charge")]
    ZeroInitialCharge,

    #[error("displacement target '{stream}' is the same as the source stream in {scope}")]
    SelfDisplacement { scope: Scope, stream: String },

    #[error(transparent)]
    NumberFormat(#[from] crate::number::NumberParseError),

    #[error("invariant '{invariant}' violated in {scope} at year {year}: {detail}")]
    InvariantViolated {
        scope: Scope,
        year: i64,
        invariant: &'static str,
        detail: String,
    },

    #[error("simulation cancelled at year {year}")]
    Cancelled { year: i64 },

    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invariant(scope: Scope, year: i64, invariant: &'static str, detail: impl Into<String>) -> Self {
        Self::InvariantViolated {
            scope,
            year,
            invariant,
            detail: detail.into(),
        }
    }
}
