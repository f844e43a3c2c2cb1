//! The parser's output: a typed AST describing a DSL document (spec.md
//! §4.3-§4.4, §4.7). Kept separate from `model` because `model` is
//! mutable runtime state while this is the immutable program the
//! interpreter walks against it.

pub mod command;
pub mod program;
pub mod year_matcher;

pub use command::{CommandKind, DisplaceBasis, DisplaceTarget, SamplingSpec, Statement, ValueExpr};
pub use program::{ApplicationBlock, ParsedProgram, ScenarioSpec, Stanza, SubstanceBlock};
pub use year_matcher::YearMatcher;
