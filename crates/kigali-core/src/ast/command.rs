//! `Command`: one DSL verb, parsed into a typed instruction the
//! interpreter executes against a `Scope` (spec.md §4.4).

use serde::{Deserialize, Serialize};

use crate::ast::year_matcher::YearMatcher;
use crate::model::stream::{EnabledStream, StreamName};
use crate::model::substance_state::RecoveryStage;
use crate::number::Unit;

/// A sampling distribution a numeric literal can draw from instead of a
/// fixed value (spec.md §4.7 Monte Carlo). `limit` clamps the draw to a
/// closed interval before it's used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamplingSpec {
    Normal {
        mean: f64,
        std: f64,
        limit: Option<(f64, f64)>,
    },
    Uniform {
        low: f64,
        high: f64,
        limit: Option<(f64, f64)>,
    },
}

/// A numeric command argument: either a literal value or a sampling node
/// to be resolved once per (scenario, trial) before the command runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueExpr {
    Literal(f64),
    Sampled(SamplingSpec),
}

impl ValueExpr {
    pub fn literal(value: f64) -> Self {
        ValueExpr::Literal(value)
    }

    /// Read the resolved value. The Monte Carlo driver replaces every
    /// `Sampled` node with a `Literal` before the interpreter ever sees a
    /// statement (spec.md §4.7) — a `Sampled` surviving to execution is an
    /// engine bug, not a user error.
    pub fn as_literal(&self) -> Result<f64, crate::error::EngineError> {
        match self {
            ValueExpr::Literal(v) => Ok(*v),
            ValueExpr::Sampled(_) => Err(crate::error::EngineError::Internal(
                "sampled value reached the interpreter unresolved".to_string(),
            )),
        }
    }
}

/// How a `cap`/`floor`'s displaced volume is denominated when the target
/// is a different substance than the source (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplaceBasis {
    Units,
    Volume,
}

/// The `displacing T [by units|volume]` clause on `cap`/`floor`/`recycle`.
/// `raw_name` is resolved at execution time: if it names a known stream on
/// the *same* substance, the displaced volume flows there; otherwise it
/// names another substance in the same application and the volume is
/// converted across substances (spec.md §5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaceTarget {
    pub raw_name: String,
    pub basis: Option<DisplaceBasis>,
}

/// Every DSL verb spec.md §4.4 defines, each carrying the typed arguments
/// the interpreter needs — no string dispatch at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// `enable domestic` / `enable import` / `enable export`.
    Enable { stream: EnabledStream },

    /// `initial charge of V kg / unit for domestic`.
    InitialCharge { stream: EnabledStream, value: ValueExpr, units: Unit },

    /// `equals V kgCO2e / kg`.
    EqualsGhgIntensity { value: ValueExpr, units: Unit },

    /// `equals V kwh / unit`.
    EqualsEnergyIntensity { value: ValueExpr, units: Unit },

    /// `set <stream> to V <units>`.
    SetAbsolute { stream: StreamName, value: ValueExpr, units: Unit },

    /// `set <stream> by P%`.
    SetRelativePercent { stream: StreamName, percent: ValueExpr },

    /// `change <stream> by V <units>`.
    ChangeAbsolute { stream: StreamName, value: ValueExpr, units: Unit },

    /// `change <stream> by P%`.
    ChangeRelativePercent { stream: StreamName, percent: ValueExpr },

    /// `cap <stream> to V <units> [displacing T [by basis]]`.
    Cap {
        stream: StreamName,
        value: ValueExpr,
        units: Unit,
        displacing: Option<DisplaceTarget>,
    },

    /// `floor <stream> to V <units> [displacing T [by basis]]`.
    Floor {
        stream: StreamName,
        value: ValueExpr,
        units: Unit,
        displacing: Option<DisplaceTarget>,
    },

    /// `recharge P% each year with K kg / unit`.
    Recharge { percent: ValueExpr, kg_per_unit: ValueExpr },

    /// `retire P% each year [with replacement]`.
    Retire { percent: ValueExpr, with_replacement: bool },

    /// `recover V <units> for recharge|eol [displacing T]`.
    Recover {
        value: ValueExpr,
        units: Unit,
        stage: RecoveryStage,
        displacing: Option<DisplaceTarget>,
    },

    /// `recycle s with P% [displacing T]` — a standing recovery policy
    /// rather than a one-off quantity, applied every recalculation.
    Recycle {
        stage: RecoveryStage,
        percent: ValueExpr,
        displacing: Option<String>,
    },

    /// `replace V kg of a with b` — moves volume from substance `from` to
    /// substance `to` within the same application.
    Replace {
        value: ValueExpr,
        units: Unit,
        from_substance: String,
        to_substance: String,
    },
}

/// One statement: a command plus the years it's active in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub command: CommandKind,
    pub year_matcher: YearMatcher,
}

impl Statement {
    pub fn new(command: CommandKind, year_matcher: YearMatcher) -> Self {
        Self { command, year_matcher }
    }
}
