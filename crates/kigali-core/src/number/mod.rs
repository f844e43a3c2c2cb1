//! Numeric primitives: `EngineNumber`, its unit tag, and the flexible
//! UK-format number parser.
//!
//! Every value that flows through the engine is a `(value, units)` pair.
//! Polymorphism is pushed into the `Unit` enum rather than handled by
//! string dispatch in hot paths (see DESIGN.md).

mod parse;
mod units;

pub use parse::{parse_flexible_number, NumberParseError};
pub use units::{PerBasis, SimpleUnit, Unit, UnitConverter, UnitParseError};

use serde::{Deserialize, Serialize};

/// A value tagged with its unit, optionally remembering the exact string
/// the author wrote (so error messages and re-serialization can echo it
/// back verbatim).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineNumber {
    pub value: f64,
    pub units: Unit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

impl EngineNumber {
    pub fn new(value: f64, units: Unit) -> Self {
        Self {
            value,
            units,
            original: None,
        }
    }

    pub fn with_original(value: f64, units: Unit, original: impl Into<String>) -> Self {
        Self {
            value,
            units,
            original: Some(original.into()),
        }
    }

    /// Zero-valued number in the given units; the default for any stream
    /// that hasn't been written yet.
    pub fn zero(units: Unit) -> Self {
        Self::new(0.0, units)
    }

    /// Numeric equality after canonicalizing both operands' units.
    /// Returns `false` (rather than erroring) when the units are not the
    /// same dimension — callers that need to know *why* two numbers are
    /// incomparable should use `Unit::canonical_factor` directly.
    pub fn approx_eq(&self, other: &EngineNumber, epsilon: f64) -> bool {
        match (
            self.units.canonical_factor(),
            other.units.canonical_factor(),
        ) {
            (Some((self_dim, self_factor)), Some((other_dim, other_factor)))
                if self_dim == other_dim =>
            {
                (self.value * self_factor - other.value * other_factor).abs() <= epsilon
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for EngineNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.units)
    }
}
