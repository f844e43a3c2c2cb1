//! `Scope`: the immutable `(stanza, application, substance)` triple that
//! addresses a point in the program (spec.md §3).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which stanza a command came from, carried on `Scope` purely for
/// diagnostics (error messages, trace events) — it plays no part in how
/// `SimulationState` indexes substances, since the default stanza and every
/// policy stanza mutate the *same* per-(application, substance) state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub stanza: String,
    pub application: String,
    pub substance: String,
}

impl Scope {
    pub fn new(
        stanza: impl Into<String>,
        application: impl Into<String>,
        substance: impl Into<String>,
    ) -> Self {
        Self {
            stanza: stanza.into(),
            application: application.into(),
            substance: substance.into(),
        }
    }

    /// Cheap clone-with-substitution; the displacement executor uses this
    /// to switch into a destination substance without touching `stanza` or
    /// `application`.
    pub fn with_substance(&self, substance: impl Into<String>) -> Scope {
        Scope {
            stanza: self.stanza.clone(),
            application: self.application.clone(),
            substance: substance.into(),
        }
    }

    /// The `(application, substance)` pair used to index `SimulationState`.
    pub fn key(&self) -> (String, String) {
        (self.application.clone(), self.substance.clone())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.application, self.substance)
    }
}
