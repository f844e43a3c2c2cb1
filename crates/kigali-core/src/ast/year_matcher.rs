//! `YearMatcher`: the `during ...` clause attached to every command
//! (spec.md §4.4 "Year-matcher edge policy").

use serde::{Deserialize, Serialize};

/// An inclusive year range with open ends. `start: None` means "from the
/// simulation's first year"; `end: None` means "through the simulation's
/// last year". Both `None` matches every simulated year unconditionally —
/// this is what a command with no `during` clause at all gets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearMatcher {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl YearMatcher {
    pub fn unconditional() -> Self {
        Self { start: None, end: None }
    }

    pub fn year(y: i64) -> Self {
        Self { start: Some(y), end: Some(y) }
    }

    pub fn range(start: i64, end: i64) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    /// `during years beginning to B` — open at the start.
    pub fn through(end: i64) -> Self {
        Self { start: None, end: Some(end) }
    }

    /// `during years A onwards` — open at the end.
    pub fn onwards(start: i64) -> Self {
        Self { start: Some(start), end: None }
    }

    /// Resolve the open ends against the simulation's bounds and test
    /// `year` for inclusion. Bounds are inclusive on both sides.
    pub fn matches(&self, year: i64, sim_start: i64, sim_end: i64) -> bool {
        let lo = self.start.unwrap_or(sim_start);
        let hi = self.end.unwrap_or(sim_end);
        year >= lo && year <= hi
    }
}

impl Default for YearMatcher {
    fn default() -> Self {
        Self::unconditional()
    }
}
