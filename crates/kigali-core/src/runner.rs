//! The scenario runner: steps one scenario year by year, applying the
//! default stanza plus any stacked policies, and yields one [`EngineResult`]
//! per `(application, substance)` each year (spec.md §4.6).
//!
//! Exposed as an iterator rather than an async stream or callback-driven
//! loop — there is no cooperative suspension to model, just a value
//! produced once per simulated year (spec.md §9 "Async/await callbacks").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ast::program::{ParsedProgram, ScenarioSpec};
use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::model::scope::Scope;
use crate::model::simulation_state::SimulationState;
use crate::output::EngineResult;

/// Start iterating `scenario`'s `trial`-th run against `program`. `cancel`,
/// if given, is checked once at the start of each simulated year; setting it
/// aborts the run with `EngineError::Cancelled` before that year's rows are
/// emitted (spec.md §5).
pub fn run_scenario<'a>(
    program: &'a ParsedProgram,
    scenario: &'a ScenarioSpec,
    trial: u32,
    cancel: Option<Arc<AtomicBool>>,
) -> ScenarioRun<'a> {
    tracing::info!(
        scenario = %scenario.name,
        trial,
        year_start = scenario.year_start,
        year_end = scenario.year_end,
        "starting scenario run"
    );
    ScenarioRun {
        program,
        scenario,
        trial,
        current_year: scenario.year_start,
        state: SimulationState::new(scenario.year_start),
        cancel,
        pending: VecDeque::new(),
        finished: false,
    }
}

/// An iterator of `Result<EngineResult, EngineError>`, one item per
/// `(application, substance)` per simulated year. Stops (returns `None`)
/// after the year the scenario covers, or immediately after yielding the
/// first `Err`.
pub struct ScenarioRun<'a> {
    program: &'a ParsedProgram,
    scenario: &'a ScenarioSpec,
    trial: u32,
    current_year: i64,
    state: SimulationState,
    cancel: Option<Arc<AtomicBool>>,
    pending: VecDeque<EngineResult>,
    finished: bool,
}

impl<'a> ScenarioRun<'a> {
    /// Progress through the scenario's year range, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let span = (self.scenario.year_end - self.scenario.year_start + 1).max(1) as f64;
        let done = (self.current_year - self.scenario.year_start).clamp(0, span as i64) as f64;
        (done / span).clamp(0.0, 1.0)
    }

    fn run_one_year(&mut self) -> Result<(), EngineError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                tracing::warn!(scenario = %self.scenario.name, trial = self.trial, year = self.current_year, "run cancelled");
                return Err(EngineError::Cancelled { year: self.current_year });
            }
        }

        tracing::debug!(scenario = %self.scenario.name, trial = self.trial, year = self.current_year, "executing year");

        if let Err(e) = Interpreter::execute_year(
            self.program,
            &self.scenario.policies,
            &mut self.state,
            self.current_year,
            self.scenario.year_start,
            self.scenario.year_end,
        ) {
            tracing::error!(scenario = %self.scenario.name, trial = self.trial, year = self.current_year, error = %e, "scenario run failed");
            return Err(e);
        }

        let keys: Vec<(String, String)> = self.state.registered_substances().cloned().collect();
        for (application, substance) in keys {
            let scope = Scope::new("", application.clone(), substance.clone());
            let sub_state = self.state.substance(&scope)?;
            self.pending.push_back(EngineResult::from_substance_state(
                self.scenario.name.clone(),
                self.trial,
                self.current_year,
                application,
                substance,
                sub_state,
            ));
        }

        self.state.increment_year();
        self.current_year += 1;
        if self.current_year > self.scenario.year_end {
            tracing::info!(scenario = %self.scenario.name, trial = self.trial, "scenario run complete");
        }
        Ok(())
    }
}

impl<'a> Iterator for ScenarioRun<'a> {
    type Item = Result<EngineResult, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.finished || self.current_year > self.scenario.year_end {
                return None;
            }
            if let Err(e) = self.run_one_year() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::command::{CommandKind, Statement, ValueExpr};
    use crate::ast::program::{ApplicationBlock, SubstanceBlock};
    use crate::ast::year_matcher::YearMatcher;
    use crate::model::stream::{EnabledStream, StreamName};
    use crate::number::Unit;

    fn program() -> ParsedProgram {
        let mut program = ParsedProgram::new();
        let mut app = ApplicationBlock::new("Commercial Refrigeration");
        let mut sub = SubstanceBlock::new("HFC-134a");
        sub.statements = vec![
            Statement::new(CommandKind::Enable { stream: EnabledStream::Domestic }, YearMatcher::unconditional()),
            Statement::new(
                CommandKind::InitialCharge {
                    stream: EnabledStream::Domestic,
                    value: ValueExpr::literal(1.0),
                    units: Unit::kg_per_unit(),
                },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::SetAbsolute { stream: StreamName::Domestic, value: ValueExpr::literal(1000.0), units: Unit::mt() },
                YearMatcher::year(1),
            ),
            Statement::new(
                CommandKind::Retire { percent: ValueExpr::literal(5.0), with_replacement: false },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::EqualsGhgIntensity { value: ValueExpr::literal(1430.0), units: Unit::kg_co2e_per_kg() },
                YearMatcher::unconditional(),
            ),
        ];
        app.substances.push(sub);
        program.default_stanza.applications.push(app);
        program
    }

    #[test]
    fn yields_one_row_per_substance_per_year() {
        let program = program();
        let scenario = ScenarioSpec {
            name: "BAU".to_string(),
            policies: vec![],
            year_start: 1,
            year_end: 3,
            trials: 1,
        };
        let rows: Vec<EngineResult> = run_scenario(&program, &scenario, 0, None)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].year, 1);
        assert_eq!(rows[2].year, 3);
        assert!(rows[0].population.value > 0.0);
        assert!(rows[2].population.value > rows[0].population.value.min(rows[2].population.value) - 1.0);
    }

    /// Scenario 1 (spec.md §8): 1 mt domestic sales at 1430 kgCO2e/kg
    /// yields `ghgConsumption` ≈ 1.43 tCO2e in the sales year.
    #[test]
    fn scenario_one_ghg_consumption_matches_spec_example() {
        let program = program();
        let scenario = ScenarioSpec { name: "BAU".to_string(), policies: vec![], year_start: 1, year_end: 10, trials: 1 };
        let rows: Vec<EngineResult> = run_scenario(&program, &scenario, 0, None)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let year1 = &rows[0];
        assert!((year1.ghg_consumption.value - 1.43).abs() < 1e-6);
    }

    #[test]
    fn population_grows_then_is_reduced_by_retirement() {
        let program = program();
        let scenario = ScenarioSpec { name: "BAU".to_string(), policies: vec![], year_start: 1, year_end: 10, trials: 1 };
        let rows: Vec<EngineResult> = run_scenario(&program, &scenario, 0, None)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(rows.last().unwrap().population.value > rows.first().unwrap().population.value);
    }

    #[test]
    fn cancellation_stops_the_run_with_no_partial_rows_for_that_year() {
        let program = program();
        let scenario = ScenarioSpec { name: "BAU".to_string(), policies: vec![], year_start: 1, year_end: 5, trials: 1 };
        let cancel = Arc::new(AtomicBool::new(true));
        let mut run = run_scenario(&program, &scenario, 0, Some(cancel));
        let first = run.next().unwrap();
        assert!(matches!(first, Err(EngineError::Cancelled { year: 1 })));
        assert!(run.next().is_none());
    }
}
