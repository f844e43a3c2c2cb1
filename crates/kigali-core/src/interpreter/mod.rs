//! The command interpreter: walks a `ParsedProgram`'s stanzas for one
//! simulated year and applies each active statement's command to
//! `SimulationState`, then triggers the recalculator (spec.md §4.2, §4.4).
//!
//! Policy stacking (spec.md §4.3): the `default` stanza always runs
//! first, then each policy stanza named in the active scenario, in the
//! order the scenario lists them. Each later stanza sees the state the
//! ones before it left behind.

use crate::ast::command::CommandKind;
use crate::ast::program::{ParsedProgram, Stanza};
use crate::displacement::DisplacementExecutor;
use crate::error::EngineError;
use crate::model::scope::Scope;
use crate::model::simulation_state::SimulationState;
use crate::model::substance_state::{RecyclingPolicy, StreamUpdate};
use crate::number::{EngineNumber, Unit};
use crate::recalculator::Recalculator;

pub struct Interpreter;

impl Interpreter {
    /// Run every stanza active for `year` against `state`, in policy-stack
    /// order, recalculating each substance once per stanza pass.
    pub fn execute_year(
        program: &ParsedProgram,
        policies: &[String],
        state: &mut SimulationState,
        year: i64,
        sim_start: i64,
        sim_end: i64,
    ) -> Result<(), EngineError> {
        Self::execute_stanza("default", &program.default_stanza, state, year, sim_start, sim_end)?;
        for policy_name in policies {
            let stanza = program.policy_stanzas.get(policy_name).ok_or_else(|| {
                EngineError::Internal(format!("scenario references unknown policy stanza '{policy_name}'"))
            })?;
            Self::execute_stanza(policy_name, stanza, state, year, sim_start, sim_end)?;
        }
        Ok(())
    }

    fn execute_stanza(
        stanza_name: &str,
        stanza: &Stanza,
        state: &mut SimulationState,
        year: i64,
        sim_start: i64,
        sim_end: i64,
    ) -> Result<(), EngineError> {
        for application in &stanza.applications {
            for substance in &application.substances {
                let scope = Scope::new(stanza_name, &application.name, &substance.name);
                state.ensure_substance(&scope);

                for statement in &substance.statements {
                    if statement.year_matcher.matches(year, sim_start, sim_end) {
                        Self::execute_command(&scope, &statement.command, state, year)?;
                    }
                }

                Recalculator::recalculate(&scope, state.substance_mut(&scope)?, year)?;
            }
        }
        Ok(())
    }

    /// Resolve a `cap`/`floor` target that was written as a bare `N%` into
    /// an absolute quantity in the target stream's own units, relative to
    /// its current value (spec.md §4.1 "% <-> absolute ... for cap/floor
    /// N%: current value of the target stream"). A concrete-unit target
    /// passes through unchanged.
    fn resolve_cap_floor_target(
        scope: &Scope,
        state: &SimulationState,
        stream: crate::model::stream::StreamName,
        value: f64,
        units: Unit,
    ) -> Result<(f64, Unit), EngineError> {
        if units.numerator != crate::number::SimpleUnit::Percent {
            return Ok((value, units));
        }
        let current = state.get_stream(scope, stream)?;
        Ok((current.value * (value / 100.0), current.units))
    }

    fn execute_command(
        scope: &Scope,
        command: &CommandKind,
        state: &mut SimulationState,
        year: i64,
    ) -> Result<(), EngineError> {
        match command {
            CommandKind::Enable { stream } => state.mark_stream_as_enabled(scope, *stream),

            CommandKind::InitialCharge { stream, value, units } => {
                let kg_per_unit = value.as_literal()? * units.numerator.canonical_scale();
                state.set_initial_charge(scope, *stream, kg_per_unit)
            }

            CommandKind::EqualsGhgIntensity { value, units } => {
                state.set_ghg_intensity(scope, EngineNumber::new(value.as_literal()?, *units))
            }

            CommandKind::EqualsEnergyIntensity { value, units } => {
                state.set_energy_intensity(scope, EngineNumber::new(value.as_literal()?, *units))
            }

            CommandKind::SetAbsolute { stream, value, units } => {
                let update = StreamUpdate::new(*stream, EngineNumber::new(value.as_literal()?, *units));
                state.update(scope, update)
            }

            CommandKind::SetRelativePercent { stream, percent } => {
                // I6: `set s by P%` is relative to `lastSpecifiedValue[s]`,
                // not the current stream value — they diverge once a
                // displacement or recalculation has moved `s` since the
                // last explicit (non-%) `set`/`change`.
                let sub = state.substance(scope)?;
                let baseline = sub
                    .last_specified(*stream)
                    .cloned()
                    .unwrap_or_else(|| sub.get_stream(*stream));
                let new_value = baseline.value * (1.0 + percent.as_literal()? / 100.0);
                let mut update = StreamUpdate::new(*stream, EngineNumber::new(new_value, baseline.units));
                // A %-relative write never becomes the new
                // `last_specified_value` baseline itself.
                update.record_as_last_specified = false;
                state.update(scope, update)
            }

            CommandKind::ChangeAbsolute { stream, value, units } => {
                let current = state.get_stream(scope, *stream)?;
                let delta_in_current_units =
                    value.as_literal()? * units.numerator.canonical_scale() / current.units.numerator.canonical_scale();
                let update = StreamUpdate::new(
                    *stream,
                    EngineNumber::new(current.value + delta_in_current_units, current.units),
                );
                state.update(scope, update)
            }

            CommandKind::ChangeRelativePercent { stream, percent } => {
                let current = state.get_stream(scope, *stream)?;
                let new_value = current.value * (1.0 + percent.as_literal()? / 100.0);
                let mut update = StreamUpdate::new(*stream, EngineNumber::new(new_value, current.units));
                update.record_as_last_specified = false;
                state.update(scope, update)
            }

            CommandKind::Cap { stream, value, units, displacing } => {
                let (resolved_value, resolved_units) =
                    Self::resolve_cap_floor_target(scope, state, *stream, value.as_literal()?, *units)?;
                DisplacementExecutor::cap(scope, state, *stream, resolved_value, resolved_units, displacing.as_ref(), year)
            }

            CommandKind::Floor { stream, value, units, displacing } => {
                let (resolved_value, resolved_units) =
                    Self::resolve_cap_floor_target(scope, state, *stream, value.as_literal()?, *units)?;
                DisplacementExecutor::floor(scope, state, *stream, resolved_value, resolved_units, displacing.as_ref(), year)
            }

            CommandKind::Recharge { percent, kg_per_unit } => {
                let percent_value = percent.as_literal()?;
                let kg_per_unit_value = kg_per_unit.as_literal()?;
                let sub = state.substance_mut(scope)?;
                sub.recharge_rate_percent = percent_value;
                sub.recharge_intensity_kg_per_unit = kg_per_unit_value;
                Ok(())
            }

            CommandKind::Retire { percent, with_replacement } => {
                let percent_value = percent.as_literal()?;
                let sub = state.substance_mut(scope)?;
                sub.retirement_rate_percent = percent_value;
                sub.retirement_with_replacement = *with_replacement;
                Ok(())
            }

            CommandKind::Recover { value, units, stage, displacing } => DisplacementExecutor::recover(
                scope,
                state,
                value.as_literal()?,
                *units,
                *stage,
                displacing.as_ref(),
                year,
            ),

            CommandKind::Recycle { stage, percent, displacing } => {
                let percent_value = percent.as_literal()?;
                let sub = state.substance_mut(scope)?;
                sub.recycling_policies.push(RecyclingPolicy {
                    stage: *stage,
                    percent: percent_value,
                    displacing: displacing.clone(),
                });
                Ok(())
            }

            CommandKind::Replace { value, units, from_substance, to_substance } => DisplacementExecutor::replace(
                scope,
                state,
                value.as_literal()?,
                *units,
                from_substance,
                to_substance,
                year,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::command::{CommandKind, Statement, ValueExpr};
    use crate::ast::program::{ApplicationBlock, ParsedProgram, SubstanceBlock};
    use crate::ast::year_matcher::YearMatcher;
    use crate::model::stream::EnabledStream;

    fn program_with(statements: Vec<Statement>) -> ParsedProgram {
        let mut program = ParsedProgram::new();
        let mut app = ApplicationBlock::new("Refrigeration");
        let mut sub = SubstanceBlock::new("HFC-134a");
        sub.statements = statements;
        app.substances.push(sub);
        program.default_stanza.applications.push(app);
        program
    }

    #[test]
    fn enable_and_set_domestic_runs_end_to_end() {
        let program = program_with(vec![
            Statement::new(
                CommandKind::Enable { stream: EnabledStream::Domestic },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::InitialCharge {
                    stream: EnabledStream::Domestic,
                    value: ValueExpr::literal(10.0),
                    units: Unit::kg_per_unit(),
                },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::SetAbsolute {
                    stream: crate::model::stream::StreamName::Domestic,
                    value: ValueExpr::literal(1000.0),
                    units: Unit::kg(),
                },
                YearMatcher::unconditional(),
            ),
        ]);

        let mut state = SimulationState::new(2020);
        Interpreter::execute_year(&program, &[], &mut state, 2020, 2020, 2030).unwrap();

        let scope = Scope::new("default", "Refrigeration", "HFC-134a");
        let sub = state.substance(&scope).unwrap();
        assert_eq!(sub.domestic.value, 1000.0);
        assert!((sub.equipment.value - 100.0).abs() < 1e-6);
    }

    /// Scenario 6 (spec.md §8): `set domestic to 100 kg` then, after an
    /// intervening year, `set domestic by 50%` yields `domestic = 150 kg`
    /// while `lastSpecifiedValue[domestic]` stays at 100 kg (I6).
    #[test]
    fn percent_relative_set_uses_last_specified_value_not_current() {
        let program = program_with(vec![
            Statement::new(
                CommandKind::Enable { stream: EnabledStream::Domestic },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::SetAbsolute {
                    stream: crate::model::stream::StreamName::Domestic,
                    value: ValueExpr::literal(100.0),
                    units: Unit::kg(),
                },
                YearMatcher::year(1),
            ),
            Statement::new(
                CommandKind::SetRelativePercent {
                    stream: crate::model::stream::StreamName::Domestic,
                    percent: ValueExpr::literal(50.0),
                },
                YearMatcher::year(3),
            ),
        ]);

        let mut state = SimulationState::new(2020);
        Interpreter::execute_year(&program, &[], &mut state, 1, 1, 3).unwrap();
        Interpreter::execute_year(&program, &[], &mut state, 2, 1, 3).unwrap();
        Interpreter::execute_year(&program, &[], &mut state, 3, 1, 3).unwrap();

        let scope = Scope::new("default", "Refrigeration", "HFC-134a");
        let sub = state.substance(&scope).unwrap();
        assert!((sub.domestic.value - 150.0).abs() < 1e-6);
        assert_eq!(sub.last_specified(crate::model::stream::StreamName::Domestic).unwrap().value, 100.0);
    }

    /// I6: once a displacement (or any non-`set` write) has moved a
    /// stream away from its last explicit intent, `set s by P%` must still
    /// compound off `lastSpecifiedValue[s]`, not the stream's current
    /// (post-displacement) value.
    #[test]
    fn percent_relative_set_ignores_intervening_displacement() {
        let program = program_with(vec![
            Statement::new(
                CommandKind::Enable { stream: EnabledStream::Domestic },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::InitialCharge {
                    stream: EnabledStream::Domestic,
                    value: ValueExpr::literal(1.0),
                    units: Unit::kg_per_unit(),
                },
                YearMatcher::unconditional(),
            ),
            Statement::new(
                CommandKind::SetAbsolute {
                    stream: crate::model::stream::StreamName::Domestic,
                    value: ValueExpr::literal(100.0),
                    units: Unit::kg(),
                },
                YearMatcher::year(1),
            ),
            // Shrinks the stream to 60 kg without touching
            // `lastSpecifiedValue` (no `displacing` clause).
            Statement::new(
                CommandKind::Cap {
                    stream: crate::model::stream::StreamName::Domestic,
                    value: ValueExpr::literal(60.0),
                    units: Unit::kg(),
                    displacing: None,
                },
                YearMatcher::year(2),
            ),
            Statement::new(
                CommandKind::SetRelativePercent {
                    stream: crate::model::stream::StreamName::Domestic,
                    percent: ValueExpr::literal(50.0),
                },
                YearMatcher::year(3),
            ),
        ]);

        let mut state = SimulationState::new(2020);
        Interpreter::execute_year(&program, &[], &mut state, 1, 1, 3).unwrap();
        Interpreter::execute_year(&program, &[], &mut state, 2, 1, 3).unwrap();
        Interpreter::execute_year(&program, &[], &mut state, 3, 1, 3).unwrap();

        let scope = Scope::new("default", "Refrigeration", "HFC-134a");
        let sub = state.substance(&scope).unwrap();
        // lastSpecifiedValue[domestic] is still 100 kg, so `by 50%` lands
        // at 150 kg, not 90 kg (60 kg current * 1.5).
        assert!((sub.domestic.value - 150.0).abs() < 1e-6);
    }

    #[test]
    fn writing_disabled_stream_errors() {
        let program = program_with(vec![Statement::new(
            CommandKind::SetAbsolute {
                stream: crate::model::stream::StreamName::Domestic,
                value: ValueExpr::literal(1000.0),
                units: Unit::kg(),
            },
            YearMatcher::unconditional(),
        )]);

        let mut state = SimulationState::new(2020);
        let err = Interpreter::execute_year(&program, &[], &mut state, 2020, 2020, 2030).unwrap_err();
        assert!(matches!(err, EngineError::StreamNotEnabled { .. }));
    }
}
