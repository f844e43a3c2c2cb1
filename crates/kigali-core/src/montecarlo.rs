//! The Monte Carlo driver: resamples every `normally`/`uniformly` node in a
//! scenario's program once per trial and reruns it, in parallel, yielding
//! every trial's rows tagged with its trial index (spec.md §4.7).
//!
//! Each trial gets a fresh `SimulationState` (via `run_scenario`) and its
//! own RNG, seeded deterministically from `(scenario name, trial index)` so
//! a rerun of the same scenario reproduces identical results (spec.md §5).
//! Trials run on `rayon`'s thread pool — the pack's only precedent for
//! parallel simulation fan-out is the `chapaty` example's `rayon::spawn`
//! usage; here the work is embarrassingly parallel across independent
//! trials, so a plain `par_iter` fits better than a spawn-and-join channel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::ast::command::{CommandKind, SamplingSpec, Statement, ValueExpr};
use crate::ast::program::{ApplicationBlock, ParsedProgram, ScenarioSpec, Stanza, SubstanceBlock};
use crate::error::EngineError;
use crate::output::EngineResult;
use crate::runner::run_scenario;

/// Run every trial of `scenario` against `program`, in parallel, returning
/// all trials' rows once every trial has completed. `on_progress` is
/// invoked after each trial finishes with `completed / total`, from
/// whichever thread finished that trial — it must not block or call back
/// into the engine (spec.md §5).
pub fn run_monte_carlo(
    program: &ParsedProgram,
    scenario: &ScenarioSpec,
    cancel: Option<Arc<AtomicBool>>,
    on_progress: impl Fn(f64) + Send + Sync,
) -> Result<Vec<EngineResult>, EngineError> {
    let total_trials = scenario.trials.max(1);
    tracing::info!(scenario = %scenario.name, total_trials, "starting monte carlo run");

    let completed = AtomicUsize::new(0);

    let per_trial: Vec<Result<Vec<EngineResult>, EngineError>> = (0..total_trials)
        .into_par_iter()
        .map(|trial_index| {
            if let Some(flag) = &cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(EngineError::Cancelled { year: scenario.year_start });
                }
            }

            let seed = stable_seed(&scenario.name, trial_index);
            let mut rng = StdRng::seed_from_u64(seed);
            let resolved_program = resolve_program(program, &mut rng);

            let rows = run_scenario(&resolved_program, scenario, trial_index, cancel.clone()).collect::<Result<Vec<_>, _>>();

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            on_progress(done as f64 / total_trials as f64);
            rows
        })
        .collect();

    let mut all_rows = Vec::new();
    for trial_result in per_trial {
        all_rows.extend(trial_result?);
    }
    tracing::info!(scenario = %scenario.name, total_trials, rows = all_rows.len(), "monte carlo run complete");
    Ok(all_rows)
}

/// A stable (not cryptographic) hash of `(scenario_name, trial_index)` used
/// to seed each trial's RNG — same inputs always produce the same seed
/// within one build.
fn stable_seed(scenario_name: &str, trial_index: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    scenario_name.hash(&mut hasher);
    trial_index.hash(&mut hasher);
    hasher.finish()
}

fn sample(spec: &SamplingSpec, rng: &mut StdRng) -> f64 {
    let (raw, limit) = match spec {
        SamplingSpec::Normal { mean, std, limit } => {
            let dist = Normal::new(*mean, std.max(f64::EPSILON)).expect("std is always finite and positive here");
            (dist.sample(rng), *limit)
        }
        SamplingSpec::Uniform { low, high, limit } => {
            let (lo, hi) = if low <= high { (*low, *high) } else { (*high, *low) };
            (rng.gen_range(lo..=hi), *limit)
        }
    };
    match limit {
        Some((lo, hi)) => raw.clamp(lo.min(hi), lo.max(hi)),
        None => raw,
    }
}

fn resolve_value(value: &ValueExpr, rng: &mut StdRng) -> ValueExpr {
    match value {
        ValueExpr::Literal(v) => ValueExpr::Literal(*v),
        ValueExpr::Sampled(spec) => ValueExpr::Literal(sample(spec, rng)),
    }
}

fn resolve_command(cmd: &CommandKind, rng: &mut StdRng) -> CommandKind {
    match cmd {
        CommandKind::Enable { stream } => CommandKind::Enable { stream: *stream },
        CommandKind::InitialCharge { stream, value, units } => {
            CommandKind::InitialCharge { stream: *stream, value: resolve_value(value, rng), units: *units }
        }
        CommandKind::EqualsGhgIntensity { value, units } => {
            CommandKind::EqualsGhgIntensity { value: resolve_value(value, rng), units: *units }
        }
        CommandKind::EqualsEnergyIntensity { value, units } => {
            CommandKind::EqualsEnergyIntensity { value: resolve_value(value, rng), units: *units }
        }
        CommandKind::SetAbsolute { stream, value, units } => {
            CommandKind::SetAbsolute { stream: *stream, value: resolve_value(value, rng), units: *units }
        }
        CommandKind::SetRelativePercent { stream, percent } => {
            CommandKind::SetRelativePercent { stream: *stream, percent: resolve_value(percent, rng) }
        }
        CommandKind::ChangeAbsolute { stream, value, units } => {
            CommandKind::ChangeAbsolute { stream: *stream, value: resolve_value(value, rng), units: *units }
        }
        CommandKind::ChangeRelativePercent { stream, percent } => {
            CommandKind::ChangeRelativePercent { stream: *stream, percent: resolve_value(percent, rng) }
        }
        CommandKind::Cap { stream, value, units, displacing } => {
            CommandKind::Cap { stream: *stream, value: resolve_value(value, rng), units: *units, displacing: displacing.clone() }
        }
        CommandKind::Floor { stream, value, units, displacing } => {
            CommandKind::Floor { stream: *stream, value: resolve_value(value, rng), units: *units, displacing: displacing.clone() }
        }
        CommandKind::Recharge { percent, kg_per_unit } => {
            CommandKind::Recharge { percent: resolve_value(percent, rng), kg_per_unit: resolve_value(kg_per_unit, rng) }
        }
        CommandKind::Retire { percent, with_replacement } => {
            CommandKind::Retire { percent: resolve_value(percent, rng), with_replacement: *with_replacement }
        }
        CommandKind::Recover { value, units, stage, displacing } => CommandKind::Recover {
            value: resolve_value(value, rng),
            units: *units,
            stage: *stage,
            displacing: displacing.clone(),
        },
        CommandKind::Recycle { stage, percent, displacing } => {
            CommandKind::Recycle { stage: *stage, percent: resolve_value(percent, rng), displacing: displacing.clone() }
        }
        CommandKind::Replace { value, units, from_substance, to_substance } => CommandKind::Replace {
            value: resolve_value(value, rng),
            units: *units,
            from_substance: from_substance.clone(),
            to_substance: to_substance.clone(),
        },
    }
}

fn resolve_statement(stmt: &Statement, rng: &mut StdRng) -> Statement {
    Statement::new(resolve_command(&stmt.command, rng), stmt.year_matcher)
}

fn resolve_substance(sub: &SubstanceBlock, rng: &mut StdRng) -> SubstanceBlock {
    SubstanceBlock {
        name: sub.name.clone(),
        statements: sub.statements.iter().map(|s| resolve_statement(s, rng)).collect(),
    }
}

fn resolve_application(app: &ApplicationBlock, rng: &mut StdRng) -> ApplicationBlock {
    ApplicationBlock {
        name: app.name.clone(),
        substances: app.substances.iter().map(|s| resolve_substance(s, rng)).collect(),
    }
}

fn resolve_stanza(stanza: &Stanza, rng: &mut StdRng) -> Stanza {
    Stanza { applications: stanza.applications.iter().map(|a| resolve_application(a, rng)).collect() }
}

/// Clone `program` with every `Sampled` node replaced by a drawn `Literal`.
/// Policy stanzas are resolved in name-sorted order (not `HashMap` iteration
/// order, which is randomized per process) so the draw sequence — and
/// therefore the result — is reproducible given the same seed.
fn resolve_program(program: &ParsedProgram, rng: &mut StdRng) -> ParsedProgram {
    let mut policy_names: Vec<&String> = program.policy_stanzas.keys().collect();
    policy_names.sort();

    let policy_stanzas = policy_names
        .into_iter()
        .map(|name| (name.clone(), resolve_stanza(&program.policy_stanzas[name], rng)))
        .collect();

    ParsedProgram {
        default_stanza: resolve_stanza(&program.default_stanza, rng),
        policy_stanzas,
        scenarios: program.scenarios.clone(),
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

    fn sampled_program() -> ParsedProgram {
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
                CommandKind::SetAbsolute {
                    stream: StreamName::Domestic,
                    value: ValueExpr::Sampled(SamplingSpec::Normal { mean: 1000.0, std: 50.0, limit: None }),
                    units: Unit::kg(),
                },
                YearMatcher::year(1),
            ),
        ];
        app.substances.push(sub);
        program.default_stanza.applications.push(app);
        program
    }

    #[test]
    fn same_seed_reproduces_the_same_trial() {
        let mut rng_a = StdRng::seed_from_u64(stable_seed("BAU", 3));
        let mut rng_b = StdRng::seed_from_u64(stable_seed("BAU", 3));
        let program = sampled_program();
        let resolved_a = resolve_program(&program, &mut rng_a);
        let resolved_b = resolve_program(&program, &mut rng_b);
        assert_eq!(resolved_a.default_stanza.applications[0].substances[0].statements[2].command, resolved_b.default_stanza.applications[0].substances[0].statements[2].command);
    }

    #[test]
    fn different_trial_indices_usually_draw_different_values() {
        let mut rng_a = StdRng::seed_from_u64(stable_seed("BAU", 0));
        let mut rng_b = StdRng::seed_from_u64(stable_seed("BAU", 1));
        let program = sampled_program();
        let resolved_a = resolve_program(&program, &mut rng_a);
        let resolved_b = resolve_program(&program, &mut rng_b);
        assert_ne!(
            resolved_a.default_stanza.applications[0].substances[0].statements[2].command,
            resolved_b.default_stanza.applications[0].substances[0].statements[2].command
        );
    }

    #[test]
    fn run_monte_carlo_yields_trials_times_years_rows() {
        let program = sampled_program();
        let scenario = ScenarioSpec { name: "BAU".to_string(), policies: vec![], year_start: 1, year_end: 5, trials: 10 };
        let rows = run_monte_carlo(&program, &scenario, None, |_p| {}).unwrap();
        assert_eq!(rows.len(), 10 * 5);
        let distinct_trials: std::collections::HashSet<u32> = rows.iter().map(|r| r.trial).collect();
        assert_eq!(distinct_trials.len(), 10);
    }
}
