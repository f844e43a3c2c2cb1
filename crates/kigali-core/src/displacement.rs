//! The displacement executor: moves volume between streams (`cap`/`floor`
//! .. `displacing`) or between substances (`recover .. displacing`,
//! `replace .. with ..`) while conserving the total material moved
//! (spec.md §5, invariant I7).
//!
//! A `displacing T` clause names either a stream on the *same* substance
//! (`domestic`, `import`, `export`) or another substance in the same
//! application. `resolve_target` decides which by checking `T` against
//! the known stream vocabulary first.

use crate::ast::command::{DisplaceBasis, DisplaceTarget};
use crate::error::EngineError;
use crate::model::scope::Scope;
use crate::model::simulation_state::SimulationState;
use crate::model::stream::{EnabledStream, StreamName};
use crate::model::substance_state::RecoveryStage;
use crate::number::{EngineNumber, Unit};
use crate::recalculator::Recalculator;

/// Where a displaced volume lands: another stream of the same substance,
/// or the sales streams of a different substance in the same application.
enum Target {
    SameSubstanceStream(StreamName),
    OtherSubstance(Scope),
}

fn resolve_target(scope: &Scope, raw_name: &str) -> Target {
    match StreamName::parse(raw_name) {
        Some(name) => Target::SameSubstanceStream(name),
        None => Target::OtherSubstance(scope.with_substance(raw_name.to_string())),
    }
}

/// ErrSelfDisplacement (spec.md §4.5, §7, P5): a `displacing T` clause may
/// never name the stream it is itself displacing from.
fn check_not_self(scope: &Scope, source: StreamName, target: &Target) -> Result<(), EngineError> {
    if let Target::SameSubstanceStream(name) = target {
        if *name == source {
            return Err(EngineError::SelfDisplacement {
                scope: scope.clone(),
                stream: source.to_string(),
            });
        }
    }
    Ok(())
}

/// Re-denominate a `kg` delta measured in the source scope's units for
/// landing in `other_scope` (spec.md §4.5): a `by units` clause preserves
/// the *equipment-unit count*, so a different destination initial charge
/// changes the kg amount that lands there; `by volume` (the default)
/// preserves the kg amount directly.
fn rebase_kg_for_target(
    state: &SimulationState,
    scope: &Scope,
    other_scope: &Scope,
    kg: f64,
    basis: Option<DisplaceBasis>,
) -> Result<f64, EngineError> {
    if basis != Some(DisplaceBasis::Units) {
        return Ok(kg);
    }
    let source_charge = state.substance(scope)?.amortized_unit_volume();
    if source_charge <= 0.0 {
        return Ok(kg);
    }
    let units_moved = kg / source_charge;
    let dest_charge = state.substance(other_scope)?.amortized_unit_volume();
    Ok(units_moved * dest_charge)
}

/// Bump the destination's `lastSpecifiedValue` for the stream actually
/// written, so a later `change s by %` in the destination compounds off
/// the post-displacement total rather than its pre-displacement intent
/// (spec.md §4.5).
fn bump_last_specified(sub: &mut crate::model::substance_state::SubstanceState, stream: StreamName, delta_kg: f64) {
    let base = sub.last_specified(stream).map(|n| n.value).unwrap_or(0.0);
    sub.last_specified_value
        .insert(stream, EngineNumber::new(base + delta_kg, Unit::kg()));
}

/// Add `kg` of virgin material demand onto a displacement target, growing
/// whichever sales stream is enabled there (preferring `domestic`, then
/// `import`) — the receiving side of a conservation transfer. `kg` is
/// always denominated in the *source* scope's units; `basis` governs how
/// it is re-denominated when the target is a different substance.
fn add_kg_to_target(
    state: &mut SimulationState,
    target: &Target,
    scope: &Scope,
    kg: f64,
    basis: Option<DisplaceBasis>,
) -> Result<(), EngineError> {
    match target {
        Target::SameSubstanceStream(name) => {
            // Same substance: both streams share the substance's initial
            // charge, so volume and unit count move together regardless
            // of `basis` (spec.md §4.5 "volumes match").
            let current = state.get_stream(scope, *name)?;
            let new_value = current.value + kg;
            state.substance_mut(scope)?.set_raw_for_displacement(*name, new_value);
        }
        Target::OtherSubstance(other_scope) => {
            state.ensure_substance(other_scope);
            let landing_kg = rebase_kg_for_target(state, scope, other_scope, kg, basis)?;
            let sub = state.substance_mut(other_scope)?;
            let stream = if sub.is_enabled(EnabledStream::Domestic) {
                StreamName::Domestic
            } else {
                StreamName::Import
            };
            let current = sub.get_stream(stream).value;
            sub.set_raw_for_displacement(stream, current + landing_kg);
            bump_last_specified(sub, stream, landing_kg);
        }
    }
    Ok(())
}

/// Remove `kg` from a displacement target, clamping at zero. See
/// `add_kg_to_target` for the `basis` re-denomination rule.
fn remove_kg_from_target(
    state: &mut SimulationState,
    target: &Target,
    scope: &Scope,
    kg: f64,
    basis: Option<DisplaceBasis>,
) -> Result<(), EngineError> {
    match target {
        Target::SameSubstanceStream(name) => {
            let current = state.get_stream(scope, *name)?;
            let new_value = (current.value - kg).max(0.0);
            state.substance_mut(scope)?.set_raw_for_displacement(*name, new_value);
        }
        Target::OtherSubstance(other_scope) => {
            state.ensure_substance(other_scope);
            let leaving_kg = rebase_kg_for_target(state, scope, other_scope, kg, basis)?;
            let sub = state.substance_mut(other_scope)?;
            let stream = if sub.is_enabled(EnabledStream::Domestic) {
                StreamName::Domestic
            } else {
                StreamName::Import
            };
            let current = sub.get_stream(stream).value;
            sub.set_raw_for_displacement(stream, (current - leaving_kg).max(0.0));
            bump_last_specified(sub, stream, -leaving_kg);
        }
    }
    Ok(())
}

/// `sales` has no storage of its own — it's `domestic + import + recycle`
/// recomputed on every read (`SubstanceState::get_stream`), so `set_raw`
/// can't write it directly. Capping/flooring `sales` therefore has to move
/// `domestic`/`import` instead, applying spec.md §4.5's "automatic
/// recycling pre-step": the recycled credit is left untouched (it isn't
/// virgin material and isn't what a cap/floor on `sales` is meant to take
/// away), so the target for `domestic + import` is `sales_target -
/// recycle`, not `sales_target` itself. Returns the kg actually moved
/// into/out of `domestic`/`import`, which is what gets displaced — not the
/// nominal delta against the full `sales` total, since the recycled share
/// can never be reduced below zero.
fn reduce_virgin_sales(sub: &mut crate::model::substance_state::SubstanceState, sales_target_kg: f64) -> f64 {
    let virgin_target_kg = (sales_target_kg - sub.recycle.value).max(0.0);
    let virgin_kg = sub.domestic.value + sub.import.value;
    let removed_kg = (virgin_kg - virgin_target_kg).max(0.0);
    if removed_kg <= 0.0 || virgin_kg <= 0.0 {
        return 0.0;
    }
    let domestic_share = sub.domestic.value / virgin_kg;
    sub.domestic = EngineNumber::new(sub.domestic.value - removed_kg * domestic_share, Unit::kg());
    sub.import = EngineNumber::new(sub.import.value - removed_kg * (1.0 - domestic_share), Unit::kg());
    removed_kg
}

/// The floor-side counterpart of `reduce_virgin_sales`: grows whichever of
/// `domestic`/`import` is enabled (preferring `domestic`, matching
/// `add_kg_to_target`'s own preference) so `domestic + import + recycle`
/// reaches `sales_target_kg`. Returns the kg actually added.
fn increase_virgin_sales(sub: &mut crate::model::substance_state::SubstanceState, sales_target_kg: f64) -> f64 {
    let virgin_target_kg = (sales_target_kg - sub.recycle.value).max(0.0);
    let virgin_kg = sub.domestic.value + sub.import.value;
    let added_kg = (virgin_target_kg - virgin_kg).max(0.0);
    if added_kg <= 0.0 {
        return 0.0;
    }
    if sub.is_enabled(EnabledStream::Domestic) {
        sub.domestic = EngineNumber::new(sub.domestic.value + added_kg, Unit::kg());
    } else {
        sub.import = EngineNumber::new(sub.import.value + added_kg, Unit::kg());
    }
    added_kg
}

pub struct DisplacementExecutor;

impl DisplacementExecutor {
    /// `cap <stream> to V <units> [displacing T]`: clamp `stream` down to
    /// `value`; any excess flows onto `displacing`'s target if given,
    /// otherwise it's simply removed from the system.
    pub fn cap(
        scope: &Scope,
        state: &mut SimulationState,
        stream: StreamName,
        value: f64,
        units: Unit,
        displacing: Option<&DisplaceTarget>,
        year: i64,
    ) -> Result<(), EngineError> {
        let current = state.get_stream(scope, stream)?;
        let cap_kg = value * units.numerator.canonical_scale();
        let current_kg = current.value * current.units.numerator.canonical_scale();

        if current_kg <= cap_kg {
            return Ok(());
        }

        let resolved_target = match displacing {
            Some(target) => {
                let resolved = resolve_target(scope, &target.raw_name);
                check_not_self(scope, stream, &resolved)?;
                Some((resolved, target.basis))
            }
            None => None,
        };

        let excess_kg = if stream == StreamName::Sales {
            reduce_virgin_sales(state.substance_mut(scope)?, cap_kg)
        } else {
            let new_value = cap_kg / current.units.numerator.canonical_scale();
            state.substance_mut(scope)?.set_raw_for_displacement(stream, new_value);
            current_kg - cap_kg
        };

        if let Some((resolved, basis)) = resolved_target {
            if excess_kg > 0.0 {
                add_kg_to_target(state, &resolved, scope, excess_kg, basis)?;
            }
        }

        Recalculator::recalculate(scope, state.substance_mut(scope)?, year)
    }

    /// `floor <stream> to V <units> [displacing T]`: raise `stream` up to
    /// `value`; the shortfall is pulled from `displacing`'s target if
    /// given, otherwise it's simply created.
    pub fn floor(
        scope: &Scope,
        state: &mut SimulationState,
        stream: StreamName,
        value: f64,
        units: Unit,
        displacing: Option<&DisplaceTarget>,
        year: i64,
    ) -> Result<(), EngineError> {
        let current = state.get_stream(scope, stream)?;
        let floor_kg = value * units.numerator.canonical_scale();
        let current_kg = current.value * current.units.numerator.canonical_scale();

        if current_kg >= floor_kg {
            return Ok(());
        }

        let resolved_target = match displacing {
            Some(target) => {
                let resolved = resolve_target(scope, &target.raw_name);
                check_not_self(scope, stream, &resolved)?;
                Some((resolved, target.basis))
            }
            None => None,
        };

        let shortfall_kg = if stream == StreamName::Sales {
            increase_virgin_sales(state.substance_mut(scope)?, floor_kg)
        } else {
            let new_value = floor_kg / current.units.numerator.canonical_scale();
            state.substance_mut(scope)?.set_raw_for_displacement(stream, new_value);
            floor_kg - current_kg
        };

        if let Some((resolved, basis)) = resolved_target {
            if shortfall_kg > 0.0 {
                remove_kg_from_target(state, &resolved, scope, shortfall_kg, basis)?;
            }
        }

        Recalculator::recalculate(scope, state.substance_mut(scope)?, year)
    }

    /// `recover V <units> for recharge|eol [displacing T]`: add recovered
    /// material into the named recovery stage, optionally pulling the
    /// equivalent virgin demand out of `displacing`'s target.
    pub fn recover(
        scope: &Scope,
        state: &mut SimulationState,
        value: f64,
        units: Unit,
        stage: RecoveryStage,
        displacing: Option<&DisplaceTarget>,
        year: i64,
    ) -> Result<(), EngineError> {
        let kg = value * units.numerator.canonical_scale();
        let source_stream = match stage {
            RecoveryStage::Recharge => StreamName::RecycleRecharge,
            RecoveryStage::Eol => StreamName::RecycleEol,
        };

        if let Some(target) = displacing {
            let resolved = resolve_target(scope, &target.raw_name);
            check_not_self(scope, source_stream, &resolved)?;
        }

        {
            let sub = state.substance_mut(scope)?;
            let current = match stage {
                RecoveryStage::Recharge => sub.recycle_recharge.value,
                RecoveryStage::Eol => sub.recycle_eol.value,
            };
            sub.set_raw_for_displacement(source_stream, current + kg);
            sub.recycle = EngineNumber::new(sub.recycle.value + kg, Unit::kg());
        }

        if let Some(target) = displacing {
            let resolved = resolve_target(scope, &target.raw_name);
            remove_kg_from_target(state, &resolved, scope, kg, target.basis)?;
        }

        Recalculator::recalculate(scope, state.substance_mut(scope)?, year)
    }

    /// `replace V kg of a with b`: move `value` of virgin demand from
    /// substance `from` to substance `to` within the same application —
    /// the cross-substance form of conservation (spec.md I7).
    pub fn replace(
        scope: &Scope,
        state: &mut SimulationState,
        value: f64,
        units: Unit,
        from_substance: &str,
        to_substance: &str,
        year: i64,
    ) -> Result<(), EngineError> {
        let kg = value * units.numerator.canonical_scale();
        let from_scope = scope.with_substance(from_substance.to_string());
        let to_scope = scope.with_substance(to_substance.to_string());

        state.ensure_substance(&from_scope);
        state.ensure_substance(&to_scope);

        {
            let sub = state.substance_mut(&from_scope)?;
            let stream = if sub.is_enabled(EnabledStream::Domestic) {
                StreamName::Domestic
            } else {
                StreamName::Import
            };
            let current = sub.get_stream(stream).value;
            sub.set_raw_for_displacement(stream, (current - kg).max(0.0));
        }
        {
            let sub = state.substance_mut(&to_scope)?;
            let stream = if sub.is_enabled(EnabledStream::Domestic) {
                StreamName::Domestic
            } else {
                StreamName::Import
            };
            let current = sub.get_stream(stream).value;
            sub.set_raw_for_displacement(stream, current + kg);
        }

        Recalculator::recalculate(&from_scope, state.substance_mut(&from_scope)?, year)?;
        Recalculator::recalculate(&to_scope, state.substance_mut(&to_scope)?, year)
    }
}
