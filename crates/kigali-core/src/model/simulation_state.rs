//! `SimulationState`: the full collection of `SubstanceState`s for one
//! scenario run, plus the bookkeeping the runner needs to step years
//! (spec.md §3, §4.2).

use std::collections::HashMap;

use crate::error::EngineError;
use crate::model::scope::Scope;
use crate::model::stream::{AssumeMode, EnabledStream, StreamName};
use crate::model::substance_state::{StreamUpdate, SubstanceState};
use crate::number::{EngineNumber, Unit};

pub type SubstanceKey = (String, String);

/// Holds every `SubstanceState` for the scenario currently being run. Reset
/// (via `SimulationState::default()`) at the start of each scenario/trial —
/// spec.md §5 forbids sharing one `SimulationState` across concurrent runs.
#[derive(Debug, Default, Clone)]
pub struct SimulationState {
    substances: HashMap<SubstanceKey, SubstanceState>,
    /// Insertion order, so the runner emits `EngineResult` rows in a
    /// deterministic, reproducible sequence rather than hash-map order.
    order: Vec<SubstanceKey>,
    current_year: i64,
    year_start: i64,
}

impl SimulationState {
    pub fn new(year_start: i64) -> Self {
        Self {
            substances: HashMap::new(),
            order: Vec::new(),
            current_year: year_start,
            year_start,
        }
    }

    pub fn current_year(&self) -> i64 {
        self.current_year
    }

    pub fn set_current_year(&mut self, year: i64) {
        self.current_year = year;
    }

    pub fn years_elapsed(&self) -> f64 {
        (self.current_year - self.year_start) as f64
    }

    pub fn has_substance(&self, scope: &Scope) -> bool {
        self.substances.contains_key(&scope.key())
    }

    /// Create the substance's state on first reference (spec.md §3
    /// "Lifecycle"). Idempotent.
    pub fn ensure_substance(&mut self, scope: &Scope) -> &mut SubstanceState {
        let key = scope.key();
        if !self.substances.contains_key(&key) {
            self.substances.insert(key.clone(), SubstanceState::default());
            self.order.push(key.clone());
        }
        self.substances.get_mut(&key).unwrap()
    }

    pub fn substance(&self, scope: &Scope) -> Result<&SubstanceState, EngineError> {
        self.substances.get(&scope.key()).ok_or_else(|| EngineError::UnknownSubstance {
            application: scope.application.clone(),
            substance: scope.substance.clone(),
        })
    }

    pub fn substance_mut(&mut self, scope: &Scope) -> Result<&mut SubstanceState, EngineError> {
        self.substances.get_mut(&scope.key()).ok_or_else(|| EngineError::UnknownSubstance {
            application: scope.application.clone(),
            substance: scope.substance.clone(),
        })
    }

    pub fn get_stream(&self, scope: &Scope, name: StreamName) -> Result<EngineNumber, EngineError> {
        Ok(self.substance(scope)?.get_stream(name))
    }

    pub fn update(&mut self, scope: &Scope, mut upd: StreamUpdate) -> Result<(), EngineError> {
        upd.scope.get_or_insert_with(|| scope.clone());
        self.substance_mut(scope)?.update(upd)
    }

    pub fn set_initial_charge(&mut self, scope: &Scope, stream: EnabledStream, kg_per_unit: f64) -> Result<(), EngineError> {
        self.substance_mut(scope)?.initial_charge.set(stream, kg_per_unit);
        Ok(())
    }

    pub fn set_ghg_intensity(&mut self, scope: &Scope, intensity: EngineNumber) -> Result<(), EngineError> {
        self.substance_mut(scope)?.ghg_intensity = intensity;
        Ok(())
    }

    pub fn set_energy_intensity(&mut self, scope: &Scope, intensity: EngineNumber) -> Result<(), EngineError> {
        self.substance_mut(scope)?.energy_intensity = intensity;
        Ok(())
    }

    pub fn mark_stream_as_enabled(&mut self, scope: &Scope, stream: EnabledStream) -> Result<(), EngineError> {
        self.substance_mut(scope)?.enable(stream);
        Ok(())
    }

    pub fn set_last_specified_value(&mut self, scope: &Scope, name: StreamName, value: EngineNumber) -> Result<(), EngineError> {
        self.substance_mut(scope)?.last_specified_value.insert(name, value);
        Ok(())
    }

    pub fn get_last_specified_value(&self, scope: &Scope, name: StreamName) -> Result<Option<EngineNumber>, EngineError> {
        Ok(self.substance(scope)?.last_specified(name).cloned())
    }

    pub fn is_sales_intent_freshly_set(&self, scope: &Scope) -> Result<bool, EngineError> {
        Ok(self.substance(scope)?.sales_intent_freshly_set)
    }

    pub fn reset_sales_intent_flag(&mut self, scope: &Scope) -> Result<(), EngineError> {
        self.substance_mut(scope)?.reset_sales_intent_flag();
        Ok(())
    }

    pub fn registered_substances(&self) -> impl Iterator<Item = &SubstanceKey> {
        self.order.iter()
    }

    /// Roll `equipment -> priorEquipment`, carry `domestic`/`import`/`export`
    /// into the new year per the substance's `assumeMode` (spec.md §9 Open
    /// Question — see DESIGN.md), zero the other this-year flow streams, and
    /// preserve cumulative totals (`retired`). Invariant I3.
    pub fn increment_year(&mut self) {
        self.current_year += 1;
        for key in &self.order {
            if let Some(state) = self.substances.get_mut(key) {
                state.prior_equipment = state.equipment.clone();
                Self::carry_forward_sales_streams(state);
                state.recycle = EngineNumber::zero(Unit::kg());
                state.recycle_recharge = EngineNumber::zero(Unit::kg());
                state.recycle_eol = EngineNumber::zero(Unit::kg());
                state.consumption = EngineNumber::zero(Unit::t_co2e());
                state.energy = EngineNumber::zero(Unit::kwh());
                state.recharge_emissions = EngineNumber::zero(Unit::t_co2e());
                state.eol_emissions = EngineNumber::zero(Unit::t_co2e());
                state.export_emissions = EngineNumber::zero(Unit::t_co2e());
                state.reset_sales_intent_flag();
            }
        }
    }

    /// `domestic`/`import`/`export` for the new year, per `assumeMode`:
    /// `Zero` resets them (a command must re-set them this year to have any
    /// effect); `Continued` carries forward each stream's
    /// `lastSpecifiedValue` (falling back to zero if the stream was never
    /// explicitly set); `Recharge` derives the demand purely from the
    /// recharge schedule against last year's equipment population, split
    /// across whichever streams are enabled.
    fn carry_forward_sales_streams(state: &mut SubstanceState) {
        match state.assume_mode {
            AssumeMode::Zero => {
                state.domestic = EngineNumber::zero(Unit::kg());
                state.import = EngineNumber::zero(Unit::kg());
                state.export = EngineNumber::zero(Unit::kg());
            }
            AssumeMode::Continued => {
                state.domestic = state.last_specified(StreamName::Domestic).cloned().unwrap_or_else(|| EngineNumber::zero(Unit::kg()));
                state.import = state.last_specified(StreamName::Import).cloned().unwrap_or_else(|| EngineNumber::zero(Unit::kg()));
                state.export = state.last_specified(StreamName::Export).cloned().unwrap_or_else(|| EngineNumber::zero(Unit::kg()));
            }
            AssumeMode::Recharge => {
                let demand_kg = state.prior_equipment.value * (state.recharge_rate_percent / 100.0) * state.recharge_intensity_kg_per_unit;
                let distribution = state.distribution;
                state.domestic = if state.is_enabled(EnabledStream::Domestic) {
                    EngineNumber::new(demand_kg * distribution.percent_domestic, Unit::kg())
                } else {
                    EngineNumber::zero(Unit::kg())
                };
                state.import = if state.is_enabled(EnabledStream::Import) {
                    EngineNumber::new(demand_kg * distribution.percent_import, Unit::kg())
                } else {
                    EngineNumber::zero(Unit::kg())
                };
                state.export = EngineNumber::zero(Unit::kg());
            }
        }
    }
}
