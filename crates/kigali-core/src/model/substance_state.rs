//! `SubstanceState`: everything tracked for one `(application, substance)`
//! pair — streams, parameters, and policy state (spec.md §3).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::scope::Scope;
use crate::model::stream::{AssumeMode, EnabledStream, SalesStreamDistribution, StreamName};
use crate::number::{EngineNumber, Unit};

/// Per-stream initial charge (kg needed per new equipment unit). Each of
/// the three sales streams can carry its own initial charge — most
/// programs set the same value for all of them, but the DSL allows `for
/// domestic` / `for import` / `for export` individually.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InitialCharges {
    pub domestic: f64,
    pub import: f64,
    pub export: f64,
}

impl InitialCharges {
    pub fn get(&self, stream: EnabledStream) -> f64 {
        match stream {
            EnabledStream::Domestic => self.domestic,
            EnabledStream::Import => self.import,
            EnabledStream::Export => self.export,
        }
    }

    pub fn set(&mut self, stream: EnabledStream, kg_per_unit: f64) {
        match stream {
            EnabledStream::Domestic => self.domestic = kg_per_unit,
            EnabledStream::Import => self.import = kg_per_unit,
            EnabledStream::Export => self.export = kg_per_unit,
        }
    }
}

/// Where a `recover` command's credit is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryStage {
    Recharge,
    Eol,
}

/// A `recycle s with P% [displacing T]` policy, applied every recalculation
/// against whichever need (`recharge` or `eol`) it is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecyclingPolicy {
    pub stage: RecoveryStage,
    pub percent: f64,
    pub displacing: Option<String>,
}

/// State for one `(application, substance)` pair: the streams in spec.md
/// §3, the substance's static parameters, and the interpreter's policy
/// bookkeeping (enabled streams, last-specified values, distribution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstanceState {
    // ---- Streams ----
    pub domestic: EngineNumber,
    pub import: EngineNumber,
    pub export: EngineNumber,
    pub recycle: EngineNumber,
    pub recycle_recharge: EngineNumber,
    pub recycle_eol: EngineNumber,
    pub prior_equipment: EngineNumber,
    pub equipment: EngineNumber,
    pub retired: EngineNumber,
    pub consumption: EngineNumber,
    pub energy: EngineNumber,
    pub recharge_emissions: EngineNumber,
    pub eol_emissions: EngineNumber,
    pub export_emissions: EngineNumber,

    // ---- Parameters ----
    pub ghg_intensity: EngineNumber,
    pub energy_intensity: EngineNumber,
    pub initial_charge: InitialCharges,
    pub retirement_rate_percent: f64,
    pub retirement_with_replacement: bool,
    pub recharge_rate_percent: f64,
    pub recharge_intensity_kg_per_unit: f64,

    // ---- Policy state ----
    pub enabled_streams: HashSet<EnabledStream>,
    pub last_specified_value: HashMap<StreamName, EngineNumber>,
    pub sales_intent_freshly_set: bool,
    pub assume_mode: AssumeMode,
    pub distribution: SalesStreamDistribution,
    pub recycling_policies: Vec<RecyclingPolicy>,
}

impl Default for SubstanceState {
    fn default() -> Self {
        Self {
            domestic: EngineNumber::zero(Unit::kg()),
            import: EngineNumber::zero(Unit::kg()),
            export: EngineNumber::zero(Unit::kg()),
            recycle: EngineNumber::zero(Unit::kg()),
            recycle_recharge: EngineNumber::zero(Unit::kg()),
            recycle_eol: EngineNumber::zero(Unit::kg()),
            prior_equipment: EngineNumber::zero(Unit::units()),
            equipment: EngineNumber::zero(Unit::units()),
            retired: EngineNumber::zero(Unit::units()),
            consumption: EngineNumber::zero(Unit::t_co2e()),
            energy: EngineNumber::zero(Unit::kwh()),
            recharge_emissions: EngineNumber::zero(Unit::t_co2e()),
            eol_emissions: EngineNumber::zero(Unit::t_co2e()),
            export_emissions: EngineNumber::zero(Unit::t_co2e()),

            ghg_intensity: EngineNumber::zero(Unit::kg_co2e_per_kg()),
            energy_intensity: EngineNumber::zero(Unit::kwh_per_unit()),
            initial_charge: InitialCharges::default(),
            retirement_rate_percent: 0.0,
            retirement_with_replacement: false,
            recharge_rate_percent: 0.0,
            recharge_intensity_kg_per_unit: 0.0,

            enabled_streams: HashSet::new(),
            last_specified_value: HashMap::new(),
            sales_intent_freshly_set: false,
            assume_mode: AssumeMode::default(),
            distribution: SalesStreamDistribution::default(),
            recycling_policies: Vec::new(),
        }
    }
}

/// An immutable description of a write to one stream (spec.md §4.2).
/// Built by the interpreter, consumed by `SubstanceState::update`.
#[derive(Debug, Clone)]
pub struct StreamUpdate {
    pub name: StreamName,
    pub value: EngineNumber,
    pub scope: Option<Scope>,
    pub units_to_record: Option<Unit>,
    pub subtract_recycling: bool,
    pub force_use_full_recharge: bool,
    pub distribution: Option<SalesStreamDistribution>,
    /// `false` when this write came from a `%`-relative command (`set s by
    /// P%`) — such writes never update `last_specified_value` (spec.md I6).
    pub record_as_last_specified: bool,
}

impl StreamUpdate {
    pub fn new(name: StreamName, value: EngineNumber) -> Self {
        Self {
            name,
            value,
            scope: None,
            units_to_record: None,
            subtract_recycling: false,
            force_use_full_recharge: false,
            distribution: None,
            record_as_last_specified: true,
        }
    }
}

impl SubstanceState {
    pub fn is_enabled(&self, stream: EnabledStream) -> bool {
        self.enabled_streams.contains(&stream)
    }

    pub fn enable(&mut self, stream: EnabledStream) {
        self.enabled_streams.insert(stream);
    }

    /// Derived `sales = domestic + import + recycle` (spec.md I2).
    pub fn sales_kg(&self) -> f64 {
        self.domestic.value + self.import.value + self.recycle.value
    }

    /// Read a stream's current value. `Sales` is synthesized; everything
    /// else is a direct field read.
    pub fn get_stream(&self, name: StreamName) -> EngineNumber {
        match name {
            StreamName::Domestic => self.domestic.clone(),
            StreamName::Import => self.import.clone(),
            StreamName::Export => self.export.clone(),
            StreamName::Sales => EngineNumber::new(self.sales_kg(), Unit::kg()),
            StreamName::Recycle => self.recycle.clone(),
            StreamName::RecycleRecharge => self.recycle_recharge.clone(),
            StreamName::RecycleEol => self.recycle_eol.clone(),
            StreamName::PriorEquipment => self.prior_equipment.clone(),
            StreamName::Equipment => self.equipment.clone(),
            StreamName::Retired => self.retired.clone(),
            StreamName::Consumption => self.consumption.clone(),
            StreamName::Energy => self.energy.clone(),
            StreamName::RechargeEmissions => self.recharge_emissions.clone(),
            StreamName::EolEmissions => self.eol_emissions.clone(),
            StreamName::ExportEmissions => self.export_emissions.clone(),
        }
    }

    /// Direct stream write bypassing enablement checks and
    /// `last_specified_value` bookkeeping — used by the recalculator and
    /// displacement executor, which derive values rather than interpret a
    /// DSL command (spec.md §4.2 only governs *interpreter* writes).
    pub fn set_raw_for_displacement(&mut self, name: StreamName, value: f64) {
        let units = self.get_stream(name).units;
        self.set_raw(name, EngineNumber::new(value, units));
    }

    fn set_raw(&mut self, name: StreamName, value: EngineNumber) {
        match name {
            StreamName::Domestic => self.domestic = value,
            StreamName::Import => self.import = value,
            StreamName::Export => self.export = value,
            StreamName::Recycle => self.recycle = value,
            StreamName::RecycleRecharge => self.recycle_recharge = value,
            StreamName::RecycleEol => self.recycle_eol = value,
            StreamName::PriorEquipment => self.prior_equipment = value,
            StreamName::Equipment => self.equipment = value,
            StreamName::Retired => self.retired = value,
            StreamName::Consumption => self.consumption = value,
            StreamName::Energy => self.energy = value,
            StreamName::RechargeEmissions => self.recharge_emissions = value,
            StreamName::EolEmissions => self.eol_emissions = value,
            StreamName::ExportEmissions => self.export_emissions = value,
            StreamName::Sales => {
                // Handled by `apply_sales_write`; `set_raw` should never be
                // called directly with `Sales`.
            }
        }
    }

    /// Apply a `StreamUpdate`, enforcing I1 and I5. `update` only performs
    /// the write and the bookkeeping (`last_specified_value`,
    /// `sales_intent_freshly_set`) described in spec.md §4.2; the
    /// recalculator is invoked separately by the interpreter once per
    /// stanza, not after every individual write (see `recalculator.rs`).
    pub fn update(&mut self, upd: StreamUpdate) -> Result<(), EngineError> {
        let scope = upd.scope.clone();
        let is_enabled_stream = EnabledStream::from_stream_name(upd.name);

        if let Some(enabled_stream) = is_enabled_stream {
            if upd.value.value != 0.0 && !self.is_enabled(enabled_stream) {
                return Err(EngineError::StreamNotEnabled {
                    scope: scope.unwrap_or_else(|| Scope::new("", "", "")),
                    stream: upd.name.to_string(),
                });
            }
            // A zero write to a disabled stream is a permitted no-op
            // initializer (spec.md §4.2).
            if upd.value.value == 0.0 && !self.is_enabled(enabled_stream) {
                return Ok(());
            }
        }

        if upd.name == StreamName::Sales {
            self.apply_sales_write(upd)?;
        } else {
            if upd.record_as_last_specified {
                self.last_specified_value
                    .insert(upd.name, upd.value.clone());
            }
            self.set_raw(upd.name, upd.value);
        }

        if matches!(
            upd.name,
            StreamName::Domestic | StreamName::Import | StreamName::Export | StreamName::Sales
        ) && upd.record_as_last_specified
        {
            self.sales_intent_freshly_set = true;
        }

        Ok(())
    }

    /// `sales` writes redistribute across `domestic`/`import` per the
    /// active `SalesStreamDistribution` (spec.md §4.2).
    fn apply_sales_write(&mut self, upd: StreamUpdate) -> Result<(), EngineError> {
        let distribution = upd.distribution.unwrap_or(self.distribution);
        let total_kg = upd.value.value * upd.value.units.numerator.canonical_scale();

        let domestic_enabled = self.is_enabled(EnabledStream::Domestic);
        let import_enabled = self.is_enabled(EnabledStream::Import);

        if !domestic_enabled && !import_enabled {
            return Err(EngineError::StreamNotEnabled {
                scope: upd.scope.clone().unwrap_or_else(|| Scope::new("", "", "")),
                stream: "sales".to_string(),
            });
        }

        let domestic_kg = if domestic_enabled {
            total_kg * distribution.percent_domestic
        } else {
            0.0
        };
        let import_kg = if import_enabled {
            total_kg * distribution.percent_import
        } else {
            total_kg
        };

        let domestic_value = EngineNumber::new(domestic_kg, Unit::kg());
        let import_value = EngineNumber::new(import_kg, Unit::kg());

        if upd.record_as_last_specified {
            self.last_specified_value
                .insert(StreamName::Domestic, domestic_value.clone());
            self.last_specified_value
                .insert(StreamName::Import, import_value.clone());
        }

        self.domestic = domestic_value;
        self.import = import_value;

        Ok(())
    }

    pub fn last_specified(&self, name: StreamName) -> Option<&EngineNumber> {
        self.last_specified_value.get(&name)
    }

    pub fn reset_sales_intent_flag(&mut self) {
        self.sales_intent_freshly_set = false;
    }

    /// GHG intensity weighted average over enabled streams' initial
    /// charge, used by `StateGetter::get_amortized_unit_volume` (spec.md
    /// §4.1, invariant I4).
    pub fn amortized_unit_volume(&self) -> f64 {
        let enabled: Vec<EnabledStream> = [
            EnabledStream::Domestic,
            EnabledStream::Import,
            EnabledStream::Export,
        ]
        .into_iter()
        .filter(|s| self.is_enabled(*s))
        .collect();

        if enabled.is_empty() {
            return 0.0;
        }

        let weights = SalesStreamDistribution::even(&enabled);
        let mut total_weight = 0.0;
        let mut weighted = 0.0;
        for stream in &enabled {
            let weight = match stream {
                EnabledStream::Domestic => weights.percent_domestic,
                EnabledStream::Import => weights.percent_import,
                EnabledStream::Export => 1.0 / enabled.len() as f64,
            };
            weighted += weight * self.initial_charge.get(*stream);
            total_weight += weight;
        }

        if total_weight == 0.0 {
            0.0
        } else {
            weighted / total_weight
        }
    }
}
