//! `EngineResult`: one row per `(scenario, trial, year, application,
//! substance)` (spec.md §6), and its default CSV serialization.

use serde::{Deserialize, Serialize};

use crate::model::substance_state::SubstanceState;
use crate::number::{EngineNumber, Unit};

/// The exact column order spec.md §6 requires for CSV output.
pub const CSV_HEADER: [&str; 17] = [
    "scenario",
    "trial",
    "year",
    "application",
    "substance",
    "domestic_kg",
    "import_kg",
    "export_kg",
    "recycle_kg",
    "population_units",
    "priorPopulation_units",
    "retired_units",
    "rechargeEmissions_tCO2e",
    "eolEmissions_tCO2e",
    "exportEmissions_tCO2e",
    "ghgConsumption_tCO2e",
    "energy_kwh",
];

/// One observation of a substance in a scenario for one simulated year.
/// Every stream is an `(value, unit)` pair, matching `EngineNumber`'s
/// original/round-trippable representation (spec.md §6 "All as (value,
/// unit)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResult {
    pub scenario: String,
    pub trial: u32,
    pub year: i64,
    pub application: String,
    pub substance: String,

    pub domestic: EngineNumber,
    pub import: EngineNumber,
    pub export: EngineNumber,
    pub sales: EngineNumber,
    pub recycle: EngineNumber,
    pub recycle_recharge: EngineNumber,
    pub recycle_eol: EngineNumber,
    pub population: EngineNumber,
    pub prior_population: EngineNumber,
    pub retired: EngineNumber,
    pub recharge_emissions: EngineNumber,
    pub eol_emissions: EngineNumber,
    pub export_emissions: EngineNumber,
    pub ghg_consumption: EngineNumber,
    pub energy: EngineNumber,
}

impl EngineResult {
    pub fn from_substance_state(
        scenario: impl Into<String>,
        trial: u32,
        year: i64,
        application: impl Into<String>,
        substance: impl Into<String>,
        state: &SubstanceState,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            trial,
            year,
            application: application.into(),
            substance: substance.into(),
            domestic: state.domestic.clone(),
            import: state.import.clone(),
            export: state.export.clone(),
            sales: EngineNumber::new(state.sales_kg(), Unit::kg()),
            recycle: state.recycle.clone(),
            recycle_recharge: state.recycle_recharge.clone(),
            recycle_eol: state.recycle_eol.clone(),
            population: state.equipment.clone(),
            prior_population: state.prior_equipment.clone(),
            retired: state.retired.clone(),
            recharge_emissions: state.recharge_emissions.clone(),
            eol_emissions: state.eol_emissions.clone(),
            export_emissions: state.export_emissions.clone(),
            ghg_consumption: state.consumption.clone(),
            energy: state.energy.clone(),
        }
    }

    /// One CSV data row, in `CSV_HEADER` order. Every numeric stream is
    /// already stored in its canonical unit (kg, units, tCO2e, kwh), so no
    /// conversion happens here — just formatting.
    pub fn to_csv_record(&self) -> Vec<String> {
        vec![
            self.scenario.clone(),
            self.trial.to_string(),
            self.year.to_string(),
            self.application.clone(),
            self.substance.clone(),
            self.domestic.value.to_string(),
            self.import.value.to_string(),
            self.export.value.to_string(),
            self.recycle.value.to_string(),
            self.population.value.to_string(),
            self.prior_population.value.to_string(),
            self.retired.value.to_string(),
            self.recharge_emissions.value.to_string(),
            self.eol_emissions.value.to_string(),
            self.export_emissions.value.to_string(),
            self.ghg_consumption.value.to_string(),
            self.energy.value.to_string(),
        ]
    }
}

/// Write `results` as RFC-4180 CSV to `writer`, with the header row from
/// spec.md §6 first.
pub fn write_csv<'a, W, I>(writer: W, results: I) -> Result<(), csv::Error>
where
    W: std::io::Write,
    I: IntoIterator<Item = &'a EngineResult>,
{
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for result in results {
        wtr.write_record(result.to_csv_record())?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EngineResult {
        let mut state = SubstanceState::default();
        state.domestic = EngineNumber::new(1000.0, Unit::kg());
        state.equipment = EngineNumber::new(100.0, Unit::units());
        state.consumption = EngineNumber::new(1.43, Unit::t_co2e());
        EngineResult::from_substance_state("BAU", 0, 1, "Commercial Refrigeration", "HFC-134a", &state)
    }

    #[test]
    fn csv_round_trips_header_and_row_count() {
        let result = sample();
        let mut buf = Vec::new();
        write_csv(&mut buf, std::iter::once(&result)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("BAU,0,1,Commercial Refrigeration,HFC-134a,1000"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn sales_is_derived_from_domestic_import_and_recycle() {
        let mut state = SubstanceState::default();
        state.domestic = EngineNumber::new(600.0, Unit::kg());
        state.import = EngineNumber::new(300.0, Unit::kg());
        state.recycle = EngineNumber::new(100.0, Unit::kg());
        let result = EngineResult::from_substance_state("BAU", 0, 1, "A", "S", &state);
        assert_eq!(result.sales.value, 1000.0);
    }
}
