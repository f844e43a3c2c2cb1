//! Unit tags and the `UnitConverter` that moves an `EngineNumber` between
//! them.
//!
//! Units are kept as typed variants (`SimpleUnit`, `Unit`) rather than raw
//! strings so the hot paths in the recalculator and displacement executor
//! never do string comparisons. Parsing a unit string happens once, at the
//! DSL/number-literal boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The atomic unit kinds the DSL can express. `Year` only ever appears as
/// a denominator (a per-year rate), never as a numerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimpleUnit {
    Kg,
    Mt,
    Units,
    KgCo2e,
    TCo2e,
    /// Historical alias for `TCo2e` carried over from the source DSL; see
    /// spec.md §3 ("`tCO2e` = 1000 kgCO2e = `MkgCO2e`").
    MkgCo2e,
    Kwh,
    Percent,
    Year,
    /// Bare numbers with no unit at all (e.g. a GWP multiplier).
    Dimensionless,
}

/// Coarse dimension used to decide whether two `SimpleUnit`s are
/// comparable at all (mass vs. mass, GHG vs. GHG, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Mass,
    Units,
    Ghg,
    Energy,
    Percent,
    Dimensionless,
}

impl SimpleUnit {
    pub fn dimension(self) -> Dimension {
        match self {
            SimpleUnit::Kg | SimpleUnit::Mt => Dimension::Mass,
            SimpleUnit::Units => Dimension::Units,
            SimpleUnit::KgCo2e | SimpleUnit::TCo2e | SimpleUnit::MkgCo2e => Dimension::Ghg,
            SimpleUnit::Kwh => Dimension::Energy,
            SimpleUnit::Percent => Dimension::Percent,
            SimpleUnit::Year => Dimension::Dimensionless,
            SimpleUnit::Dimensionless => Dimension::Dimensionless,
        }
    }

    /// Multiplier to this dimension's canonical base unit (`kg` for mass,
    /// `kgCO2e` for GHG, `kwh` for energy, `units` for equipment, the raw
    /// percent number for `%`).
    pub fn canonical_scale(self) -> f64 {
        match self {
            SimpleUnit::Kg => 1.0,
            SimpleUnit::Mt => 1000.0,
            SimpleUnit::Units => 1.0,
            SimpleUnit::KgCo2e => 1.0,
            // Both the metric-ton and the legacy "Mkg" spelling collapse to
            // the same 1000x factor — see spec.md §3.
            SimpleUnit::TCo2e | SimpleUnit::MkgCo2e => 1000.0,
            SimpleUnit::Kwh => 1.0,
            SimpleUnit::Percent => 1.0,
            SimpleUnit::Year | SimpleUnit::Dimensionless => 1.0,
        }
    }

    fn parse(token: &str) -> Option<SimpleUnit> {
        match token {
            "kg" => Some(SimpleUnit::Kg),
            "mt" | "tonne" | "tonnes" => Some(SimpleUnit::Mt),
            "unit" | "units" => Some(SimpleUnit::Units),
            "kgco2e" => Some(SimpleUnit::KgCo2e),
            "tco2e" => Some(SimpleUnit::TCo2e),
            "mkgco2e" => Some(SimpleUnit::MkgCo2e),
            "kwh" => Some(SimpleUnit::Kwh),
            "%" | "percent" => Some(SimpleUnit::Percent),
            "yr" | "year" | "years" => Some(SimpleUnit::Year),
            "" | "no units" | "no unit" => Some(SimpleUnit::Dimensionless),
            _ => None,
        }
    }

    fn canonical_str(self) -> &'static str {
        match self {
            SimpleUnit::Kg => "kg",
            SimpleUnit::Mt => "mt",
            SimpleUnit::Units => "units",
            SimpleUnit::KgCo2e => "kgCO2e",
            SimpleUnit::TCo2e => "tCO2e",
            SimpleUnit::MkgCo2e => "MkgCO2e",
            SimpleUnit::Kwh => "kwh",
            SimpleUnit::Percent => "%",
            SimpleUnit::Year => "year",
            SimpleUnit::Dimensionless => "",
        }
    }
}

/// What a unit is expressed "per": nothing, per equipment unit, per kg, or
/// per year. `kg/unit`, `kwh/unit`, `kwh/kg`, `%/year`, `kg/year` are all
/// `(numerator, Some(per))` pairs; a bare `kg` is `(Kg, None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerBasis {
    None,
    PerUnit,
    PerKg,
    PerYear,
}

/// A full unit tag: a numerator `SimpleUnit` and an optional denominator
/// basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub numerator: SimpleUnit,
    pub per: PerBasis,
}

impl Unit {
    pub const fn new(numerator: SimpleUnit, per: PerBasis) -> Self {
        Self { numerator, per }
    }

    pub const fn kg() -> Self {
        Self::new(SimpleUnit::Kg, PerBasis::None)
    }
    pub const fn mt() -> Self {
        Self::new(SimpleUnit::Mt, PerBasis::None)
    }
    pub const fn units() -> Self {
        Self::new(SimpleUnit::Units, PerBasis::None)
    }
    pub const fn kg_co2e() -> Self {
        Self::new(SimpleUnit::KgCo2e, PerBasis::None)
    }
    pub const fn t_co2e() -> Self {
        Self::new(SimpleUnit::TCo2e, PerBasis::None)
    }
    pub const fn kwh() -> Self {
        Self::new(SimpleUnit::Kwh, PerBasis::None)
    }
    pub const fn percent() -> Self {
        Self::new(SimpleUnit::Percent, PerBasis::None)
    }
    pub const fn kg_per_unit() -> Self {
        Self::new(SimpleUnit::Kg, PerBasis::PerUnit)
    }
    pub const fn kwh_per_unit() -> Self {
        Self::new(SimpleUnit::Kwh, PerBasis::PerUnit)
    }
    pub const fn kg_co2e_per_kg() -> Self {
        Self::new(SimpleUnit::KgCo2e, PerBasis::PerKg)
    }
    pub const fn percent_per_year() -> Self {
        Self::new(SimpleUnit::Percent, PerBasis::PerYear)
    }
    pub const fn kg_per_year() -> Self {
        Self::new(SimpleUnit::Kg, PerBasis::PerYear)
    }
    pub const fn dimensionless() -> Self {
        Self::new(SimpleUnit::Dimensionless, PerBasis::None)
    }

    /// Dimension-and-scale pair used for equality comparisons: two units
    /// are comparable iff their `(dimension, per)` pairs match.
    pub fn canonical_factor(&self) -> Option<((Dimension, PerBasis), f64)> {
        Some((
            (self.numerator.dimension(), self.per),
            self.numerator.canonical_scale(),
        ))
    }

    /// Parse a unit string such as `"kg"`, `"kg / unit"`, `"% / year"`,
    /// `"kwh/unit"`. Whitespace around `/` is ignored and `/ yr` normalizes
    /// identically to `/ year`.
    pub fn parse(raw: &str) -> Result<Unit, UnitParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Unit::dimensionless());
        }
        let lowered = trimmed.to_ascii_lowercase();
        if let Some((num_part, den_part)) = lowered.split_once('/') {
            let numerator = SimpleUnit::parse(num_part.trim())
                .ok_or_else(|| UnitParseError::Unknown(raw.to_string()))?;
            let per = match den_part.trim() {
                "unit" | "units" => PerBasis::PerUnit,
                "kg" => PerBasis::PerKg,
                "yr" | "year" | "years" => PerBasis::PerYear,
                other => return Err(UnitParseError::UnknownDenominator(other.to_string())),
            };
            Ok(Unit::new(numerator, per))
        } else {
            let numerator = SimpleUnit::parse(&lowered)
                .ok_or_else(|| UnitParseError::Unknown(raw.to_string()))?;
            Ok(Unit::new(numerator, PerBasis::None))
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let den = match self.per {
            PerBasis::None => None,
            PerBasis::PerUnit => Some("unit"),
            PerBasis::PerKg => Some("kg"),
            PerBasis::PerYear => Some("year"),
        };
        match den {
            None => write!(f, "{}", self.numerator.canonical_str()),
            Some(den) => write!(f, "{} / {}", self.numerator.canonical_str(), den),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UnitParseError {
    #[error("unrecognized unit '{0}'")]
    Unknown(String),
    #[error("unrecognized unit denominator '{0}'")]
    UnknownDenominator(String),
}

/// Context a `UnitConverter` needs to resolve conversions that depend on
/// more than the two units in play (kg↔units via initial charge, %↔absolute
/// relative to some base, GHG/energy totals for a substance).
///
/// One `StateGetter` is built per `(Scope, command)` by the interpreter,
/// borrowing the fields of `SubstanceState` relevant to the conversion at
/// hand.
pub trait StateGetter {
    /// Equipment population in the active scope \[units\].
    fn get_population(&self) -> f64;
    /// Total substance volume (sales) in the active scope \[kg\].
    fn get_volume(&self) -> f64;
    /// Amortized initial charge across enabled streams \[kg/unit\].
    fn get_amortized_unit_volume(&self) -> f64;
    /// GHG intensity \[kgCO2e/kg\].
    fn get_substance_consumption(&self) -> f64;
    /// Energy intensity, already normalized to kwh/unit or kwh/kg
    /// depending on how it was declared.
    fn get_energy_intensity(&self) -> f64;
    /// Years elapsed since the scenario's first simulated year.
    fn get_years_elapsed(&self) -> f64;
    /// Total GHG consumption accumulated so far \[kgCO2e\].
    fn get_ghg_consumption(&self) -> f64;
    /// Total energy consumption accumulated so far \[kwh\].
    fn get_energy_consumption(&self) -> f64;
    /// GHG consumption amortized per equipment unit \[kgCO2e/unit\].
    fn get_amortized_unit_consumption(&self) -> f64;
    /// Population delta since the prior year \[units\], signed.
    fn get_population_change(&self) -> f64;
}

/// Converts an `EngineNumber` into a requested `Unit`, using a
/// `StateGetter` to resolve conversions that need scope context.
pub struct UnitConverter<'a> {
    state: &'a dyn StateGetter,
}

impl<'a> UnitConverter<'a> {
    pub fn new(state: &'a dyn StateGetter) -> Self {
        Self { state }
    }

    /// Convert `value` into `target`. `target` must already be a parsed
    /// `Unit` — number-literal parsing happens earlier, in the DSL layer.
    pub fn convert(
        &self,
        value: &crate::number::EngineNumber,
        target: Unit,
    ) -> Result<crate::number::EngineNumber, EngineError> {
        if value.units == target {
            return Ok(crate::number::EngineNumber::new(value.value, target));
        }

        let (src_dim, src_per) = (value.units.numerator.dimension(), value.units.per);
        let (dst_dim, dst_per) = (target.numerator.dimension(), target.per);

        // Same dimension, same "per": pure SI-style rescale (kg<->mt,
        // kgCO2e<->tCO2e/MkgCO2e).
        if src_dim == dst_dim && src_per == dst_per {
            let factor = value.units.numerator.canonical_scale() / target.numerator.canonical_scale();
            return Ok(crate::number::EngineNumber::new(value.value * factor, target));
        }

        // kg <-> units via initial charge.
        if src_dim == Dimension::Mass && dst_dim == Dimension::Units && src_per == PerBasis::None {
            let kg_per_unit = self.state.get_amortized_unit_volume();
            if kg_per_unit == 0.0 {
                return Err(EngineError::ZeroInitialCharge);
            }
            let kg = value.value * value.units.numerator.canonical_scale();
            return Ok(crate::number::EngineNumber::new(kg / kg_per_unit, target));
        }
        if src_dim == Dimension::Units && dst_dim == Dimension::Mass && src_per == PerBasis::None {
            let kg_per_unit = self.state.get_amortized_unit_volume();
            if kg_per_unit == 0.0 {
                return Err(EngineError::ZeroInitialCharge);
            }
            let kg = value.value * kg_per_unit;
            let factor = 1.0 / target.numerator.canonical_scale();
            return Ok(crate::number::EngineNumber::new(kg * factor, target));
        }

        Err(EngineError::Internal(format!(
            "no conversion path from {} to {}",
            value.units, target
        )))
    }

    /// Resolve a bare percentage (`value` is e.g. `5.0` meaning `5%`)
    /// against an explicit base value in the target's numerator unit.
    /// Used by the interpreter for `retire P%`, `recharge P%`,
    /// `set x by P%`, and `cap/floor N%`, each of which picks a different
    /// base per spec.md §4.1.
    pub fn percent_to_absolute(percent: f64, base: f64) -> f64 {
        base * (percent / 100.0)
    }

    pub fn years_elapsed(&self) -> f64 {
        self.state.get_years_elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::EngineNumber;

    struct FixedState {
        amortized_unit_volume: f64,
    }

    impl StateGetter for FixedState {
        fn get_population(&self) -> f64 {
            0.0
        }
        fn get_volume(&self) -> f64 {
            0.0
        }
        fn get_amortized_unit_volume(&self) -> f64 {
            self.amortized_unit_volume
        }
        fn get_substance_consumption(&self) -> f64 {
            0.0
        }
        fn get_energy_intensity(&self) -> f64 {
            0.0
        }
        fn get_years_elapsed(&self) -> f64 {
            0.0
        }
        fn get_ghg_consumption(&self) -> f64 {
            0.0
        }
        fn get_energy_consumption(&self) -> f64 {
            0.0
        }
        fn get_amortized_unit_consumption(&self) -> f64 {
            0.0
        }
        fn get_population_change(&self) -> f64 {
            0.0
        }
    }

    #[test]
    fn mt_and_kg_convert_by_a_thousand() {
        let state = FixedState { amortized_unit_volume: 0.0 };
        let converter = UnitConverter::new(&state);
        let one_mt = EngineNumber::new(1.0, Unit::mt());
        let kg = converter.convert(&one_mt, Unit::kg()).unwrap();
        assert!((kg.value - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn t_co2e_and_mkg_co2e_are_the_same_canonical_scale() {
        let state = FixedState { amortized_unit_volume: 0.0 };
        let converter = UnitConverter::new(&state);
        let one_t_co2e = EngineNumber::new(1.0, Unit::t_co2e());
        let kg_co2e = converter.convert(&one_t_co2e, Unit::kg_co2e()).unwrap();
        assert!((kg_co2e.value - 1000.0).abs() < 1e-9);

        let mkg = EngineNumber::new(1.0, Unit::new(SimpleUnit::MkgCo2e, PerBasis::None));
        let kg_co2e_from_mkg = converter.convert(&mkg, Unit::kg_co2e()).unwrap();
        assert!((kg_co2e_from_mkg.value - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn kg_to_units_uses_amortized_initial_charge() {
        let state = FixedState { amortized_unit_volume: 2.0 };
        let converter = UnitConverter::new(&state);
        let ten_kg = EngineNumber::new(10.0, Unit::kg());
        let units = converter.convert(&ten_kg, Unit::units()).unwrap();
        assert!((units.value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn kg_to_units_with_zero_initial_charge_errors() {
        let state = FixedState { amortized_unit_volume: 0.0 };
        let converter = UnitConverter::new(&state);
        let ten_kg = EngineNumber::new(10.0, Unit::kg());
        let err = converter.convert(&ten_kg, Unit::units()).unwrap_err();
        assert!(matches!(err, EngineError::ZeroInitialCharge));
    }

    #[test]
    fn units_to_kg_round_trips_through_initial_charge() {
        let state = FixedState { amortized_unit_volume: 2.0 };
        let converter = UnitConverter::new(&state);
        let five_units = EngineNumber::new(5.0, Unit::units());
        let kg = converter.convert(&five_units, Unit::kg()).unwrap();
        assert!((kg.value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn per_year_unit_string_normalizes_yr_and_year_identically() {
        assert_eq!(Unit::parse("% / yr").unwrap(), Unit::parse("% / year").unwrap());
    }

    #[test]
    fn parse_rejects_unknown_unit() {
        assert!(matches!(Unit::parse("bogus"), Err(UnitParseError::Unknown(_))));
    }
}
