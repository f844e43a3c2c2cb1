//! Stream identifiers and the small enums that hang off them.
//!
//! Kept as typed variants rather than strings so the recalculator and
//! displacement executor dispatch on them with `match`, never string
//! comparison (spec.md §9 "Dynamic typing" design note).

use serde::{Deserialize, Serialize};

/// Every stream tracked on a `SubstanceState`. `Sales` is derived
/// (`domestic + import + recycle`) and never stored directly — see
/// `SubstanceState::get_stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamName {
    Domestic,
    Import,
    Export,
    Sales,
    Recycle,
    RecycleRecharge,
    RecycleEol,
    PriorEquipment,
    Equipment,
    Retired,
    Consumption,
    Energy,
    RechargeEmissions,
    EolEmissions,
    ExportEmissions,
}

impl StreamName {
    pub fn name(self) -> &'static str {
        match self {
            StreamName::Domestic => "domestic",
            StreamName::Import => "import",
            StreamName::Export => "export",
            StreamName::Sales => "sales",
            StreamName::Recycle => "recycle",
            StreamName::RecycleRecharge => "recycleRecharge",
            StreamName::RecycleEol => "recycleEol",
            StreamName::PriorEquipment => "priorEquipment",
            StreamName::Equipment => "equipment",
            StreamName::Retired => "retired",
            StreamName::Consumption => "consumption",
            StreamName::Energy => "energy",
            StreamName::RechargeEmissions => "rechargeEmissions",
            StreamName::EolEmissions => "eolEmissions",
            StreamName::ExportEmissions => "exportEmissions",
        }
    }

    pub fn parse(name: &str) -> Option<StreamName> {
        match name {
            "domestic" | "manufacture" => Some(StreamName::Domestic),
            "import" => Some(StreamName::Import),
            "export" => Some(StreamName::Export),
            "sales" => Some(StreamName::Sales),
            "recycle" => Some(StreamName::Recycle),
            "recycleRecharge" => Some(StreamName::RecycleRecharge),
            "recycleEol" => Some(StreamName::RecycleEol),
            "priorEquipment" => Some(StreamName::PriorEquipment),
            "equipment" => Some(StreamName::Equipment),
            "retired" => Some(StreamName::Retired),
            "consumption" => Some(StreamName::Consumption),
            "energy" => Some(StreamName::Energy),
            "rechargeEmissions" => Some(StreamName::RechargeEmissions),
            "eolEmissions" => Some(StreamName::EolEmissions),
            "exportEmissions" => Some(StreamName::ExportEmissions),
            _ => None,
        }
    }
}

impl std::fmt::Display for StreamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The three streams that can be individually enabled and that
/// participate in the sales distribution (spec.md §3: `enabledStreams ⊆
/// {domestic, import, export}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnabledStream {
    Domestic,
    Import,
    Export,
}

impl EnabledStream {
    pub fn as_stream_name(self) -> StreamName {
        match self {
            EnabledStream::Domestic => StreamName::Domestic,
            EnabledStream::Import => StreamName::Import,
            EnabledStream::Export => StreamName::Export,
        }
    }

    pub fn from_stream_name(name: StreamName) -> Option<EnabledStream> {
        match name {
            StreamName::Domestic => Some(EnabledStream::Domestic),
            StreamName::Import => Some(EnabledStream::Import),
            StreamName::Export => Some(EnabledStream::Export),
            _ => None,
        }
    }
}

/// How a stream behaves in years where no command writes it explicitly
/// (spec.md §9 Open Question — `assumeMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssumeMode {
    /// Keep the previous year's value (the default).
    #[default]
    Continued,
    /// Treat the stream as zero unless set this year.
    Zero,
    /// Derive the stream purely from the recharge schedule.
    Recharge,
}

/// How `sales` splits across `domestic` and `import` when written as a
/// combined quantity (spec.md §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesStreamDistribution {
    pub percent_domestic: f64,
    pub percent_import: f64,
}

impl Default for SalesStreamDistribution {
    fn default() -> Self {
        Self {
            percent_domestic: 1.0,
            percent_import: 0.0,
        }
    }
}

impl SalesStreamDistribution {
    pub fn even(enabled: &[EnabledStream]) -> Self {
        let has_domestic = enabled.contains(&EnabledStream::Domestic);
        let has_import = enabled.contains(&EnabledStream::Import);
        match (has_domestic, has_import) {
            (true, true) => Self {
                percent_domestic: 0.5,
                percent_import: 0.5,
            },
            (true, false) => Self {
                percent_domestic: 1.0,
                percent_import: 0.0,
            },
            (false, true) => Self {
                percent_domestic: 0.0,
                percent_import: 1.0,
            },
            (false, false) => Self {
                percent_domestic: 0.0,
                percent_import: 0.0,
            },
        }
    }
}
