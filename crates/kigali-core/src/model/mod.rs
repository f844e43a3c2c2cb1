//! The state model: `Scope`, `SubstanceState`, `SimulationState`, and the
//! small typed enums that describe streams and policy state (spec.md §3).

pub mod scope;
pub mod simulation_state;
pub mod stream;
pub mod substance_state;

pub use scope::Scope;
pub use simulation_state::{SimulationState, SubstanceKey};
pub use stream::{AssumeMode, EnabledStream, SalesStreamDistribution, StreamName};
pub use substance_state::{InitialCharges, RecoveryStage, RecyclingPolicy, StreamUpdate, SubstanceState};
