// tandem_sim/src/prelude.rs

// Re-export the entire tandem_core prelude so the pure planner types are at hand.
pub use tandem_core::prelude::*;

// Re-export common simulation-specific types.
pub use crate::cli::Cli;
pub use crate::error::SimError;
pub use crate::simulation::config::{load_scenario, parse_scenario, ScenarioConfig};
pub use crate::simulation::core::{run_scenario, write_report, RunReport, ScenarioRng};
