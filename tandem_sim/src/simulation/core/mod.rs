// tandem_sim/src/simulation/core/mod.rs

pub mod prng;
pub mod report;
pub mod runner;
pub mod scenario;

pub use prng::ScenarioRng;
pub use report::RunReport;
pub use runner::{run_scenario, write_report};
pub use scenario::build_environment;
