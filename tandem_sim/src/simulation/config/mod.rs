// tandem_sim/src/simulation/config/mod.rs

//! This module handles loading and validating all simulation configuration from disk.

mod catalog;

pub mod structs;

use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use tracing::info;

use crate::error::SimError;

// Re-export public types
pub use catalog::{discover_scenarios, scenario_name};
pub use structs::{EgoConfig, PedestrianConfig, ScenarioConfig, Simulation};

/// Loads and validates the scenario at `path`.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, SimError> {
    // figment treats a missing file as an empty document.
    if !path.is_file() {
        return Err(SimError::MissingScenario(path.to_path_buf()));
    }
    info!("Loading scenario from: {:?}", path);
    let config: ScenarioConfig = Figment::new().merge(Toml::file(path)).extract()?;
    validate(&config)?;
    Ok(config)
}

/// Parses a scenario from an in-memory TOML document.
pub fn parse_scenario(toml: &str) -> Result<ScenarioConfig, SimError> {
    let config: ScenarioConfig = Figment::new().merge(Toml::string(toml)).extract()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ScenarioConfig) -> Result<(), SimError> {
    let invalid = |msg: String| Err(SimError::InvalidScenario(msg));
    if !(config.simulation.dt > 0.0) {
        return invalid(format!("time step must be positive, got {}", config.simulation.dt));
    }
    if !(config.ego.speed_max > 0.0) || !(config.ego.acceleration_max > 0.0) {
        return invalid("ego limits must be positive".to_string());
    }
    if config.solver.horizon == 0 {
        return invalid("solver horizon must be positive".to_string());
    }
    for (i, ped) in config.pedestrians.iter().enumerate() {
        match (ped.modes.is_empty(), ped.num_modes) {
            (false, Some(_)) => {
                return invalid(format!("pedestrian {i} sets both `modes` and `num_modes`"));
            }
            (true, Some(0)) => return invalid(format!("pedestrian {i} asks for zero modes")),
            _ => {}
        }
    }
    Ok(())
}
