// tandem_sim/src/simulation/config/structs.rs

use serde::{Deserialize, Serialize};
use tandem_core::agents::DynamicsKind;
use tandem_core::constants::{ENV_DT_DEFAULT, ROBOT_ACC_MAX, ROBOT_SPEED_MAX};
use tandem_core::environment::{BehaviorConfig, ModeParams};
use tandem_core::solver::SolverConfig;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// Holds all configuration for a simulation run.
/// This struct is the root of the data parsed from a `scenario.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    #[serde(default)]
    pub environment: BehaviorConfig,

    #[serde(default)]
    pub ego: EgoConfig,

    // The TOML has `[[pedestrians]]`, which becomes a Vec of PedestrianConfig structs.
    #[serde(default)]
    pub pedestrians: Vec<PedestrianConfig>,

    #[serde(default)]
    pub solver: SolverConfig,
}

impl ScenarioConfig {
    /// Goal tolerance of the closed loop, `[simulation]` taking precedence over `[solver]`.
    pub fn goal_tolerance(&self) -> f64 {
        self.simulation
            .goal_tolerance
            .unwrap_or(self.solver.goal_tolerance)
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in a scenario.toml file.
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Simulation {
    /// Time step of the environment in seconds.
    pub dt: f64,
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Upper bound on executed control steps.
    pub max_steps: usize,
    pub goal_tolerance: Option<f64>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            dt: ENV_DT_DEFAULT,
            seed: None,
            max_steps: 60,
            goal_tolerance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EgoConfig {
    pub dynamics: DynamicsKind,
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    pub goal: [f64; 2],
    pub speed_max: f64,
    /// Only used by the double integrator.
    pub acceleration_max: f64,
}

impl Default for EgoConfig {
    fn default() -> Self {
        Self {
            dynamics: DynamicsKind::DoubleIntegrator,
            position: [0.0, 0.0],
            velocity: [0.0, 0.0],
            goal: [8.0, 0.0],
            speed_max: ROBOT_SPEED_MAX,
            acceleration_max: ROBOT_ACC_MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PedestrianConfig {
    pub position: [f64; 2],
    #[serde(default)]
    pub velocity: [f64; 2],
    #[serde(default)]
    pub goal: Option<[f64; 2]>,
    /// Explicit behavior modes. Mutually exclusive with `num_modes`.
    #[serde(default)]
    pub modes: Vec<ModeParams>,
    /// Number of modes to sample around the model's default mode.
    #[serde(default)]
    pub num_modes: Option<usize>,
}
