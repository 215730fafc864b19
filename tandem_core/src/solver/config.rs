// tandem_core/src/solver/config.rs

use serde::{Deserialize, Serialize};

use crate::attention::AttentionConfig;
use crate::constants::{
    SOLVER_ELASTIC_PENALTY, SOLVER_FEASIBILITY_TOLERANCE, SOLVER_GOAL_TOLERANCE, SOLVER_HORIZON_DEFAULT,
    SOLVER_LBFGS_MEMORY, SOLVER_MAX_CPU_TIME_DEFAULT, SOLVER_TOLERANCE,
};
use crate::modules::ModuleName;
use crate::solver::nlp::SqpOptions;

/// An objective module together with its weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightedModule {
    pub name: ModuleName,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Everything that shapes one planning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Number of planned control steps `T`.
    pub horizon: usize,
    pub objectives: Vec<WeightedModule>,
    pub constraints: Vec<ModuleName>,
    pub attention: AttentionConfig,
    /// Wall-clock budget of one NLP solve, in seconds.
    pub max_cpu_time: f64,
    pub max_iter: Option<usize>,
    /// Replaces the module Jacobians by forward finite differences.
    pub approximate_jacobian: bool,
    pub lbfgs_memory: usize,
    pub tolerance: f64,
    pub feasibility_tolerance: f64,
    /// Weight of the elastic slacks that keep the QP subproblems feasible.
    pub elastic_penalty: f64,
    /// Solve from the straight line and two lateral swerves instead of the straight line only.
    pub multi_start: bool,
    /// Run the multi-start solves on the rayon pool.
    pub parallel: bool,
    pub goal_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            horizon: SOLVER_HORIZON_DEFAULT,
            objectives: vec![
                WeightedModule {
                    name: ModuleName::GoalWeighted,
                    weight: 1.0,
                },
                WeightedModule {
                    name: ModuleName::InteractionPos,
                    weight: 5.0,
                },
            ],
            constraints: vec![ModuleName::SpeedLimits, ModuleName::MinDistance],
            attention: AttentionConfig::default(),
            max_cpu_time: SOLVER_MAX_CPU_TIME_DEFAULT,
            max_iter: None,
            approximate_jacobian: false,
            lbfgs_memory: SOLVER_LBFGS_MEMORY,
            tolerance: SOLVER_TOLERANCE,
            feasibility_tolerance: SOLVER_FEASIBILITY_TOLERANCE,
            elastic_penalty: SOLVER_ELASTIC_PENALTY,
            multi_start: true,
            parallel: true,
            goal_tolerance: SOLVER_GOAL_TOLERANCE,
        }
    }
}

impl SolverConfig {
    pub fn sqp_options(&self) -> SqpOptions {
        SqpOptions {
            max_cpu_time: self.max_cpu_time,
            max_iter: self.max_iter,
            lbfgs_memory: self.lbfgs_memory,
            tolerance: self.tolerance,
            feasibility_tolerance: self.feasibility_tolerance,
            elastic_penalty: self.elastic_penalty,
        }
    }
}
