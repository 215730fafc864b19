// tandem_core/src/modules/min_distance.rs

use crate::agents::EgoGraph;
use crate::autodiff::Dual64;
use crate::constants::{MIN_DISTANCE_DEFAULT, NORM_EPS};
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::AgentId;

/// Keeps the ego at least `min_distance` away from every predicted pedestrian mode.
///
/// One output per pedestrian, mode and future step `k = 1..=T`, in that nesting order. The
/// pedestrians are predicted conditioned on the candidate ego trajectory.
#[derive(Debug)]
pub struct MinDistanceModule<'e> {
    env: &'e Environment,
    horizon: usize,
    min_distance: f64,
}

impl<'e> MinDistanceModule<'e> {
    pub fn new(env: &'e Environment, horizon: usize) -> Result<Self, PlannerError> {
        Self::with_distance(env, horizon, MIN_DISTANCE_DEFAULT)
    }

    pub fn with_distance(env: &'e Environment, horizon: usize, min_distance: f64) -> Result<Self, PlannerError> {
        env.ego_or_err()?;
        if !(min_distance > 0.0) {
            return Err(PlannerError::InfeasibleConfiguration {
                module: "min_distance".to_string(),
                reason: format!("minimal distance must be positive, got {min_distance}"),
            });
        }
        Ok(Self {
            env,
            horizon,
            min_distance,
        })
    }
}

impl OptimizationModule for MinDistanceModule<'_> {
    fn name(&self) -> &'static str {
        "min_distance"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Constraint
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn constraint_core(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> Option<Vec<Dual64>> {
        if ids.is_empty() {
            return None;
        }
        let positions = ego.positions();
        let forecast = self
            .env
            .predict_graph(Some(&positions), self.horizon, ids)
            .ok()?;
        let mut outputs = Vec::with_capacity(self.num_constraints(ids));
        for pedestrian in &forecast {
            for mode in &pedestrian.modes {
                for k in 1..=self.horizon {
                    outputs.push((positions[k] - mode.positions[k]).norm(NORM_EPS));
                }
            }
        }
        Some(outputs)
    }

    fn constraint_limits(&self) -> (Option<f64>, Option<f64>) {
        (Some(self.min_distance), None)
    }

    fn num_constraints(&self, ids: &[AgentId]) -> usize {
        ids.iter()
            .filter_map(|id| self.env.num_modes(*id))
            .sum::<usize>()
            * self.horizon
    }

    fn gradient_condition(&self) -> bool {
        true
    }
}
