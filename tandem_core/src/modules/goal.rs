// tandem_core/src/modules/goal.rs

use nalgebra::{DMatrix, DVector, Vector2};

use crate::agents::EgoGraph;
use crate::autodiff::{sum, Dual64};
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::{AgentId, Trajectory};

/// Time-weighted squared distance to the goal, `Σ_t w_t |p_t - g|²`.
///
/// Shared by the two goal objectives, which only differ in their weights `w_t`.
#[derive(Debug)]
struct GoalDistance {
    goal: Vector2<f64>,
    horizon: usize,
    weights: Vec<f64>,
    dx_du: DMatrix<f64>,
}

impl GoalDistance {
    fn new(env: &Environment, goal: Vector2<f64>, horizon: usize, weights: Vec<f64>) -> Result<Self, PlannerError> {
        let ego = env.ego_or_err()?;
        Ok(Self {
            goal,
            horizon,
            weights,
            dx_du: ego.dynamics.dx_du(horizon, env.dt()),
        })
    }

    fn core(&self, ego: &EgoGraph<'_>) -> Option<Dual64> {
        sum(ego
            .states
            .iter()
            .zip(self.weights.iter())
            .map(|(state, w)| (state.position - &self.goal).norm_squared() * *w))
    }

    fn gradient(&self, trajectory: &Trajectory) -> Option<DVector<f64>> {
        if trajectory.len() != self.horizon + 1 {
            return None;
        }
        let mut d_objective_dx = DVector::zeros(4 * (self.horizon + 1));
        for (t, (state, w)) in trajectory.states.iter().zip(self.weights.iter()).enumerate() {
            let diff = (state.position - self.goal) * (2.0 * w);
            d_objective_dx[4 * t] = diff.x;
            d_objective_dx[4 * t + 1] = diff.y;
        }
        Some(self.dx_du.tr_mul(&d_objective_dx))
    }
}

/// Mean squared distance of the ego positions to the goal.
#[derive(Debug)]
pub struct GoalNormModule {
    distance: GoalDistance,
    weight: f64,
}

impl GoalNormModule {
    pub fn new(env: &Environment, goal: Vector2<f64>, horizon: usize, weight: f64) -> Result<Self, PlannerError> {
        let weights = vec![1.0 / (horizon + 1) as f64; horizon + 1];
        Ok(Self {
            distance: GoalDistance::new(env, goal, horizon, weights)?,
            weight,
        })
    }
}

impl OptimizationModule for GoalNormModule {
    fn name(&self) -> &'static str {
        "goal_norm"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Objective
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn horizon(&self) -> usize {
        self.distance.horizon
    }

    fn objective_core(&self, ego: &EgoGraph<'_>, _ids: &[AgentId]) -> Option<Dual64> {
        self.distance.core(ego)
    }

    fn gradient_analytic(&self, trajectory: &Trajectory, _ids: &[AgentId]) -> Option<DVector<f64>> {
        self.distance.gradient(trajectory)
    }

    fn gradient_condition(&self) -> bool {
        true
    }
}

/// Squared goal distance weighted linearly in time, so late positions dominate and the ego is
/// free to swerve early on.
#[derive(Debug)]
pub struct GoalWeightedModule {
    distance: GoalDistance,
    weight: f64,
}

impl GoalWeightedModule {
    pub fn new(env: &Environment, goal: Vector2<f64>, horizon: usize, weight: f64) -> Result<Self, PlannerError> {
        let total = (horizon * (horizon + 1)) as f64 / 2.0;
        let weights = (0..=horizon).map(|t| t as f64 / total.max(1.0)).collect();
        Ok(Self {
            distance: GoalDistance::new(env, goal, horizon, weights)?,
            weight,
        })
    }
}

impl OptimizationModule for GoalWeightedModule {
    fn name(&self) -> &'static str {
        "goal_weighted"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Objective
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn horizon(&self) -> usize {
        self.distance.horizon
    }

    fn objective_core(&self, ego: &EgoGraph<'_>, _ids: &[AgentId]) -> Option<Dual64> {
        self.distance.core(ego)
    }

    fn gradient_analytic(&self, trajectory: &Trajectory, _ids: &[AgentId]) -> Option<DVector<f64>> {
        self.distance.gradient(trajectory)
    }

    fn gradient_condition(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{DoubleIntegrator, SingleIntegrator};
    use crate::modules::test_utils;
    use crate::session::SessionLog;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_objective_is_mean_squared_distance() {
        let env = test_utils::environment(Box::new(SingleIntegrator::default()), false);
        let goal = Vector2::new(4.0, 1.0);
        let module = GoalNormModule::new(&env, goal, 4, 1.0).unwrap();
        let ego = env.ego().unwrap();
        let z = DVector::from_vec(vec![1.0, 0.0, 1.0, 0.5, 0.0, 0.5, -1.0, 0.0]);
        let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, &z, env.dt());

        let expected: f64 = graph
            .trajectory()
            .positions()
            .map(|p| (p - goal).norm_squared())
            .sum::<f64>()
            / 5.0;
        let mut log = SessionLog::new();
        let value = module.objective(&graph, &[], &mut log, "test");
        assert_abs_diff_eq!(value, expected, epsilon = 1e-12);
        assert!(log.last("test/obj_goal_norm").is_some());
    }

    #[test]
    fn test_analytic_gradient_matches_autodiff() {
        let goal = Vector2::new(3.0, -2.0);
        let mut rng = test_utils::rng(7);
        for dynamics in [
            Box::new(SingleIntegrator::default()) as Box<dyn crate::agents::AgentDynamics>,
            Box::new(DoubleIntegrator::default()),
        ] {
            let env = test_utils::environment(dynamics, false);
            let ego = env.ego().unwrap();
            let horizon = 5;
            let modules: Vec<Box<dyn OptimizationModule>> = vec![
                Box::new(GoalNormModule::new(&env, goal, horizon, 1.0).unwrap()),
                Box::new(GoalWeightedModule::new(&env, goal, horizon, 1.0).unwrap()),
            ];
            for _ in 0..5 {
                let z = test_utils::random_controls(&mut rng, ego.dynamics.as_ref(), horizon);
                let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, &z, env.dt());
                for module in &modules {
                    let analytic = module.gradient_analytic(&graph.trajectory(), &[]).unwrap();
                    let autodiff = module.gradient_autodiff(&graph, &[]);
                    assert_eq!(analytic.len(), z.len());
                    assert!((analytic - autodiff).amax() < 0.01, "{}", module.name());
                }
            }
        }
    }
}
