// tandem_core/src/modules/control_limits.rs

use nalgebra::DMatrix;

use crate::agents::{AgentDynamics, EgoGraph};
use crate::autodiff::Dual64;
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::{AgentId, Trajectory};

/// Per-axis box constraint on the controls recovered from the ego trajectory by inverse
/// dynamics. Outputs are normalized by the control limit.
#[derive(Debug)]
pub struct ControlLimitModule {
    dynamics: Box<dyn AgentDynamics>,
    horizon: usize,
    /// `d u / d z`, constant because both the dynamics and their inverse are linear.
    jacobian: DMatrix<f64>,
}

impl ControlLimitModule {
    pub fn new(env: &Environment, horizon: usize) -> Result<Self, PlannerError> {
        let ego = env.ego_or_err()?;
        let dynamics = ego.dynamics.clone();
        let jacobian = (dynamics.inverse_jacobian(horizon, env.dt()) * dynamics.dx_du(horizon, env.dt()))
            .map(|j| if j.abs() < 1e-12 { 0.0 } else { j });
        Ok(Self {
            dynamics,
            horizon,
            jacobian,
        })
    }
}

impl OptimizationModule for ControlLimitModule {
    fn name(&self) -> &'static str {
        "control_limits"
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

    fn constraint_core(&self, ego: &EgoGraph<'_>, _ids: &[AgentId]) -> Option<Vec<Dual64>> {
        Some(
            ego.states
                .windows(2)
                .flat_map(|w| {
                    let u = self.dynamics.inverse_dynamics_graph(&w[1], &w[0], ego.dt);
                    [u.x, u.y]
                })
                .collect(),
        )
    }

    fn jacobian_analytic(&self, _trajectory: &Trajectory, _ids: &[AgentId]) -> Option<DMatrix<f64>> {
        Some(self.jacobian.clone())
    }

    /// Control `i` is recovered from the states it moves between, so row `i` only depends on
    /// entry `i` of `z`.
    fn jacobian_structure(&self, _ids: &[AgentId]) -> Option<Vec<usize>> {
        let n = 2 * self.horizon;
        Some((0..n).map(|i| i * n + i).collect())
    }

    fn constraint_limits(&self) -> (Option<f64>, Option<f64>) {
        let (lower, upper) = self.dynamics.control_limits();
        (Some(lower), Some(upper))
    }

    fn num_constraints(&self, _ids: &[AgentId]) -> usize {
        2 * self.horizon
    }

    fn normalize(&self, x: f64) -> f64 {
        x / self.dynamics.control_max()
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
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_recovers_the_controls() {
        let mut rng = test_utils::rng(5);
        for dynamics in [
            Box::new(SingleIntegrator::default()) as Box<dyn AgentDynamics>,
            Box::new(DoubleIntegrator::default()),
        ] {
            let env = test_utils::environment(dynamics, false);
            let ego = env.ego().unwrap();
            let module = ControlLimitModule::new(&env, 3).unwrap();
            let z = test_utils::random_controls(&mut rng, ego.dynamics.as_ref(), 3);
            let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, &z, env.dt());
            let values = module.constraint_values(&graph, &[]);
            let expected = z.map(|u| module.normalize(u));
            assert_abs_diff_eq!(values, expected, epsilon = 1e-9);
            assert_abs_diff_eq!(module.compute_violation(&graph, &[]), 0.0);

            let analytic = module.jacobian_matrix(&graph, &[]);
            let autodiff = module.jacobian_autodiff(&graph, &[]).map(|j| module.normalize(j));
            assert!((analytic - autodiff).amax() < 1e-9);
        }
    }

    #[test]
    fn test_declared_structure_matches_finite_differences() {
        let mut rng = test_utils::rng(19);
        for dynamics in [
            Box::new(SingleIntegrator::default()) as Box<dyn AgentDynamics>,
            Box::new(DoubleIntegrator::default()),
        ] {
            let env = test_utils::environment(dynamics, false);
            let ego = env.ego().unwrap();
            let module = ControlLimitModule::new(&env, 4).unwrap();
            let declared = test_utils::declared_structure(&module, &[]);
            assert_eq!(declared.len(), 8);
            for _ in 0..4 {
                let z = test_utils::random_controls(&mut rng, ego.dynamics.as_ref(), 4);
                assert_eq!(test_utils::numeric_structure(&module, &env, &[], &z, 1e-6), declared);
            }
        }
    }
}
