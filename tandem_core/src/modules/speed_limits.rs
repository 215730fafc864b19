// tandem_core/src/modules/speed_limits.rs

use nalgebra::DMatrix;

use crate::agents::{DynamicsKind, EgoGraph};
use crate::autodiff::Dual64;
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::{AgentId, Trajectory};

/// Per-axis box constraint on every velocity of the ego trajectory.
///
/// Outputs are ordered `[vx_0, vy_0, vx_1, vy_1, ...]` and normalized by the speed limit.
#[derive(Debug)]
pub struct SpeedLimitModule {
    speed_max: f64,
    limits: (f64, f64),
    horizon: usize,
    jacobian: DMatrix<f64>,
    structure: Vec<usize>,
}

/// Row-major non-zeros of `d v / d z`. The initial velocity is fixed, so its two rows are empty.
/// A single integrator's velocity at step `k` is its control `k - 1`; a double integrator's
/// accumulates every earlier control on the same axis.
fn velocity_structure(kind: DynamicsKind, horizon: usize) -> Vec<usize> {
    let n = 2 * horizon;
    let mut structure = Vec::new();
    for k in 1..=horizon {
        for axis in 0..2 {
            let row = 2 * k + axis;
            let first = match kind {
                DynamicsKind::SingleIntegrator => k - 1,
                DynamicsKind::DoubleIntegrator => 0,
            };
            structure.extend((first..k).map(|j| row * n + 2 * j + axis));
        }
    }
    structure
}

impl SpeedLimitModule {
    pub fn new(env: &Environment, horizon: usize) -> Result<Self, PlannerError> {
        let ego = env.ego_or_err()?;
        let dx_du = ego.dynamics.dx_du(horizon, env.dt());
        let jacobian = DMatrix::from_fn(2 * (horizon + 1), 2 * horizon, |r, c| {
            dx_du[(4 * (r / 2) + 2 + r % 2, c)]
        });
        Ok(Self {
            speed_max: ego.dynamics.speed_max(),
            limits: ego.dynamics.speed_limits(),
            horizon,
            structure: velocity_structure(ego.dynamics.kind(), horizon),
            jacobian,
        })
    }
}

impl OptimizationModule for SpeedLimitModule {
    fn name(&self) -> &'static str {
        "speed_limits"
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
        Some(ego.states.iter().flat_map(|s| [s.velocity.x, s.velocity.y]).collect())
    }

    fn jacobian_analytic(&self, _trajectory: &Trajectory, _ids: &[AgentId]) -> Option<DMatrix<f64>> {
        Some(self.jacobian.clone())
    }

    fn jacobian_structure(&self, _ids: &[AgentId]) -> Option<Vec<usize>> {
        Some(self.structure.clone())
    }

    fn constraint_limits(&self) -> (Option<f64>, Option<f64>) {
        (Some(self.limits.0), Some(self.limits.1))
    }

    fn num_constraints(&self, _ids: &[AgentId]) -> usize {
        2 * (self.horizon + 1)
    }

    fn normalize(&self, x: f64) -> f64 {
        x / self.speed_max
    }

    fn gradient_condition(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentDynamics, DoubleIntegrator, SingleIntegrator};
    use crate::modules::test_utils;
    use crate::session::SessionLog;
    use crate::types::{AgentState, Position};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;

    #[test]
    fn test_declared_structure_matches_finite_differences() {
        let mut rng = test_utils::rng(11);
        for dynamics in [
            Box::new(SingleIntegrator::default()) as Box<dyn AgentDynamics>,
            Box::new(DoubleIntegrator::default()),
        ] {
            let env = test_utils::environment(dynamics, false);
            let ego = env.ego().unwrap();
            let module = SpeedLimitModule::new(&env, 4).unwrap();
            let declared = test_utils::declared_structure(&module, &[]);
            let n = 8;
            assert!(declared.iter().all(|&i| i >= 2 * n), "initial velocity rows must stay empty");
            for _ in 0..5 {
                let z = test_utils::random_controls(&mut rng, ego.dynamics.as_ref(), 4);
                assert_eq!(test_utils::numeric_structure(&module, &env, &[], &z, 1e-6), declared);

                let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, &z, env.dt());
                assert_eq!(module.jacobian(&graph, &[]).len(), module.num_constraints(&[]) * z.len());
                let autodiff = module.jacobian_autodiff(&graph, &[]).map(|j| module.normalize(j));
                let analytic = module.jacobian_matrix(&graph, &[]);
                assert!((autodiff - analytic).amax() < 1e-9);
            }
        }
    }

    #[test]
    fn test_structure_size_by_dynamics() {
        // H = 3: one entry per velocity row vs. the 2 * (1 + 2 + 3) of the accumulated sum.
        assert_eq!(velocity_structure(DynamicsKind::SingleIntegrator, 3).len(), 6);
        assert_eq!(velocity_structure(DynamicsKind::DoubleIntegrator, 3).len(), 12);
    }

    #[test]
    fn test_violation_of_single_overshoot() {
        let env = test_utils::environment(Box::new(DoubleIntegrator::default()), false);
        let module = SpeedLimitModule::new(&env, 2).unwrap();
        let v_max = env.ego().unwrap().dynamics.speed_max();
        let trajectory = Trajectory::new(vec![
            AgentState::new(Position::zeros(), Vector2::new(0.5, 0.0), 0.0),
            AgentState::new(Position::new(0.2, 0.0), Vector2::new(v_max + 0.1, 0.0), 0.4),
            AgentState::new(Position::new(1.0, 0.0), Vector2::new(1.0, -v_max), 0.8),
        ]);
        let graph = EgoGraph::from_trajectory(&trajectory, env.dt());
        let mut log = SessionLog::new();
        let values = module.constraint(&graph, &[], &mut log, "test");
        assert_eq!(values.len(), 6);
        assert_abs_diff_eq!(module.compute_violation(&graph, &[]), 0.1 / v_max, epsilon = 1e-12);
        assert!(log.last("test/inf_speed_limits").is_some());
    }
}
