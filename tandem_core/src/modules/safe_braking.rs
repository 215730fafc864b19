// tandem_core/src/modules/safe_braking.rs

use nalgebra::{DMatrix, Vector2};

use crate::agents::{DynamicsKind, EgoGraph};
use crate::autodiff::Dual64;
use crate::constants::{NORM_EPS, PEDESTRIAN_SPEED_MAX, SAFE_BRAKING_MARGIN};
use crate::environment::{Environment, Forecast};
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::{AgentId, Trajectory};

/// Keeps the ego able to brake to a stop before any pedestrian could reach it.
///
/// For every pedestrian and future step the margin
///
/// ```text
/// |p_k - q_k| - s_k² / (2 a) - v_ped · s_k / a
/// ```
///
/// must stay above [`SAFE_BRAKING_MARGIN`], where `s_k` is the ego speed, `a` its maximal
/// deceleration, `q_k` the unconditioned mean pedestrian position and `v_ped` the maximal
/// pedestrian speed. The braking distance is only defined for acceleration-controlled egos.
#[derive(Debug)]
pub struct SafeBrakingModule {
    horizon: usize,
    deceleration: f64,
    baseline: Forecast,
    dx_du: DMatrix<f64>,
}

impl SafeBrakingModule {
    pub fn new(env: &Environment, horizon: usize) -> Result<Self, PlannerError> {
        let ego = env.ego_or_err()?;
        if ego.dynamics.kind() != DynamicsKind::DoubleIntegrator {
            return Err(PlannerError::InfeasibleConfiguration {
                module: "safe_braking".to_string(),
                reason: "braking distance requires double integrator ego dynamics".to_string(),
            });
        }
        Ok(Self {
            horizon,
            deceleration: ego.dynamics.control_max(),
            baseline: env.predict_unconditioned(horizon)?,
            dx_du: ego.dynamics.dx_du(horizon, env.dt()),
        })
    }

    fn pedestrian_positions(&self, id: AgentId) -> Option<Vec<Vector2<f64>>> {
        self.baseline
            .iter()
            .find(|f| f.id == id)
            .map(|f| (0..=self.horizon).map(|k| f.mean_position(k)).collect())
    }
}

impl OptimizationModule for SafeBrakingModule {
    fn name(&self) -> &'static str {
        "safe_braking"
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
        let a = self.deceleration;
        let mut outputs = Vec::with_capacity(ids.len() * self.horizon);
        for id in ids {
            let pedestrian = self.pedestrian_positions(*id)?;
            for k in 1..=self.horizon {
                let state = &ego.states[k];
                let distance = (state.position - &pedestrian[k]).norm(NORM_EPS);
                let speed = state.velocity.smooth_norm(NORM_EPS);
                outputs.push(distance - speed * speed * (0.5 / a) - speed * (PEDESTRIAN_SPEED_MAX / a));
            }
        }
        Some(outputs)
    }

    fn jacobian_analytic(&self, trajectory: &Trajectory, ids: &[AgentId]) -> Option<DMatrix<f64>> {
        if trajectory.len() != self.horizon + 1 {
            return None;
        }
        let a = self.deceleration;
        let mut d_margin_dx = DMatrix::zeros(ids.len() * self.horizon, 4 * (self.horizon + 1));
        for (i, id) in ids.iter().enumerate() {
            let pedestrian = self.pedestrian_positions(*id)?;
            for k in 1..=self.horizon {
                let row = i * self.horizon + k - 1;
                let state = &trajectory.states[k];

                let offset = state.position - pedestrian[k];
                let distance = offset.norm();
                if distance > NORM_EPS {
                    d_margin_dx[(row, 4 * k)] = offset.x / distance;
                    d_margin_dx[(row, 4 * k + 1)] = offset.y / distance;
                }
                let speed = (state.velocity.norm_squared() + NORM_EPS * NORM_EPS).sqrt();
                let factor = -(1.0 / a + PEDESTRIAN_SPEED_MAX / (a * speed));
                d_margin_dx[(row, 4 * k + 2)] = factor * state.velocity.x;
                d_margin_dx[(row, 4 * k + 3)] = factor * state.velocity.y;
            }
        }
        Some(d_margin_dx * &self.dx_du)
    }

    /// Step `k` depends on the first `k` controls only.
    fn jacobian_structure(&self, ids: &[AgentId]) -> Option<Vec<usize>> {
        let n = 2 * self.horizon;
        let mut structure = Vec::new();
        for i in 0..ids.len() {
            for k in 1..=self.horizon {
                let row = i * self.horizon + k - 1;
                structure.extend((0..2 * k).map(|c| row * n + c));
            }
        }
        Some(structure)
    }

    fn constraint_limits(&self) -> (Option<f64>, Option<f64>) {
        (Some(SAFE_BRAKING_MARGIN), None)
    }

    fn num_constraints(&self, ids: &[AgentId]) -> usize {
        ids.len() * self.horizon
    }

    fn gradient_condition(&self) -> bool {
        true
    }
}
