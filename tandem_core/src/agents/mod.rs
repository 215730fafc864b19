// tandem_core/src/agents/mod.rs

use std::fmt::Debug;

use dyn_clone::DynClone;
use nalgebra::{DMatrix, Matrix2x4, Matrix4, Matrix4x2, Vector2};
use serde::{Deserialize, Serialize};

use crate::autodiff::Vec2;
use crate::types::{AgentState, Control, Trajectory};

pub mod double_integrator;
pub mod graph;
pub mod single_integrator;

pub use double_integrator::DoubleIntegrator;
pub use graph::{EgoGraph, GraphState};
pub use single_integrator::SingleIntegrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsKind {
    SingleIntegrator,
    DoubleIntegrator,
}

/// A discrete-time kinematic model of a planar agent.
///
/// Both supported models are linear in `[x, y, vx, vy]`, which lets the analytic module
/// derivatives use the constant sensitivity matrix returned by [`AgentDynamics::dx_du`].
/// Heading is derived from the velocity direction and never differentiated analytically.
pub trait AgentDynamics: DynClone + Debug + Send + Sync {
    fn kind(&self) -> DynamicsKind;

    /// Maximal speed along each axis.
    fn speed_max(&self) -> f64;

    /// Maximal magnitude of each control entry.
    fn control_max(&self) -> f64;

    fn control_limits(&self) -> (f64, f64) {
        (-self.control_max(), self.control_max())
    }

    fn speed_limits(&self) -> (f64, f64) {
        (-self.speed_max(), self.speed_max())
    }

    /// Maps the current state and a control held for `dt` to the next state.
    fn dynamics(&self, state: &AgentState, control: &Control, dt: f64) -> AgentState;

    /// The control that moves the agent from `previous` to `state` within `dt`.
    fn inverse_dynamics(&self, state: &AgentState, previous: &AgentState, dt: f64) -> Control;

    /// [`AgentDynamics::dynamics`] in dual numbers.
    fn dynamics_graph(&self, state: &GraphState, control: &Vec2, dt: f64) -> GraphState;

    /// [`AgentDynamics::inverse_dynamics`] in dual numbers.
    fn inverse_dynamics_graph(&self, state: &GraphState, previous: &GraphState, dt: f64) -> Vec2;

    /// Discrete transition `[p; v]' = A [p; v] + B u`.
    fn transition(&self, dt: f64) -> (Matrix4<f64>, Matrix4x2<f64>);

    /// Inverse map `u = N [p; v]' + P [p; v]`, returned as `(N, P)`.
    fn inverse_transition(&self, dt: f64) -> (Matrix2x4<f64>, Matrix2x4<f64>);

    /// The control that steers towards `desired` velocity within one step, clipped to the limits.
    fn velocity_control(&self, state: &AgentState, desired: &Vector2<f64>, dt: f64) -> Control;

    /// Radius of the (conservative) disc reachable within `steps` steps of `dt`.
    fn reachability_radius(&self, state: &AgentState, steps: usize, dt: f64) -> f64;

    // --- Provided methods ---

    /// Clips a control to the per-axis limits.
    fn clamp_control(&self, control: &Control) -> Control {
        let (lo, hi) = self.control_limits();
        control.map(|c| c.clamp(lo, hi))
    }

    /// Forward-integrates `controls` from `initial`. The result has `controls.len() + 1` states.
    fn unroll_trajectory(&self, initial: &AgentState, controls: &[Control], dt: f64) -> Trajectory {
        let mut states = Vec::with_capacity(controls.len() + 1);
        let mut current = *initial;
        states.push(current);
        for u in controls {
            current = self.dynamics(&current, u, dt);
            states.push(current);
        }
        Trajectory::new(states)
    }

    /// Recovers the control sequence that generated `trajectory`.
    fn roll_trajectory(&self, trajectory: &Trajectory, dt: f64) -> Vec<Control> {
        trajectory
            .states
            .windows(2)
            .map(|w| self.inverse_dynamics(&w[1], &w[0], dt))
            .collect()
    }

    /// Sensitivity of the stacked `[x, y, vx, vy]` rows of a `horizon`-step trajectory w.r.t.
    /// the stacked controls: a `4 (T+1) x 2 T` matrix. The first block row is zero since the
    /// initial state is fixed.
    fn dx_du(&self, horizon: usize, dt: f64) -> DMatrix<f64> {
        let (a, b) = self.transition(dt);
        let mut out = DMatrix::zeros(4 * (horizon + 1), 2 * horizon);
        for k in 1..=horizon {
            for j in 0..k {
                let block = if j == k - 1 {
                    b
                } else {
                    a * out.fixed_view::<4, 2>(4 * (k - 1), 2 * j).into_owned()
                };
                out.fixed_view_mut::<4, 2>(4 * k, 2 * j).copy_from(&block);
            }
        }
        out
    }

    /// Jacobian of the stacked controls w.r.t. the stacked `[x, y, vx, vy]` trajectory rows:
    /// a `2 T x 4 (T+1)` matrix, the left-inverse companion of [`AgentDynamics::dx_du`].
    fn inverse_jacobian(&self, horizon: usize, dt: f64) -> DMatrix<f64> {
        let (next, prev) = self.inverse_transition(dt);
        let mut out = DMatrix::zeros(2 * horizon, 4 * (horizon + 1));
        for k in 0..horizon {
            out.fixed_view_mut::<2, 4>(2 * k, 4 * k).copy_from(&prev);
            out.fixed_view_mut::<2, 4>(2 * k, 4 * (k + 1)).copy_from(&next);
        }
        out
    }
}

dyn_clone::clone_trait_object!(AgentDynamics);

/// Builds a boxed dynamics model of the given kind with the default limits.
pub fn from_kind(kind: DynamicsKind) -> Box<dyn AgentDynamics> {
    match kind {
        DynamicsKind::SingleIntegrator => Box::new(SingleIntegrator::default()),
        DynamicsKind::DoubleIntegrator => Box::new(DoubleIntegrator::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{controls_to_vector, Position};
    use approx::assert_abs_diff_eq;

    fn check_dx_du_matches_unroll(dynamics: &dyn AgentDynamics) {
        let dt = 0.4;
        let initial = AgentState::new(Position::new(-1.0, 2.0), Vector2::new(0.3, -0.1), 0.0);
        let controls = vec![
            Control::new(0.5, -1.0),
            Control::new(1.2, 0.4),
            Control::new(-0.7, 0.9),
        ];
        let zero = vec![Control::zeros(); controls.len()];
        let free = dynamics.unroll_trajectory(&initial, &zero, dt).kinematic_vector();
        let full = dynamics.unroll_trajectory(&initial, &controls, dt).kinematic_vector();
        let predicted = free + dynamics.dx_du(controls.len(), dt) * controls_to_vector(&controls);
        assert_abs_diff_eq!(predicted, full, epsilon = 1e-12);
    }

    fn check_inverse_jacobian(dynamics: &dyn AgentDynamics) {
        let horizon = 4;
        let dt = 0.25;
        let product = dynamics.inverse_jacobian(horizon, dt) * dynamics.dx_du(horizon, dt);
        assert_abs_diff_eq!(product, DMatrix::identity(2 * horizon, 2 * horizon), epsilon = 1e-12);
    }

    #[test]
    fn test_dx_du_single_integrator() {
        check_dx_du_matches_unroll(&SingleIntegrator::default());
        check_inverse_jacobian(&SingleIntegrator::default());
    }

    #[test]
    fn test_dx_du_double_integrator() {
        check_dx_du_matches_unroll(&DoubleIntegrator::default());
        check_inverse_jacobian(&DoubleIntegrator::default());
    }

    #[test]
    fn test_roll_inverts_unroll() {
        for dynamics in [from_kind(DynamicsKind::SingleIntegrator), from_kind(DynamicsKind::DoubleIntegrator)] {
            let initial = AgentState::new(Position::new(0.0, 0.0), Vector2::new(0.5, 0.0), 0.0);
            let controls = vec![Control::new(0.2, 0.1), Control::new(-0.4, 0.3)];
            let trajectory = dynamics.unroll_trajectory(&initial, &controls, 0.5);
            let recovered = dynamics.roll_trajectory(&trajectory, 0.5);
            for (u, r) in controls.iter().zip(recovered.iter()) {
                assert_abs_diff_eq!(u, r, epsilon = 1e-12);
            }
        }
    }
}
