// tandem_core/src/agents/double_integrator.rs

use nalgebra::{Matrix2x4, Matrix4, Matrix4x2, Vector2};

use crate::agents::{AgentDynamics, DynamicsKind, GraphState};
use crate::autodiff::Vec2;
use crate::constants::{ROBOT_ACC_MAX, ROBOT_SPEED_MAX};
use crate::types::{heading_of, AgentState, Control};

/// An acceleration-controlled agent.
///
/// `p' = p + v dt + ½ u dt²`, `v' = v + u dt`.
#[derive(Debug, Clone)]
pub struct DoubleIntegrator {
    pub speed_max: f64,
    pub acceleration_max: f64,
}

impl Default for DoubleIntegrator {
    fn default() -> Self {
        Self {
            speed_max: ROBOT_SPEED_MAX,
            acceleration_max: ROBOT_ACC_MAX,
        }
    }
}

impl DoubleIntegrator {
    pub fn new(speed_max: f64, acceleration_max: f64) -> Self {
        assert!(speed_max > 0.0, "speed limit must be positive");
        assert!(acceleration_max > 0.0, "acceleration limit must be positive");
        Self {
            speed_max,
            acceleration_max,
        }
    }
}

impl AgentDynamics for DoubleIntegrator {
    fn kind(&self) -> DynamicsKind {
        DynamicsKind::DoubleIntegrator
    }

    fn speed_max(&self) -> f64 {
        self.speed_max
    }

    fn control_max(&self) -> f64 {
        self.acceleration_max
    }

    fn dynamics(&self, state: &AgentState, control: &Control, dt: f64) -> AgentState {
        let velocity = state.velocity + control * dt;
        AgentState {
            position: state.position + state.velocity * dt + control * (0.5 * dt * dt),
            heading: heading_of(&velocity, state.heading),
            velocity,
            time: state.time + dt,
        }
    }

    fn inverse_dynamics(&self, state: &AgentState, previous: &AgentState, dt: f64) -> Control {
        (state.velocity - previous.velocity) / dt
    }

    fn dynamics_graph(&self, state: &GraphState, control: &Vec2, dt: f64) -> GraphState {
        let velocity = state.velocity + *control * dt;
        GraphState {
            position: state.position + state.velocity * dt + *control * (0.5 * dt * dt),
            heading: state.heading_towards(&velocity),
            velocity,
            time: state.time + dt,
        }
    }

    fn inverse_dynamics_graph(&self, state: &GraphState, previous: &GraphState, dt: f64) -> Vec2 {
        (state.velocity - previous.velocity) * (1.0 / dt)
    }

    fn transition(&self, dt: f64) -> (Matrix4<f64>, Matrix4x2<f64>) {
        let mut a = Matrix4::identity();
        a[(0, 2)] = dt;
        a[(1, 3)] = dt;
        let h = 0.5 * dt * dt;
        let b = Matrix4x2::new(h, 0.0, 0.0, h, dt, 0.0, 0.0, dt);
        (a, b)
    }

    fn inverse_transition(&self, dt: f64) -> (Matrix2x4<f64>, Matrix2x4<f64>) {
        let inv = 1.0 / dt;
        let next = Matrix2x4::new(0.0, 0.0, inv, 0.0, 0.0, 0.0, 0.0, inv);
        (next, -next)
    }

    fn velocity_control(&self, state: &AgentState, desired: &Vector2<f64>, dt: f64) -> Control {
        let (v_min, v_max) = self.speed_limits();
        let target = desired.map(|v| v.clamp(v_min, v_max));
        self.clamp_control(&((target - state.velocity) / dt))
    }

    fn reachability_radius(&self, state: &AgentState, steps: usize, dt: f64) -> f64 {
        let tau = dt * steps as f64;
        let accelerating = state.speed() * tau + 0.5 * self.acceleration_max * tau * tau;
        accelerating.min(self.speed_max * std::f64::consts::SQRT_2 * tau)
    }
}
