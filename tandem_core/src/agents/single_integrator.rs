// tandem_core/src/agents/single_integrator.rs

use nalgebra::{Matrix2x4, Matrix4, Matrix4x2, Vector2};

use crate::agents::{AgentDynamics, DynamicsKind, GraphState};
use crate::autodiff::Vec2;
use crate::constants::ROBOT_SPEED_MAX;
use crate::types::{heading_of, AgentState, Control};

/// A velocity-controlled agent: the control is the velocity held over the next step.
///
/// `v' = u`, `p' = p + u dt`.
#[derive(Debug, Clone)]
pub struct SingleIntegrator {
    pub speed_max: f64,
}

impl Default for SingleIntegrator {
    fn default() -> Self {
        Self {
            speed_max: ROBOT_SPEED_MAX,
        }
    }
}

impl SingleIntegrator {
    pub fn new(speed_max: f64) -> Self {
        assert!(speed_max > 0.0, "speed limit must be positive");
        Self { speed_max }
    }
}

impl AgentDynamics for SingleIntegrator {
    fn kind(&self) -> DynamicsKind {
        DynamicsKind::SingleIntegrator
    }

    fn speed_max(&self) -> f64 {
        self.speed_max
    }

    fn control_max(&self) -> f64 {
        self.speed_max
    }

    fn dynamics(&self, state: &AgentState, control: &Control, dt: f64) -> AgentState {
        AgentState {
            position: state.position + control * dt,
            heading: heading_of(control, state.heading),
            velocity: *control,
            time: state.time + dt,
        }
    }

    fn inverse_dynamics(&self, state: &AgentState, previous: &AgentState, dt: f64) -> Control {
        (state.position - previous.position) / dt
    }

    fn dynamics_graph(&self, state: &GraphState, control: &Vec2, dt: f64) -> GraphState {
        GraphState {
            position: state.position + *control * dt,
            heading: state.heading_towards(control),
            velocity: *control,
            time: state.time + dt,
        }
    }

    fn inverse_dynamics_graph(&self, state: &GraphState, previous: &GraphState, dt: f64) -> Vec2 {
        (state.position - previous.position) * (1.0 / dt)
    }

    fn transition(&self, dt: f64) -> (Matrix4<f64>, Matrix4x2<f64>) {
        let mut a = Matrix4::zeros();
        a[(0, 0)] = 1.0;
        a[(1, 1)] = 1.0;
        let b = Matrix4x2::new(dt, 0.0, 0.0, dt, 1.0, 0.0, 0.0, 1.0);
        (a, b)
    }

    fn inverse_transition(&self, dt: f64) -> (Matrix2x4<f64>, Matrix2x4<f64>) {
        let inv = 1.0 / dt;
        let next = Matrix2x4::new(inv, 0.0, 0.0, 0.0, 0.0, inv, 0.0, 0.0);
        (next, -next)
    }

    fn velocity_control(&self, _state: &AgentState, desired: &Vector2<f64>, _dt: f64) -> Control {
        self.clamp_control(desired)
    }

    fn reachability_radius(&self, _state: &AgentState, steps: usize, dt: f64) -> f64 {
        self.speed_max * dt * steps as f64
    }
}
