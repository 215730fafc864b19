// tandem_core/src/agents/graph.rs

use nalgebra::DVector;

use crate::agents::AgentDynamics;
use crate::autodiff::dual::seed;
use crate::autodiff::Vec2;
use crate::types::{heading_of, AgentState, Trajectory, CONTROL_DIM};

/// An agent state with dual-number kinematics. The heading is plain: it follows the velocity
/// direction and is never differentiated.
#[derive(Debug, Clone, Copy)]
pub struct GraphState {
    pub position: Vec2,
    pub heading: f64,
    pub velocity: Vec2,
    pub time: f64,
}

impl GraphState {
    pub fn constant(state: &AgentState) -> Self {
        Self {
            position: Vec2::constant(&state.position),
            heading: state.heading,
            velocity: Vec2::constant(&state.velocity),
            time: state.time,
        }
    }

    pub fn value(&self) -> AgentState {
        AgentState {
            position: self.position.value(),
            heading: self.heading,
            velocity: self.velocity.value(),
            time: self.time,
        }
    }

    /// Heading of `velocity`, keeping the current heading while (nearly) at rest.
    pub fn heading_towards(&self, velocity: &Vec2) -> f64 {
        heading_of(&velocity.value(), self.heading)
    }
}

#[derive(Debug, Clone)]
struct ControlSource<'a> {
    dynamics: &'a dyn AgentDynamics,
    initial: AgentState,
    z: DVector<f64>,
}

/// The ego trajectory in dual numbers.
///
/// A graph built from a control vector can be re-rolled with one control seeded
/// ([`EgoGraph::seeded`]), which carries the derivative w.r.t. that control through everything
/// computed from the states. A graph built from a plain trajectory has no controls to seed.
#[derive(Debug, Clone)]
pub struct EgoGraph<'a> {
    pub states: Vec<GraphState>,
    pub dt: f64,
    source: Option<ControlSource<'a>>,
}

impl<'a> EgoGraph<'a> {
    /// Forward-integrates `dynamics` from the fixed `initial` state through the controls in `z`.
    pub fn from_controls(dynamics: &'a dyn AgentDynamics, initial: &AgentState, z: &DVector<f64>, dt: f64) -> Self {
        let source = ControlSource {
            dynamics,
            initial: *initial,
            z: z.clone(),
        };
        Self {
            states: source.roll(None, dt),
            dt,
            source: Some(source),
        }
    }

    pub fn from_trajectory(trajectory: &Trajectory, dt: f64) -> Self {
        Self {
            states: trajectory.states.iter().map(GraphState::constant).collect(),
            dt,
            source: None,
        }
    }

    /// The same trajectory with a unit derivative on control entry `direction`.
    pub fn seeded(&self, direction: usize) -> Option<EgoGraph<'a>> {
        let source = self.source.as_ref().filter(|s| direction < s.z.len())?;
        Some(Self {
            states: source.roll(Some(direction), self.dt),
            dt: self.dt,
            source: Some(source.clone()),
        })
    }

    pub fn horizon(&self) -> usize {
        self.states.len().saturating_sub(1)
    }

    pub fn trajectory(&self) -> Trajectory {
        Trajectory::new(self.states.iter().map(GraphState::value).collect())
    }

    /// Number of differentiable inputs, the length of the control vector.
    pub fn num_leaves(&self) -> usize {
        self.source.as_ref().map_or(0, |s| s.z.len())
    }

    pub fn has_leaves(&self) -> bool {
        self.num_leaves() > 0
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.states.iter().map(|s| s.position).collect()
    }
}

impl ControlSource<'_> {
    fn roll(&self, direction: Option<usize>, dt: f64) -> Vec<GraphState> {
        let controls: Vec<Vec2> = seed(&self.z, direction)
            .chunks_exact(CONTROL_DIM)
            .map(|u| Vec2::new(u[0], u[1]))
            .collect();
        let mut current = GraphState::constant(&self.initial);
        let mut states = Vec::with_capacity(controls.len() + 1);
        states.push(current);
        for control in &controls {
            current = self.dynamics.dynamics_graph(&current, control, dt);
            states.push(current);
        }
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{DoubleIntegrator, SingleIntegrator};
    use crate::types::Position;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;

    #[test]
    fn test_seeded_rollout_matches_sensitivity() {
        let dynamics = DoubleIntegrator::default();
        let initial = AgentState::new(Position::new(1.0, -1.0), Vector2::new(0.2, 0.0), 0.0);
        let z = DVector::from_vec(vec![0.5, -0.3, 1.0, 0.2, -0.4, 0.1]);
        let dt = 0.4;
        let graph = EgoGraph::from_controls(&dynamics, &initial, &z, dt);
        let dx_du = dynamics.dx_du(3, dt);
        for j in 0..z.len() {
            let seeded = graph.seeded(j).unwrap();
            assert_abs_diff_eq!(seeded.trajectory().states[3].position, graph.trajectory().states[3].position);
            for (k, state) in seeded.states.iter().enumerate() {
                assert_abs_diff_eq!(state.position.tangent().x, dx_du[(4 * k, j)], epsilon = 1e-12);
                assert_abs_diff_eq!(state.velocity.tangent().y, dx_du[(4 * k + 3, j)], epsilon = 1e-12);
            }
        }
        assert!(graph.seeded(z.len()).is_none());
    }

    #[test]
    fn test_trajectory_graph_has_no_leaves() {
        let dynamics = SingleIntegrator::default();
        let initial = AgentState::new(Position::zeros(), Vector2::zeros(), 0.0);
        let controls = [Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)];
        let trajectory = dynamics.unroll_trajectory(&initial, &controls, 0.5);
        let graph = EgoGraph::from_trajectory(&trajectory, 0.5);
        assert!(!graph.has_leaves());
        assert!(graph.seeded(0).is_none());
        assert_eq!(graph.trajectory(), trajectory);
    }
}
