// tandem_core/src/types.rs

use nalgebra::{DMatrix, DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

// --- Core Type Aliases ---
pub type Control = Vector2<f64>;
pub type Position = Vector2<f64>;

/// Number of scalar entries describing one ego state row: x, y, heading, vx, vy.
pub const STATE_DIM: usize = 5;
/// Number of control inputs per time step for every supported agent.
pub const CONTROL_DIM: usize = 2;

// --- Core Identifier ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ped_{}", self.0)
    }
}

/// The kinematic state of one agent at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentState {
    pub position: Position,
    pub heading: f64,
    pub velocity: Vector2<f64>,
    pub time: f64,
}

impl AgentState {
    /// Builds a state whose heading is derived from the velocity direction.
    pub fn new(position: Position, velocity: Vector2<f64>, time: f64) -> Self {
        Self {
            position,
            heading: heading_of(&velocity, 0.0),
            velocity,
            time,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Row layout used by `Trajectory::to_matrix`: [x, y, heading, vx, vy].
    pub fn to_row(&self) -> [f64; STATE_DIM] {
        [
            self.position.x,
            self.position.y,
            self.heading,
            self.velocity.x,
            self.velocity.y,
        ]
    }
}

/// Heading of a velocity vector, falling back to `previous` for a (nearly) resting agent.
pub fn heading_of(velocity: &Vector2<f64>, previous: f64) -> f64 {
    if velocity.norm_squared() < 1e-12 {
        previous
    } else {
        velocity.y.atan2(velocity.x)
    }
}

/// An ordered sequence of time-stamped states spaced by a fixed `dt`.
///
/// The first state is always the current (fixed) state of the agent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    pub states: Vec<AgentState>,
}

impl Trajectory {
    pub fn new(states: Vec<AgentState>) -> Self {
        Self { states }
    }

    /// Number of control steps covered, i.e. one less than the number of states.
    pub fn horizon(&self) -> usize {
        self.states.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn first(&self) -> Option<&AgentState> {
        self.states.first()
    }

    pub fn last(&self) -> Option<&AgentState> {
        self.states.last()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.states.iter().map(|s| s.position)
    }

    /// Checks that the trajectory has `horizon + 1` states with strictly increasing time stamps.
    pub fn validate(&self, horizon: usize) -> Result<(), PlannerError> {
        if self.states.len() != horizon + 1 {
            return Err(PlannerError::MalformedInput(format!(
                "expected a trajectory of {} states, got {}",
                horizon + 1,
                self.states.len()
            )));
        }
        if self.states.windows(2).any(|w| w[1].time <= w[0].time) {
            return Err(PlannerError::MalformedInput(
                "trajectory time stamps must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Dense `(T+1) x 5` representation, mostly useful for reports and debugging.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.states.len(), STATE_DIM, |r, c| self.states[r].to_row()[c])
    }

    /// Flattened positions and velocities `[x, y, vx, vy]` per state, the layout of `dx_du` rows.
    pub fn kinematic_vector(&self) -> DVector<f64> {
        let mut out = DVector::zeros(self.states.len() * 4);
        for (t, s) in self.states.iter().enumerate() {
            out[4 * t] = s.position.x;
            out[4 * t + 1] = s.position.y;
            out[4 * t + 2] = s.velocity.x;
            out[4 * t + 3] = s.velocity.y;
        }
        out
    }
}

/// Packs a control sequence into the flat optimization vector layout `[u0x, u0y, u1x, ...]`.
pub fn controls_to_vector(controls: &[Control]) -> DVector<f64> {
    DVector::from_iterator(
        controls.len() * CONTROL_DIM,
        controls.iter().flat_map(|u| [u.x, u.y]),
    )
}

/// Inverse of `controls_to_vector`. The vector length must be a multiple of `CONTROL_DIM`.
pub fn vector_to_controls(z: &DVector<f64>) -> Vec<Control> {
    z.as_slice()
        .chunks_exact(CONTROL_DIM)
        .map(|c| Control::new(c[0], c[1]))
        .collect()
}
