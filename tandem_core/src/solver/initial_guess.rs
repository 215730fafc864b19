// tandem_core/src/solver/initial_guess.rs

use nalgebra::{DVector, Vector2};

use crate::agents::AgentDynamics;
use crate::types::{controls_to_vector, AgentState, Position};

/// Lateral offset of the swerving guesses at the midpoint between ego and goal, in meters.
const SWERVE_OFFSET: f64 = 2.0;

/// Shape of an initial guess path from the ego to the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessShape {
    Straight,
    SwerveLeft,
    SwerveRight,
}

impl GuessShape {
    pub const ALL: [GuessShape; 3] = [Self::Straight, Self::SwerveLeft, Self::SwerveRight];

    fn offset(self) -> f64 {
        match self {
            Self::Straight => 0.0,
            Self::SwerveLeft => SWERVE_OFFSET,
            Self::SwerveRight => -SWERVE_OFFSET,
        }
    }
}

/// The polyline `start -> (midpoint + lateral offset) -> goal`.
fn waypoints(start: &Position, goal: &Position, shape: GuessShape) -> Vec<Position> {
    let direction = goal - start;
    let normal = if direction.norm() > 1e-9 {
        Vector2::new(-direction.y, direction.x) / direction.norm()
    } else {
        Vector2::new(0.0, 1.0)
    };
    let midpoint = start + direction * 0.5 + normal * shape.offset();
    vec![*start, midpoint, *goal]
}

/// Points spaced `spacing` apart along `polyline`, starting one spacing after its first vertex
/// and stopping at its last vertex.
fn resample(polyline: &[Position], spacing: f64, count: usize) -> Vec<Position> {
    let mut points = Vec::with_capacity(count);
    let mut segment = 0;
    let mut travelled_in_segment = 0.0;
    for _ in 0..count {
        let mut remaining = spacing;
        loop {
            let Some(end) = polyline.get(segment + 1) else {
                break;
            };
            let begin = polyline[segment];
            let length = (end - begin).norm();
            if travelled_in_segment + remaining <= length {
                travelled_in_segment += remaining;
                break;
            }
            remaining -= length - travelled_in_segment;
            segment += 1;
            travelled_in_segment = 0.0;
        }
        let point = match polyline.get(segment + 1) {
            Some(end) => {
                let begin = polyline[segment];
                let length = (end - begin).norm();
                if length > 1e-12 {
                    begin + (end - begin) * (travelled_in_segment / length)
                } else {
                    begin
                }
            }
            None => polyline[polyline.len() - 1],
        };
        points.push(point);
    }
    points
}

/// Control sequence that tracks `shape` from `initial` towards `goal` at the maximal speed.
pub fn initial_guess(
    dynamics: &dyn AgentDynamics,
    initial: &AgentState,
    goal: &Position,
    horizon: usize,
    dt: f64,
    shape: GuessShape,
) -> DVector<f64> {
    let path = waypoints(&initial.position, goal, shape);
    let targets = resample(&path, dynamics.speed_max() * dt, horizon);
    let mut state = *initial;
    let controls: Vec<_> = targets
        .iter()
        .map(|target| {
            let desired = (target - state.position) / dt;
            let control = dynamics.velocity_control(&state, &desired, dt);
            state = dynamics.dynamics(&state, &control, dt);
            control
        })
        .collect();
    controls_to_vector(&controls)
}

/// One guess per shape: the straight line, plus the two swerves when `multi_start` is set.
pub fn initial_guesses(
    dynamics: &dyn AgentDynamics,
    initial: &AgentState,
    goal: &Position,
    horizon: usize,
    dt: f64,
    multi_start: bool,
) -> Vec<(GuessShape, DVector<f64>)> {
    let shapes: &[GuessShape] = if multi_start {
        &GuessShape::ALL
    } else {
        &GuessShape::ALL[..1]
    };
    shapes
        .iter()
        .map(|shape| (*shape, initial_guess(dynamics, initial, goal, horizon, dt, *shape)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{DoubleIntegrator, SingleIntegrator};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_straight_guess_moves_towards_goal() {
        let dynamics = SingleIntegrator::default();
        let initial = AgentState::new(Position::zeros(), Vector2::zeros(), 0.0);
        let z = initial_guess(&dynamics, &initial, &Position::new(10.0, 0.0), 3, 0.5, GuessShape::Straight);
        assert_eq!(z.len(), 6);
        for k in 0..3 {
            assert_abs_diff_eq!(z[2 * k], dynamics.speed_max(), epsilon = 1e-9);
            assert_abs_diff_eq!(z[2 * k + 1], 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_guess_stops_at_goal() {
        let dynamics = SingleIntegrator::default();
        let initial = AgentState::new(Position::zeros(), Vector2::zeros(), 0.0);
        let goal = Position::new(1.0, 0.0);
        let z = initial_guess(&dynamics, &initial, &goal, 5, 0.5, GuessShape::Straight);
        let trajectory = dynamics.unroll_trajectory(&initial, &crate::types::vector_to_controls(&z), 0.5);
        assert_abs_diff_eq!(trajectory.last().unwrap().position, goal, epsilon = 1e-9);
    }

    #[test]
    fn test_swerves_leave_the_line_on_opposite_sides() {
        let dynamics = DoubleIntegrator::default();
        let initial = AgentState::new(Position::zeros(), Vector2::zeros(), 0.0);
        let guesses = initial_guesses(&dynamics, &initial, &Position::new(6.0, 0.0), 6, 0.4, true);
        assert_eq!(guesses.len(), 3);
        let lateral: Vec<f64> = guesses
            .iter()
            .map(|(_, z)| {
                let controls = crate::types::vector_to_controls(z);
                dynamics.unroll_trajectory(&initial, &controls, 0.4).last().unwrap().position.y
            })
            .collect();
        assert_abs_diff_eq!(lateral[0], 0.0, epsilon = 1e-9);
        assert!(lateral[1] > 0.1);
        assert!(lateral[2] < -0.1);
        assert_eq!(initial_guesses(&dynamics, &initial, &Position::new(6.0, 0.0), 6, 0.4, false).len(), 1);
    }
}
