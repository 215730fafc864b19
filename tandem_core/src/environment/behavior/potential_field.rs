// tandem_core/src/environment/behavior/potential_field.rs

use crate::autodiff::{DualNum, Vec2};
use crate::constants::{NORM_EPS, POTENTIAL_FIELD_SIGMA_DEFAULT, POTENTIAL_FIELD_V0_DEFAULT};
use crate::environment::behavior::BehaviorModel;
use crate::environment::forecast::{GraphForecast, ModeForecast, PedestrianForecast};
use crate::environment::{ModeParams, Pedestrian};

/// Pedestrians drift with their current velocity and are pushed away from the ego.
///
/// Each ghost is a double integrator driven by the repulsive force
/// `v0 · exp(-d / σ) · (p - e) / d`, where `d` is the ego distance and `v0`, `σ` are the
/// ghost's mode parameters. Deterministic and differentiable w.r.t. the ego positions.
#[derive(Debug, Clone, Default)]
pub struct PotentialField;

impl BehaviorModel for PotentialField {
    fn name(&self) -> &'static str {
        "potential_field"
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn is_multi_modal(&self) -> bool {
        true
    }

    fn is_differentiable_wrt_ego(&self) -> bool {
        true
    }

    fn default_modes(&self) -> Vec<ModeParams> {
        vec![ModeParams {
            weight: 1.0,
            v0: POTENTIAL_FIELD_V0_DEFAULT,
            sigma: POTENTIAL_FIELD_SIGMA_DEFAULT,
        }]
    }

    fn rollout(&self, pedestrians: &[Pedestrian], ego: &[Vec2], horizon: usize, dt: f64) -> GraphForecast {
        pedestrians
            .iter()
            .map(|ped| PedestrianForecast {
                id: ped.id,
                modes: ped
                    .modes
                    .iter()
                    .map(|mode| {
                        let mut position = Vec2::constant(&ped.state.position);
                        let mut velocity = Vec2::constant(&ped.state.velocity);
                        let mut positions = Vec::with_capacity(horizon + 1);
                        let mut velocities = Vec::with_capacity(horizon + 1);
                        positions.push(position);
                        velocities.push(velocity);
                        for ego_position in ego.iter().take(horizon) {
                            let force = repulsion(&position, ego_position, mode.v0, mode.sigma);
                            velocity = velocity + force * dt;
                            position = position + velocity * dt;
                            positions.push(position);
                            velocities.push(velocity);
                        }
                        ModeForecast {
                            weight: mode.weight,
                            positions,
                            velocities,
                            std_devs: vec![0.0; horizon + 1],
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Exponentially decaying push of `position` away from `source`.
pub(crate) fn repulsion(position: &Vec2, source: &Vec2, v0: f64, sigma: f64) -> Vec2 {
    let delta = *position - *source;
    let distance = delta.norm(NORM_EPS);
    let magnitude = (distance * (-1.0 / sigma)).exp() * v0;
    delta.scale(magnitude / distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::{constant, Dual64};
    use crate::types::{AgentId, AgentState};
    use nalgebra::Vector2;

    fn pedestrian() -> Pedestrian {
        Pedestrian::new(
            AgentId(0),
            AgentState::new(Vector2::zeros(), Vector2::new(-1.0, 0.0), 0.0),
            None,
            PotentialField.default_modes(),
        )
    }

    #[test]
    fn test_closer_ego_pushes_harder() {
        let horizon = 2;
        let ped = pedestrian();
        let near = vec![Vec2::constant(&Vector2::new(0.0, -1.0)); horizon + 1];
        let far = vec![Vec2::constant(&Vector2::new(0.0, -3.0)); horizon + 1];
        let pushed_near = PotentialField.rollout(std::slice::from_ref(&ped), &near, horizon, 0.5);
        let pushed_far = PotentialField.rollout(std::slice::from_ref(&ped), &far, horizon, 0.5);
        let y_near = pushed_near[0].modes[0].positions[horizon].value().y;
        let y_far = pushed_far[0].modes[0].positions[horizon].value().y;
        assert!(y_near > y_far && y_far > 0.0);
    }

    #[test]
    fn test_gradient_decays_with_distance() {
        let horizon = 1;
        let mut gradients = Vec::new();
        for distance in [1.0, 2.0, 4.0] {
            let e = Vec2::new(constant(0.0), Dual64::new(-distance, 1.0));
            let ego = vec![e; horizon + 1];
            let forecast = PotentialField.rollout(&[pedestrian()], &ego, horizon, 0.5);
            gradients.push(forecast[0].modes[0].positions[horizon].y.eps.abs());
        }
        assert!(gradients[0] > gradients[1] && gradients[1] > gradients[2]);
    }

    #[test]
    fn test_ego_derivative_matches_finite_differences() {
        let horizon = 3;
        let h = 1e-6;
        let final_y = |ego_y: f64| {
            let ego = vec![Vec2::constant(&Vector2::new(0.5, ego_y)); horizon + 1];
            PotentialField.rollout(&[pedestrian()], &ego, horizon, 0.5)[0].modes[0].positions[horizon].y.re
        };
        let seeded = vec![Vec2::new(constant(0.5), Dual64::new(-1.5, 1.0)); horizon + 1];
        let forecast = PotentialField.rollout(&[pedestrian()], &seeded, horizon, 0.5);
        let numeric = (final_y(-1.5 + h) - final_y(-1.5 - h)) / (2.0 * h);
        assert!((forecast[0].modes[0].positions[horizon].y.eps - numeric).abs() < 1e-6);
    }
}
