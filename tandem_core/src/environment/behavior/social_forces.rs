// tandem_core/src/environment/behavior/social_forces.rs

use nalgebra::Vector2;

use crate::autodiff::Vec2;
use crate::constants::{
    NORM_EPS, POSITION_STD_GROWTH, SOCIAL_FORCES_GOAL_LOOKAHEAD, SOCIAL_FORCES_SIGMA_DEFAULT,
    SOCIAL_FORCES_TAU, SOCIAL_FORCES_V0_DEFAULT,
};
use crate::environment::behavior::potential_field::repulsion;
use crate::environment::behavior::BehaviorModel;
use crate::environment::forecast::{GraphForecast, ModeForecast, PedestrianForecast};
use crate::environment::{ModeParams, Pedestrian};

/// Helbing-style social forces with one ghost per behavior mode.
///
/// Every ghost relaxes towards its desired velocity `v0 · ê_goal` with time constant `τ` and is
/// repelled by the ego and by the (mode-weighted mean) positions of the other pedestrians.
/// Modes differ by desired speed `v0` and interaction range `σ`.
#[derive(Debug, Clone)]
pub struct SocialForces {
    pub tau: f64,
    /// Magnitude of the repulsive potential, shared by all modes.
    pub repulsion_strength: f64,
}

impl Default for SocialForces {
    fn default() -> Self {
        Self {
            tau: SOCIAL_FORCES_TAU,
            repulsion_strength: SOCIAL_FORCES_V0_DEFAULT,
        }
    }
}

/// Goal a pedestrian walks to: its own goal, or a point far ahead along its current heading.
fn walking_goal(ped: &Pedestrian) -> Vector2<f64> {
    ped.goal.unwrap_or_else(|| {
        let direction = if ped.state.velocity.norm() > NORM_EPS {
            ped.state.velocity.normalize()
        } else {
            Vector2::new(ped.state.heading.cos(), ped.state.heading.sin())
        };
        ped.state.position + direction * SOCIAL_FORCES_GOAL_LOOKAHEAD
    })
}

impl BehaviorModel for SocialForces {
    fn name(&self) -> &'static str {
        "social_forces"
    }

    fn is_deterministic(&self) -> bool {
        false
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
            v0: SOCIAL_FORCES_V0_DEFAULT,
            sigma: SOCIAL_FORCES_SIGMA_DEFAULT,
        }]
    }

    fn rollout(&self, pedestrians: &[Pedestrian], ego: &[Vec2], horizon: usize, dt: f64) -> GraphForecast {
        let goals: Vec<Vector2<f64>> = pedestrians.iter().map(walking_goal).collect();

        // (position, velocity) per pedestrian and mode, advanced in lock-step.
        let mut ghosts: Vec<Vec<(Vec2, Vec2)>> = pedestrians
            .iter()
            .map(|ped| {
                let start = (Vec2::constant(&ped.state.position), Vec2::constant(&ped.state.velocity));
                vec![start; ped.modes.len()]
            })
            .collect();
        let mut history: Vec<Vec<Vec<(Vec2, Vec2)>>> =
            ghosts.iter().map(|g| vec![g.clone()]).collect();

        for ego_position in ego.iter().take(horizon) {
            let crowd: Vec<Vec2> = pedestrians
                .iter()
                .zip(ghosts.iter())
                .map(|(ped, modes)| weighted_mean(ped, modes))
                .collect();

            let next: Vec<Vec<(Vec2, Vec2)>> = pedestrians
                .iter()
                .enumerate()
                .map(|(i, ped)| {
                    ped.modes
                        .iter()
                        .zip(ghosts[i].iter())
                        .map(|(mode, &(position, velocity))| {
                            let to_goal = Vec2::constant(&goals[i]) - position;
                            let direction = to_goal.div(to_goal.norm(NORM_EPS));
                            let desired = direction * mode.v0;
                            let mut force = (desired - velocity) * (1.0 / self.tau);
                            force = force + self.push(&position, ego_position, mode.sigma);
                            for (j, other) in crowd.iter().enumerate() {
                                if j != i {
                                    force = force + self.push(&position, other, mode.sigma);
                                }
                            }
                            let velocity = velocity + force * dt;
                            (position + velocity * dt, velocity)
                        })
                        .collect()
                })
                .collect();

            for (record, step) in history.iter_mut().zip(next.iter()) {
                record.push(step.clone());
            }
            ghosts = next;
        }

        pedestrians
            .iter()
            .zip(history)
            .map(|(ped, steps)| PedestrianForecast {
                id: ped.id,
                modes: ped
                    .modes
                    .iter()
                    .enumerate()
                    .map(|(m, mode)| ModeForecast {
                        weight: mode.weight,
                        positions: steps.iter().map(|s| s[m].0).collect(),
                        velocities: steps.iter().map(|s| s[m].1).collect(),
                        std_devs: (0..=horizon)
                            .map(|k| POSITION_STD_GROWTH * k as f64 * dt)
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }
}

impl SocialForces {
    fn push(&self, position: &Vec2, source: &Vec2, sigma: f64) -> Vec2 {
        repulsion(position, source, self.repulsion_strength / sigma, sigma)
    }
}

fn weighted_mean(ped: &Pedestrian, modes: &[(Vec2, Vec2)]) -> Vec2 {
    ped.modes
        .iter()
        .zip(modes)
        .map(|(mode, (position, _))| *position * mode.weight)
        .reduce(|acc, p| acc + p)
        .unwrap_or_else(|| Vec2::constant(&ped.state.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentId, AgentState};
    use approx::assert_abs_diff_eq;

    fn walker(id: u32, position: Vector2<f64>, goal: Vector2<f64>, modes: Vec<ModeParams>) -> Pedestrian {
        Pedestrian::new(
            AgentId(id),
            AgentState::new(position, Vector2::zeros(), 0.0),
            Some(goal),
            modes,
        )
    }

    #[test]
    fn test_walks_towards_goal_without_ego() {
        let ped = walker(0, Vector2::zeros(), Vector2::new(5.0, 0.0), SocialForces::default().default_modes());
        let far = vec![Vec2::constant(&Vector2::new(1e4, 1e4)); 6];
        let forecast = SocialForces::default().rollout(&[ped], &far, 5, 0.2);
        let mode = &forecast[0].modes[0];
        let last = mode.positions[5].value();
        assert!(last.x > 0.5);
        assert_abs_diff_eq!(last.y, 0.0, epsilon = 1e-6);
        assert_eq!(mode.std_devs[0], 0.0);
    }

    #[test]
    fn test_faster_mode_walks_further() {
        let modes = vec![
            ModeParams { weight: 0.5, v0: 0.5, sigma: 1.5 },
            ModeParams { weight: 0.5, v0: 2.0, sigma: 1.5 },
        ];
        let ped = walker(0, Vector2::zeros(), Vector2::new(10.0, 0.0), modes);
        let far = vec![Vec2::constant(&Vector2::new(1e4, 1e4)); 5];
        let forecast = SocialForces::default().rollout(&[ped], &far, 4, 0.4);
        let slow = forecast[0].modes[0].positions[4].value().x;
        let fast = forecast[0].modes[1].positions[4].value().x;
        assert!(fast > slow);
    }
}
