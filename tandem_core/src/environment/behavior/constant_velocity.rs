// tandem_core/src/environment/behavior/constant_velocity.rs

use crate::autodiff::Vec2;
use crate::constants::{KALMAN_INITIAL_STD, KALMAN_PROCESS_NOISE};
use crate::environment::behavior::BehaviorModel;
use crate::environment::forecast::{GraphForecast, ModeForecast, PedestrianForecast};
use crate::environment::{ModeParams, Pedestrian};

/// Kalman-style constant velocity prediction.
///
/// The mean moves on a straight line, the position variance grows linearly in time with the
/// process noise (a random-walk covariance propagation `P' = P + Q dt`). The ego is ignored.
#[derive(Debug, Clone)]
pub struct ConstantVelocity {
    initial_std: f64,
    process_noise: f64,
}

impl Default for ConstantVelocity {
    fn default() -> Self {
        Self::new(KALMAN_INITIAL_STD, KALMAN_PROCESS_NOISE)
    }
}

impl ConstantVelocity {
    pub fn new(initial_std: f64, process_noise: f64) -> Self {
        assert!(initial_std > 0.0, "initial std must be positive");
        assert!(process_noise >= 0.0, "process noise must not be negative");
        Self {
            initial_std,
            process_noise,
        }
    }

    fn std_dev(&self, elapsed: f64) -> f64 {
        (self.initial_std * self.initial_std + self.process_noise * elapsed).sqrt()
    }
}

impl BehaviorModel for ConstantVelocity {
    fn name(&self) -> &'static str {
        "constant_velocity"
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn is_multi_modal(&self) -> bool {
        false
    }

    fn is_differentiable_wrt_ego(&self) -> bool {
        false
    }

    fn default_modes(&self) -> Vec<ModeParams> {
        vec![ModeParams::default()]
    }

    fn rollout(&self, pedestrians: &[Pedestrian], _ego: &[Vec2], horizon: usize, dt: f64) -> GraphForecast {
        pedestrians
            .iter()
            .map(|ped| {
                let velocity = Vec2::constant(&ped.state.velocity);
                let positions = (0..=horizon)
                    .map(|k| {
                        let p = ped.state.position + ped.state.velocity * (k as f64 * dt);
                        Vec2::constant(&p)
                    })
                    .collect();
                let std_devs = (0..=horizon).map(|k| self.std_dev(k as f64 * dt)).collect();
                PedestrianForecast {
                    id: ped.id,
                    modes: vec![ModeForecast {
                        weight: 1.0,
                        positions,
                        velocities: vec![velocity; horizon + 1],
                        std_devs,
                    }],
                }
            })
            .collect()
    }
}
