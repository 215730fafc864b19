// tandem_core/src/environment/behavior/mod.rs

use std::fmt::Debug;

use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

use crate::autodiff::Vec2;
use crate::environment::forecast::GraphForecast;
use crate::environment::{ModeParams, Pedestrian};

pub mod constant_velocity;
pub mod potential_field;
pub mod social_forces;

pub use constant_velocity::ConstantVelocity;
pub use potential_field::PotentialField;
pub use social_forces::SocialForces;

/// A pedestrian behavior model that predicts the future of every ghost in a scene.
///
/// Rollouts run in dual numbers, so a derivative seeded in the ego positions comes out of the
/// forecast for models that react to the ego.
pub trait BehaviorModel: DynClone + Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// `true` if the forecast carries no uncertainty (all std devs are zero).
    fn is_deterministic(&self) -> bool;

    /// `true` if the model honors several ghosts per pedestrian.
    fn is_multi_modal(&self) -> bool;

    /// `true` if predictions depend (differentiably) on the ego positions.
    fn is_differentiable_wrt_ego(&self) -> bool;

    /// Modes assigned to a pedestrian whose behavior parameters leave them unspecified.
    fn default_modes(&self) -> Vec<ModeParams>;

    /// Rolls out all pedestrians for `horizon` steps.
    ///
    /// # Arguments
    /// * `pedestrians`: The current scene, in environment order.
    /// * `ego`: Ego positions for every step, `horizon + 1` entries.
    ///
    /// # Returns
    /// One forecast per pedestrian in the same order as `pedestrians`.
    fn rollout(&self, pedestrians: &[Pedestrian], ego: &[Vec2], horizon: usize, dt: f64) -> GraphForecast;
}

dyn_clone::clone_trait_object!(BehaviorModel);

/// Serializable selection of a behavior model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case", deny_unknown_fields)]
pub enum BehaviorConfig {
    ConstantVelocity {
        #[serde(default = "default_initial_std")]
        initial_std: f64,
        #[serde(default = "default_process_noise")]
        process_noise: f64,
    },
    PotentialField,
    SocialForces,
}

fn default_initial_std() -> f64 {
    crate::constants::KALMAN_INITIAL_STD
}

fn default_process_noise() -> f64 {
    crate::constants::KALMAN_PROCESS_NOISE
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self::PotentialField
    }
}

impl BehaviorConfig {
    pub fn build(&self) -> Box<dyn BehaviorModel> {
        match self {
            Self::ConstantVelocity {
                initial_std,
                process_noise,
            } => Box::new(ConstantVelocity::new(*initial_std, *process_noise)),
            Self::PotentialField => Box::new(PotentialField),
            Self::SocialForces => Box::new(SocialForces::default()),
        }
    }
}
