// tandem_core/src/attention/mod.rs

//! Attention filters select the pedestrians that are relevant for the current planning step.
//!
//! Filters are pure functions of the scene: the same environment and ego trajectory always give
//! the same selection.

use std::fmt::Debug;

use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

use crate::constants::{ATTENTION_CLOSEST_K_DEFAULT, ATTENTION_EUCLIDEAN_RADIUS_DEFAULT};
use crate::environment::Environment;
use crate::types::{AgentId, Position, Trajectory};

pub trait Attention: DynClone + Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Selects the relevant pedestrians.
    ///
    /// # Arguments
    /// * `env`: The current scene.
    /// * `ego_trajectory`: The planned ego trajectory, if one exists already. Distance based
    ///   filters then measure against the closest point of the trajectory instead of the current
    ///   ego position.
    ///
    /// # Returns
    /// The selected ids, nearest first. Every pedestrian when the scene has no ego.
    fn select(&self, env: &Environment, ego_trajectory: Option<&Trajectory>) -> Vec<AgentId>;
}

dyn_clone::clone_trait_object!(Attention);

/// Pedestrians sorted by their distance to the ego (ties by id). `None` if there is no ego.
fn by_distance(env: &Environment, ego_trajectory: Option<&Trajectory>) -> Option<Vec<(AgentId, f64)>> {
    let ego = env.ego()?;
    let anchors: Vec<Position> = match ego_trajectory {
        Some(trajectory) if !trajectory.is_empty() => trajectory.positions().collect(),
        _ => vec![ego.state.position],
    };
    let mut distances: Vec<(AgentId, f64)> = env
        .pedestrians()
        .iter()
        .map(|ped| {
            let distance = anchors
                .iter()
                .map(|p| (p - ped.state.position).norm())
                .fold(f64::INFINITY, f64::min);
            (ped.id, distance)
        })
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    Some(distances)
}

/// Keeps every pedestrian.
#[derive(Debug, Clone, Default)]
pub struct AllPedestrians;

impl Attention for AllPedestrians {
    fn name(&self) -> &'static str {
        "all"
    }

    fn select(&self, env: &Environment, _ego_trajectory: Option<&Trajectory>) -> Vec<AgentId> {
        env.pedestrian_ids()
    }
}

/// The `k` pedestrians closest to the ego.
#[derive(Debug, Clone)]
pub struct ClosestK {
    pub k: usize,
}

impl Default for ClosestK {
    fn default() -> Self {
        Self {
            k: ATTENTION_CLOSEST_K_DEFAULT,
        }
    }
}

impl Attention for ClosestK {
    fn name(&self) -> &'static str {
        "closest_k"
    }

    fn select(&self, env: &Environment, ego_trajectory: Option<&Trajectory>) -> Vec<AgentId> {
        match by_distance(env, ego_trajectory) {
            Some(sorted) => sorted.into_iter().take(self.k).map(|(id, _)| id).collect(),
            None => env.pedestrian_ids(),
        }
    }
}

/// Every pedestrian within a fixed radius of the ego.
#[derive(Debug, Clone)]
pub struct EuclideanRadius {
    pub radius: f64,
}

impl Default for EuclideanRadius {
    fn default() -> Self {
        Self {
            radius: ATTENTION_EUCLIDEAN_RADIUS_DEFAULT,
        }
    }
}

impl Attention for EuclideanRadius {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn select(&self, env: &Environment, ego_trajectory: Option<&Trajectory>) -> Vec<AgentId> {
        match by_distance(env, ego_trajectory) {
            Some(sorted) => sorted
                .into_iter()
                .take_while(|(_, d)| *d <= self.radius)
                .map(|(id, _)| id)
                .collect(),
            None => env.pedestrian_ids(),
        }
    }
}

/// Every pedestrian inside the ego's forward-reachable disc over the horizon, around the
/// current ego position. The radius comes from the ego dynamics (control and speed limits);
/// a planned trajectory does not change the reachable set.
#[derive(Debug, Clone)]
pub struct Reachability {
    pub horizon: usize,
}

impl Attention for Reachability {
    fn name(&self) -> &'static str {
        "reachability"
    }

    fn select(&self, env: &Environment, _ego_trajectory: Option<&Trajectory>) -> Vec<AgentId> {
        let Some(ego) = env.ego() else {
            return env.pedestrian_ids();
        };
        let reach = ego.dynamics.reachability_radius(&ego.state, self.horizon, env.dt());
        match by_distance(env, None) {
            Some(sorted) => sorted
                .into_iter()
                .take_while(|(_, d)| *d <= reach)
                .map(|(id, _)| id)
                .collect(),
            None => env.pedestrian_ids(),
        }
    }
}

// =========================================================================
// == Configuration ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case", deny_unknown_fields)]
pub enum AttentionConfig {
    All,
    ClosestK {
        #[serde(default = "default_k")]
        k: usize,
    },
    Euclidean {
        #[serde(default = "default_radius")]
        radius: f64,
    },
    Reachability,
}

fn default_k() -> usize {
    ATTENTION_CLOSEST_K_DEFAULT
}

fn default_radius() -> f64 {
    ATTENTION_EUCLIDEAN_RADIUS_DEFAULT
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self::ClosestK {
            k: ATTENTION_CLOSEST_K_DEFAULT,
        }
    }
}

impl AttentionConfig {
    /// Builds the filter for a planner with the given horizon.
    pub fn build(&self, horizon: usize) -> Box<dyn Attention> {
        match self {
            Self::All => Box::new(AllPedestrians),
            Self::ClosestK { k } => Box::new(ClosestK { k: *k }),
            Self::Euclidean { radius } => Box::new(EuclideanRadius { radius: *radius }),
            Self::Reachability => Box::new(Reachability { horizon }),
        }
    }
}
