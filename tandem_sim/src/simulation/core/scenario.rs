// tandem_sim/src/simulation/core/scenario.rs

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use tandem_core::agents::{AgentDynamics, DoubleIntegrator, DynamicsKind, SingleIntegrator};
use tandem_core::environment::{BehaviorParams, Environment, ModeParams};
use tandem_core::types::Position;

use crate::error::SimError;
use crate::simulation::config::{EgoConfig, PedestrianConfig, ScenarioConfig};
use crate::simulation::core::prng::ScenarioRng;

/// Relative spread of sampled mode parameters around the model's default mode.
const MODE_PARAM_SPREAD: f64 = 0.2;
/// Sampled parameters never drop below this fraction of the default.
const MODE_PARAM_FLOOR: f64 = 0.2;

fn position(xy: [f64; 2]) -> Position {
    Position::new(xy[0], xy[1])
}

fn ego_dynamics(ego: &EgoConfig) -> Box<dyn AgentDynamics> {
    match ego.dynamics {
        DynamicsKind::SingleIntegrator => Box::new(SingleIntegrator::new(ego.speed_max)),
        DynamicsKind::DoubleIntegrator => {
            Box::new(DoubleIntegrator::new(ego.speed_max, ego.acceleration_max))
        }
    }
}

/// Draws `count` modes around `mean`. Weights are uniform in `[0.1, 1)` and normalized later by
/// the environment.
fn sample_modes(mean: &ModeParams, count: usize, rng: &mut ScenarioRng) -> Result<Vec<ModeParams>, SimError> {
    let spread = |value: f64| {
        Normal::new(value, value.abs() * MODE_PARAM_SPREAD)
            .map_err(|e| SimError::InvalidScenario(format!("cannot sample mode parameters: {e}")))
    };
    let v0 = spread(mean.v0)?;
    let sigma = spread(mean.sigma)?;
    Ok((0..count)
        .map(|_| ModeParams {
            weight: rng.0.gen_range(0.1..1.0),
            v0: v0.sample(&mut rng.0).max(mean.v0 * MODE_PARAM_FLOOR),
            sigma: sigma.sample(&mut rng.0).max(mean.sigma * MODE_PARAM_FLOOR),
        })
        .collect())
}

fn behavior_params(
    env: &Environment,
    ped: &PedestrianConfig,
    rng: &mut ScenarioRng,
) -> Result<BehaviorParams, SimError> {
    let modes = match ped.num_modes {
        Some(count) => {
            let defaults = env.behavior().default_modes();
            let mean = defaults.first().copied().unwrap_or_default();
            sample_modes(&mean, count, rng)?
        }
        None => ped.modes.clone(),
    };
    Ok(BehaviorParams {
        goal: ped.goal.map(position),
        modes,
    })
}

/// Builds the scene described by `config`.
///
/// # Returns
/// The environment and the ego goal.
pub fn build_environment(config: &ScenarioConfig, rng: &mut ScenarioRng) -> Result<(Environment, Position), SimError> {
    let mut env = Environment::new(config.environment.build(), config.simulation.dt);
    env.set_ego(
        ego_dynamics(&config.ego),
        position(config.ego.position),
        position(config.ego.velocity),
    );
    for ped in &config.pedestrians {
        let params = behavior_params(&env, ped, rng)?;
        let id = env.add_pedestrian(position(ped.position), position(ped.velocity), None, params)?;
        debug!(%id, modes = env.num_modes(id).unwrap_or(0), "pedestrian added");
    }
    Ok((env, position(config.ego.goal)))
}
