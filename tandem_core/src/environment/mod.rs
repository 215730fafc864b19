// tandem_core/src/environment/mod.rs

//! The prediction environment: the ego, the pedestrians and the behavior model that forecasts
//! how the pedestrians react to a candidate ego trajectory.

pub mod behavior;
pub mod forecast;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agents::AgentDynamics;
use crate::autodiff::Vec2;
use crate::constants::{PEDESTRIAN_SPEED_MAX, PSEUDO_EGO_POSITION};
use crate::error::PlannerError;
use crate::types::{AgentId, AgentState, Control, Position, Trajectory};

pub use behavior::{BehaviorConfig, BehaviorModel};
pub use forecast::{forecast_values, Forecast, GraphForecast, ModeForecast, PedestrianForecast};

// =========================================================================
// == Agents ==
// =========================================================================

/// Parameters of one behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeParams {
    /// Probability of the mode, normalized per pedestrian on insertion.
    pub weight: f64,
    /// Desired speed (social forces) or repulsion strength (potential field).
    pub v0: f64,
    /// Interaction range.
    pub sigma: f64,
}

impl Default for ModeParams {
    fn default() -> Self {
        Self {
            weight: 1.0,
            v0: crate::constants::SOCIAL_FORCES_V0_DEFAULT,
            sigma: crate::constants::SOCIAL_FORCES_SIGMA_DEFAULT,
        }
    }
}

/// Behavior parameters handed to [`Environment::add_pedestrian`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorParams {
    pub goal: Option<Position>,
    /// Behavior modes. Empty means "use the model's defaults".
    pub modes: Vec<ModeParams>,
}

/// One behavior-mode instance of a pedestrian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ghost {
    pub agent: AgentId,
    pub mode: usize,
    pub weight: f64,
    pub params: ModeParams,
}

#[derive(Debug, Clone)]
pub struct Pedestrian {
    pub id: AgentId,
    pub state: AgentState,
    pub goal: Option<Position>,
    pub history: Vec<AgentState>,
    pub modes: Vec<ModeParams>,
}

impl Pedestrian {
    pub fn new(id: AgentId, state: AgentState, goal: Option<Position>, modes: Vec<ModeParams>) -> Self {
        Self {
            id,
            state,
            goal,
            history: vec![state],
            modes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ego {
    pub dynamics: Box<dyn AgentDynamics>,
    pub state: AgentState,
    pub history: Vec<AgentState>,
}

#[derive(Debug, Clone)]
struct BaselineCache {
    horizon: usize,
    forecast: Forecast,
}

// =========================================================================
// == Environment ==
// =========================================================================

/// Owns the scene and answers prediction queries.
///
/// `Clone` (and [`Environment::copy`]) produce fully independent deep copies; the behavior
/// model and the ego dynamics are cloned through `dyn-clone`.
#[derive(Debug, Clone)]
pub struct Environment {
    dt: f64,
    time: f64,
    ego: Option<Ego>,
    pedestrians: Vec<Pedestrian>,
    model: Box<dyn BehaviorModel>,
    next_id: u32,
    baseline_horizon: Option<usize>,
    baseline: Option<BaselineCache>,
}

impl Environment {
    pub fn new(model: Box<dyn BehaviorModel>, dt: f64) -> Self {
        assert!(dt > 0.0, "time step must be positive");
        Self {
            dt,
            time: 0.0,
            ego: None,
            pedestrians: Vec::new(),
            model,
            next_id: 0,
            baseline_horizon: None,
            baseline: None,
        }
    }

    // --- Scene construction ---

    /// Places the ego, replacing a previous one.
    pub fn set_ego(&mut self, dynamics: Box<dyn AgentDynamics>, position: Position, velocity: Vector2<f64>) {
        let state = AgentState::new(position, velocity, self.time);
        self.ego = Some(Ego {
            dynamics,
            state,
            history: vec![state],
        });
        self.invalidate();
    }

    /// Adds a pedestrian and returns its unique id.
    ///
    /// Mode weights must be non-negative and are normalized to sum to one. Single-modal models
    /// keep only the most likely mode.
    pub fn add_pedestrian(
        &mut self,
        position: Position,
        velocity: Vector2<f64>,
        history: Option<Vec<AgentState>>,
        params: BehaviorParams,
    ) -> Result<AgentId, PlannerError> {
        let mut modes = if params.modes.is_empty() {
            self.model.default_modes()
        } else {
            params.modes
        };
        if modes.iter().any(|m| !(m.weight >= 0.0) || !(m.sigma > 0.0)) {
            return Err(PlannerError::MalformedInput(
                "mode weights must be non-negative and interaction ranges positive".to_string(),
            ));
        }
        let total: f64 = modes.iter().map(|m| m.weight).sum();
        if total <= 0.0 {
            return Err(PlannerError::MalformedInput(
                "mode weights must not all be zero".to_string(),
            ));
        }
        if !self.model.is_multi_modal() && modes.len() > 1 {
            let best = modes
                .iter()
                .copied()
                .fold(modes[0], |a, b| if b.weight > a.weight { b } else { a });
            modes = vec![best];
        }
        let total: f64 = modes.iter().map(|m| m.weight).sum();
        for mode in &mut modes {
            mode.weight /= total;
        }

        let id = AgentId(self.next_id);
        self.next_id += 1;
        let state = AgentState::new(position, velocity, self.time);
        let mut pedestrian = Pedestrian::new(id, state, params.goal, modes);
        if let Some(mut past) = history {
            past.push(state);
            pedestrian.history = past;
        }
        self.pedestrians.push(pedestrian);
        self.invalidate();
        Ok(id)
    }

    // --- Queries ---

    /// Current ego state (if any) and pedestrian states in insertion order.
    pub fn states(&self) -> (Option<AgentState>, Vec<AgentState>) {
        (
            self.ego.as_ref().map(|e| e.state),
            self.pedestrians.iter().map(|p| p.state).collect(),
        )
    }

    pub fn ego(&self) -> Option<&Ego> {
        self.ego.as_ref()
    }

    pub fn ego_or_err(&self) -> Result<&Ego, PlannerError> {
        self.ego.as_ref().ok_or(PlannerError::MissingEgo)
    }

    pub fn pedestrians(&self) -> &[Pedestrian] {
        &self.pedestrians
    }

    pub fn pedestrian(&self, id: AgentId) -> Option<&Pedestrian> {
        self.pedestrians.iter().find(|p| p.id == id)
    }

    pub fn pedestrian_ids(&self) -> Vec<AgentId> {
        self.pedestrians.iter().map(|p| p.id).collect()
    }

    pub fn num_pedestrians(&self) -> usize {
        self.pedestrians.len()
    }

    pub fn num_ghosts(&self) -> usize {
        self.pedestrians.iter().map(|p| p.modes.len()).sum()
    }

    pub fn num_modes(&self, id: AgentId) -> Option<usize> {
        self.pedestrian(id).map(|p| p.modes.len())
    }

    pub fn ghosts(&self) -> Vec<Ghost> {
        self.pedestrians
            .iter()
            .flat_map(|p| {
                p.modes.iter().enumerate().map(move |(mode, params)| Ghost {
                    agent: p.id,
                    mode,
                    weight: params.weight,
                    params: *params,
                })
            })
            .collect()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn behavior(&self) -> &dyn BehaviorModel {
        self.model.as_ref()
    }

    pub fn is_deterministic(&self) -> bool {
        self.model.is_deterministic()
    }

    pub fn is_multi_modal(&self) -> bool {
        self.model.is_multi_modal()
    }

    pub fn is_differentiable_wrt_ego(&self) -> bool {
        self.model.is_differentiable_wrt_ego()
    }

    /// Fails with `MalformedInput` if any id is unknown or listed twice.
    pub fn check_ids(&self, ids: &[AgentId]) -> Result<(), PlannerError> {
        for (i, id) in ids.iter().enumerate() {
            if self.pedestrian(*id).is_none() {
                return Err(PlannerError::MalformedInput(format!("unknown pedestrian {id}")));
            }
            if ids[..i].contains(id) {
                return Err(PlannerError::MalformedInput(format!("pedestrian {id} listed twice")));
            }
        }
        Ok(())
    }

    // --- Prediction ---

    /// Forecast of the `ids` pedestrians in dual numbers.
    ///
    /// With `ego = Some(positions)` (exactly `horizon + 1` of them) the forecast is conditioned on
    /// that ego path. With `None` the ego is replaced by a pseudo-ego parked far outside the
    /// scene, which keeps the model inputs identical while removing any influence.
    pub fn predict_graph(
        &self,
        ego: Option<&[Vec2]>,
        horizon: usize,
        ids: &[AgentId],
    ) -> Result<GraphForecast, PlannerError> {
        self.check_ids(ids)?;
        let pseudo;
        let ego = match ego {
            Some(positions) => {
                if positions.len() != horizon + 1 {
                    return Err(PlannerError::MalformedInput(format!(
                        "conditioning ego path has {} positions, expected {}",
                        positions.len(),
                        horizon + 1
                    )));
                }
                positions
            }
            None => {
                let far = Vector2::new(PSEUDO_EGO_POSITION[0], PSEUDO_EGO_POSITION[1]);
                pseudo = vec![Vec2::constant(&far); horizon + 1];
                &pseudo[..]
            }
        };
        let all = self.model.rollout(&self.pedestrians, ego, horizon, self.dt);
        Ok(ids
            .iter()
            .filter_map(|id| all.iter().find(|f| f.id == *id).cloned())
            .collect())
    }

    /// Numeric forecast of all pedestrians, conditioned on `ego` or unconditioned for `None`.
    pub fn predict(&self, ego: Option<&Trajectory>, horizon: usize) -> Result<Forecast, PlannerError> {
        let positions: Option<Vec<Vec2>> =
            ego.map(|trajectory| trajectory.positions().map(|p| Vec2::constant(&p)).collect());
        let forecast = self.predict_graph(positions.as_deref(), horizon, &self.pedestrian_ids())?;
        Ok(forecast_values(&forecast))
    }

    /// The unconditioned forecast, served from the cache built by [`Environment::detach`] when
    /// the horizon matches.
    pub fn predict_unconditioned(&self, horizon: usize) -> Result<Forecast, PlannerError> {
        match &self.baseline {
            Some(cache) if cache.horizon == horizon => Ok(cache.forecast.clone()),
            _ => self.predict(None, horizon),
        }
    }

    /// Registers the horizon for which the unconditioned forecast is cached and builds it.
    pub fn prepare_baseline(&mut self, horizon: usize) -> Result<(), PlannerError> {
        self.baseline_horizon = Some(horizon);
        self.detach()
    }

    /// Drops every derived prediction state and rebuilds it from the current numeric state.
    pub fn detach(&mut self) -> Result<(), PlannerError> {
        self.baseline = None;
        if let Some(horizon) = self.baseline_horizon {
            let forecast = self.predict(None, horizon)?;
            self.baseline = Some(BaselineCache { horizon, forecast });
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.baseline = None;
    }

    // --- Mutation ---

    /// Advances the scene by one step: the ego applies `control` (clipped to its limits) and every
    /// pedestrian follows its mode-averaged one-step forecast conditioned on the ego motion.
    ///
    /// # Returns
    /// The next pedestrian states (insertion order) and the next ego state.
    pub fn step(&mut self, control: &Control) -> Result<(Vec<AgentState>, AgentState), PlannerError> {
        let ego = self.ego.as_ref().ok_or(PlannerError::MissingEgo)?;
        let control = ego.dynamics.clamp_control(control);
        let ego_next = ego.dynamics.dynamics(&ego.state, &control, self.dt);

        let path = [Vec2::constant(&ego.state.position), Vec2::constant(&ego_next.position)];
        let forecast = forecast_values(&self.model.rollout(&self.pedestrians, &path, 1, self.dt));

        let next_time = self.time + self.dt;
        for (ped, prediction) in self.pedestrians.iter_mut().zip(forecast.iter()) {
            let mut velocity = prediction.mean_velocity(1);
            let speed = velocity.norm();
            if speed > PEDESTRIAN_SPEED_MAX {
                velocity *= PEDESTRIAN_SPEED_MAX / speed;
            }
            let position = ped.state.position + velocity * self.dt;
            ped.state = AgentState {
                position,
                heading: crate::types::heading_of(&velocity, ped.state.heading),
                velocity,
                time: next_time,
            };
            ped.history.push(ped.state);
        }

        if let Some(ego) = self.ego.as_mut() {
            ego.state = ego_next;
            ego.history.push(ego_next);
        }
        self.time = next_time;
        self.invalidate();
        debug!(time = self.time, "environment stepped");

        Ok((self.states().1, ego_next))
    }

    /// Force-sets the ego and/or pedestrian states, e.g. to replay a counterfactual.
    pub fn step_reset(
        &mut self,
        ego_state: Option<AgentState>,
        pedestrian_states: Option<Vec<AgentState>>,
    ) -> Result<(), PlannerError> {
        if let Some(states) = &pedestrian_states {
            if states.len() != self.pedestrians.len() {
                return Err(PlannerError::MalformedInput(format!(
                    "got {} pedestrian states for {} pedestrians",
                    states.len(),
                    self.pedestrians.len()
                )));
            }
        }
        if let Some(state) = ego_state {
            let ego = self.ego.as_mut().ok_or(PlannerError::MissingEgo)?;
            ego.state = state;
            ego.history.push(state);
            self.time = state.time;
        }
        if let Some(states) = pedestrian_states {
            for (ped, state) in self.pedestrians.iter_mut().zip(states) {
                ped.state = state;
                ped.history.push(state);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// An independent deep copy of the environment.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SingleIntegrator;
    use crate::environment::behavior::{PotentialField, SocialForces};
    use approx::assert_abs_diff_eq;

    fn scene() -> Environment {
        let mut env = Environment::new(Box::new(PotentialField), 0.4);
        env.set_ego(Box::new(SingleIntegrator::default()), Position::new(-5.0, 0.0), Vector2::zeros());
        env.add_pedestrian(Position::new(0.0, 0.0), Vector2::new(-1.0, 0.0), None, BehaviorParams::default())
            .unwrap();
        env
    }

    #[test]
    fn test_copy_is_independent() {
        let env = scene();
        let before = env.states();
        let mut copy = env.copy();
        copy.step(&Control::new(1.0, 0.0)).unwrap();

        let after = env.states();
        assert_eq!(before.0, after.0);
        assert_eq!(before.1, after.1);
        assert_ne!(copy.states().0, after.0);
        assert_ne!(copy.states().1, after.1);
    }

    #[test]
    fn test_first_prediction_is_current_state() {
        let env = scene();
        let forecast = env.predict(None, 4).unwrap();
        assert_eq!(forecast.len(), 1);
        let mode = &forecast[0].modes[0];
        assert_eq!(mode.positions.len(), 5);
        assert_abs_diff_eq!(mode.positions[0], Position::new(0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_mode_weights_are_normalized() {
        let mut env = Environment::new(Box::new(SocialForces::default()), 0.4);
        let params = BehaviorParams {
            goal: None,
            modes: vec![
                ModeParams { weight: 3.0, v0: 1.0, sigma: 1.0 },
                ModeParams { weight: 1.0, v0: 2.0, sigma: 1.0 },
            ],
        };
        let id = env.add_pedestrian(Position::zeros(), Vector2::zeros(), None, params).unwrap();
        let weights: Vec<f64> = env.ghosts().iter().filter(|g| g.agent == id).map(|g| g.weight).collect();
        assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(weights[0], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_weights_and_ids() {
        let mut env = scene();
        let params = BehaviorParams {
            goal: None,
            modes: vec![ModeParams { weight: -1.0, v0: 1.0, sigma: 1.0 }],
        };
        assert!(env.add_pedestrian(Position::zeros(), Vector2::zeros(), None, params).is_err());
        assert!(env.predict_graph(None, 3, &[AgentId(42)]).is_err());
    }

    #[test]
    fn test_conditioned_prediction_differs_when_ego_is_close() {
        let env = scene();
        let horizon = 3;
        let close: Trajectory = Trajectory::new(
            (0..=horizon)
                .map(|k| AgentState::new(Position::new(-0.5, -0.2), Vector2::zeros(), k as f64 * 0.4))
                .collect(),
        );
        let conditioned = env.predict(Some(&close), horizon).unwrap();
        let unconditioned = env.predict_unconditioned(horizon).unwrap();
        let d = (conditioned[0].modes[0].positions[horizon] - unconditioned[0].modes[0].positions[horizon]).norm();
        assert!(d > 1e-3);
    }

    #[test]
    fn test_step_reset_and_detach() {
        let mut env = scene();
        env.prepare_baseline(3).unwrap();
        let cached = env.predict_unconditioned(3).unwrap();
        let moved = AgentState::new(Position::new(1.0, 1.0), Vector2::zeros(), 0.0);
        env.step_reset(None, Some(vec![moved])).unwrap();
        env.detach().unwrap();
        let rebuilt = env.predict_unconditioned(3).unwrap();
        assert_abs_diff_eq!(rebuilt[0].modes[0].positions[0], Position::new(1.0, 1.0), epsilon = 1e-12);
        assert!((cached[0].modes[0].positions[0] - rebuilt[0].modes[0].positions[0]).norm() > 0.5);
        assert!(env.step_reset(None, Some(vec![])).is_err());
    }
}
