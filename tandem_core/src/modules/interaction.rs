// tandem_core/src/modules/interaction.rs

use nalgebra::Vector2;

use crate::agents::EgoGraph;
use crate::autodiff::{sum, Dual64, Vec2};
use crate::constants::NORM_EPS;
use crate::environment::{Environment, Forecast, ModeForecast};
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::AgentId;

/// Which pedestrian quantity the interaction objective compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionQuantity {
    Position,
    Velocity,
    Acceleration,
}

/// Disturbance of the pedestrians by the ego.
///
/// Compares, per pedestrian, mode and future step, the forecast conditioned on the candidate ego
/// trajectory with the unconditioned forecast (ego parked far away) and accumulates the
/// Euclidean distance of the chosen quantity, weighted by the mode probability.
#[derive(Debug)]
pub struct InteractionModule<'e> {
    env: &'e Environment,
    quantity: InteractionQuantity,
    horizon: usize,
    weight: f64,
    baseline: Forecast,
}

impl<'e> InteractionModule<'e> {
    pub fn new(
        env: &'e Environment,
        quantity: InteractionQuantity,
        horizon: usize,
        weight: f64,
    ) -> Result<Self, PlannerError> {
        env.ego_or_err()?;
        Ok(Self {
            env,
            quantity,
            horizon,
            weight,
            baseline: env.predict_unconditioned(horizon)?,
        })
    }

    fn conditioned(&self, mode: &ModeForecast<Vec2>, k: usize) -> Vec2 {
        match self.quantity {
            InteractionQuantity::Position => mode.positions[k],
            InteractionQuantity::Velocity => mode.velocities[k],
            InteractionQuantity::Acceleration => {
                (mode.velocities[k] - mode.velocities[k - 1]) * (1.0 / self.env.dt())
            }
        }
    }

    fn unconditioned(&self, mode: &ModeForecast<Vector2<f64>>, k: usize) -> Vector2<f64> {
        match self.quantity {
            InteractionQuantity::Position => mode.positions[k],
            InteractionQuantity::Velocity => mode.velocities[k],
            InteractionQuantity::Acceleration => {
                (mode.velocities[k] - mode.velocities[k - 1]) / self.env.dt()
            }
        }
    }
}

impl OptimizationModule for InteractionModule<'_> {
    fn name(&self) -> &'static str {
        match self.quantity {
            InteractionQuantity::Position => "interaction_pos",
            InteractionQuantity::Velocity => "interaction_vel",
            InteractionQuantity::Acceleration => "interaction_acc",
        }
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Objective
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn objective_core(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> Option<Dual64> {
        if ids.is_empty() || self.env.num_ghosts() == 0 {
            return None;
        }
        let positions = ego.positions();
        let forecast = self
            .env
            .predict_graph(Some(&positions), self.horizon, ids)
            .ok()?;

        let mut terms = Vec::new();
        for pedestrian in &forecast {
            let baseline = self.baseline.iter().find(|b| b.id == pedestrian.id)?;
            for (mode, reference) in pedestrian.modes.iter().zip(baseline.modes.iter()) {
                for k in 1..=self.horizon {
                    let difference = self.conditioned(mode, k) - &self.unconditioned(reference, k);
                    terms.push(difference.norm(NORM_EPS) * reference.weight);
                }
            }
        }
        sum(terms.into_iter())
    }

    fn gradient_condition(&self) -> bool {
        self.env.is_differentiable_wrt_ego()
    }
}
