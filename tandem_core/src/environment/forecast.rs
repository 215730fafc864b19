// tandem_core/src/environment/forecast.rs

use nalgebra::Vector2;

use crate::autodiff::Vec2;
use crate::types::AgentId;

/// The predicted future of one behavior mode (ghost) of a pedestrian.
///
/// All sequences have `horizon + 1` entries, the first being the current state. Each position
/// is the mean of an isotropic Gaussian with the matching entry of `std_devs` (zero for
/// deterministic models).
#[derive(Debug, Clone)]
pub struct ModeForecast<V> {
    pub weight: f64,
    pub positions: Vec<V>,
    pub velocities: Vec<V>,
    pub std_devs: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PedestrianForecast<V> {
    pub id: AgentId,
    pub modes: Vec<ModeForecast<V>>,
}

/// Forecast in dual numbers, carrying the derivative w.r.t. the seeded ego control.
pub type GraphForecast = Vec<PedestrianForecast<Vec2>>;

/// Plain numeric forecast.
pub type Forecast = Vec<PedestrianForecast<Vector2<f64>>>;

impl PedestrianForecast<Vec2> {
    pub fn value(&self) -> PedestrianForecast<Vector2<f64>> {
        PedestrianForecast {
            id: self.id,
            modes: self
                .modes
                .iter()
                .map(|m| ModeForecast {
                    weight: m.weight,
                    positions: m.positions.iter().map(Vec2::value).collect(),
                    velocities: m.velocities.iter().map(Vec2::value).collect(),
                    std_devs: m.std_devs.clone(),
                })
                .collect(),
        }
    }
}

impl PedestrianForecast<Vector2<f64>> {
    /// Weight-averaged position of all modes at step `k`.
    pub fn mean_position(&self, k: usize) -> Vector2<f64> {
        self.modes
            .iter()
            .map(|m| m.positions[k] * m.weight)
            .sum()
    }

    /// Weight-averaged velocity of all modes at step `k`.
    pub fn mean_velocity(&self, k: usize) -> Vector2<f64> {
        self.modes
            .iter()
            .map(|m| m.velocities[k] * m.weight)
            .sum()
    }
}

/// Drops the derivative parts of a forecast.
pub fn forecast_values(forecast: &GraphForecast) -> Forecast {
    forecast.iter().map(PedestrianForecast::value).collect()
}

/// Log density of an isotropic 2D Gaussian.
pub fn gaussian_log_prob(x: &Vector2<f64>, mean: &Vector2<f64>, std_dev: f64) -> f64 {
    let var = std_dev * std_dev;
    -(2.0 * std::f64::consts::PI * var).ln() - (x - mean).norm_squared() / (2.0 * var)
}
