// tandem_core/src/modules/probability.rs

use std::f64::consts::PI;

use crate::agents::EgoGraph;
use crate::autodiff::{log_sum_exp, sum, Dual64};
use crate::constants::NORM_EPS;
use crate::environment::{Environment, Forecast};
use crate::error::PlannerError;
use crate::modules::{ModuleKind, OptimizationModule};
use crate::types::AgentId;

/// Negative log-likelihood of the unconditioned pedestrian means under the Gaussian mixture
/// predicted conditioned on the candidate ego trajectory:
///
/// ```text
/// -Σ_m w_m Σ_k log Σ_j ŵ_j N(μ_{m,k}; μ̂_{j,k}(z), σ̂_{j,k}²)
/// ```
///
/// Hatted quantities come from the conditioned forecast. The objective is small when the ego
/// leaves the pedestrians doing what they would have done anyway. Only defined for
/// probabilistic behavior models.
#[derive(Debug)]
pub struct InteractionProbabilityModule<'e> {
    env: &'e Environment,
    horizon: usize,
    weight: f64,
    baseline: Forecast,
}

impl<'e> InteractionProbabilityModule<'e> {
    pub fn new(env: &'e Environment, horizon: usize, weight: f64) -> Result<Self, PlannerError> {
        env.ego_or_err()?;
        Ok(Self {
            env,
            horizon,
            weight,
            baseline: env.predict_unconditioned(horizon)?,
        })
    }
}

impl OptimizationModule for InteractionProbabilityModule<'_> {
    fn name(&self) -> &'static str {
        "interaction_prob"
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
        if ids.is_empty() || self.env.is_deterministic() {
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
            for reference in &baseline.modes {
                for k in 1..=self.horizon {
                    let components: Vec<Dual64> = pedestrian
                        .modes
                        .iter()
                        .filter(|component| component.weight > 0.0)
                        .map(|component| {
                            let variance = component.std_devs[k].max(NORM_EPS).powi(2);
                            let offset = component.positions[k] - &reference.positions[k];
                            offset.norm_squared() * (-0.5 / variance)
                                + (component.weight.ln() - (2.0 * PI * variance).ln())
                        })
                        .collect();
                    terms.push(log_sum_exp(&components)? * -reference.weight);
                }
            }
        }
        sum(terms.into_iter())
    }

    fn gradient_condition(&self) -> bool {
        self.env.is_differentiable_wrt_ego()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::DoubleIntegrator;
    use crate::autodiff::finite_diff;
    use crate::environment::forecast::gaussian_log_prob;
    use crate::modules::test_utils;
    use crate::session::SessionLog;
    use crate::types::Position;
    use approx::assert_abs_diff_eq;
    use nalgebra::{DVector, Vector2};

    fn evaluate(module: &InteractionProbabilityModule<'_>, env: &Environment, z: &DVector<f64>) -> f64 {
        let ego = env.ego().unwrap();
        let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, z, env.dt());
        module.objective(&graph, &env.pedestrian_ids(), &mut SessionLog::new(), "test")
    }

    #[test]
    fn test_undisturbed_pedestrians_score_the_mixture_likelihood() {
        let mut env = test_utils::environment(Box::new(DoubleIntegrator::default()), true);
        env.set_ego(Box::new(DoubleIntegrator::default()), Position::new(900.0, 900.0), Vector2::zeros());
        let module = InteractionProbabilityModule::new(&env, 3, 1.0).unwrap();
        let value = evaluate(&module, &env, &DVector::zeros(6));

        let baseline = env.predict_unconditioned(3).unwrap();
        let mut expected = 0.0;
        for pedestrian in &baseline {
            for mode in &pedestrian.modes {
                for k in 1..=3 {
                    let likelihood: f64 = pedestrian
                        .modes
                        .iter()
                        .map(|c| c.weight * gaussian_log_prob(&mode.positions[k], &c.positions[k], c.std_devs[k]).exp())
                        .sum();
                    expected -= mode.weight * likelihood.ln();
                }
            }
        }
        assert_abs_diff_eq!(value, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_close_ego_scores_baseline_means_under_conditioned_mixture() {
        let env = test_utils::environment(Box::new(DoubleIntegrator::default()), true);
        let ego = env.ego().unwrap();
        let module = InteractionProbabilityModule::new(&env, 3, 1.0).unwrap();
        let z = DVector::from_vec(vec![2.0, 0.5, 2.0, 0.5, 2.0, 0.5]);
        let value = evaluate(&module, &env, &z);

        let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, &z, env.dt());
        let conditioned = env.predict(Some(&graph.trajectory()), 3).unwrap();
        let baseline = env.predict_unconditioned(3).unwrap();
        let mut expected = 0.0;
        for (mixture, reference) in conditioned.iter().zip(baseline.iter()) {
            assert_eq!(mixture.id, reference.id);
            for mode in &reference.modes {
                for k in 1..=3 {
                    let likelihood: f64 = mixture
                        .modes
                        .iter()
                        .map(|c| c.weight * gaussian_log_prob(&mode.positions[k], &c.positions[k], c.std_devs[k]).exp())
                        .sum();
                    expected -= mode.weight * likelihood.ln();
                }
            }
        }
        assert!(expected.is_finite());
        assert_abs_diff_eq!(value, expected, epsilon = 1e-6 * (1.0 + expected.abs()));
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let mut rng = test_utils::rng(9);
        let env = test_utils::environment(Box::new(DoubleIntegrator::default()), true);
        let ego = env.ego().unwrap();
        let module = InteractionProbabilityModule::new(&env, 3, 1.0).unwrap();
        let z = test_utils::random_controls(&mut rng, ego.dynamics.as_ref(), 3);
        let graph = EgoGraph::from_controls(ego.dynamics.as_ref(), &ego.state, &z, env.dt());
        let autodiff = module.gradient_autodiff(&graph, &env.pedestrian_ids());
        let numeric = finite_diff::gradient(|x| evaluate(&module, &env, x), &z);
        assert!((autodiff - &numeric).amax() < 0.01 * (1.0 + numeric.amax()));
    }

    #[test]
    fn test_deterministic_model_contributes_nothing() {
        let env = test_utils::environment(Box::new(DoubleIntegrator::default()), false);
        let module = InteractionProbabilityModule::new(&env, 3, 1.0).unwrap();
        assert_eq!(evaluate(&module, &env, &DVector::from_element(6, 0.3)), 0.0);
    }
}
