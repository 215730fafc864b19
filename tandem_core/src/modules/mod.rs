// tandem_core/src/modules/mod.rs

//! Objective and constraint modules of the trajectory optimization problem.
//!
//! Every module evaluates its value in dual numbers (`objective_core` / `constraint_core`).
//! Derivatives w.r.t. the ego controls come from an analytic implementation when the module
//! provides one and from one forward pass per control otherwise.

use std::fmt::Debug;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::agents::EgoGraph;
use crate::autodiff::dual::{forward_gradient, forward_jacobian};
use crate::autodiff::Dual64;
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::session::{LogKind, SessionLog};
use crate::types::{AgentId, Trajectory};

pub mod control_limits;
pub mod goal;
pub mod interaction;
pub mod min_distance;
pub mod probability;
pub mod safe_braking;
pub mod speed_limits;

pub use control_limits::ControlLimitModule;
pub use goal::{GoalNormModule, GoalWeightedModule};
pub use interaction::{InteractionModule, InteractionQuantity};
pub use min_distance::MinDistanceModule;
pub use probability::InteractionProbabilityModule;
pub use safe_braking::SafeBrakingModule;
pub use speed_limits::SpeedLimitModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Contributes to the objective only.
    Objective,
    /// Contributes constraint outputs only; its weight is ignored.
    Constraint,
    /// Contributes to both.
    Mixed,
}

impl ModuleKind {
    pub fn has_objective(self) -> bool {
        matches!(self, Self::Objective | Self::Mixed)
    }

    pub fn has_constraints(self) -> bool {
        matches!(self, Self::Constraint | Self::Mixed)
    }
}

/// The shared interface of all objective and constraint modules.
pub trait OptimizationModule: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ModuleKind;

    fn weight(&self) -> f64;

    fn horizon(&self) -> usize;

    // --- Core hooks ---

    /// Raw objective on the ego graph. `None` means "no contribution".
    fn objective_core(&self, _ego: &EgoGraph<'_>, _ids: &[AgentId]) -> Option<Dual64> {
        None
    }

    /// Raw constraint outputs on the ego graph. `None` means "no outputs".
    fn constraint_core(&self, _ego: &EgoGraph<'_>, _ids: &[AgentId]) -> Option<Vec<Dual64>> {
        None
    }

    /// Raw objective gradient w.r.t. the controls, if known in closed form.
    fn gradient_analytic(&self, _trajectory: &Trajectory, _ids: &[AgentId]) -> Option<DVector<f64>> {
        None
    }

    /// Raw constraint Jacobian w.r.t. the controls, if known in closed form.
    fn jacobian_analytic(&self, _trajectory: &Trajectory, _ids: &[AgentId]) -> Option<DMatrix<f64>> {
        None
    }

    /// Row-major flat indices of the structurally non-zero Jacobian entries, if declared.
    fn jacobian_structure(&self, _ids: &[AgentId]) -> Option<Vec<usize>> {
        None
    }

    /// Lower and upper bound of every constraint output, before normalization.
    fn constraint_limits(&self) -> (Option<f64>, Option<f64>) {
        (None, None)
    }

    fn num_constraints(&self, _ids: &[AgentId]) -> usize {
        0
    }

    /// Linear rescaling applied to values, derivatives and bounds alike.
    fn normalize(&self, x: f64) -> f64 {
        x
    }

    /// Whether back-propagating through the core can yield a non-zero derivative.
    fn gradient_condition(&self) -> bool;

    // --- Provided methods ---

    /// Normalized objective value, zero when the module does not contribute.
    fn objective(&self, ego: &EgoGraph<'_>, ids: &[AgentId], log: &mut SessionLog, tag: &str) -> f64 {
        let value = self
            .objective_core(ego, ids)
            .map_or(0.0, |v| self.normalize(v.re));
        log.record_scalar(tag, LogKind::Objective, self.name(), value);
        value
    }

    /// Normalized objective gradient w.r.t. the ego graph's controls.
    fn gradient(&self, ego: &EgoGraph<'_>, ids: &[AgentId], log: &mut SessionLog, tag: &str) -> DVector<f64> {
        let gradient = if ego.has_leaves() {
            match self.gradient_analytic(&ego.trajectory(), ids) {
                Some(raw) => raw.map(|g| self.normalize(g)),
                None => self.gradient_autodiff(ego, ids),
            }
        } else {
            DVector::zeros(0)
        };
        log.record_scalar(tag, LogKind::GradientNorm, self.name(), gradient.norm());
        gradient
    }

    /// Normalized objective gradient, one forward pass per control entry.
    fn gradient_autodiff(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> DVector<f64> {
        let n = ego.num_leaves();
        if !self.gradient_condition() {
            return DVector::zeros(n);
        }
        forward_gradient(n, |j| self.objective_core(&ego.seeded(j)?, ids)).map(|g| self.normalize(g))
    }

    /// Normalized constraint outputs, `num_constraints(ids)` of them.
    fn constraint(&self, ego: &EgoGraph<'_>, ids: &[AgentId], log: &mut SessionLog, tag: &str) -> DVector<f64> {
        let values = self.constraint_values(ego, ids);
        log.record_scalar(tag, LogKind::Violation, self.name(), self.violation_of(&values, ids));
        values
    }

    fn constraint_values(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> DVector<f64> {
        let values = match self.constraint_core(ego, ids) {
            Some(outputs) => DVector::from_iterator(outputs.len(), outputs.iter().map(|v| self.normalize(v.re))),
            None => DVector::zeros(0),
        };
        debug_assert_eq!(values.len(), self.num_constraints(ids), "{}", self.name());
        values
    }

    /// Normalized Jacobian, flattened row-major: `num_constraints x num_leaves` entries.
    fn jacobian(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> DVector<f64> {
        let jacobian = self.jacobian_matrix(ego, ids);
        DVector::from_column_slice(jacobian.transpose().as_slice())
    }

    /// Normalized Jacobian as a dense matrix.
    fn jacobian_matrix(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> DMatrix<f64> {
        let m = self.num_constraints(ids);
        let n = ego.num_leaves();
        if m == 0 || n == 0 {
            return DMatrix::zeros(m, n);
        }
        let raw = self
            .jacobian_analytic(&ego.trajectory(), ids)
            .unwrap_or_else(|| self.jacobian_autodiff(ego, ids));
        raw.map(|j| self.normalize(j))
    }

    /// Raw Jacobian, one forward pass (one column) per control entry.
    fn jacobian_autodiff(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> DMatrix<f64> {
        let n = ego.num_leaves();
        let m = self.num_constraints(ids);
        if !self.gradient_condition() {
            return DMatrix::zeros(m, n);
        }
        forward_jacobian(m, n, |j| self.constraint_core(&ego.seeded(j)?, ids))
    }

    /// Normalized lower and upper bounds broadcast to every output.
    fn constraint_bounds(&self, ids: &[AgentId]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let (lower, upper) = self.constraint_limits();
        let m = self.num_constraints(ids);
        (
            vec![lower.map(|l| self.normalize(l)); m],
            vec![upper.map(|u| self.normalize(u)); m],
        )
    }

    /// Sum of bound overshoots of the normalized constraint outputs.
    fn compute_violation(&self, ego: &EgoGraph<'_>, ids: &[AgentId]) -> f64 {
        let values = self.constraint_values(ego, ids);
        self.violation_of(&values, ids)
    }

    fn violation_of(&self, values: &DVector<f64>, ids: &[AgentId]) -> f64 {
        let (lower, upper) = self.constraint_bounds(ids);
        bound_violation(values.as_slice(), &lower, &upper)
    }
}

/// `Σ max(0, lower - x) + max(0, x - upper)` over all entries with a bound.
pub fn bound_violation(values: &[f64], lower: &[Option<f64>], upper: &[Option<f64>]) -> f64 {
    values
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(x, (lo, hi))| {
            lo.map_or(0.0, |lo| (lo - x).max(0.0)) + hi.map_or(0.0, |hi| (x - hi).max(0.0))
        })
        .sum()
}

/// Row-major flat indices of the non-zero entries of a dense matrix.
pub fn sparsity_pattern(matrix: &DMatrix<f64>) -> Vec<usize> {
    let n = matrix.ncols();
    (0..matrix.nrows())
        .flat_map(|r| (0..n).map(move |c| (r, c)))
        .filter(|&(r, c)| matrix[(r, c)] != 0.0)
        .map(|(r, c)| r * n + c)
        .collect()
}

// =========================================================================
// == Registry ==
// =========================================================================

/// The closed set of available modules, addressed by their string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleName {
    GoalNorm,
    GoalWeighted,
    InteractionPos,
    InteractionVel,
    InteractionAcc,
    InteractionProb,
    ControlLimits,
    SpeedLimits,
    MinDistance,
    SafeBraking,
}

impl ModuleName {
    pub const ALL: [ModuleName; 10] = [
        Self::GoalNorm,
        Self::GoalWeighted,
        Self::InteractionPos,
        Self::InteractionVel,
        Self::InteractionAcc,
        Self::InteractionProb,
        Self::ControlLimits,
        Self::SpeedLimits,
        Self::MinDistance,
        Self::SafeBraking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoalNorm => "goal_norm",
            Self::GoalWeighted => "goal_weighted",
            Self::InteractionPos => "interaction_pos",
            Self::InteractionVel => "interaction_vel",
            Self::InteractionAcc => "interaction_acc",
            Self::InteractionProb => "interaction_prob",
            Self::ControlLimits => "control_limits",
            Self::SpeedLimits => "speed_limits",
            Self::MinDistance => "min_distance",
            Self::SafeBraking => "safe_braking",
        }
    }

    /// Constructs the module for one solve session.
    ///
    /// # Errors
    /// `InfeasibleConfiguration` when the module's preconditions on the environment are not met,
    /// `MissingEgo` when the environment has no ego.
    pub fn build<'e>(
        self,
        env: &'e Environment,
        goal: Vector2<f64>,
        horizon: usize,
        weight: f64,
    ) -> Result<Box<dyn OptimizationModule + 'e>, PlannerError> {
        Ok(match self {
            Self::GoalNorm => Box::new(GoalNormModule::new(env, goal, horizon, weight)?),
            Self::GoalWeighted => Box::new(GoalWeightedModule::new(env, goal, horizon, weight)?),
            Self::InteractionPos => Box::new(InteractionModule::new(
                env,
                InteractionQuantity::Position,
                horizon,
                weight,
            )?),
            Self::InteractionVel => Box::new(InteractionModule::new(
                env,
                InteractionQuantity::Velocity,
                horizon,
                weight,
            )?),
            Self::InteractionAcc => Box::new(InteractionModule::new(
                env,
                InteractionQuantity::Acceleration,
                horizon,
                weight,
            )?),
            Self::InteractionProb => Box::new(InteractionProbabilityModule::new(env, horizon, weight)?),
            Self::ControlLimits => Box::new(ControlLimitModule::new(env, horizon)?),
            Self::SpeedLimits => Box::new(SpeedLimitModule::new(env, horizon)?),
            Self::MinDistance => Box::new(MinDistanceModule::new(env, horizon)?),
            Self::SafeBraking => Box::new(SafeBrakingModule::new(env, horizon)?),
        })
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleName {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| PlannerError::UnknownModule(s.to_string()))
    }
}
