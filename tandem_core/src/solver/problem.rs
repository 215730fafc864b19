// tandem_core/src/solver/problem.rs

use nalgebra::{DMatrix, DVector};

use crate::agents::{AgentDynamics, EgoGraph};
use crate::autodiff::finite_diff;
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::modules::{ModuleName, OptimizationModule};
use crate::session::SessionLog;
use crate::solver::config::SolverConfig;
use crate::solver::nlp::NonlinearProgram;
use crate::types::{vector_to_controls, AgentId, AgentState, Position, Trajectory, CONTROL_DIM};

/// The trajectory optimization problem of one solve session.
///
/// The optimization variables are the stacked ego controls `[u0x, u0y, u1x, ...]`. States are
/// recovered by forward-integrating the ego dynamics from the (fixed) current state. Objective
/// modules are summed with their weights, constraint modules are concatenated in the configured
/// order.
#[derive(Debug)]
pub struct TrajectoryProblem<'e> {
    dynamics: Box<dyn AgentDynamics>,
    initial: AgentState,
    dt: f64,
    horizon: usize,
    objectives: Vec<Box<dyn OptimizationModule + 'e>>,
    constraints: Vec<Box<dyn OptimizationModule + 'e>>,
    ids: Vec<AgentId>,
    approximate_jacobian: bool,
    tag: String,
}

impl<'e> TrajectoryProblem<'e> {
    /// Builds every configured module against `env`.
    ///
    /// # Errors
    /// `MissingEgo` without an ego, `MalformedInput` for a zero horizon or unknown ids,
    /// `InfeasibleConfiguration` when a module rejects the scene or is listed in the wrong role.
    pub fn new(
        env: &'e Environment,
        goal: Position,
        ids: &[AgentId],
        config: &SolverConfig,
        tag: impl Into<String>,
    ) -> Result<Self, PlannerError> {
        let ego = env.ego_or_err()?;
        if config.horizon == 0 {
            return Err(PlannerError::MalformedInput("planning horizon must be positive".to_string()));
        }
        env.check_ids(ids)?;

        let build = |name: ModuleName, weight: f64, objective: bool| {
            let module = name.build(env, goal, config.horizon, weight)?;
            let fits = if objective {
                module.kind().has_objective()
            } else {
                module.kind().has_constraints()
            };
            if !fits {
                return Err(PlannerError::InfeasibleConfiguration {
                    module: name.to_string(),
                    reason: format!(
                        "listed as {} but provides none",
                        if objective { "objective" } else { "constraint" }
                    ),
                });
            }
            Ok(module)
        };
        let objectives = config
            .objectives
            .iter()
            .map(|m| build(m.name, m.weight, true))
            .collect::<Result<Vec<_>, _>>()?;
        let constraints = config
            .constraints
            .iter()
            .map(|name| build(*name, 1.0, false))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dynamics: ego.dynamics.clone(),
            initial: ego.state,
            dt: env.dt(),
            horizon: config.horizon,
            objectives,
            constraints,
            ids: ids.to_vec(),
            approximate_jacobian: config.approximate_jacobian,
            tag: tag.into(),
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn ids(&self) -> &[AgentId] {
        &self.ids
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn dynamics(&self) -> &dyn AgentDynamics {
        self.dynamics.as_ref()
    }

    pub fn initial_state(&self) -> &AgentState {
        &self.initial
    }

    fn check_length(&self, z: &DVector<f64>) -> Result<(), PlannerError> {
        if z.len() != CONTROL_DIM * self.horizon {
            return Err(PlannerError::MalformedInput(format!(
                "optimization vector has {} entries, expected {}",
                z.len(),
                CONTROL_DIM * self.horizon
            )));
        }
        Ok(())
    }

    /// The ego trajectory generated by the controls in `z`.
    pub fn z_to_trajectory(&self, z: &DVector<f64>) -> Result<Trajectory, PlannerError> {
        self.check_length(z)?;
        Ok(self
            .dynamics
            .unroll_trajectory(&self.initial, &vector_to_controls(z), self.dt))
    }

    /// The ego trajectory in dual numbers, differentiable w.r.t. the controls in `z`.
    pub fn z_to_graph(&self, z: &DVector<f64>) -> EgoGraph<'_> {
        assert_eq!(z.len(), CONTROL_DIM * self.horizon, "optimization vector length");
        EgoGraph::from_controls(self.dynamics.as_ref(), &self.initial, z, self.dt)
    }

    fn constraint_values(&self, z: &DVector<f64>) -> DVector<f64> {
        let graph = self.z_to_graph(z);
        let blocks: Vec<DVector<f64>> = self
            .constraints
            .iter()
            .map(|module| module.constraint_values(&graph, &self.ids))
            .collect();
        concat(&blocks)
    }

    /// Total constraint violation of `z`.
    pub fn violation(&self, z: &DVector<f64>) -> f64 {
        let graph = self.z_to_graph(z);
        self.constraints
            .iter()
            .map(|module| module.compute_violation(&graph, &self.ids))
            .sum()
    }
}

fn concat(blocks: &[DVector<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        blocks.iter().map(DVector::len).sum(),
        blocks.iter().flat_map(|b| b.iter().copied()),
    )
}

impl NonlinearProgram for TrajectoryProblem<'_> {
    fn num_variables(&self) -> usize {
        CONTROL_DIM * self.horizon
    }

    fn num_constraints(&self) -> usize {
        self.constraints
            .iter()
            .map(|module| module.num_constraints(&self.ids))
            .sum()
    }

    /// The control limits, replicated for every step.
    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let (lower, upper) = self.dynamics.control_limits();
        let n = self.num_variables();
        (DVector::from_element(n, lower), DVector::from_element(n, upper))
    }

    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        for module in &self.constraints {
            let (lo, hi) = module.constraint_bounds(&self.ids);
            lower.extend(lo.into_iter().map(|l| l.unwrap_or(f64::NEG_INFINITY)));
            upper.extend(hi.into_iter().map(|u| u.unwrap_or(f64::INFINITY)));
        }
        (DVector::from_vec(lower), DVector::from_vec(upper))
    }

    fn objective(&self, z: &DVector<f64>, log: &mut SessionLog) -> f64 {
        let graph = self.z_to_graph(z);
        self.objectives
            .iter()
            .map(|module| module.weight() * module.objective(&graph, &self.ids, log, &self.tag))
            .sum()
    }

    fn gradient(&self, z: &DVector<f64>, log: &mut SessionLog) -> DVector<f64> {
        let graph = self.z_to_graph(z);
        let mut gradient = DVector::zeros(z.len());
        for module in &self.objectives {
            gradient += module.gradient(&graph, &self.ids, log, &self.tag) * module.weight();
        }
        gradient
    }

    fn constraints(&self, z: &DVector<f64>, log: &mut SessionLog) -> DVector<f64> {
        let graph = self.z_to_graph(z);
        let blocks: Vec<DVector<f64>> = self
            .constraints
            .iter()
            .map(|module| module.constraint(&graph, &self.ids, log, &self.tag))
            .collect();
        concat(&blocks)
    }

    fn jacobian(&self, z: &DVector<f64>, _log: &mut SessionLog) -> DMatrix<f64> {
        if self.approximate_jacobian {
            let c0 = self.constraint_values(z);
            return finite_diff::jacobian(|x| self.constraint_values(x), z, &c0);
        }
        let graph = self.z_to_graph(z);
        let mut jacobian = DMatrix::zeros(self.num_constraints(), z.len());
        let mut row = 0;
        for module in &self.constraints {
            let block = module.jacobian_matrix(&graph, &self.ids);
            jacobian.view_mut((row, 0), block.shape()).copy_from(&block);
            row += block.nrows();
        }
        jacobian
    }
}
