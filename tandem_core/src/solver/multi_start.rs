// tandem_core/src/solver/multi_start.rs

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::constants::TAG_OPTIMIZATION;
use crate::environment::Environment;
use crate::error::PlannerError;
use crate::session::SessionLog;
use crate::solver::config::SolverConfig;
use crate::solver::initial_guess::{initial_guesses, GuessShape};
use crate::solver::nlp::{self, is_better, SolveStatus};
use crate::solver::problem::TrajectoryProblem;
use crate::types::{AgentId, Position, Trajectory};

/// Result of one NLP solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Index of the initial guess the solve started from.
    pub guess: usize,
    pub shape: GuessShape,
    pub controls: DVector<f64>,
    pub trajectory: Trajectory,
    pub objective: f64,
    pub violation: f64,
    pub iterations: usize,
    pub status: SolveStatus,
    pub log: SessionLog,
}

/// Picks the outcome with the lowest feasible objective. Ties go to the lower violation, then to
/// the earlier guess. Without any feasible outcome the lowest violation wins.
pub fn select_best(outcomes: Vec<SolveOutcome>, feasibility_tolerance: f64) -> Option<SolveOutcome> {
    let mut best: Option<SolveOutcome> = None;
    for outcome in outcomes {
        let replace = match &best {
            None => true,
            Some(incumbent) => {
                is_better(
                    outcome.objective,
                    outcome.violation,
                    (incumbent.objective, incumbent.violation),
                    feasibility_tolerance,
                ) || (outcome.objective == incumbent.objective
                    && outcome.violation == incumbent.violation
                    && outcome.guess < incumbent.guess)
            }
        };
        if replace {
            best = Some(outcome);
        }
    }
    best
}

/// Solves from a single initial guess on a private copy of the environment.
fn solve_from(
    env: &Environment,
    goal: Position,
    ids: &[AgentId],
    config: &SolverConfig,
    guess: usize,
    shape: GuessShape,
    z0: &DVector<f64>,
) -> Result<SolveOutcome, PlannerError> {
    let env = env.copy();
    let tag = format!("{}/{}", TAG_OPTIMIZATION, guess);
    let problem = TrajectoryProblem::new(&env, goal, ids, config, tag.as_str())?;
    let mut log = SessionLog::new();
    let result = nlp::solve(&problem, z0, &config.sqp_options(), &mut log, &tag)?;
    Ok(SolveOutcome {
        guess,
        shape,
        trajectory: problem.z_to_trajectory(&result.z)?,
        controls: result.z,
        objective: result.objective,
        violation: result.violation,
        iterations: result.iterations,
        status: result.status,
        log,
    })
}

/// Drops the guesses whose solve failed. Fails only when none succeeded, with the first error.
fn surviving(results: Vec<Result<SolveOutcome, PlannerError>>) -> Result<Vec<SolveOutcome>, PlannerError> {
    let mut outcomes = Vec::with_capacity(results.len());
    let mut first_error = None;
    for (guess, result) in results.into_iter().enumerate() {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(guess, error = %e, "solve from initial guess failed, dropping it");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if outcomes.is_empty() => Err(e),
        _ => Ok(outcomes),
    }
}

/// Solves the planning problem from every initial guess and keeps the best result.
///
/// Each guess works on its own deep copy of `env`, its own problem and its own session log, so
/// the solves can run concurrently. The logs of all guesses are merged into the winner. A guess
/// whose solve fails is dropped; the call fails only if every guess does.
pub fn solve_multi_start(
    env: &Environment,
    goal: Position,
    ids: &[AgentId],
    config: &SolverConfig,
) -> Result<SolveOutcome, PlannerError> {
    let ego = env.ego_or_err()?;
    let guesses = initial_guesses(
        ego.dynamics.as_ref(),
        &ego.state,
        &goal,
        config.horizon,
        env.dt(),
        config.multi_start,
    );

    let results: Vec<Result<SolveOutcome, PlannerError>> = if config.parallel && guesses.len() > 1 {
        guesses
            .par_iter()
            .enumerate()
            .map(|(i, (shape, z0))| solve_from(env, goal, ids, config, i, *shape, z0))
            .collect()
    } else {
        guesses
            .iter()
            .enumerate()
            .map(|(i, (shape, z0))| solve_from(env, goal, ids, config, i, *shape, z0))
            .collect()
    };
    let outcomes = surviving(results)?;

    let mut merged = SessionLog::new();
    for outcome in &outcomes {
        debug!(
            guess = outcome.guess,
            shape = ?outcome.shape,
            objective = outcome.objective,
            violation = outcome.violation,
            status = ?outcome.status,
            "multi-start candidate"
        );
        merged.merge(outcome.log.clone());
    }
    let mut best = select_best(outcomes, config.feasibility_tolerance)
        .ok_or_else(|| PlannerError::MalformedInput("no initial guess to solve from".to_string()))?;
    best.log = merged;
    Ok(best)
}
