// tandem_core/src/solver/receding.rs

use tracing::{debug, info};

use crate::attention::Attention;
use crate::environment::{Environment, Forecast};
use crate::error::PlannerError;
use crate::session::SessionLog;
use crate::solver::config::SolverConfig;
use crate::solver::multi_start::solve_multi_start;
use crate::solver::nlp::SolveStatus;
use crate::types::{vector_to_controls, AgentId, AgentState, Control, Position, Trajectory};

/// What a planner returns for the current scene.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub controls: Vec<Control>,
    /// Ego trajectory obtained by applying `controls` from the current ego state.
    pub planned: Trajectory,
    /// Pedestrians the plan was optimized against.
    pub ids: Vec<AgentId>,
    pub objective: f64,
    pub violation: f64,
    /// `None` for planners that do not run a solver.
    pub status: Option<SolveStatus>,
    pub log: SessionLog,
}

/// Anything that turns the current scene into a control sequence.
pub trait MotionPlanner {
    /// Number of planned control steps.
    fn horizon(&self) -> usize;

    /// Plans from the current scene. `previous` is the trajectory planned at the last step, if
    /// there was one.
    fn plan(&self, env: &Environment, goal: &Position, previous: Option<&Trajectory>) -> Result<PlanStep, PlannerError>;
}

/// Plans by solving the trajectory NLP from several initial guesses.
#[derive(Debug, Clone)]
pub struct NlpPlanner {
    config: SolverConfig,
    attention: Box<dyn Attention>,
}

impl NlpPlanner {
    pub fn new(config: SolverConfig) -> Self {
        let attention = config.attention.build(config.horizon);
        Self { config, attention }
    }

    pub fn with_attention(config: SolverConfig, attention: Box<dyn Attention>) -> Self {
        Self { config, attention }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl MotionPlanner for NlpPlanner {
    fn horizon(&self) -> usize {
        self.config.horizon
    }

    fn plan(&self, env: &Environment, goal: &Position, previous: Option<&Trajectory>) -> Result<PlanStep, PlannerError> {
        let ids = self.attention.select(env, previous);
        debug!(filter = self.attention.name(), selected = ids.len(), "attention");
        let outcome = solve_multi_start(env, *goal, &ids, &self.config)?;
        Ok(PlanStep {
            controls: vector_to_controls(&outcome.controls),
            planned: outcome.trajectory,
            ids,
            objective: outcome.objective,
            violation: outcome.violation,
            status: Some(outcome.status),
            log: outcome.log,
        })
    }
}

/// Diagnostics of one executed control step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: usize,
    /// Scene time at which the plan was made.
    pub time: f64,
    /// The executed (first) control.
    pub control: Control,
    /// Ego state after executing `control`.
    pub ego_state: AgentState,
    pub planned: Trajectory,
    /// Pedestrian forecast conditioned on `planned`.
    pub forecast: Forecast,
    pub ids: Vec<AgentId>,
    pub objective: f64,
    pub violation: f64,
    pub status: Option<SolveStatus>,
    pub log: SessionLog,
}

/// Result of a closed-loop run.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Executed ego trajectory, starting with the initial state.
    pub executed: Trajectory,
    /// Executed trajectory of every pedestrian.
    pub pedestrians: Vec<(AgentId, Trajectory)>,
    pub steps: Vec<StepRecord>,
    pub reached_goal: bool,
}

/// Receding-horizon loop: plan, apply the first control, repeat.
#[derive(Debug, Clone)]
pub struct RecedingHorizon<P> {
    planner: P,
    goal: Position,
    goal_tolerance: f64,
    max_steps: usize,
}

impl<P: MotionPlanner> RecedingHorizon<P> {
    pub fn new(planner: P, goal: Position, goal_tolerance: f64, max_steps: usize) -> Self {
        Self {
            planner,
            goal,
            goal_tolerance,
            max_steps,
        }
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    fn at_goal(&self, env: &Environment) -> Result<bool, PlannerError> {
        let ego = env.ego_or_err()?;
        Ok((ego.state.position - self.goal).norm() <= self.goal_tolerance)
    }

    /// Runs the loop on `env` until the ego is within `goal_tolerance` of the goal or
    /// `max_steps` controls have been executed.
    ///
    /// # Errors
    /// Planner errors abort the run. A plan that does not converge is executed anyway.
    pub fn run(&self, env: &mut Environment) -> Result<SolveReport, PlannerError> {
        env.prepare_baseline(self.planner.horizon())?;
        let mut steps = Vec::new();
        let mut reached_goal = self.at_goal(env)?;
        let mut previous: Option<Trajectory> = None;

        while !reached_goal && steps.len() < self.max_steps {
            let time = env.time();
            let plan = self.planner.plan(env, &self.goal, previous.as_ref())?;
            let Some(control) = plan.controls.first().copied() else {
                return Err(PlannerError::MalformedInput("planner returned no controls".to_string()));
            };
            let forecast = env.predict(Some(&plan.planned), plan.planned.horizon())?;

            let (_, ego_state) = env.step(&control)?;
            env.detach()?;

            info!(
                step = steps.len(),
                time,
                x = ego_state.position.x,
                y = ego_state.position.y,
                objective = plan.objective,
                violation = plan.violation,
                status = ?plan.status,
                "receding horizon step"
            );
            previous = Some(plan.planned.clone());
            steps.push(StepRecord {
                step: steps.len(),
                time,
                control,
                ego_state,
                planned: plan.planned,
                forecast,
                ids: plan.ids,
                objective: plan.objective,
                violation: plan.violation,
                status: plan.status,
                log: plan.log,
            });
            reached_goal = self.at_goal(env)?;
        }

        let executed = Trajectory::new(env.ego_or_err()?.history.clone());
        let pedestrians = env
            .pedestrians()
            .iter()
            .map(|ped| (ped.id, Trajectory::new(ped.history.clone())))
            .collect();
        info!(steps = steps.len(), reached_goal, "receding horizon finished");
        Ok(SolveReport {
            executed,
            pedestrians,
            steps,
            reached_goal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SingleIntegrator;
    use crate::environment::behavior::PotentialField;
    use crate::environment::BehaviorParams;
    use crate::modules::ModuleName;
    use crate::solver::config::WeightedModule;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;
    use std::cell::RefCell;

    /// Always drives along +x at unit speed. Remembers the start of every previous plan it is
    /// handed.
    struct ConstantPolicy {
        horizon: usize,
        handed: RefCell<Vec<Option<Position>>>,
    }

    impl ConstantPolicy {
        fn new(horizon: usize) -> Self {
            Self {
                horizon,
                handed: RefCell::new(Vec::new()),
            }
        }
    }

    impl MotionPlanner for ConstantPolicy {
        fn horizon(&self) -> usize {
            self.horizon
        }

        fn plan(&self, env: &Environment, _goal: &Position, previous: Option<&Trajectory>) -> Result<PlanStep, PlannerError> {
            self.handed
                .borrow_mut()
                .push(previous.and_then(|p| p.states.first()).map(|s| s.position));
            let ego = env.ego_or_err()?;
            let controls = vec![Control::new(1.0, 0.0); self.horizon];
            Ok(PlanStep {
                planned: ego.dynamics.unroll_trajectory(&ego.state, &controls, env.dt()),
                controls,
                ids: env.pedestrian_ids(),
                objective: 0.0,
                violation: 0.0,
                status: None,
                log: SessionLog::new(),
            })
        }
    }

    fn scene(dt: f64) -> Environment {
        let mut env = Environment::new(Box::new(PotentialField), dt);
        env.set_ego(Box::new(SingleIntegrator::default()), Position::new(-8.0, 0.0), Vector2::zeros());
        env.add_pedestrian(Position::zeros(), Vector2::new(-1.0, 0.0), None, BehaviorParams::default())
            .unwrap();
        env
    }

    #[test]
    fn test_constant_policy_closed_loop() {
        let dt = 0.25;
        let mut env = scene(dt);
        let horizon = RecedingHorizon::new(ConstantPolicy::new(4), Position::zeros(), 0.1, 100);
        let report = horizon.run(&mut env).unwrap();

        assert!(report.reached_goal);
        assert_eq!(report.steps.len(), (8.0_f64 / dt).ceil() as usize);
        for (k, state) in report.executed.states.iter().enumerate() {
            assert_abs_diff_eq!(state.position.x, -8.0 + dt * k as f64, epsilon = 1e-9);
            assert_abs_diff_eq!(state.position.y, 0.0, epsilon = 1e-12);
        }
        assert_eq!(report.pedestrians.len(), 1);
        assert_eq!(report.pedestrians[0].1.len(), report.steps.len() + 1);

        let first = &report.steps[0];
        assert_eq!(first.planned.horizon(), 4);
        assert_eq!(first.forecast.len(), 1);
        assert_eq!(first.forecast[0].modes[0].positions.len(), 5);
    }

    #[test]
    fn test_step_budget_stops_the_loop() {
        let mut env = scene(0.25);
        let horizon = RecedingHorizon::new(ConstantPolicy::new(2), Position::zeros(), 0.1, 5);
        let report = horizon.run(&mut env).unwrap();
        assert!(!report.reached_goal);
        assert_eq!(report.steps.len(), 5);
        assert_abs_diff_eq!(env.time(), 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_previous_plan_is_handed_on() {
        let mut env = scene(0.25);
        let horizon = RecedingHorizon::new(ConstantPolicy::new(3), Position::zeros(), 0.1, 3);
        let report = horizon.run(&mut env).unwrap();
        let handed = horizon.planner().handed.borrow();
        assert_eq!(handed.len(), 3);
        assert_eq!(handed[0], None);
        for (k, start) in handed.iter().enumerate().skip(1) {
            assert_eq!(*start, report.steps[k - 1].planned.states.first().map(|s| s.position));
        }
    }

    #[test]
    fn test_nlp_planner_moves_towards_goal() {
        let mut env = Environment::new(Box::new(PotentialField), 0.5);
        env.set_ego(Box::new(SingleIntegrator::default()), Position::new(-3.0, 0.0), Vector2::zeros());
        let config = SolverConfig {
            horizon: 3,
            objectives: vec![WeightedModule {
                name: ModuleName::GoalNorm,
                weight: 1.0,
            }],
            constraints: vec![ModuleName::SpeedLimits],
            multi_start: false,
            parallel: false,
            max_cpu_time: 5.0,
            ..SolverConfig::default()
        };
        let horizon = RecedingHorizon::new(NlpPlanner::new(config), Position::zeros(), 0.1, 3);
        let report = horizon.run(&mut env).unwrap();
        assert_eq!(report.steps.len(), 3);
        let final_x = report.executed.last().unwrap().position.x;
        assert!(final_x > -3.0 + 1.5, "ego did not advance: {final_x}");
        assert!(report.steps.iter().all(|s| s.status.is_some() && s.ids.is_empty()));
    }
}
