// tandem_core/src/solver/mod.rs

pub mod config;
pub mod initial_guess;
pub mod multi_start;
pub mod nlp;
pub mod problem;
pub mod receding;

pub use config::{SolverConfig, WeightedModule};
pub use initial_guess::{initial_guess, initial_guesses, GuessShape};
pub use multi_start::{select_best, solve_multi_start, SolveOutcome};
pub use nlp::{SolveStatus, SqpOptions};
pub use problem::TrajectoryProblem;
pub use receding::{MotionPlanner, NlpPlanner, PlanStep, RecedingHorizon, SolveReport, StepRecord};
