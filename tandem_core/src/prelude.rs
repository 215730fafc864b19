// tandem_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::agents::AgentDynamics;
pub use crate::attention::Attention;
pub use crate::environment::BehaviorModel;
pub use crate::modules::OptimizationModule;
pub use crate::solver::MotionPlanner;

// --- Core Data Structures ---
pub use crate::environment::{BehaviorParams, Environment, Forecast, ModeParams};
pub use crate::error::PlannerError;
pub use crate::session::{LogKind, LogSample, SessionLog};
pub use crate::types::{AgentId, AgentState, Control, Position, Trajectory};

// --- Configuration ---
pub use crate::agents::DynamicsKind;
pub use crate::attention::AttentionConfig;
pub use crate::environment::BehaviorConfig;
pub use crate::modules::ModuleName;
pub use crate::solver::{SolverConfig, WeightedModule};

// --- Concrete Implementations (Export common ones for convenience) ---
pub use crate::agents::{DoubleIntegrator, SingleIntegrator};
pub use crate::attention::{AllPedestrians, ClosestK, EuclideanRadius, Reachability};
pub use crate::environment::behavior::{ConstantVelocity, PotentialField, SocialForces};

// --- Planning ---
pub use crate::solver::{
    solve_multi_start, NlpPlanner, PlanStep, RecedingHorizon, SolveOutcome, SolveReport, SolveStatus, StepRecord,
};
