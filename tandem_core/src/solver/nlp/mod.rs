// tandem_core/src/solver/nlp/mod.rs

pub mod lbfgs;
pub mod sqp;

pub use lbfgs::DampedLbfgs;
pub use sqp::{is_better, solve, NonlinearProgram, SolveStatus, SqpOptions, SqpResult};
