// tandem_sim/src/error.rs

use std::path::PathBuf;

use tandem_core::error::PlannerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to load scenario configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("scenario file not found: {0}")]
    MissingScenario(PathBuf),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize run report: {0}")]
    Report(#[from] toml::ser::Error),
}

impl From<figment::Error> for SimError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}
