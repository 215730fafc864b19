// tandem_sim/src/simulation/core/report.rs

//! Serializable summary of a closed-loop run.

use serde::Serialize;

use tandem_core::environment::Forecast;
use tandem_core::session::SessionLog;
use tandem_core::solver::{SolveReport, SolveStatus, StepRecord};
use tandem_core::types::{AgentState, Trajectory};

// TOML wants plain values ahead of tables, so every struct lists its scalar fields first.

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub seed: u64,
    pub reached_goal: bool,
    pub num_steps: usize,
    pub final_time: f64,
    pub goal: [f64; 2],
    pub ego: Vec<StateRecord>,
    pub pedestrians: Vec<PedestrianRecord>,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateRecord {
    pub time: f64,
    pub heading: f64,
    pub position: [f64; 2],
    pub velocity: [f64; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct PedestrianRecord {
    pub id: u32,
    pub states: Vec<StateRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub time: f64,
    pub objective: f64,
    pub violation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SolveStatus>,
    pub control: [f64; 2],
    pub selected: Vec<u32>,
    pub planned: Vec<[f64; 2]>,
    pub forecast: Vec<ForecastRecord>,
    pub log: SessionLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRecord {
    pub id: u32,
    pub modes: Vec<ModeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeRecord {
    pub weight: f64,
    pub positions: Vec<[f64; 2]>,
    pub std_devs: Vec<f64>,
}

impl From<&AgentState> for StateRecord {
    fn from(state: &AgentState) -> Self {
        Self {
            time: state.time,
            heading: state.heading,
            position: [state.position.x, state.position.y],
            velocity: [state.velocity.x, state.velocity.y],
        }
    }
}

fn states(trajectory: &Trajectory) -> Vec<StateRecord> {
    trajectory.states.iter().map(StateRecord::from).collect()
}

fn forecast_records(forecast: &Forecast) -> Vec<ForecastRecord> {
    forecast
        .iter()
        .map(|ped| ForecastRecord {
            id: ped.id.0,
            modes: ped
                .modes
                .iter()
                .map(|mode| ModeRecord {
                    weight: mode.weight,
                    positions: mode.positions.iter().map(|p| [p.x, p.y]).collect(),
                    std_devs: mode.std_devs.clone(),
                })
                .collect(),
        })
        .collect()
}

impl From<&StepRecord> for StepReport {
    fn from(record: &StepRecord) -> Self {
        Self {
            step: record.step,
            time: record.time,
            objective: record.objective,
            violation: record.violation,
            status: record.status,
            control: [record.control.x, record.control.y],
            selected: record.ids.iter().map(|id| id.0).collect(),
            planned: record.planned.positions().map(|p| [p.x, p.y]).collect(),
            forecast: forecast_records(&record.forecast),
            log: record.log.clone(),
        }
    }
}

impl RunReport {
    pub fn new(scenario: String, seed: u64, goal: [f64; 2], report: &SolveReport) -> Self {
        Self {
            scenario,
            seed,
            reached_goal: report.reached_goal,
            num_steps: report.steps.len(),
            final_time: report.executed.last().map_or(0.0, |s| s.time),
            goal,
            ego: states(&report.executed),
            pedestrians: report
                .pedestrians
                .iter()
                .map(|(id, trajectory)| PedestrianRecord {
                    id: id.0,
                    states: states(trajectory),
                })
                .collect(),
            steps: report.steps.iter().map(StepReport::from).collect(),
        }
    }

    /// Renders the report as a TOML document.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
