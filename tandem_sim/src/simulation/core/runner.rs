// tandem_sim/src/simulation/core/runner.rs

use std::fs;
use std::path::Path;

use tracing::info;

use tandem_core::solver::{NlpPlanner, RecedingHorizon};

use crate::error::SimError;
use crate::simulation::config::ScenarioConfig;
use crate::simulation::core::prng::ScenarioRng;
use crate::simulation::core::report::RunReport;
use crate::simulation::core::scenario::build_environment;

/// Builds the scene and drives the receding-horizon planner until the goal or the step budget.
pub fn run_scenario(name: &str, config: &ScenarioConfig) -> Result<RunReport, SimError> {
    let (mut rng, seed) = ScenarioRng::new(config.simulation.seed);
    let (mut env, goal) = build_environment(config, &mut rng)?;
    info!(
        scenario = name,
        seed,
        pedestrians = env.num_pedestrians(),
        horizon = config.solver.horizon,
        "starting run"
    );

    let planner = NlpPlanner::new(config.solver.clone());
    let receding = RecedingHorizon::new(planner, goal, config.goal_tolerance(), config.simulation.max_steps);
    let report = receding.run(&mut env)?;

    info!(
        scenario = name,
        steps = report.steps.len(),
        reached_goal = report.reached_goal,
        "run finished"
    );
    Ok(RunReport::new(name.to_string(), seed, config.ego.goal, &report))
}

/// Writes `report` to `path` as TOML, creating parent directories as needed.
pub fn write_report(report: &RunReport, path: &Path) -> Result<(), SimError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report.to_toml()?)?;
    info!("Report written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::parse_scenario;

    fn short_run() -> ScenarioConfig {
        parse_scenario(
            r#"
            [simulation]
            dt = 0.5
            seed = 5
            max_steps = 3

            [ego]
            dynamics = "single_integrator"
            position = [-4.0, 0.0]
            goal = [4.0, 0.0]

            [[pedestrians]]
            position = [0.0, 3.0]
            velocity = [0.0, -0.5]

            [solver]
            horizon = 3
            max_cpu_time = 2.0
            multi_start = false
            parallel = false
            constraints = ["speed_limits"]
            objectives = [{ name = "goal_norm" }, { name = "interaction_pos", weight = 0.5 }]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_short_closed_loop() {
        let report = run_scenario("short", &short_run()).unwrap();
        assert_eq!(report.seed, 5);
        assert_eq!(report.num_steps, 3);
        assert!(!report.reached_goal);
        assert_eq!(report.ego.len(), 4);
        assert_eq!(report.pedestrians.len(), 1);
        assert_eq!(report.pedestrians[0].states.len(), 4);
        assert!(report.ego[3].position[0] > -4.0);
        assert_eq!(report.steps[0].planned.len(), 4);
        assert_eq!(report.steps[0].selected, vec![0]);

        let toml = report.to_toml().unwrap();
        assert!(toml.starts_with("scenario = \"short\""));
        assert!(toml.contains("[[steps]]"));
    }

    #[test]
    fn test_write_report() {
        let report = run_scenario("short", &short_run()).unwrap();
        let path = std::env::temp_dir().join(format!("tandem_sim_report_{}.toml", std::process::id()));
        write_report(&report, &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("reached_goal = false"));
        fs::remove_file(&path).unwrap();
    }
}
