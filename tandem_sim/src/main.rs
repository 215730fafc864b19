// tandem_sim/src/main.rs

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tandem_sim::prelude::*;
use tandem_sim::simulation::config::{discover_scenarios, scenario_name};

fn init_logging(level: &str) {
    // Default to the CLI level for our crates and keep everything else quiet.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,tandem_core={level},tandem_sim={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run_one(path: &Path, cli: &Cli, output: Option<PathBuf>) -> Result<RunReport, SimError> {
    let mut config = load_scenario(path)?;
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(steps) = cli.steps {
        config.simulation.max_steps = steps;
    }
    let report = run_scenario(&scenario_name(path), &config)?;
    if let Some(output) = output {
        write_report(&report, &output)?;
    }
    Ok(report)
}

fn run(cli: &Cli) -> Result<(), SimError> {
    let Some(dir) = &cli.scenario_dir else {
        run_one(&cli.scenario, cli, cli.output.clone())?;
        return Ok(());
    };

    let mut reached = 0;
    let scenarios = discover_scenarios(dir);
    for path in &scenarios {
        let output = cli
            .output
            .as_ref()
            .map(|out| out.join(format!("{}.toml", scenario_name(path))));
        if run_one(path, cli, output)?.reached_goal {
            reached += 1;
        }
    }
    info!("{reached}/{} scenarios reached their goal", scenarios.len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
