// tandem_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Tandem: closed-loop simulation of a robot planning around pedestrians.
///
/// This struct defines the command-line arguments of the scenario runner.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/passing.toml")]
    pub scenario: PathBuf,

    /// Run every scenario found (recursively) in this directory instead of `--scenario`.
    #[arg(long)]
    pub scenario_dir: Option<PathBuf>,

    /// Overrides `[simulation].seed`.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overrides `[simulation].max_steps`.
    #[arg(long)]
    pub steps: Option<usize>,

    /// Where to write the run report as TOML. A directory when used with `--scenario-dir`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Default log filter, e.g. `info` or `debug`. `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let cli = Cli::parse_from(["tandem_sim"]);
        assert_eq!(cli.scenario, PathBuf::from("assets/scenarios/passing.toml"));
        assert!(cli.scenario_dir.is_none());
        assert_eq!(cli.log_level, "info");

        let cli = Cli::parse_from(["tandem_sim", "--seed", "7", "--steps", "12", "-o", "out.toml"]);
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.steps, Some(12));
        assert_eq!(cli.output, Some(PathBuf::from("out.toml")));
    }
}
