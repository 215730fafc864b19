// tandem_sim/src/simulation/config/catalog.rs

//! Discovery of scenario files on disk.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

/// Walks `root` and returns every `.toml` file below it, sorted by path.
pub fn discover_scenarios(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("Scenario directory not found at {:?}, nothing to run.", root);
        return Vec::new();
    }

    let mut scenarios: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir() && e.path().extension().map_or(false, |ext| ext == "toml"))
        .map(|e| e.into_path())
        .collect();
    scenarios.sort();
    info!("Found {} scenarios in {:?}", scenarios.len(), root);
    scenarios
}

/// Scenario name used in reports, e.g. `passing` for `assets/scenarios/passing.toml`.
pub fn scenario_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_bundled_scenarios() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../assets/scenarios");
        let scenarios = discover_scenarios(&root);
        let names: Vec<String> = scenarios.iter().map(|p| scenario_name(p)).collect();
        assert!(names.contains(&"passing".to_string()));
        assert!(names.contains(&"head_on".to_string()));
        assert!(discover_scenarios(Path::new("does/not/exist")).is_empty());
    }
}
