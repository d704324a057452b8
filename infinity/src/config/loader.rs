use std::fs;
use std::path::{Path, PathBuf};

use crate::types::config::DashboardConfig;

use super::error::ConfigError;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "infinity.yaml";

/// Values given on the command line or through `INFINITY_*` variables.
/// They take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub route: Option<String>,
    pub scratch_root: Option<PathBuf>,
    pub python: Option<String>,
    pub workers: Option<String>,
    pub dist: Option<String>,
    pub no_stress: bool,
}

/// Read and parse a YAML config file.
pub fn read_config(path: &Path) -> Result<DashboardConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(DashboardConfig::default());
    }
    Ok(serde_yaml::from_str(&content)?)
}

/// Resolve the configuration relative to the current working directory.
pub fn resolve(
    explicit: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<DashboardConfig, ConfigError> {
    let cwd = std::env::current_dir()?;
    resolve_in(&cwd, explicit, overrides)
}

/// Layer defaults, the config file and overrides, then validate.
///
/// An explicit config path must exist; the default `infinity.yaml` in `dir`
/// is optional.
pub fn resolve_in(
    dir: &Path,
    explicit: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<DashboardConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => read_config(&dir.join(path))?,
        None => {
            let candidate = dir.join(DEFAULT_CONFIG_FILE);
            if candidate.is_file() {
                read_config(&candidate)?
            } else {
                DashboardConfig::default()
            }
        }
    };

    apply_overrides(&mut config, overrides);
    validate_config(&config)?;
    Ok(config)
}

pub fn apply_overrides(config: &mut DashboardConfig, overrides: &ConfigOverrides) {
    if let Some(host) = &overrides.host {
        config.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(route) = &overrides.route {
        config.route = route.clone();
    }
    if let Some(root) = &overrides.scratch_root {
        config.scratch_root = root.clone();
    }
    if let Some(python) = &overrides.python {
        config.runner.python = python.clone();
    }
    if let Some(workers) = &overrides.workers {
        config.runner.workers = workers.clone();
    }
    if let Some(dist) = &overrides.dist {
        config.runner.dist = dist.clone();
    }
    if overrides.no_stress {
        config.runner.stress = false;
    }
}

/// Collect every problem instead of stopping at the first one.
pub fn validate_config(config: &DashboardConfig) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    if config.host.trim().is_empty() {
        problems.push("host must not be empty".to_string());
    }
    if config.port == 0 {
        problems.push("port must be a fixed, non-zero port".to_string());
    }
    let route = config.route.trim_start_matches('/');
    if route.trim().is_empty() {
        problems.push("route must not be empty".to_string());
    } else if route.contains(char::is_whitespace) || route.contains(['{', '}']) {
        problems.push(format!("route contains invalid characters: {route}"));
    } else if route.split('/').any(|segment| segment.starts_with([':', '*'])) {
        problems.push(format!("route segments must not start with ':' or '*': {route}"));
    }
    if config.runner.python.trim().is_empty() {
        problems.push("runner.python must not be empty".to_string());
    }
    if config.runner.workers.trim().is_empty() {
        problems.push("runner.workers must not be empty".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(problems))
    }
}
