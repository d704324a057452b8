use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the pytest subprocess is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_python")]
    pub python: String,
    /// Value passed to `-n` (pytest-xdist worker count)
    #[serde(default = "default_workers")]
    pub workers: String,
    /// Value passed to `--dist`
    #[serde(default = "default_dist")]
    pub dist: String,
    /// Pass `--xstress` to keep re-running the selection
    #[serde(default = "default_true")]
    pub stress: bool,
    #[serde(default = "default_true")]
    pub verbose: bool,
    /// Ask pytest for colored output (`--color yes`)
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            workers: default_workers(),
            dist: default_dist(),
            stress: true,
            verbose: true,
            color: true,
        }
    }
}

/// Process-wide settings, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Route the result endpoint listens on, without the leading slash
    #[serde(default = "default_route")]
    pub route: String,
    /// Parent of the per-run scratch directories
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            route: default_route(),
            scratch_root: default_scratch_root(),
            runner: RunnerConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// URL the pytest plugin publishes results to.
    pub fn callback_url(&self) -> String {
        format!(
            "http://{}:{}/{}",
            self.host,
            self.port,
            self.route.trim_start_matches('/')
        )
    }

    /// Path component the router is mounted on.
    pub fn route_path(&self) -> String {
        format!("/{}", self.route.trim_start_matches('/'))
    }
}

fn default_true() -> bool {
    true
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_workers() -> String {
    "auto".to_string()
}

fn default_dist() -> String {
    "loadgroup".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    7778
}

fn default_route() -> String {
    "test-update".to_string()
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("pytest-infinity")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_config_default() {
        let config = DashboardConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 7778);
        assert_eq!(config.route, "test-update");
        assert!(config.scratch_root.ends_with("pytest-infinity"));
        assert_eq!(config.runner.python, "python3");
        assert_eq!(config.runner.workers, "auto");
        assert_eq!(config.runner.dist, "loadgroup");
        assert!(config.runner.stress);
    }

    #[test]
    fn test_callback_url() {
        let config = DashboardConfig::default();
        assert_eq!(config.callback_url(), "http://localhost:7778/test-update");

        let config = DashboardConfig {
            port: 9000,
            route: "/results".to_string(),
            ..DashboardConfig::default()
        };
        assert_eq!(config.callback_url(), "http://localhost:9000/results");
        assert_eq!(config.route_path(), "/results");
    }

    #[test]
    fn test_config_yaml_partial() {
        let yaml = r#"
port: 8123
runner:
  workers: "4"
  stress: false
"#;
        let config: DashboardConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 8123);
        assert_eq!(config.route, "test-update");
        assert_eq!(config.runner.workers, "4");
        assert!(!config.runner.stress);
        assert_eq!(config.runner.python, "python3");
    }
}
