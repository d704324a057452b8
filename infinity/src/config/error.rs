/// Errors that can occur while resolving the dashboard configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file explicitly requested but missing
    #[error("Config file not found: {0}")]
    NotFound(String),
    /// Failed to parse config file (YAML syntax error)
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// IO error reading config
    #[error("Config IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Config validation failed
    #[error("Config validation failed:\n{}", format_problems(.0))]
    ValidationError(Vec<String>),
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
