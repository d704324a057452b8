pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::{read_config, resolve, resolve_in, validate_config, ConfigOverrides};
