pub mod config;
pub mod enums;
pub mod event;
pub mod output;
pub mod tally;

// Re-export commonly used types for convenience
pub use config::{DashboardConfig, RunnerConfig};
pub use enums::TestOutcome;
pub use event::ResultEvent;
pub use output::OutputBuffer;
pub use tally::{Tally, TallyTable};
