pub mod ansi;
pub mod app;
pub mod dashboard;
pub mod events;
pub mod exit_modal;
pub mod file_tree;
pub mod footer;
pub mod header;
pub mod run_table;
pub mod theme;

pub use app::App;
pub use dashboard::{run_dashboard, TerminalSession};
pub use events::{DashboardCommand, DashboardHandle, EventHandler, TuiEvent};
