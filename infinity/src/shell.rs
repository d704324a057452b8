//! Wires the dashboard, the result endpoint and the pytest supervisor
//! together for one run, and tears them down again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::logging;
use crate::server::spawn_server;
use crate::supervisor::{build_runner_args, OutputSink, Supervisor};
use crate::tui::{run_dashboard, App, DashboardHandle, EventHandler, TerminalSession};
use crate::types::DashboardConfig;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Everything one run needs, resolved before the terminal is taken over.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: DashboardConfig,
    /// Passed to pytest verbatim after the generated arguments.
    pub pytest_args: Vec<String>,
}

/// Create `<root>/<uuid>` for this run's artifacts.
pub fn create_scratch_dir(root: &Path) -> io::Result<PathBuf> {
    let dir = root.join(Uuid::new_v4().to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Forwards supervisor output to the dashboard queue.
struct DashboardSink {
    handle: DashboardHandle,
}

impl OutputSink for DashboardSink {
    fn output(&mut self, text: &str) {
        self.handle.replace_output(text);
    }

    fn log(&mut self, line: &str) {
        self.handle.log(line);
    }

    fn exited(&mut self, code: Option<i32>) {
        self.handle.runner_exited(code);
    }
}

/// Route SIGINT, SIGTERM and SIGHUP into the dashboard's shutdown flag.
///
/// The runner lives in its own process group, so a hangup aimed at ours
/// only reaches it through the normal teardown.
fn install_signal_handler(shutdown: &Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    let shutdown = Arc::clone(shutdown);
    ctrlc::set_handler(move || shutdown.store(true, Ordering::Release))
}

/// Run the dashboard until the operator quits. Returns the scratch directory.
pub fn run(options: RunOptions) -> Result<PathBuf> {
    let RunOptions {
        config,
        pytest_args,
    } = options;

    let scratch_dir = create_scratch_dir(&config.scratch_root).with_context(|| {
        format!(
            "Failed to create scratch directory under {}",
            config.scratch_root.display()
        )
    })?;
    let log_path = logging::init(&scratch_dir)?;
    info!(scratch_dir = %scratch_dir.display(), ?config, "starting run");

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(err) = install_signal_handler(&shutdown) {
        warn!(%err, "cannot install signal handler");
    }

    // The consumer side exists before any producer starts.
    let events = EventHandler::with_terminal_input(TICK_INTERVAL);
    let handle = events.handle();
    let mut app = App::new(scratch_dir.clone());
    handle.log(format!("test directory at {}", scratch_dir.display()));
    handle.log(format!("diagnostics written to {}", log_path.display()));

    let mut session = TerminalSession::enter().context("Failed to set up terminal")?;

    let server = spawn_server(&config, handle.clone()).context("Failed to start result endpoint")?;
    handle.log(format!("results accepted at {}", config.callback_url()));

    let args = build_runner_args(&config, &scratch_dir, &pytest_args);
    let workdir = std::env::current_dir().context("Failed to read working directory")?;
    handle.log(format!("running {} {}", config.runner.python, args.join(" ")));
    let supervisor = Supervisor::start(
        &config.runner.python,
        &args,
        &workdir,
        DashboardSink {
            handle: handle.clone(),
        },
    )
    .context("Failed to start test runner")?;

    let result = run_dashboard(session.terminal(), &mut app, &events, &shutdown);

    info!("shutting down");
    drop(session);
    // Dropping the queue first releases handlers still waiting on an ack,
    // so the server can drain. Results accepted after this point are dropped.
    events.stop();
    server.stop();
    supervisor.stop();

    result.context("Dashboard failed")?;
    Ok(scratch_dir)
}
