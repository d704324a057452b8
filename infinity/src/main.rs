pub mod config;
pub mod logging;
pub mod server;
pub mod shell;
pub mod supervisor;
pub mod tui;
pub mod types;

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use config::ConfigOverrides;
use shell::RunOptions;

#[derive(Parser, Debug)]
#[command(
    name = "infinity",
    version,
    about = "Live terminal dashboard for parallel pytest runs",
    long_about = "Infinity runs pytest under xdist, collects per-test results over HTTP and shows \
                  them next to the live output and the artifacts each test writes."
)]
struct Cli {
    /// Port the result endpoint listens on
    #[arg(long, env = "INFINITY_PORT")]
    port: Option<u16>,

    /// Route the result endpoint listens on
    #[arg(long, env = "INFINITY_ROUTE")]
    route: Option<String>,

    /// Host the result endpoint binds and publishes
    #[arg(long, env = "INFINITY_HOST")]
    host: Option<String>,

    /// Directory that holds the per-run scratch directories
    #[arg(long, env = "INFINITY_SCRATCH_ROOT", value_name = "DIR")]
    scratch_root: Option<PathBuf>,

    /// Python interpreter used to launch pytest
    #[arg(long, env = "INFINITY_PYTHON")]
    python: Option<String>,

    /// pytest-xdist worker count (-n)
    #[arg(long, env = "INFINITY_WORKERS")]
    workers: Option<String>,

    /// pytest-xdist distribution mode (--dist)
    #[arg(long, env = "INFINITY_DIST")]
    dist: Option<String>,

    /// Run the selection once instead of repeating it
    #[arg(long)]
    no_stress: bool,

    /// Config file (defaults to ./infinity.yaml when present)
    #[arg(long, env = "INFINITY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Arguments passed to pytest unchanged
    #[arg(
        value_name = "PYTEST_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pytest_args: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            route: self.route.clone(),
            scratch_root: self.scratch_root.clone(),
            python: self.python.clone(),
            workers: self.workers.clone(),
            dist: self.dist.clone(),
            no_stress: self.no_stress,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match config::resolve(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    let options = RunOptions {
        config,
        pytest_args: cli.pytest_args,
    };
    match shell::run(options) {
        Ok(scratch_dir) => {
            println!("{} {}", "Test artifacts:".dimmed(), scratch_dir.display());
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            std::process::exit(1);
        }
    }
}
