//! TFES broker entry point: CLI parsing, config loading, tracing init, and
//! process startup. Exits non-zero on any fatal startup error.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tfes_core::config::Config;
use tracing::error;

/// Subject-based federated publish/subscribe message broker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the broker's JSON configuration file.
    #[arg(short = 'c', long = "config", default_value = "config.json")]
    config: PathBuf,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, path = %args.config.display(), "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match compio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start compio runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(tfes_net::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "broker exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}
