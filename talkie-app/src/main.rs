//! Talkie CLI entry point: loads config, installs logging, enforces the
//! single-instance guard, wires the pipeline to its collaborators, and
//! dispatches the `start`/`stop`/`toggle`/`state` CLI verbs (§6).

mod config;
mod control;
mod error;
mod sink;

use std::sync::Arc;

use error::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn install_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn main() {
    install_tracing();

    let exit_code = match run() {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "talkie exited with an error");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32> {
    let mut args = std::env::args().skip(1);
    let state_path = control::default_state_path();

    if let Some(verb) = args.next() {
        return Ok(control::run_cli_verb(&verb, &state_path)?);
    }

    run_application(state_path)
}

/// The no-verb case (§6): run the application itself — load config, start
/// the pipeline, and poll the state file until the process is killed.
fn run_application(state_path: std::path::PathBuf) -> Result<i32> {
    let _single_instance_guard = control::acquire_single_instance()?;

    let config_path = config::default_config_path();
    let pipeline_config = config::load(&config_path)?;
    info!(config = ?pipeline_config, "starting talkie");

    let state = control::read_state(&state_path)?;
    let run_flag = talkie_core::RunFlag::new(state.transcribing, {
        let state_path = state_path.clone();
        move |transcribing| {
            if let Err(e) = control::write_state(&state_path, transcribing) {
                tracing::error!(error = %e, "failed to persist transcribing state");
            }
        }
    });

    let keystrokes: Arc<dyn talkie_core::KeystrokeSink> = match sink::EnigoKeystrokeSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            tracing::warn!(error = %e, "keystroke injection unavailable, running headless");
            Arc::new(talkie_core::NullKeystrokeSink)
        }
    };
    let gui: Arc<dyn talkie_core::GuiSink> = Arc::new(sink::ConsoleGuiSink);

    let pipeline =
        talkie_core::Pipeline::start(pipeline_config, Arc::clone(&run_flag), keystrokes, gui)?;

    let poller = control::StatePoller::spawn(state_path, Arc::clone(&run_flag));

    wait_for_shutdown_signal();

    info!("shutting down");
    poller.shutdown();
    pipeline.shutdown();
    Ok(0)
}

/// Parks the main thread until the process is killed. The pipeline's own
/// threads do the real work; this just keeps `main` from returning. No
/// signal crate is in the dependency stack, so a SIGINT/SIGTERM still ends
/// the process immediately rather than running the graceful shutdown path
/// below — acceptable for a CLI host where the state file is the intended
/// stop mechanism (§6's `stop` verb).
fn wait_for_shutdown_signal() {
    let (_tx, rx) = std::sync::mpsc::channel::<()>();
    rx.recv().ok();
}
