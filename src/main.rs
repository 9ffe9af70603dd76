//! azdo - Azure DevOps on the command line
//!
//! Entry point for the azdo command-line application.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use azdo::cli::context::{DebugMode, Factory};
use azdo::cli::output::display_error;
use azdo::config::env::EnvVars;
use azdo::error::{exit, exit_code};
use azdo::infra::iostreams::IoStreams;

fn init_tracing(mode: DebugMode) {
    let default = match mode {
        DebugMode::Off => "warn",
        DebugMode::On => "azdo=debug",
        DebugMode::Api => "azdo=debug,azdo::client=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(mode.is_enabled())
        .without_time()
        .init();
}

#[tokio::main]
async fn main() {
    let env = EnvVars::from_process();
    let debug = DebugMode::from_env(&env);
    init_tracing(debug);

    let io = IoStreams::system(&env);
    let factory = Arc::new(Factory::system(io, env));

    let cancel = factory.cancel().clone();
    let io = Arc::clone(factory.io());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted");
            io.restore_terminal();
            cancel.cancel();
        }
    });
    match factory.timeout() {
        Ok(Some(timeout)) => {
            let cancel = factory.cancel().clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::debug!("deadline of {:?} reached", timeout);
                cancel.cancel();
            });
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("{e:#}"),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match azdo::cli::run(Arc::clone(&factory), args).await {
        Ok(()) => exit::OK,
        Err(e) => {
            display_error(factory.io(), &e, debug.is_enabled());
            exit_code(&e)
        }
    };
    factory.io().stop_pager();
    std::process::exit(code);
}
