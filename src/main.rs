use std::process::ExitCode;

mod cli;
mod command;
mod config;
mod error;
mod logging;
mod mounts;
mod probe;
mod runner;
mod staging;
mod strategy;
mod templates;
mod workflow;

use cli::{Command, Parsed};
use error::{WrapError, EXIT_OK};

fn main() -> ExitCode {
    let args = match cli::parse(std::env::args_os()) {
        Parsed::Args(args) => args,
        Parsed::Exit(code) => {
            logging::init(false);
            return finish(i32::from(code));
        }
    };
    logging::init(args.verbose);

    let config = args.config.as_deref();
    let result = match args.command {
        Command::Run(run) => workflow::run_tool(run, config),
        Command::Probe(probe) => workflow::run_probe(probe, config),
        Command::Tools(tools) => workflow::run_tools(tools, config),
    };
    let code = match result {
        Ok(()) => i32::from(EXIT_OK),
        Err(err) => report(&err),
    };
    finish(code)
}

fn report(err: &anyhow::Error) -> i32 {
    let wrap = err.downcast_ref::<WrapError>();
    if wrap.is_some_and(WrapError::shows_usage) {
        eprintln!("{}", cli::run_usage());
    }
    // the runner already logged the failing command
    if !matches!(wrap, Some(WrapError::BackendExecutionFailure { .. })) {
        eprintln!("error: {err:#}");
    }
    error::exit_code_for(err)
}

/// Single exit point; codes outside 0..=255 collapse to 255.
fn finish(code: i32) -> ExitCode {
    if code == i32::from(EXIT_OK) {
        tracing::debug!(code, "exiting");
    } else {
        tracing::info!(code, "exiting");
    }
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
