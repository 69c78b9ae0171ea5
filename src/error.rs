//! Error taxonomy for a single wrapped invocation and its exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Successful invocation.
pub const EXIT_OK: u8 = 0;
/// Validation, usage, or configuration failure.
pub const EXIT_VALIDATION: u8 = 1;
/// The command line could not be parsed.
pub const EXIT_PARSE: u8 = 2;
/// The command line named an option the wrapper does not know.
pub const EXIT_INVALID_OPTION: u8 = 3;
/// The backend program exists but could not be started.
pub const EXIT_LAUNCH_FAILED: u8 = 126;
/// The backend program could not be found.
pub const EXIT_LAUNCH_NOT_FOUND: u8 = 127;

/// Fatal failures of the resolve → select → build → run pipeline.
#[derive(Error, Debug)]
pub enum WrapError {
    #[error("missing required argument: {name}")]
    MissingArgument { name: &'static str },

    #[error("{path} was not staged as a {kind} after {waited_secs:.0}s")]
    InputNotStaged {
        path: String,
        kind: &'static str,
        waited_secs: f64,
    },

    #[error("tool '{tool}' takes no pair file (its profile has no {{pair}} slot)")]
    PairNotAccepted { tool: String },

    #[error("failed to resolve {path}: {source}")]
    PathResolution {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "invalid reference bundle {}: expected exactly one file ending in '{suffix}', found {found}",
        dir.display()
    )]
    InvalidReferenceBundle {
        dir: PathBuf,
        suffix: String,
        found: usize,
    },

    #[error("strategy '{strategy}' is not supported by {tool} (allowed: {})", allowed.join(", "))]
    UnsupportedStrategy {
        strategy: String,
        tool: String,
        allowed: Vec<String>,
    },

    #[error("no execution strategy is available for {tool} (tried: {})", tried.join(", "))]
    NoStrategyAvailable { tool: String, tried: Vec<String> },

    #[error("unknown tool '{name}' (configured: {})", known.join(", "))]
    UnknownTool { name: String, known: Vec<String> },

    #[error("invalid tool configuration {source_name}: {message}")]
    Config {
        source_name: String,
        message: String,
    },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command exited with status {code}: {command}")]
    BackendExecutionFailure { command: String, code: i32 },
}

impl WrapError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            WrapError::BackendExecutionFailure { code, .. } => *code,
            WrapError::Launch { source, .. } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    i32::from(EXIT_LAUNCH_NOT_FOUND)
                } else {
                    i32::from(EXIT_LAUNCH_FAILED)
                }
            }
            _ => i32::from(EXIT_VALIDATION),
        }
    }

    /// Whether the usage text accompanies this failure.
    pub fn shows_usage(&self) -> bool {
        matches!(
            self,
            WrapError::MissingArgument { .. }
                | WrapError::PairNotAccepted { .. }
                | WrapError::UnsupportedStrategy { .. }
                | WrapError::NoStrategyAvailable { .. }
        )
    }
}

/// Exit code for an arbitrary pipeline error, defaulting to validation failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<WrapError>() {
        Some(wrap) => wrap.exit_code(),
        None => i32::from(EXIT_VALIDATION),
    }
}
