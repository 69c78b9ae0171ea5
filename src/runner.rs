//! Run a built invocation and surface its exit status.
use crate::command::Invocation;
use crate::error::WrapError;
use std::fs::File;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

/// Execute `invocation` to completion.
///
/// Blocks until the backend exits; there is no timeout. Standard output and
/// standard error go to the invocation's targets, created or truncated here.
pub fn run(invocation: &Invocation) -> Result<(), WrapError> {
    let rendered = invocation.render();
    let stdout = create_target(invocation, &invocation.stdout)?;
    let stderr = create_target(invocation, &invocation.stderr)?;

    tracing::info!(strategy = %invocation.strategy, command = %rendered, "running");
    let start = Instant::now();
    let status = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .status()
        .map_err(|source| WrapError::Launch {
            program: invocation.program.clone(),
            source,
        })?;
    let elapsed_ms = start.elapsed().as_millis();

    let code = exit_code(&status);
    if code != 0 {
        tracing::error!(code, elapsed_ms, command = %rendered, "command failed");
        return Err(WrapError::BackendExecutionFailure {
            command: rendered,
            code,
        });
    }
    tracing::info!(elapsed_ms, "command finished");
    Ok(())
}

fn create_target(invocation: &Invocation, path: &std::path::Path) -> Result<File, WrapError> {
    File::create(path).map_err(|source| WrapError::Launch {
        program: format!("{} (opening {})", invocation.program, path.display()),
        source,
    })
}

/// Exit code of a finished process; signal deaths map to 128 + signal.
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
