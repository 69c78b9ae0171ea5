//! Command assembly for each backend.
//!
//! The tool's own argument vector comes from the profile grammar; each
//! backend then wraps it in whatever launches the tool (nothing, a container
//! runtime, or a module-loading shell). Building reads no environment, so the
//! same inputs always produce the same argument vector.
use crate::config::{ArgToken, Locations, Slot, ToolProfile};
use crate::error::WrapError;
use crate::mounts::{Mount, RewrittenPaths, Translation};
use crate::staging::OutputTarget;
use crate::strategy::Strategy;
use serde::Serialize;
use std::path::{Path, PathBuf};

const MODULE_SHELL: &str = "bash";

/// Tool parameters that are not paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub threads: u32,
    pub extra: Vec<String>,
}

/// A fully resolved command, ready to run once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub strategy: Strategy,
    pub program: String,
    pub args: Vec<String>,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub mounts: Vec<Mount>,
}

impl Invocation {
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Shell rendering including both redirections.
    pub fn render(&self) -> String {
        format!(
            "{} > {} 2> {}",
            shell_words::join(self.argv()),
            quote_path(&self.stdout),
            quote_path(&self.stderr)
        )
    }
}

fn quote_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Launches a tool argument vector under one backend.
trait Backend {
    /// Full argument vector, program first.
    fn wrap(&self, tool_argv: Vec<String>, translation: &Translation) -> Vec<String>;
}

/// Runs the tool directly on the host.
struct Direct;

impl Backend for Direct {
    fn wrap(&self, tool_argv: Vec<String>, _translation: &Translation) -> Vec<String> {
        tool_argv
    }
}

struct Singularity<'a> {
    runtime: &'a str,
    image: &'a Path,
}

impl Backend for Singularity<'_> {
    fn wrap(&self, tool_argv: Vec<String>, translation: &Translation) -> Vec<String> {
        let mut argv = vec![self.runtime.to_string(), "exec".to_string()];
        for mount in translation.mounts.mounts() {
            argv.push("--bind".to_string());
            argv.push(bind_spec(mount));
        }
        if let Some(workdir) = &translation.paths.workdir {
            argv.push("--pwd".to_string());
            argv.push(workdir.clone());
        }
        argv.push(self.image.to_string_lossy().into_owned());
        argv.extend(tool_argv);
        argv
    }
}

struct Docker<'a> {
    runtime: &'a str,
    image: &'a str,
}

impl Backend for Docker<'_> {
    fn wrap(&self, tool_argv: Vec<String>, translation: &Translation) -> Vec<String> {
        let mut argv = vec![
            self.runtime.to_string(),
            "run".to_string(),
            "--rm".to_string(),
        ];
        for mount in translation.mounts.mounts() {
            argv.push("-v".to_string());
            argv.push(bind_spec(mount));
        }
        if let Some(workdir) = &translation.paths.workdir {
            argv.push("-w".to_string());
            argv.push(workdir.clone());
        }
        argv.push(self.image.to_string());
        argv.extend(tool_argv);
        argv
    }
}

/// `module` is a shell function, so the tool runs inside a login shell.
struct ModuleShell<'a> {
    module: &'a str,
}

impl Backend for ModuleShell<'_> {
    fn wrap(&self, tool_argv: Vec<String>, _translation: &Translation) -> Vec<String> {
        let script = format!(
            "module load {} && exec {}",
            shell_words::quote(self.module),
            shell_words::join(tool_argv)
        );
        vec![MODULE_SHELL.to_string(), "-lc".to_string(), script]
    }
}

fn bind_spec(mount: &Mount) -> String {
    let spec = format!(
        "{}:{}",
        mount.host_dir.to_string_lossy(),
        mount.container_dir.to_string_lossy()
    );
    if mount.read_only {
        format!("{spec}:ro")
    } else {
        spec
    }
}

/// Assemble the invocation for `strategy`.
pub fn build(
    strategy: Strategy,
    profile: &ToolProfile,
    locations: &Locations,
    translation: &Translation,
    parameters: &Parameters,
    output: &OutputTarget,
) -> Result<Invocation, WrapError> {
    let missing = |setting: &str| WrapError::Config {
        source_name: profile.name.clone(),
        message: format!("strategy '{strategy}' requires {setting}"),
    };
    let executable = match strategy {
        Strategy::Package => locations
            .local_package
            .as_deref()
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| missing("package.local"))?,
        Strategy::SharedPackage => locations
            .shared_package
            .as_deref()
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| missing("package.shared"))?,
        _ => profile.executable.clone(),
    };

    let paired = translation.paths.pair.is_some();
    let mut tool_argv = vec![executable];
    tool_argv.extend(tool_args(
        profile.template(paired),
        &translation.paths,
        parameters,
    ));

    let argv = match strategy {
        Strategy::Package | Strategy::SharedPackage | Strategy::Native => {
            Direct.wrap(tool_argv, translation)
        }
        Strategy::ContainerLocal | Strategy::ContainerShared => {
            let image = if strategy == Strategy::ContainerLocal {
                locations
                    .local_image
                    .as_deref()
                    .ok_or_else(|| missing("container.local_image"))?
            } else {
                locations
                    .shared_image
                    .as_deref()
                    .ok_or_else(|| missing("container.shared_image"))?
            };
            Singularity {
                runtime: &profile.container.runtime,
                image,
            }
            .wrap(tool_argv, translation)
        }
        Strategy::Docker => Docker {
            runtime: &profile.container.docker_runtime,
            image: profile
                .container
                .docker_image
                .as_deref()
                .ok_or_else(|| missing("container.docker_image"))?,
        }
        .wrap(tool_argv, translation),
        Strategy::Module => ModuleShell {
            module: profile.module.as_deref().ok_or_else(|| missing("module"))?,
        }
        .wrap(tool_argv, translation),
    };

    let mut argv = argv.into_iter();
    let program = argv.next().unwrap_or_default();
    Ok(Invocation {
        strategy,
        program,
        args: argv.collect(),
        stdout: output.path.clone(),
        stderr: output.stderr_log.clone(),
        mounts: translation.mounts.mounts().to_vec(),
    })
}

/// Populate the tool grammar; absent optional slots vanish.
fn tool_args(template: &[ArgToken], paths: &RewrittenPaths, parameters: &Parameters) -> Vec<String> {
    let mut args = Vec::with_capacity(template.len() + parameters.extra.len());
    for token in template {
        match token {
            ArgToken::Literal(value) => args.push(value.clone()),
            ArgToken::Slot { slot, .. } => match slot {
                Slot::Threads => args.push(parameters.threads.to_string()),
                Slot::Reference => args.push(paths.reference.clone()),
                Slot::Input => args.push(paths.input.clone()),
                Slot::Pair => args.extend(paths.pair.clone()),
                Slot::Extra => args.extend(parameters.extra.iter().cloned()),
            },
        }
    }
    args
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
