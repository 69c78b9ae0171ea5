//! Waiting for caller-staged inputs and resolving them to absolute paths.
//!
//! Inputs may still be in flight when the wrapper starts (a workflow engine
//! copying them into place), so every input is polled for a bounded number of
//! attempts before the invocation gives up.
use crate::config::ToolProfile;
use crate::error::WrapError;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    File,
    Directory,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::File => "file",
            InputKind::Directory => "directory",
        }
    }

    fn matches(self, path: &Path) -> bool {
        match self {
            InputKind::File => path.is_file(),
            InputKind::Directory => path.is_dir(),
        }
    }
}

/// Poll budget: `attempts` sleeps of `interval` between existence checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagingWait {
    pub attempts: u32,
    pub interval: Duration,
}

impl StagingWait {
    pub fn for_profile(profile: &ToolProfile) -> Self {
        Self {
            attempts: profile.staging.attempts,
            interval: profile.poll_interval(),
        }
    }

    fn budget_secs(&self) -> f64 {
        self.interval.as_secs_f64() * f64::from(self.attempts)
    }
}

/// Suspension point of the staging poll.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps on the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A caller-supplied path that became available in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedInput {
    pub requested_path: String,
    pub resolved_dir: PathBuf,
    pub resolved_name: String,
    pub kind: InputKind,
    pub staged: bool,
}

impl StagedInput {
    /// Absolute, symlink-free host path.
    pub fn path(&self) -> PathBuf {
        self.resolved_dir.join(&self.resolved_name)
    }
}

/// Wait for `path` to exist as `kind`, then resolve it.
pub fn resolve(
    path: &str,
    name: &'static str,
    kind: InputKind,
    wait: StagingWait,
    sleeper: &mut dyn Sleeper,
) -> Result<StagedInput, WrapError> {
    if path.is_empty() {
        return Err(WrapError::MissingArgument { name });
    }
    let candidate = Path::new(path);
    // one progress line per failed check, the final one included
    let mut failed = 0;
    while !kind.matches(candidate) {
        failed += 1;
        tracing::info!(
            path,
            kind = kind.as_str(),
            check = failed,
            checks = wait.attempts.saturating_add(1),
            "input not staged yet"
        );
        if failed > wait.attempts {
            return Err(WrapError::InputNotStaged {
                path: path.to_string(),
                kind: kind.as_str(),
                waited_secs: wait.budget_secs(),
            });
        }
        sleeper.sleep(wait.interval);
    }

    let resolved = fs::canonicalize(candidate).map_err(|source| WrapError::PathResolution {
        path: path.to_string(),
        source,
    })?;
    let (resolved_dir, resolved_name) = split_resolved(path, &resolved)?;
    tracing::debug!(path, resolved = %resolved.display(), "input staged");
    Ok(StagedInput {
        requested_path: path.to_string(),
        resolved_dir,
        resolved_name,
        kind,
        staged: true,
    })
}

fn split_resolved(requested: &str, resolved: &Path) -> Result<(PathBuf, String), WrapError> {
    let unsplittable = || WrapError::PathResolution {
        path: requested.to_string(),
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            "path has no parent directory and base name",
        ),
    };
    let dir = resolved.parent().ok_or_else(unsplittable)?;
    let name = resolved
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(unsplittable)?;
    require_utf8(requested, dir)?;
    Ok((dir.to_path_buf(), name.to_string()))
}

/// Paths end up as tool arguments, so they must survive as strings.
fn require_utf8(requested: &str, path: &Path) -> Result<(), WrapError> {
    if path.to_str().is_some() {
        return Ok(());
    }
    Err(WrapError::PathResolution {
        path: requested.to_string(),
        source: io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", path.display()),
        ),
    })
}

/// Reference index directory and the prefix the tool addresses it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceBundle {
    pub bundle: StagedInput,
    pub index_prefix: String,
}

impl ReferenceBundle {
    /// Find the single member ending in `suffix` (ignoring names ending in one
    /// of `exclude`) and strip the suffix to get the index prefix.
    pub fn locate(
        bundle: StagedInput,
        suffix: &str,
        exclude: &[String],
    ) -> Result<Self, WrapError> {
        let dir = bundle.path();
        let entries = fs::read_dir(&dir).map_err(|source| WrapError::PathResolution {
            path: bundle.requested_path.clone(),
            source,
        })?;
        let mut prefixes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| WrapError::PathResolution {
                path: bundle.requested_path.clone(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if exclude.iter().any(|excluded| name.ends_with(excluded.as_str())) {
                continue;
            }
            if let Some(prefix) = name.strip_suffix(suffix) {
                if !prefix.is_empty() {
                    prefixes.push(prefix.to_string());
                }
            }
        }
        if prefixes.len() != 1 {
            return Err(WrapError::InvalidReferenceBundle {
                dir,
                suffix: suffix.to_string(),
                found: prefixes.len(),
            });
        }
        let index_prefix = prefixes.remove(0);
        tracing::debug!(bundle = %dir.display(), index_prefix, "reference index located");
        Ok(Self {
            bundle,
            index_prefix,
        })
    }

    /// Host path of the index prefix.
    pub fn prefix_path(&self) -> PathBuf {
        self.bundle.path().join(&self.index_prefix)
    }
}

/// Where the tool's standard output and standard error land on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub dir: PathBuf,
    pub stderr_log: PathBuf,
}

impl OutputTarget {
    /// Resolve the output path; its directory must already exist.
    pub fn resolve(path: &str, log_name: &str) -> Result<Self, WrapError> {
        if path.is_empty() {
            return Err(WrapError::MissingArgument { name: "output" });
        }
        let requested = Path::new(path);
        let file_name = requested
            .file_name()
            .ok_or_else(|| WrapError::PathResolution {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "output has no file name"),
            })?;
        let parent = match requested.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = fs::canonicalize(parent).map_err(|source| WrapError::PathResolution {
            path: path.to_string(),
            source,
        })?;
        require_utf8(path, &dir)?;
        let resolved = dir.join(file_name);
        if resolved.is_dir() {
            return Err(WrapError::PathResolution {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "output is a directory"),
            });
        }
        Ok(Self {
            stderr_log: dir.join(log_name),
            path: resolved,
            dir,
        })
    }
}
