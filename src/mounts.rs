//! Host → container path translation.
//!
//! Container backends see the host through bind mounts. Every distinct host
//! directory gets one synthetic mount point under the profile's mount root,
//! and every path handed to the tool is rewritten under its mount point.
//! Host-side backends get the resolved host paths unchanged.
use crate::error::WrapError;
use crate::staging::{OutputTarget, ReferenceBundle, StagedInput};
use crate::strategy::Strategy;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

const MOUNT_PREFIX: &str = "mount";
/// Container runtimes split bind specs on these.
const BIND_SEPARATORS: [char; 2] = [',', ':'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub host_dir: PathBuf,
    pub container_dir: PathBuf,
    pub read_only: bool,
}

/// Ordered bind mounts plus the host → container rewriting table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountSpec {
    mounts: Vec<Mount>,
    rewrites: Vec<(PathBuf, PathBuf)>,
}

impl MountSpec {
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Container path previously assigned to `host_path`.
    pub fn rewrite(&self, host_path: &Path) -> Option<&Path> {
        self.rewrites
            .iter()
            .find(|(host, _)| host == host_path)
            .map(|(_, container)| container.as_path())
    }

    /// Mount point for `host_dir`, adding a mount on first use.
    ///
    /// A directory shared by a read-only and a writable request stays writable.
    fn bind(&mut self, host_dir: &Path, read_only: bool, mount_root: &Path) -> PathBuf {
        if let Some(existing) = self.mounts.iter_mut().find(|m| m.host_dir == host_dir) {
            existing.read_only &= read_only;
            return existing.container_dir.clone();
        }
        let container_dir = mount_root.join(format!("{MOUNT_PREFIX}{}", self.mounts.len()));
        self.mounts.push(Mount {
            host_dir: host_dir.to_path_buf(),
            container_dir: container_dir.clone(),
            read_only,
        });
        container_dir
    }

    /// Bind `host_dir` and record `host_dir/name` → `mount/name`.
    fn bind_member(
        &mut self,
        host_dir: &Path,
        name: &str,
        read_only: bool,
        mount_root: &Path,
    ) -> PathBuf {
        let container = self.bind(host_dir, read_only, mount_root).join(name);
        let host = host_dir.join(name);
        if self.rewrite(&host).is_none() {
            self.rewrites.push((host, container.clone()));
        }
        container
    }
}

/// Resolved inputs the tool needs to see.
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub reference: &'a ReferenceBundle,
    pub input: &'a StagedInput,
    pub pair: Option<&'a StagedInput>,
    pub output: &'a OutputTarget,
}

/// Paths as the tool will see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewrittenPaths {
    pub reference: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    /// Working directory inside the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub mounts: MountSpec,
    pub paths: RewrittenPaths,
}

/// Build the mount list and rewritten paths for `strategy`.
///
/// Host directories that a runtime would split apart in a bind spec are
/// rejected rather than mounted wrong.
pub fn translate(
    strategy: Strategy,
    request: TranslationRequest<'_>,
    mount_root: &Path,
) -> Result<Translation, WrapError> {
    if !strategy.is_container() {
        return Ok(Translation {
            mounts: MountSpec::default(),
            paths: RewrittenPaths {
                reference: path_arg(&request.reference.prefix_path()),
                input: path_arg(&request.input.path()),
                pair: request.pair.map(|pair| path_arg(&pair.path())),
                workdir: None,
            },
        });
    }

    let mut mounts = MountSpec::default();
    let bundle_dir = request.reference.bundle.path();
    let reference = mounts.bind_member(
        &bundle_dir,
        &request.reference.index_prefix,
        true,
        mount_root,
    );
    let input = bind_input(&mut mounts, request.input, mount_root);
    let pair = request
        .pair
        .map(|pair| bind_input(&mut mounts, pair, mount_root));
    let workdir = mounts.bind(&request.output.dir, false, mount_root);

    for mount in mounts.mounts() {
        check_bindable(mount)?;
        tracing::debug!(
            host = %mount.host_dir.display(),
            container = %mount.container_dir.display(),
            read_only = mount.read_only,
            "bind mount"
        );
    }

    Ok(Translation {
        paths: RewrittenPaths {
            reference: path_arg(&reference),
            input: path_arg(&input),
            pair: pair.as_deref().map(path_arg),
            workdir: Some(path_arg(&workdir)),
        },
        mounts,
    })
}

fn check_bindable(mount: &Mount) -> Result<(), WrapError> {
    let host = mount.host_dir.to_string_lossy();
    match host.chars().find(|c| BIND_SEPARATORS.contains(c)) {
        None => Ok(()),
        Some(separator) => Err(WrapError::PathResolution {
            path: host.into_owned(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("directory contains '{separator}' and cannot be bind-mounted"),
            ),
        }),
    }
}

fn bind_input(mounts: &mut MountSpec, input: &StagedInput, mount_root: &Path) -> PathBuf {
    debug_assert!(input.staged, "unstaged input reached translation");
    mounts.bind_member(&input.resolved_dir, &input.resolved_name, true, mount_root)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
