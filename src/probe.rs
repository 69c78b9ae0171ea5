//! Host probing: which backends could run the tool right now.
//!
//! Probing only looks: it searches `PATH` and checks for files. It never
//! starts a container or loads a module.
use crate::config::{Locations, ToolProfile};
use crate::strategy::Strategy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable exported by environment-module installations.
pub const MODULES_HOME_ENV: &str = "MODULESHOME";
const MODULE_COMMANDS: [&str; 2] = ["modulecmd", "lmod"];

/// Read-only view of the host used while probing.
pub trait HostProbe {
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
    fn is_file(&self, path: &Path) -> bool;
    fn env_var(&self, name: &str) -> Option<String>;
}

/// The real host.
pub struct SystemHost;

impl HostProbe for SystemHost {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    pub detail: String,
}

/// Availability of each strategy a tool declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    strategies: BTreeMap<Strategy, Availability>,
}

impl ProbeResult {
    pub fn record(&mut self, strategy: Strategy, available: bool, detail: impl Into<String>) {
        self.strategies.insert(
            strategy,
            Availability {
                available,
                detail: detail.into(),
            },
        );
    }

    /// Strategies that were never probed count as unavailable.
    pub fn is_available(&self, strategy: Strategy) -> bool {
        self.strategies
            .get(&strategy)
            .is_some_and(|availability| availability.available)
    }

    pub fn detail(&self, strategy: Strategy) -> Option<&str> {
        self.strategies
            .get(&strategy)
            .map(|availability| availability.detail.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strategy, &Availability)> {
        self.strategies
            .iter()
            .map(|(strategy, availability)| (*strategy, availability))
    }
}

/// Probe every strategy in the profile's allow-list.
pub fn probe(profile: &ToolProfile, locations: &Locations, host: &dyn HostProbe) -> ProbeResult {
    let mut result = ProbeResult::default();
    for strategy in &profile.strategies {
        let (available, detail) = probe_strategy(*strategy, profile, locations, host);
        tracing::debug!(strategy = %strategy, available, detail = detail.as_str(), "probed backend");
        result.record(*strategy, available, detail);
    }
    result
}

fn probe_strategy(
    strategy: Strategy,
    profile: &ToolProfile,
    locations: &Locations,
    host: &dyn HostProbe,
) -> (bool, String) {
    match strategy {
        Strategy::Package => file_present(host, locations.local_package.as_deref(), "package"),
        Strategy::SharedPackage => {
            file_present(host, locations.shared_package.as_deref(), "shared package")
        }
        Strategy::ContainerLocal => runtime_and_image(
            host,
            &profile.container.runtime,
            locations.local_image.as_deref(),
        ),
        Strategy::ContainerShared => runtime_and_image(
            host,
            &profile.container.runtime,
            locations.shared_image.as_deref(),
        ),
        Strategy::Docker => on_path(host, &profile.container.docker_runtime),
        Strategy::Native => on_path(host, &profile.executable),
        Strategy::Module => module_system(host),
    }
}

fn file_present(host: &dyn HostProbe, path: Option<&Path>, label: &str) -> (bool, String) {
    match path {
        Some(path) if host.is_file(path) => (true, path.display().to_string()),
        Some(path) => (false, format!("{label} not found at {}", path.display())),
        None => (false, format!("no {label} configured")),
    }
}

fn on_path(host: &dyn HostProbe, name: &str) -> (bool, String) {
    match host.find_executable(name) {
        Some(path) => (true, path.display().to_string()),
        None => (false, format!("{name} not found on PATH")),
    }
}

fn runtime_and_image(host: &dyn HostProbe, runtime: &str, image: Option<&Path>) -> (bool, String) {
    let (runtime_found, runtime_detail) = on_path(host, runtime);
    if !runtime_found {
        return (false, runtime_detail);
    }
    file_present(host, image, "image")
}

fn module_system(host: &dyn HostProbe) -> (bool, String) {
    if let Some(home) = host.env_var(MODULES_HOME_ENV) {
        return (true, format!("{MODULES_HOME_ENV}={home}"));
    }
    for command in MODULE_COMMANDS {
        if let Some(path) = host.find_executable(command) {
            return (true, path.display().to_string());
        }
    }
    (false, "no module system found".to_string())
}

#[cfg(test)]
pub mod fake {
    use super::HostProbe;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::{Path, PathBuf};

    /// Host whose executables, files, and environment are declared up front.
    #[derive(Default)]
    pub struct FakeHost {
        pub executables: BTreeMap<String, PathBuf>,
        pub files: BTreeSet<PathBuf>,
        pub env: BTreeMap<String, String>,
    }

    impl FakeHost {
        pub fn with_executable(mut self, name: &str) -> Self {
            self.executables
                .insert(name.to_string(), PathBuf::from("/usr/bin").join(name));
            self
        }

        pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
            self.files.insert(path.into());
            self
        }

        pub fn with_env(mut self, name: &str, value: &str) -> Self {
            self.env.insert(name.to_string(), value.to_string());
            self
        }
    }

    impl HostProbe for FakeHost {
        fn find_executable(&self, name: &str) -> Option<PathBuf> {
            self.executables.get(name).cloned()
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        fn env_var(&self, name: &str) -> Option<String> {
            self.env.get(name).cloned()
        }
    }
}
