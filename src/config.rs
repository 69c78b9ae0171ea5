//! Tool profile configuration.
//!
//! A profile declares everything the wrapper needs to know about one tool:
//! its argument grammar, how to find its reference index, which strategies it
//! may run under, and where each backend's package or image lives. Profiles
//! are loaded once per invocation and validated up front so the later stages
//! can treat them as facts.
use crate::error::WrapError;
use crate::strategy::Strategy;
use crate::templates;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current schema version for tool profile files.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Environment variable naming a tool profile file.
pub const CONFIG_ENV: &str = "BIOWRAP_CONFIG";

const BUILTIN_SOURCE: &str = "<builtin>";
const DEFAULT_RUNTIME: &str = "singularity";
const DEFAULT_DOCKER_RUNTIME: &str = "docker";
const DEFAULT_MOUNT_ROOT: &str = "/mnt";
const DEFAULT_STAGING_ATTEMPTS: u32 = 10;
const DEFAULT_STAGING_INTERVAL_SECONDS: f64 = 1.0;
const MAX_STAGING_ATTEMPTS: u32 = 3600;

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsFile {
    pub schema_version: u32,
    pub tools: BTreeMap<String, ToolProfileFile>,
}

/// On-disk form of a tool profile, before validation.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ToolProfileFile {
    pub executable: String,
    pub args: Vec<String>,
    /// Grammar used instead of `args` when a pair file is supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_args: Option<Vec<String>>,
    pub index_suffix: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_exclude_suffixes: Vec<String>,
    pub stderr_log: String,
    pub strategies: Vec<Strategy>,
    pub auto_priority: Vec<Strategy>,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StagingConfig {
    pub attempts: u32,
    pub interval_seconds: f64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_STAGING_ATTEMPTS,
            interval_seconds: DEFAULT_STAGING_INTERVAL_SECONDS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Bundled executable, relative to the wrapper home unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    /// Site-wide shared executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_docker_runtime")]
    pub docker_runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
    #[serde(default = "default_mount_root")]
    pub mount_root: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            docker_runtime: default_docker_runtime(),
            local_image: None,
            shared_image: None,
            docker_image: None,
            mount_root: default_mount_root(),
        }
    }
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

fn default_docker_runtime() -> String {
    DEFAULT_DOCKER_RUNTIME.to_string()
}

fn default_mount_root() -> String {
    DEFAULT_MOUNT_ROOT.to_string()
}

/// Value slots of the tool argument grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Threads,
    Reference,
    Input,
    Pair,
    /// Zero or more pass-through arguments.
    Extra,
}

impl Slot {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "threads" => Some(Slot::Threads),
            "reference" => Some(Slot::Reference),
            "input" => Some(Slot::Input),
            "pair" => Some(Slot::Pair),
            "extra" => Some(Slot::Extra),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgToken {
    Literal(String),
    Slot { slot: Slot, optional: bool },
}

/// A validated tool profile.
#[derive(Debug, Clone)]
pub struct ToolProfile {
    pub name: String,
    pub executable: String,
    pub args: Vec<ArgToken>,
    pub paired_args: Option<Vec<ArgToken>>,
    pub index_suffix: String,
    pub index_exclude_suffixes: Vec<String>,
    pub stderr_log: String,
    pub strategies: Vec<Strategy>,
    pub auto_priority: Vec<Strategy>,
    pub staging: StagingConfig,
    pub package: PackageConfig,
    pub container: ContainerConfig,
    pub module: Option<String>,
}

/// Backend artifacts of a profile resolved against the wrapper home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locations {
    pub local_package: Option<PathBuf>,
    pub shared_package: Option<PathBuf>,
    pub local_image: Option<PathBuf>,
    pub shared_image: Option<PathBuf>,
}

impl ToolProfile {
    /// Validate an on-disk profile.
    pub fn from_file(name: &str, raw: ToolProfileFile, source: &str) -> Result<Self, WrapError> {
        let invalid = |message: String| WrapError::Config {
            source_name: source.to_string(),
            message: format!("tool '{name}': {message}"),
        };

        if raw.executable.trim().is_empty() {
            return Err(invalid("executable is empty".to_string()));
        }
        if raw.index_suffix.is_empty() {
            return Err(invalid("index_suffix is empty".to_string()));
        }
        if raw.stderr_log.is_empty() || raw.stderr_log.contains('/') {
            return Err(invalid(
                "stderr_log must be a plain file name".to_string(),
            ));
        }
        let args = parse_template(&raw.args).map_err(&invalid)?;
        if template_has(&args, Slot::Pair, false) {
            return Err(invalid(
                "{pair} in args must be optional ({pair?})".to_string(),
            ));
        }
        for required in [Slot::Reference, Slot::Input] {
            if !template_has_slot(&args, required) {
                return Err(invalid(format!("args is missing {{{}}}", slot_name(required))));
            }
        }
        let paired_args = match &raw.paired_args {
            Some(tokens) => {
                let parsed = parse_template(tokens).map_err(&invalid)?;
                if !template_has_slot(&parsed, Slot::Pair) {
                    return Err(invalid("paired_args is missing {pair}".to_string()));
                }
                Some(parsed)
            }
            None => None,
        };

        if raw.strategies.is_empty() {
            return Err(invalid("strategies is empty".to_string()));
        }
        if let Some(outside) = raw
            .auto_priority
            .iter()
            .find(|strategy| !raw.strategies.contains(strategy))
        {
            return Err(invalid(format!(
                "auto_priority lists '{outside}' which is not in strategies"
            )));
        }
        for strategy in &raw.strategies {
            if let Some(setting) = missing_setting(&raw, *strategy) {
                return Err(invalid(format!(
                    "strategy '{strategy}' requires {setting}"
                )));
            }
        }

        let staging = raw.staging;
        if staging.attempts > MAX_STAGING_ATTEMPTS {
            return Err(invalid(format!(
                "staging.attempts exceeds {MAX_STAGING_ATTEMPTS}"
            )));
        }
        if !staging.interval_seconds.is_finite() || staging.interval_seconds < 0.0 {
            return Err(invalid(
                "staging.interval_seconds must be a non-negative number".to_string(),
            ));
        }
        if !raw.container.mount_root.starts_with('/') {
            return Err(invalid("container.mount_root must be absolute".to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            executable: raw.executable,
            args,
            paired_args,
            index_suffix: raw.index_suffix,
            index_exclude_suffixes: raw.index_exclude_suffixes,
            stderr_log: raw.stderr_log,
            strategies: raw.strategies,
            auto_priority: raw.auto_priority,
            staging,
            package: raw.package,
            container: raw.container,
            module: raw.module,
        })
    }

    /// Argument grammar to use for the given pairing.
    pub fn template(&self, paired: bool) -> &[ArgToken] {
        match (&self.paired_args, paired) {
            (Some(paired_args), true) => paired_args,
            _ => &self.args,
        }
    }

    /// Whether either grammar has somewhere to put a pair file.
    pub fn accepts_pair(&self) -> bool {
        self.paired_args.is_some() || template_has_slot(&self.args, Slot::Pair)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.staging.interval_seconds)
    }

    /// Resolve package and image paths; relative entries hang off `home`.
    pub fn locations(&self, home: &Path) -> Locations {
        let resolve = |value: &Option<String>| value.as_deref().map(|raw| home.join(raw));
        Locations {
            local_package: resolve(&self.package.local),
            shared_package: resolve(&self.package.shared),
            local_image: resolve(&self.container.local_image),
            shared_image: resolve(&self.container.shared_image),
        }
    }
}

fn missing_setting(raw: &ToolProfileFile, strategy: Strategy) -> Option<&'static str> {
    match strategy {
        Strategy::Package if raw.package.local.is_none() => Some("package.local"),
        Strategy::SharedPackage if raw.package.shared.is_none() => Some("package.shared"),
        Strategy::ContainerLocal if raw.container.local_image.is_none() => {
            Some("container.local_image")
        }
        Strategy::ContainerShared if raw.container.shared_image.is_none() => {
            Some("container.shared_image")
        }
        Strategy::Docker if raw.container.docker_image.is_none() => Some("container.docker_image"),
        Strategy::Module if raw.module.is_none() => Some("module"),
        _ => None,
    }
}

fn parse_template(tokens: &[String]) -> std::result::Result<Vec<ArgToken>, String> {
    let placeholder =
        Regex::new(r"^\{([a-z_]+)(\?)?\}$").expect("regex for argument placeholders");
    let mut parsed = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(cap) = placeholder.captures(token) {
            let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let slot = Slot::from_name(name)
                .ok_or_else(|| format!("unknown placeholder {token}"))?;
            parsed.push(ArgToken::Slot {
                slot,
                optional: cap.get(2).is_some(),
            });
        } else if token.contains('{') || token.contains('}') {
            return Err(format!("malformed placeholder {token}"));
        } else {
            parsed.push(ArgToken::Literal(token.clone()));
        }
    }
    Ok(parsed)
}

fn template_has_slot(tokens: &[ArgToken], wanted: Slot) -> bool {
    tokens
        .iter()
        .any(|token| matches!(token, ArgToken::Slot { slot, .. } if *slot == wanted))
}

fn template_has(tokens: &[ArgToken], wanted: Slot, optional_wanted: bool) -> bool {
    tokens.iter().any(|token| {
        matches!(token, ArgToken::Slot { slot, optional } if *slot == wanted && *optional == optional_wanted)
    })
}

fn slot_name(slot: Slot) -> &'static str {
    match slot {
        Slot::Threads => "threads",
        Slot::Reference => "reference",
        Slot::Input => "input",
        Slot::Pair => "pair",
        Slot::Extra => "extra",
    }
}

/// All tool profiles known to this invocation.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    pub source: String,
    pub profiles: BTreeMap<String, ToolProfile>,
}

impl ToolCatalog {
    pub fn from_json(text: &str, source: &str) -> Result<Self> {
        let file: ToolsFile = serde_json::from_str(text)
            .with_context(|| format!("parse tool profiles {source}"))?;
        if file.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(WrapError::Config {
                source_name: source.to_string(),
                message: format!(
                    "unsupported schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
                    file.schema_version
                ),
            }
            .into());
        }
        let mut profiles = BTreeMap::new();
        for (name, raw) in file.tools {
            let profile = ToolProfile::from_file(&name, raw, source)?;
            profiles.insert(name, profile);
        }
        Ok(Self {
            source: source.to_string(),
            profiles,
        })
    }

    pub fn get(&self, name: &str) -> Result<&ToolProfile, WrapError> {
        self.profiles
            .get(name)
            .ok_or_else(|| WrapError::UnknownTool {
                name: name.to_string(),
                known: self.profiles.keys().cloned().collect(),
            })
    }
}

/// Profiles compiled into the binary.
pub fn builtin_catalog() -> Result<ToolCatalog> {
    ToolCatalog::from_json(templates::BUILTIN_TOOLS_JSON, BUILTIN_SOURCE)
}

/// Load tool profiles: `--config`, then `BIOWRAP_CONFIG`, then the user
/// config directory, then the built-in set.
pub fn load_catalog(explicit: Option<&Path>) -> Result<ToolCatalog> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => env::var_os(CONFIG_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| user_config_path().filter(|path| path.is_file())),
    };
    let Some(path) = path else {
        tracing::debug!("using built-in tool profiles");
        return builtin_catalog();
    };
    let text = fs::read_to_string(&path)
        .with_context(|| format!("read tool profiles {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded tool profiles");
    ToolCatalog::from_json(&text, &path.display().to_string())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("biowrap").join("tools.json"))
}

/// Directory relative package and image paths are resolved against.
pub fn default_home() -> Result<PathBuf> {
    let exe = env::current_exe().context("locate wrapper executable")?;
    let exe = exe.canonicalize().unwrap_or(exe);
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

#[cfg(test)]
pub fn builtin_profile(name: &str) -> Option<ToolProfile> {
    builtin_catalog().ok()?.profiles.remove(name)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
