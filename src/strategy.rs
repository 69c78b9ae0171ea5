//! Execution strategies and the selector that resolves `auto`.

use crate::config::ToolProfile;
use crate::error::WrapError;
use crate::probe::ProbeResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name accepted on the command line for automatic selection.
pub const AUTO: &str = "auto";

/// A concrete backend the wrapped tool can run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Binary from the package bundled next to the wrapper.
    Package,
    /// Binary from a site-wide shared package.
    SharedPackage,
    /// Singularity image bundled next to the wrapper.
    ContainerLocal,
    /// Singularity image from the shared site image store.
    ContainerShared,
    Docker,
    /// Executable found on `PATH`.
    Native,
    /// Environment module activated in a login shell.
    Module,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Package,
        Strategy::SharedPackage,
        Strategy::ContainerLocal,
        Strategy::ContainerShared,
        Strategy::Docker,
        Strategy::Native,
        Strategy::Module,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Package => "package",
            Strategy::SharedPackage => "shared-package",
            Strategy::ContainerLocal => "container-local",
            Strategy::ContainerShared => "container-shared",
            Strategy::Docker => "docker",
            Strategy::Native => "native",
            Strategy::Module => "module",
        }
    }

    /// Strategies whose tool runs inside a container filesystem namespace.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Strategy::ContainerLocal | Strategy::ContainerShared | Strategy::Docker
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == value)
            .ok_or_else(|| value.to_string())
    }
}

/// What the caller asked for: a specific backend, or the best available one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyRequest {
    Auto,
    Explicit(Strategy),
}

impl StrategyRequest {
    /// Parse a requested strategy name for `profile`.
    ///
    /// Unknown names are reported the same way as names the tool does not
    /// allow, before any input is waited on.
    pub fn parse(value: &str, profile: &ToolProfile) -> Result<Self, WrapError> {
        if value == AUTO {
            return Ok(StrategyRequest::Auto);
        }
        match value.parse::<Strategy>() {
            Ok(strategy) if profile.strategies.contains(&strategy) => {
                Ok(StrategyRequest::Explicit(strategy))
            }
            _ => Err(unsupported(value.to_string(), profile)),
        }
    }
}

impl fmt::Display for StrategyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyRequest::Auto => f.write_str(AUTO),
            StrategyRequest::Explicit(strategy) => strategy.fmt(f),
        }
    }
}

/// Map a request plus probe facts to exactly one allowed strategy.
pub fn select(
    request: StrategyRequest,
    probe: &ProbeResult,
    profile: &ToolProfile,
) -> Result<Strategy, WrapError> {
    match request {
        StrategyRequest::Explicit(strategy) => {
            if !profile.strategies.contains(&strategy) {
                return Err(unsupported(strategy.to_string(), profile));
            }
            if !probe.is_available(strategy) {
                tracing::warn!(
                    strategy = %strategy,
                    detail = probe.detail(strategy).unwrap_or_default(),
                    "requested strategy does not look available on this host"
                );
            }
            Ok(strategy)
        }
        StrategyRequest::Auto => {
            let chosen = profile
                .auto_priority
                .iter()
                .copied()
                .filter(|strategy| profile.strategies.contains(strategy))
                .find(|strategy| probe.is_available(*strategy));
            match chosen {
                Some(strategy) => {
                    tracing::debug!(strategy = %strategy, "auto selected strategy");
                    Ok(strategy)
                }
                None => Err(WrapError::NoStrategyAvailable {
                    tool: profile.name.clone(),
                    tried: profile
                        .auto_priority
                        .iter()
                        .map(|strategy| strategy.to_string())
                        .collect(),
                }),
            }
        }
    }
}

fn unsupported(strategy: String, profile: &ToolProfile) -> WrapError {
    WrapError::UnsupportedStrategy {
        strategy,
        tool: profile.name.clone(),
        allowed: profile
            .strategies
            .iter()
            .map(|strategy| strategy.to_string())
            .chain(std::iter::once(AUTO.to_string()))
            .collect(),
    }
}
