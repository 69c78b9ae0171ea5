//! Command handlers: resolve → select → build → run.
use crate::cli::{ProbeArgs, RunArgs, ToolsArgs};
use crate::command::{self, Invocation, Parameters};
use crate::config::{self, ToolCatalog, ToolProfile};
use crate::error::WrapError;
use crate::mounts::{self, TranslationRequest};
use crate::probe::{self, ProbeResult, SystemHost};
use crate::runner;
use crate::staging::{self, InputKind, OutputTarget, ReferenceBundle, StagingWait, ThreadSleeper};
use crate::strategy::{self, Strategy, StrategyRequest};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Dry-run report for `run --dry-run --json`.
#[derive(Serialize)]
struct DryRun<'a> {
    tool: &'a str,
    command: String,
    invocation: &'a Invocation,
}

pub fn run_tool(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let tool = required(args.tool.as_deref(), "tool")?;
    let reference = required(args.reference.as_deref(), "reference")?;
    let input = required(args.input.as_deref(), "input")?;
    let output = required(args.output.as_deref(), "output")?;

    let catalog = config::load_catalog(config_path)?;
    let profile = catalog.get(tool)?;
    let request = StrategyRequest::parse(&args.strategy, profile)?;
    if args.pair.is_some() && !profile.accepts_pair() {
        return Err(WrapError::PairNotAccepted {
            tool: profile.name.clone(),
        }
        .into());
    }
    let home = resolve_home(args.home)?;
    let locations = profile.locations(&home);

    let wait = StagingWait::for_profile(profile);
    let mut sleeper = ThreadSleeper;
    let input = staging::resolve(input, "input", InputKind::File, wait, &mut sleeper)?;
    let pair = match args.pair.as_deref() {
        Some(pair) => Some(staging::resolve(
            pair,
            "pair",
            InputKind::File,
            wait,
            &mut sleeper,
        )?),
        None => None,
    };
    let bundle = staging::resolve(
        reference,
        "reference",
        InputKind::Directory,
        wait,
        &mut sleeper,
    )?;
    let reference = ReferenceBundle::locate(
        bundle,
        &profile.index_suffix,
        &profile.index_exclude_suffixes,
    )?;
    let output = OutputTarget::resolve(output, &profile.stderr_log)?;

    let probed = probe::probe(profile, &locations, &SystemHost);
    let chosen = strategy::select(request, &probed, profile)?;
    tracing::info!(tool, strategy = %chosen, requested = %request, "strategy selected");

    let translation = mounts::translate(
        chosen,
        TranslationRequest {
            reference: &reference,
            input: &input,
            pair: pair.as_ref(),
            output: &output,
        },
        Path::new(&profile.container.mount_root),
    )?;
    let parameters = Parameters {
        threads: args.threads,
        extra: args.extra,
    };
    let invocation = command::build(
        chosen,
        profile,
        &locations,
        &translation,
        &parameters,
        &output,
    )?;

    if args.dry_run {
        if args.json {
            let report = DryRun {
                tool,
                command: invocation.render(),
                invocation: &invocation,
            };
            let text = serde_json::to_string_pretty(&report).context("serialize dry run")?;
            println!("{text}");
        } else {
            println!("{}", invocation.render());
        }
        return Ok(());
    }

    runner::run(&invocation)?;
    Ok(())
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    tool: &'a str,
    home: &'a Path,
    strategies: Vec<ProbeEntry<'a>>,
    auto: Option<Strategy>,
}

#[derive(Serialize)]
struct ProbeEntry<'a> {
    strategy: Strategy,
    available: bool,
    detail: &'a str,
}

pub fn run_probe(args: ProbeArgs, config_path: Option<&Path>) -> Result<()> {
    let catalog = config::load_catalog(config_path)?;
    let profile = catalog.get(&args.tool)?;
    let home = resolve_home(args.home)?;
    let probed = probe::probe(profile, &profile.locations(&home), &SystemHost);
    let auto = auto_choice(&probed, profile);

    if args.json {
        let report = ProbeReport {
            tool: &profile.name,
            home: &home,
            strategies: probed
                .iter()
                .map(|(strategy, availability)| ProbeEntry {
                    strategy,
                    available: availability.available,
                    detail: &availability.detail,
                })
                .collect(),
            auto,
        };
        let text = serde_json::to_string_pretty(&report).context("serialize probe report")?;
        println!("{text}");
        return Ok(());
    }

    println!("tool: {}", profile.name);
    println!("home: {}", home.display());
    // allow-list order
    for strategy in &profile.strategies {
        let mark = if probed.is_available(*strategy) {
            "yes"
        } else {
            "no"
        };
        println!(
            "  {:<17} {:<4} {}",
            strategy.as_str(),
            mark,
            probed.detail(*strategy).unwrap_or_default()
        );
    }
    match auto {
        Some(strategy) => println!("auto: {strategy}"),
        None => println!("auto: none available"),
    }
    Ok(())
}

fn auto_choice(probed: &ProbeResult, profile: &ToolProfile) -> Option<Strategy> {
    strategy::select(StrategyRequest::Auto, probed, profile).ok()
}

#[derive(Serialize)]
struct ToolSummary<'a> {
    name: &'a str,
    executable: &'a str,
    index_suffix: &'a str,
    strategies: &'a [Strategy],
    auto_priority: &'a [Strategy],
    paired_grammar: bool,
}

pub fn run_tools(args: ToolsArgs, config_path: Option<&Path>) -> Result<()> {
    let catalog = config::load_catalog(config_path)?;
    let summaries = summarize(&catalog);
    if args.json {
        let text = serde_json::to_string_pretty(&summaries).context("serialize tool list")?;
        println!("{text}");
        return Ok(());
    }
    println!("source: {}", catalog.source);
    for summary in summaries {
        let strategies: Vec<&str> = summary.strategies.iter().map(|s| s.as_str()).collect();
        println!(
            "  {:<10} {:<10} {}",
            summary.name,
            summary.executable,
            strategies.join(", ")
        );
    }
    Ok(())
}

fn summarize(catalog: &ToolCatalog) -> Vec<ToolSummary<'_>> {
    catalog
        .profiles
        .values()
        .map(|profile| ToolSummary {
            name: &profile.name,
            executable: &profile.executable,
            index_suffix: &profile.index_suffix,
            strategies: &profile.strategies,
            auto_priority: &profile.auto_priority,
            paired_grammar: profile.paired_args.is_some(),
        })
        .collect()
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, WrapError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(WrapError::MissingArgument { name })
}

fn resolve_home(home: Option<PathBuf>) -> Result<PathBuf> {
    match home {
        Some(home) => Ok(home),
        None => config::default_home(),
    }
}
