//! CLI argument parsing for the wrapper.
//!
//! Required run inputs are plain options here; the workflow checks them so a
//! missing input is reported as a validation failure rather than a parse error.
use crate::error::{EXIT_INVALID_OPTION, EXIT_OK, EXIT_PARSE};
use crate::strategy::AUTO;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "biowrap",
    version,
    about = "Run a bioinformatics tool under the best available execution environment",
    after_help = "Strategies:\n  package, shared-package, container-local, container-shared, docker, native, module, auto\n\nExamples:\n  biowrap run --tool bwa-mem --reference /refs/hg38 --input r1.fq --pair r2.fq --output aln.sam\n  biowrap run --tool bowtie2 --strategy docker --reference /refs/hg38 --input r1.fq --output aln.sam --dry-run\n  biowrap probe --tool bwa-mem\n  biowrap tools --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Tool profile file (overrides BIOWRAP_CONFIG and the user config)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Probe(ProbeArgs),
    Tools(ToolsArgs),
}

/// Run command inputs for one tool invocation.
#[derive(Parser, Debug)]
#[command(about = "Resolve inputs, pick a strategy, and run the tool")]
pub struct RunArgs {
    /// Tool profile name
    #[arg(long, value_name = "NAME")]
    pub tool: Option<String>,

    /// Reference index directory
    #[arg(long, value_name = "DIR")]
    pub reference: Option<String>,

    /// Input reads
    #[arg(long, value_name = "FILE")]
    pub input: Option<String>,

    /// Mate reads for paired-end runs
    #[arg(long, value_name = "FILE")]
    pub pair: Option<String>,

    /// Worker threads handed to the tool
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub threads: u32,

    /// File receiving the tool's standard output
    #[arg(long, value_name = "FILE")]
    pub output: Option<String>,

    /// Execution strategy, or `auto`
    #[arg(long, value_name = "NAME", default_value = AUTO)]
    pub strategy: String,

    /// Extra tool argument, passed through verbatim (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub extra: Vec<String>,

    /// Directory bundled packages and images are resolved against
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Print the command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON output (with --dry-run)
    #[arg(long)]
    pub json: bool,
}

/// Probe command inputs.
#[derive(Parser, Debug)]
#[command(about = "Report which strategies could run a tool on this host")]
pub struct ProbeArgs {
    /// Tool profile name
    #[arg(long, value_name = "NAME")]
    pub tool: String,

    /// Directory bundled packages and images are resolved against
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Tools command inputs.
#[derive(Parser, Debug)]
#[command(about = "List configured tool profiles")]
pub struct ToolsArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Result of reading the command line.
#[derive(Debug)]
pub enum Parsed {
    Args(RootArgs),
    /// Help, version, or a rejected command line; already printed.
    Exit(u8),
}

pub fn parse<I, T>(argv: I) -> Parsed
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match RootArgs::try_parse_from(argv) {
        Ok(args) => Parsed::Args(args),
        Err(err) => {
            let _ = err.print();
            Parsed::Exit(exit_code_for_kind(err.kind()))
        }
    }
}

fn exit_code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
        ErrorKind::UnknownArgument => EXIT_INVALID_OPTION,
        _ => EXIT_PARSE,
    }
}

/// Usage line of the `run` command.
pub fn run_usage() -> String {
    let mut command = RootArgs::command();
    command.build();
    command
        .find_subcommand_mut("run")
        .map(|run| run.render_usage().to_string())
        .unwrap_or_default()
}
