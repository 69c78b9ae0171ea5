mod common;

use common::{run, shell_tool, stderr, stdout, Workspace};
use serde_json::json;

#[test]
fn help_and_version_exit_zero() {
    let ws = Workspace::new();
    let help = run(ws.biowrap().arg("--help"));
    assert_eq!(help.status.code(), Some(0));
    assert!(stdout(&help).contains("Usage:"));
    assert_eq!(stderr(&help), "");

    let version = run(ws.biowrap().arg("--version"));
    assert_eq!(version.status.code(), Some(0));
    assert!(stdout(&version).starts_with("biowrap "));
    assert_eq!(stderr(&version), "");
}

#[test]
fn unknown_option_exits_three() {
    let ws = Workspace::new();
    let output = run(ws.run_cmd("bwa-mem").arg("--no-such-flag"));
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn malformed_value_exits_two() {
    let ws = Workspace::new();
    let output = run(ws.run_cmd("bwa-mem").args(["--threads", "abc"]));
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_input_prints_usage_and_exits_one() {
    let ws = Workspace::new();
    let output = run(ws
        .biowrap()
        .args(["run", "--tool", "bwa-mem", "--reference"])
        .arg(ws.path("refs/hg38"))
        .arg("--output")
        .arg(ws.path("out/aln.sam")));
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("missing required argument: input"), "{err}");
    assert!(err.contains("Usage:") && err.contains("run [OPTIONS]"), "{err}");
}

#[test]
fn disallowed_strategy_exits_one_with_usage() {
    let ws = Workspace::new();
    let output = run(ws.run_cmd("hisat2").args(["--strategy", "module"]));
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("strategy 'module' is not supported by hisat2"), "{err}");
    assert!(err.contains("Usage:"), "{err}");
}

#[test]
fn unknown_tool_exits_one() {
    let ws = Workspace::new();
    let output = run(&mut ws.run_cmd("star"));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown tool 'star'"));
}

#[test]
fn backend_exit_code_is_passed_through() {
    let ws = Workspace::new();
    let config = ws.write_config(json!({ "fail": shell_tool("echo broken >&2; exit 5") }));
    let output = run(ws.run_cmd("fail").arg("--config").arg(&config));
    assert_eq!(output.status.code(), Some(5));
    let err = stderr(&output);
    assert!(err.contains("command failed"), "{err}");
    assert_eq!(
        std::fs::read_to_string(ws.path("out/run.log")).unwrap(),
        "broken\n"
    );
}

#[test]
fn missing_backend_program_exits_127() {
    let ws = Workspace::new();
    let mut tool = shell_tool("true");
    tool["executable"] = json!("biowrap-no-such-aligner");
    let config = ws.write_config(json!({ "ghost": tool }));
    let output = run(ws
        .run_cmd("ghost")
        .arg("--config")
        .arg(&config)
        .args(["--strategy", "native"]));
    assert_eq!(output.status.code(), Some(127), "{}", stderr(&output));
}

#[test]
fn invalid_config_exits_one() {
    let ws = Workspace::new();
    let mut tool = shell_tool("true");
    tool["args"] = json!(["{input}"]);
    let config = ws.write_config(json!({ "broken": tool }));
    let output = run(ws.run_cmd("broken").arg("--config").arg(&config));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("args is missing {reference}"));
}
