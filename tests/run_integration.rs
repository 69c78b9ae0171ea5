mod common;

use common::{run, shell_tool, stderr, stdout, Workspace};
use serde_json::{json, Value};
use std::fs;

#[test]
fn native_dry_run_prints_tool_command() {
    let ws = Workspace::new();
    let output = run(ws
        .run_cmd("bwa-mem")
        .args(["--threads", "4", "--strategy", "native", "--dry-run"]));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let expected = format!(
        "bwa mem -t 4 {} {} > {} 2> {}\n",
        ws.display("refs/hg38/hg38.fa"),
        ws.display("reads/r1.fq"),
        ws.display("out/aln.sam"),
        ws.display("out/bwa-mem.log"),
    );
    assert_eq!(stdout(&output), expected);
    assert!(!ws.path("out/aln.sam").exists());
}

#[test]
fn container_dry_run_binds_each_directory() {
    let ws = Workspace::new();
    let output = run(ws.run_cmd("bwa-mem").args([
        "--strategy",
        "container-local",
        "--home",
        &ws.display("home"),
        "--dry-run",
    ]));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let line = stdout(&output);
    assert!(line.starts_with("singularity exec "), "{line}");
    assert_eq!(line.matches("--bind ").count(), 3, "{line}");
    for bind in [
        format!("--bind {}:/mnt/mount0:ro", ws.display("refs/hg38")),
        format!("--bind {}:/mnt/mount1:ro", ws.display("reads")),
        format!("--bind {}:/mnt/mount2 ", ws.display("out")),
    ] {
        assert!(line.contains(&bind), "missing {bind} in {line}");
    }
    assert!(line.contains(&format!("{} bwa mem", ws.display("home/images/bwa_0.7.17.sif"))));
    assert!(line.contains("/mnt/mount0/hg38.fa /mnt/mount1/r1.fq >"), "{line}");
}

#[test]
fn dry_run_json_reports_invocation() {
    let ws = Workspace::new();
    let output = run(ws.run_cmd("bwa-mem").args([
        "--strategy",
        "docker",
        "--pair",
        &ws.display("reads/r2.fq"),
        "--dry-run",
        "--json",
    ]));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let report: Value = serde_json::from_str(&stdout(&output)).expect("parse dry run json");
    assert_eq!(report["tool"], "bwa-mem");
    let invocation = &report["invocation"];
    assert_eq!(invocation["strategy"], "docker");
    assert_eq!(invocation["program"], "docker");
    let mounts = invocation["mounts"].as_array().expect("mounts");
    // r1 and r2 share the reads directory
    assert_eq!(mounts.len(), 3);
    assert_eq!(mounts[0]["host_dir"], json!(ws.display("refs/hg38")));
    assert_eq!(mounts[2]["read_only"], json!(false));
    let args: Vec<&str> = invocation["args"]
        .as_array()
        .expect("args")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(&args[args.len() - 2..], ["/mnt/mount1/r1.fq", "/mnt/mount1/r2.fq"]);
}

#[test]
fn paired_bowtie2_uses_mate_grammar() {
    let ws = Workspace::new();
    fs::write(ws.path("refs/hg38/hg38.fa.1.bt2"), b"index").unwrap();
    fs::write(ws.path("refs/hg38/hg38.fa.rev.1.bt2"), b"index").unwrap();
    let output = run(ws.run_cmd("bowtie2").args([
        "--strategy",
        "native",
        "--threads",
        "2",
        "--pair",
        &ws.display("reads/r2.fq"),
        "--dry-run",
    ]));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let expected = format!(
        "bowtie2 -p 2 -x {} -1 {} -2 {} > {} 2> {}\n",
        ws.display("refs/hg38/hg38.fa"),
        ws.display("reads/r1.fq"),
        ws.display("reads/r2.fq"),
        ws.display("out/aln.sam"),
        ws.display("out/bowtie2.log"),
    );
    assert_eq!(stdout(&output), expected);
}

#[test]
fn pair_is_refused_by_single_end_grammar() {
    let ws = Workspace::new();
    let config = ws.write_config(json!({ "single": shell_tool("true") }));
    let output = run(ws
        .run_cmd("single")
        .arg("--config")
        .arg(&config)
        .args(["--strategy", "native", "--dry-run", "--pair"])
        .arg(ws.path("reads/missing.fq")));
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("tool 'single' takes no pair file"), "{err}");
    // refused before any staging wait
    assert!(!err.contains("input not staged yet"), "{err}");
    assert!(stdout(&output).is_empty());
}

#[test]
fn never_staged_input_fails_without_running() {
    let ws = Workspace::new();
    let config = ws.write_config(json!({ "echo": shell_tool("echo ran > marker") }));
    let output = run(ws
        .biowrap()
        .arg("--config")
        .arg(&config)
        .args(["run", "--tool", "echo"])
        .arg("--reference")
        .arg(ws.path("refs/hg38"))
        .arg("--input")
        .arg(ws.path("reads/missing.fq"))
        .arg("--output")
        .arg(ws.path("out/aln.sam")));
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("was not staged"), "{err}");
    // attempts = 1: the first check, one sleep, the final check
    assert_eq!(err.matches("input not staged yet").count(), 2, "{err}");
    assert!(!ws.path("out/aln.sam").exists());
    assert!(!ws.path("out/run.log").exists());
}

#[test]
fn ambiguous_reference_bundle_fails_before_selection() {
    let ws = Workspace::new();
    fs::write(ws.path("refs/hg38/decoy.fa.bwt"), b"index").unwrap();
    let output = run(ws.run_cmd("bwa-mem").arg("--dry-run"));
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("invalid reference bundle"), "{err}");
    assert!(err.contains("found 2"), "{err}");
    assert!(!err.contains("strategy selected"), "{err}");
    assert!(stdout(&output).is_empty());
}

#[test]
fn run_captures_tool_streams() {
    let ws = Workspace::new();
    let config = ws.write_config(json!({
        "echo": shell_tool("echo \"aligned $1\"; echo progress >&2")
    }));
    let output = run(ws.run_cmd("echo").arg("--config").arg(&config));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(
        fs::read_to_string(ws.path("out/aln.sam")).unwrap(),
        format!("aligned {}\n", ws.display("reads/r1.fq"))
    );
    assert_eq!(
        fs::read_to_string(ws.path("out/run.log")).unwrap(),
        "progress\n"
    );
}

#[test]
fn tools_lists_builtin_profiles() {
    let ws = Workspace::new();
    let output = run(ws.biowrap().args(["tools", "--json"]));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let tools: Value = serde_json::from_str(&stdout(&output)).expect("parse tools json");
    let names: Vec<&str> = tools
        .as_array()
        .expect("tool list")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(names, ["bowtie2", "bwa-mem", "hisat2"]);
}

#[test]
fn probe_reports_every_allowed_strategy() {
    let ws = Workspace::new();
    let config = ws.write_config(json!({ "echo": shell_tool("true") }));
    let output = run(ws
        .biowrap()
        .arg("--config")
        .arg(&config)
        .args(["probe", "--tool", "echo", "--json"]));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let report: Value = serde_json::from_str(&stdout(&output)).expect("parse probe json");
    assert_eq!(report["strategies"].as_array().map(Vec::len), Some(1));
    // `sh` is on PATH wherever the tests run
    assert_eq!(report["strategies"][0]["available"], json!(true));
    assert_eq!(report["auto"], "native");
}
