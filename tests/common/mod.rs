//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch layout with a staged reference bundle, reads, and an output dir.
///
/// ```text
/// <root>/refs/hg38/hg38.fa.bwt
/// <root>/reads/r1.fq
/// <root>/reads/r2.fq
/// <root>/out/
/// ```
pub struct Workspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().canonicalize().expect("canonicalize temp dir");
        let bundle = root.join("refs").join("hg38");
        fs::create_dir_all(&bundle).expect("create bundle");
        fs::write(bundle.join("hg38.fa"), ">chr1\nACGT\n").expect("write fasta");
        fs::write(bundle.join("hg38.fa.bwt"), b"index").expect("write index");
        fs::create_dir_all(root.join("reads")).expect("create reads");
        fs::write(root.join("reads").join("r1.fq"), "@r1\nACGT\n+\nIIII\n").expect("write r1");
        fs::write(root.join("reads").join("r2.fq"), "@r1\nTGCA\n+\nIIII\n").expect("write r2");
        fs::create_dir_all(root.join("out")).expect("create out");
        fs::create_dir_all(root.join("xdg")).expect("create config home");
        Self { _dir: dir, root }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn display(&self, relative: &str) -> String {
        self.path(relative).display().to_string()
    }

    /// Write a tools file holding `tools` and return its path.
    pub fn write_config(&self, tools: Value) -> PathBuf {
        let path = self.root.join("tools.json");
        let doc = json!({ "schema_version": 1, "tools": tools });
        fs::write(&path, serde_json::to_string_pretty(&doc).expect("serialize config"))
            .expect("write config");
        path
    }

    /// `biowrap` with an isolated config lookup.
    pub fn biowrap(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_biowrap"));
        command
            .env_remove("BIOWRAP_CONFIG")
            .env("BIOWRAP_LOG", "info")
            .env("XDG_CONFIG_HOME", self.root.join("xdg"))
            .env("HOME", &self.root);
        command
    }

    /// `biowrap run` over the standard inputs, unpaired.
    pub fn run_cmd(&self, tool: &str) -> Command {
        let mut command = self.biowrap();
        command
            .arg("run")
            .arg("--tool")
            .arg(tool)
            .arg("--reference")
            .arg(self.path("refs/hg38"))
            .arg("--input")
            .arg(self.path("reads/r1.fq"))
            .arg("--output")
            .arg(self.path("out/aln.sam"));
        command
    }
}

/// A profile that runs `sh -c <script> <reference> <input>` on the host.
pub fn shell_tool(script: &str) -> Value {
    json!({
        "executable": "sh",
        "args": ["-c", script, "{reference}", "{input}"],
        "index_suffix": ".bwt",
        "stderr_log": "run.log",
        "strategies": ["native"],
        "auto_priority": ["native"],
        "staging": { "attempts": 1, "interval_seconds": 0.05 }
    })
}

pub fn run(command: &mut Command) -> Output {
    command.output().expect("run biowrap")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
