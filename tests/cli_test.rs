// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::process::{Command, Output};

const CELLS: &str = include_str!("data/cells.json");
const ADDER: &str = include_str!("data/adder.subnet");

fn run(args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_subnet-synth");
    let mut cmd = Command::new(exe);
    cmd.args(args);
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        cmd.env("RUST_LOG", rust_log);
    }
    let output = cmd.output().expect("subnet-synth should run");
    println!("stdout: {}", String::from_utf8_lossy(&output.stdout));
    println!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    output
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cli_subcommands() {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("adder.subnet");
    let library = temp_dir.path().join("cells.json");
    std::fs::write(&input, ADDER).unwrap();
    std::fs::write(&library, CELLS).unwrap();

    let output = run(&["print", path_str(&input)]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), ADDER);

    let rewritten = temp_dir.path().join("rewritten.bin");
    let output = run(&[
        "rewrite",
        path_str(&input),
        "--resynth",
        "bidecomp",
        "--out",
        path_str(&rewritten),
    ]);
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(stats["cells_after"].as_u64().unwrap() <= stats["cells_before"].as_u64().unwrap());
    assert!(rewritten.exists());

    let output = run(&["rewrite", path_str(&input), "--cut-source", "reconvergence"]);
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(stats["cells_after"].as_u64().unwrap() <= stats["cells_before"].as_u64().unwrap());

    let mapped = temp_dir.path().join("mapped.subnet");
    let output = run(&[
        "map",
        path_str(&rewritten),
        "--library",
        path_str(&library),
        "--strategy",
        "power-map",
        "--out",
        path_str(&mapped),
    ]);
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(summary["cells"].as_u64().unwrap() > 0);
    assert!(std::fs::read_to_string(&mapped).unwrap().starts_with("subnet {"));

    let output = run(&["activity", path_str(&input), "--ticks", "256"]);
    assert!(output.status.success());
    let report = String::from_utf8_lossy(&output.stdout).to_string();
    let mut lines = report.lines();
    assert_eq!(
        lines.next(),
        Some("index;type;arity;switching;on_state;switches_on;switches_off")
    );
    assert_eq!(lines.count(), 10);
}

#[test]
fn test_cli_npn_needs_database() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("adder.subnet");
    std::fs::write(&input, ADDER).unwrap();
    let output = run(&["rewrite", path_str(&input), "--resynth", "npn"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--npn-db"));
}
