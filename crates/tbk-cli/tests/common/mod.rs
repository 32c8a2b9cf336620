#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tbk"))
}

pub fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("tbk_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

pub fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

pub fn assert_success(out: &Output, what: &str) {
    assert!(
        out.status.success(),
        "{what} should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
}

/// Simulate a BP3 table with `genes` rows and return its path.
pub fn simulate_bp3(name: &str, k_syn: &str, genes: usize, cells: usize, seed: u64) -> PathBuf {
    let path = tmp_path(name);
    let out = run(&[
        "simulate",
        "--k-on",
        "2",
        "--k-off",
        "4",
        "--k-syn",
        k_syn,
        "--cells",
        &cells.to_string(),
        "--genes",
        &genes.to_string(),
        "--seed",
        &seed.to_string(),
        "--source",
        "bp3",
        "--output",
        path.to_str().unwrap(),
    ]);
    assert_success(&out, "simulate");
    path
}

/// Data lines (header skipped), split on commas.
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let text = std::fs::read_to_string(path).unwrap();
    text.lines().skip(1).map(|l| l.split(',').map(str::to_string).collect()).collect()
}

pub fn read_header(path: &Path) -> String {
    let text = std::fs::read_to_string(path).unwrap();
    text.lines().next().unwrap_or_default().to_string()
}
