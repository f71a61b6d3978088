// Each integration test file is compiled as its own independent binary
// crate, each pulling in its own copy of this module. Helpers used by some
// test binaries but not others trigger false "dead code" warnings in the
// binaries that don't call them. Allow dead_code to silence these per-binary
// false positives.
#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};

/// Result of running the blazerpc binary.
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunResult {
    fn from_output(output: Output) -> Self {
        RunResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Path to the compiled blazerpc binary (set by Cargo for [[bin]] targets).
pub fn blazerpc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_blazerpc"))
}

/// Run the blazerpc binary with the given arguments.
pub fn run(args: &[&str]) -> RunResult {
    let output = Command::new(blazerpc_bin())
        .args(args)
        .output()
        .expect("failed to execute blazerpc binary");
    RunResult::from_output(output)
}

/// Assert the exit code matches.
pub fn assert_exit_code(result: &RunResult, expected: i32) {
    assert_eq!(
        result.exit_code, expected,
        "Expected exit code {expected}, got {}.\nstdout: {}\nstderr: {}",
        result.exit_code, result.stdout, result.stderr,
    );
}
