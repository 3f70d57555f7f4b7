//! Integration tests for sonant-cli.
//!
//! Tests invoke the `sonant` binary for listing, offline rendering, and
//! configuration checks.

use std::io::Write;
use std::process::{Command, Output};

/// Helper to get the path to the `sonant` binary built by cargo.
fn sonant_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sonant"))
}

fn run(args: &[&str]) -> Output {
    sonant_bin()
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run sonant {args:?}: {e}"))
}

// ---------------------------------------------------------------------------
// `sonant list`
// ---------------------------------------------------------------------------

#[test]
fn list_shows_every_family() {
    let output = run(&["list"]);
    assert!(output.status.success(), "sonant list failed");
    let stdout = String::from_utf8_lossy(&output.stdout);

    for id in ["sinOsc", "whiteNoise", "line", "playBuffer", "triggerGrains", "distortion", "math", "sequence", "out", "value"] {
        assert!(stdout.contains(id), "listing should contain '{id}'");
    }
}

#[test]
fn list_filters_by_category() {
    let output = run(&["list", "noise"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pinkNoise"));
    assert!(!stdout.contains("sinOsc"));
}

#[test]
fn list_describes_a_generator() {
    let output = run(&["list", "sinOsc"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("freq"));
    assert!(stdout.contains("Rates:"));
}

#[test]
fn list_rejects_unknown_name() {
    let output = run(&["list", "theremin"]);
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `sonant render`
// ---------------------------------------------------------------------------

#[test]
fn render_reports_levels() {
    let output = run(&["render", "--seconds", "0.25", "--voices", "2", "--bpm", "480"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rendered 11025 frames"), "{stdout}");

    let non_finite = stdout
        .lines()
        .find(|l| l.contains("NaN/Inf"))
        .and_then(|l| l.split_whitespace().last())
        .expect("NaN/Inf line");
    assert_eq!(non_finite, "0");
}

#[test]
fn render_rejects_zero_voices() {
    let output = run(&["render", "--voices", "0"]);
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `sonant check-config`
// ---------------------------------------------------------------------------

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn check_config_accepts_valid_file() {
    let file = config_file("sample_rate = 48000.0\nblock_size = 128\n");
    let output = run(&["check-config", file.path().to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK"));
    assert!(stdout.contains("128"));
}

#[test]
fn check_config_rejects_invalid_file() {
    let file = config_file("block_size = 0\n");
    let output = run(&["check-config", file.path().to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn render_uses_config_file() {
    let file = config_file("sample_rate = 8000.0\nnum_channels = 1\n");
    let output = run(&["render", "--config", file.path().to_str().unwrap(), "--seconds", "0.5"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rendered 4000 frames (1 ch @ 8000 Hz)"), "{stdout}");
}
