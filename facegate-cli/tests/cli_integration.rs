//! CLI integration tests for facegate-cli.
//!
//! These tests run the actual binary against the mock camera and services
//! and check outputs, exit codes, and file artifacts.

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a Command for the facegate binary.
fn facegate() -> Command {
    let mut cmd = Command::cargo_bin("facegate").unwrap();
    cmd.env_remove("FACEGATE_API_URL").env_remove("RUST_LOG");
    cmd
}

/// Write a few small PNG frames for the file camera.
fn frames_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..3u8 {
        let img = RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8 * 8, y as u8 * 10, i * 60]));
        img.save(dir.path().join(format!("frame_{i}.png"))).unwrap();
    }
    dir
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    facegate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Live face verification"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("enroll"));
}

#[test]
fn test_version_displays_version() {
    facegate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("facegate"));
}

#[test]
fn test_help_shows_exit_codes() {
    facegate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_login_help_shows_session_options() {
    facegate()
        .args(["login", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--frames"))
        .stdout(predicate::str::contains("--mock"))
        .stdout(predicate::str::contains("--precheck"))
        .stdout(predicate::str::contains("--max-attempts"))
        .stdout(predicate::str::contains("--request-timeout"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_unknown_subcommand_is_usage_error() {
    facegate().arg("teleport").assert().code(64);
}

#[test]
fn test_invalid_email_is_usage_error() {
    facegate()
        .args(["login", "--email", "not-an-email", "--mock"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid subject"));
}

#[test]
fn test_weak_new_password_is_usage_error() {
    facegate()
        .args(["reset", "--email", "ada@example.org", "--new-password", "short", "--mock"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Weak password"));
}

#[test]
fn test_missing_camera_source_is_unavailable() {
    facegate()
        .args(["login", "--email", "ada@example.org"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("--frames"));
}

#[test]
fn test_missing_frames_dir_is_input_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    facegate()
        .args(["login", "--email", "ada@example.org", "--frames"])
        .arg(&missing)
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Frames directory not found"));
}

#[test]
fn test_unreachable_api_is_network_error() {
    facegate()
        .args([
            "--api-url",
            "http://127.0.0.1:9/api",
            "login",
            "--email",
            "ada@example.org",
            "--password",
            "hunter22",
        ])
        .assert()
        .code(75);
}

// ============================================================================
// Face Session Tests
// ============================================================================

#[test]
fn test_mock_login_prints_token() {
    facegate()
        .args(["login", "--email", "ada@example.org", "--mock"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOGGED IN"))
        .stdout(predicate::str::contains("mock-token-1"));
}

#[test]
fn test_quiet_login_prints_only_token() {
    facegate()
        .args(["-q", "login", "--email", "ada@example.org", "--mock"])
        .assert()
        .success()
        .stdout("mock-token-1\n");
}

#[test]
fn test_attempt_ceiling_fails_verification() {
    facegate()
        .args([
            "login",
            "--email",
            "ada@example.org",
            "--mock",
            "--max-attempts",
            "2",
        ])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("NOT VERIFIED"))
        .stderr(predicate::str::contains("attempts exhausted"));
}

#[test]
fn test_mock_password_reset() {
    facegate()
        .args([
            "reset",
            "--email",
            "ada@example.org",
            "--new-password",
            "freshpass42",
            "--mock",
            "--precheck",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSWORD RESET"));
}

#[test]
fn test_login_from_frames_directory() {
    let frames = frames_dir();
    facegate()
        .args(["login", "--email", "ada@example.org", "--mock", "--frames"])
        .arg(frames.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("mock-token-1"));
}

// ============================================================================
// Enrollment Tests
// ============================================================================

#[test]
fn test_enroll_writes_jpeg() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("face.jpg");

    facegate()
        .args(["enroll", "--email", "ada@example.org", "--mock", "--now", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("FACE ENROLLED"));

    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8], "output should be a JPEG");
}

#[test]
fn test_enroll_without_destination_is_usage_error() {
    facegate()
        .args(["enroll", "--email", "ada@example.org", "--mock", "--now"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("nothing to do"));
}

#[test]
fn test_enroll_output_to_missing_directory_is_io_error() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("missing").join("face.jpg");

    facegate()
        .args(["enroll", "--email", "ada@example.org", "--mock", "--now", "--output"])
        .arg(&output)
        .assert()
        .code(74)
        .stderr(predicate::str::contains("Failed to write image"));
}
