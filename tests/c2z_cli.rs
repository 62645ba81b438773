use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

const METER_28: &str =
    " 28 20.0M  28 5936k    0     0  2970k      0  0:00:06  0:00:01  0:00:05 2969k";

fn c2z_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_c2z").expect("c2z test binary not built")
}

fn c2z() -> Command {
    let mut command = Command::new(c2z_bin());
    command
        .env("C2Z_NO_LOGS", "1")
        .env("C2Z_CURL", "sh")
        .env("C2Z_ZENITY", "sh")
        .env_remove("C2Z_ZENITY_ARGS")
        .env_remove("C2Z_WAIT_SECS");
    command
}

fn capture_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("c2z_cli_{tag}_{}.txt", std::process::id()))
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn c2z_without_arguments_prints_usage() {
    let output = Command::new(c2z_bin()).output().expect("run c2z");
    assert!(output.status.success());
    assert!(stderr_of(&output).contains("Usage: c2z [curl_options...] URL..."));
}

#[test]
fn c2z_feeds_consumer_and_sends_completion() {
    let path = capture_path("dialog");
    let _ = fs::remove_file(&path);
    let consumer_args = format!("-c 'cat > \"$0\"' '{}'", path.display());
    let script = format!("printf '\\r{METER_28}\\r' >&2");
    let output = c2z()
        .env("C2Z_ZENITY_ARGS", consumer_args)
        .args(["-c", &script])
        .output()
        .expect("run c2z");
    let captured = fs::read_to_string(&path).unwrap_or_default();
    let _ = fs::remove_file(&path);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(captured, "28\n# 28% (2969k/s)\n100\n");
}

#[test]
fn c2z_finishes_on_producer_exit_while_its_stderr_is_held_open() {
    let path = capture_path("sigchld");
    let _ = fs::remove_file(&path);
    let consumer_args = format!("-c 'cat > \"$0\"' '{}'", path.display());
    // The orphaned sleep keeps the producer pipe open; only SIGCHLD can end the run early.
    let script = format!("(sleep 5 >&2 &) ; printf '\\r{METER_28}\\r' >&2");
    let started = Instant::now();
    let output = c2z()
        .env("C2Z_ZENITY_ARGS", consumer_args)
        .args(["-c", &script])
        .output()
        .expect("run c2z");
    let elapsed = started.elapsed();
    let captured = fs::read_to_string(&path).unwrap_or_default();
    let _ = fs::remove_file(&path);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
    assert_eq!(captured, "28\n# 28% (2969k/s)\n100\n");
}

#[test]
fn c2z_silent_producer_writes_protocol_to_stderr() {
    // `sh` takes the trailing `-s` as $0; c2z sees it as curl's silent switch.
    let output = c2z()
        .args(["-c", "printf '\\r 42\\r' >&2", "-s"])
        .output()
        .expect("run c2z");
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("42\n# 42%\n"), "stderr: {stderr}");
    assert!(!stderr.contains("100\n"));
}

#[test]
fn c2z_reports_missing_producer() {
    let output = c2z()
        .env("C2Z_CURL", "c2z-test-no-such-curl")
        .args(["-s", "http://example.invalid/"])
        .output()
        .expect("run c2z");
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("producer"), "stderr: {stderr}");
    assert!(stderr.contains("c2z-test-no-such-curl"), "stderr: {stderr}");
}

#[test]
fn c2z_reports_producer_exit_status() {
    let output = c2z()
        .args(["-c", "exit 7", "-s"])
        .output()
        .expect("run c2z");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("exited with status=7"));
}

#[test]
fn c2z_rejects_invalid_wait_timeout() {
    let output = c2z()
        .env("C2Z_WAIT_SECS", "0")
        .args(["-s", "http://example.invalid/"])
        .output()
        .expect("run c2z");
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("error: C2Z_WAIT_SECS"));
}
