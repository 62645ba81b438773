use std::io::Write;
use std::process::{Command, Output, Stdio};

const METER_HEADER: &str = "  % Total    % Received % Xferd  Average Speed   Time    Time     Time  Current\n                                 Dload  Upload   Total   Spent    Left  Speed\n";
const METER_28: &str =
    " 28 20.0M  28 5936k    0     0  2970k      0  0:00:06  0:00:01  0:00:05 2969k\r";

fn cw_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_cw").expect("cw test binary not built")
}

fn run_cw(args: &[&str], input: &[u8]) -> Output {
    let mut child = Command::new(cw_bin())
        .args(args)
        .env("C2Z_NO_LOGS", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cw");
    {
        let mut stdin = child.stdin.take().expect("cw stdin");
        stdin.write_all(input).expect("write cw stdin");
    }
    child.wait_with_output().expect("wait cw")
}

#[test]
fn cw_translates_meter_and_appends_completion() {
    let input = format!("{METER_HEADER}\r{METER_28}");
    let output = run_cw(&[], input.as_bytes());
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "28\n# 28% (2969k/s)\n100\n"
    );
    assert!(output.stderr.is_empty(), "unexpected stderr: {output:?}");
}

#[test]
fn cw_skips_zero_percent_meter_lines() {
    let input = "\r  0 20.0M   0     0    0     0      0      0 --:--:-- --:--:-- --:--:--     0\r";
    let output = run_cw(&[], input.as_bytes());
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "100\n");
}

#[test]
fn cw_reads_progress_bar_with_hash_flag() {
    let input = "\r######################                                      30,4%\r######################################################     79,9%\r";
    let output = run_cw(&["-#"], input.as_bytes());
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "30\n# 30%\n79\n# 79%\n100\n"
    );
}

#[test]
fn cw_empty_input_still_completes() {
    let output = run_cw(&[], b"");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "100\n");
}

#[test]
fn cw_help_and_version() {
    let help = Command::new(cw_bin()).arg("--help").output().expect("run cw --help");
    assert!(help.status.success());
    assert!(String::from_utf8_lossy(&help.stdout).contains("Parse curl's progress meter/bar"));

    let version = Command::new(cw_bin()).arg("-V").output().expect("run cw -V");
    assert!(version.status.success());
    assert!(String::from_utf8_lossy(&version.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cw_rejects_unknown_flags() {
    let output = Command::new(cw_bin())
        .arg("--bogus")
        .stdin(Stdio::null())
        .output()
        .expect("run cw --bogus");
    assert!(!output.status.success());
}

#[test]
fn cw_warns_about_extra_arguments() {
    let output = run_cw(&["stray"], b"");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning: unwanted argument(s)"), "stderr: {stderr}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "100\n");
}
