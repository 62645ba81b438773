use std::time::Duration;

/// Longest progress line we accept; curl renders 79 columns, the slack tolerates wider terminals.
pub const LINE_BUFFER_SIZE: usize = 128;

/// One read never pulls more than two lines' worth of bytes.
pub const READ_CHUNK_SIZE: usize = LINE_BUFFER_SIZE * 2;

/// Liveness timeout for the wait primitive; only bounds a single block.
pub const DEFAULT_WAIT_SECS: u64 = 50;
pub const MIN_WAIT_SECS: u64 = 1;
pub const MAX_WAIT_SECS: u64 = 3600;

pub const DEFAULT_PRODUCER_CMD: &str = "curl";
pub const DEFAULT_CONSUMER_CMD: &str = "zenity";
pub const DEFAULT_DIALOG_TITLE: &str = "cURL wrapper";

/// Producer switches that mean curl prints no meter we could forward (or prints noise).
pub const QUIET_SWITCHES: &[&str] = &["-s", "--silent", "-v", "--verbose"];

/// Producer switches that select the `#` progress bar instead of the meter.
pub const BAR_SWITCHES: &[&str] = &["-#", "--progress-bar"];

pub const ENV_PRODUCER_CMD: &str = "C2Z_CURL";
pub const ENV_CONSUMER_CMD: &str = "C2Z_ZENITY";
pub const ENV_CONSUMER_ARGS: &str = "C2Z_ZENITY_ARGS";
pub const ENV_DIALOG_TITLE: &str = "C2Z_TITLE";
pub const ENV_KEEP_CONSUMER_ERRORS: &str = "C2Z_KEEP_ZENITY_ERRORS";
pub const ENV_WAIT_SECS: &str = "C2Z_WAIT_SECS";
pub const ENV_LOGS: &str = "C2Z_LOGS";
pub const ENV_NO_LOGS: &str = "C2Z_NO_LOGS";
pub const ENV_TRACE_LOG: &str = "C2Z_TRACE_LOG";

pub fn default_wait_timeout() -> Duration {
    Duration::from_secs(DEFAULT_WAIT_SECS)
}

/// Arguments handed to zenity when `C2Z_ZENITY_ARGS` does not replace them.
pub fn default_consumer_args(title: &str) -> Vec<String> {
    vec![
        "--progress".to_string(),
        "--no-cancel".to_string(),
        "--auto-close".to_string(),
        "--title".to_string(),
        title.to_string(),
    ]
}
