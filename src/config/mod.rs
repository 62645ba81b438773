//! Command-line parsing and environment configuration for `cw` and `c2z`.

mod defaults;
mod validation;

use clap::Parser;
use std::ffi::OsString;
use std::time::Duration;

use crate::filter::ProgressFormat;
use crate::logging::LogSettings;

pub use defaults::{
    default_consumer_args, default_wait_timeout, BAR_SWITCHES, DEFAULT_CONSUMER_CMD,
    DEFAULT_DIALOG_TITLE, DEFAULT_PRODUCER_CMD, DEFAULT_WAIT_SECS, ENV_CONSUMER_ARGS,
    ENV_CONSUMER_CMD, ENV_DIALOG_TITLE, ENV_KEEP_CONSUMER_ERRORS, ENV_LOGS, ENV_NO_LOGS,
    ENV_PRODUCER_CMD, ENV_TRACE_LOG, ENV_WAIT_SECS, LINE_BUFFER_SIZE, MAX_WAIT_SECS,
    MIN_WAIT_SECS, QUIET_SWITCHES, READ_CHUNK_SIZE,
};

/// CLI options for the standalone `cw` filter.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "cw",
    about = "Parse curl's progress meter/bar (stdin => stdout).",
    version
)]
pub struct FilterArgs {
    /// Progress bar input data (curl -#)
    #[arg(short = '#', default_value_t = false)]
    pub progress_bar: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = ENV_LOGS, default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs)
    #[arg(long = "no-logs", env = ENV_NO_LOGS, default_value_t = false)]
    pub no_logs: bool,

    /// Unexpected positional arguments; reported and ignored.
    #[arg(hide = true)]
    pub extra: Vec<String>,
}

impl FilterArgs {
    pub fn format(&self) -> ProgressFormat {
        if self.progress_bar {
            ProgressFormat::Bar
        } else {
            ProgressFormat::Meter
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            logs: self.logs,
            no_logs: self.no_logs,
        }
    }
}

/// `c2z` owns no flags: everything on its command line belongs to curl.
#[derive(Debug, Parser, Clone)]
#[command(name = "c2z", disable_help_flag = true, disable_version_flag = true)]
pub struct WrapperArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub producer_args: Vec<String>,
}

impl WrapperArgs {
    /// Parse `c2z`'s argv. clap swallows a `--` in first position, but curl must
    /// still see it, so it is put back.
    pub fn from_argv<I, T>(argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        let leading_separator = argv.get(1).is_some_and(|arg| arg == "--");
        let mut parsed = Self::parse_from(argv);
        if leading_separator && parsed.producer_args.first().map(String::as_str) != Some("--") {
            parsed.producer_args.insert(0, "--".to_string());
        }
        parsed
    }
}

/// Everything the orchestrator needs to spawn and supervise curl and zenity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub producer_cmd: String,
    pub producer_args: Vec<String>,
    pub consumer_cmd: String,
    pub consumer_args: Vec<String>,
    pub keep_consumer_errors: bool,
    pub wait_timeout: Duration,
    pub log: LogSettings,
}

/// Decisions derived from the producer's own switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationPlan {
    /// False when curl is silenced or verbose; protocol lines then go to our stderr.
    pub spawn_consumer: bool,
    pub format: ProgressFormat,
}

impl InvocationPlan {
    /// Scan the producer arguments for exact matches of the known switches.
    pub fn from_producer_args(args: &[String]) -> Self {
        let has_any = |switches: &[&str]| {
            args.iter()
                .any(|arg| arg.starts_with('-') && switches.contains(&arg.as_str()))
        };
        let format = if has_any(BAR_SWITCHES) {
            ProgressFormat::Bar
        } else {
            ProgressFormat::Meter
        };
        Self {
            spawn_consumer: !has_any(QUIET_SWITCHES),
            format,
        }
    }
}
