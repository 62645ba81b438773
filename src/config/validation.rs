use super::defaults::{
    default_consumer_args, DEFAULT_CONSUMER_CMD, DEFAULT_DIALOG_TITLE, DEFAULT_PRODUCER_CMD,
    DEFAULT_WAIT_SECS, ENV_CONSUMER_ARGS, ENV_CONSUMER_CMD, ENV_DIALOG_TITLE,
    ENV_KEEP_CONSUMER_ERRORS, ENV_LOGS, ENV_NO_LOGS, ENV_PRODUCER_CMD, ENV_WAIT_SECS,
    MAX_WAIT_SECS, MIN_WAIT_SECS,
};
use super::{OrchestratorConfig, WrapperArgs};
use crate::logging::LogSettings;
use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

impl OrchestratorConfig {
    /// Build the configuration from parsed `c2z` arguments and the process environment.
    pub fn from_env(args: WrapperArgs) -> Result<Self> {
        Self::from_lookup(args.producer_args, |key| env::var(key).ok())
    }

    /// Build and validate the configuration, reading variables through `lookup`.
    pub fn from_lookup<F>(producer_args: Vec<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let producer_cmd = lookup(ENV_PRODUCER_CMD).unwrap_or_else(|| DEFAULT_PRODUCER_CMD.into());
        let consumer_cmd = lookup(ENV_CONSUMER_CMD).unwrap_or_else(|| DEFAULT_CONSUMER_CMD.into());
        let title = lookup(ENV_DIALOG_TITLE).unwrap_or_else(|| DEFAULT_DIALOG_TITLE.into());

        let consumer_args = match lookup(ENV_CONSUMER_ARGS) {
            Some(raw) => shell_words::split(&raw)
                .with_context(|| format!("{ENV_CONSUMER_ARGS} is not valid shell syntax: {raw}"))?,
            None => default_consumer_args(&title),
        };

        let wait_secs = match lookup(ENV_WAIT_SECS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{ENV_WAIT_SECS} must be a whole number of seconds"))?,
            None => DEFAULT_WAIT_SECS,
        };

        let mut config = Self {
            producer_cmd,
            producer_args,
            consumer_cmd,
            consumer_args,
            keep_consumer_errors: parse_env_flag(ENV_KEEP_CONSUMER_ERRORS, &lookup)?,
            wait_timeout: Duration::from_secs(wait_secs),
            log: LogSettings {
                logs: parse_env_flag(ENV_LOGS, &lookup)?,
                no_logs: parse_env_flag(ENV_NO_LOGS, &lookup)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail late, after a child is already running.
    pub fn validate(&mut self) -> Result<()> {
        self.producer_cmd = sanitize_command(&self.producer_cmd, ENV_PRODUCER_CMD)?;
        self.consumer_cmd = sanitize_command(&self.consumer_cmd, ENV_CONSUMER_CMD)?;

        let wait_secs = self.wait_timeout.as_secs();
        if !(MIN_WAIT_SECS..=MAX_WAIT_SECS).contains(&wait_secs) {
            bail!(
                "{ENV_WAIT_SECS} must be between {MIN_WAIT_SECS} and {MAX_WAIT_SECS}, got {wait_secs}"
            );
        }

        for arg in self.producer_args.iter().chain(self.consumer_args.iter()) {
            if arg.contains('\0') {
                bail!("argument contains NUL byte: {arg:?}");
            }
        }
        Ok(())
    }
}

/// Commands are looked up on PATH at exec time, so only their shape is checked here.
pub(super) fn sanitize_command(value: &str, var: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{var} cannot be empty");
    }
    if trimmed.contains('\0') {
        bail!("{var} contains a NUL byte");
    }
    Ok(trimmed.to_string())
}

pub(super) fn parse_env_flag<F>(var: &str, lookup: &F) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => bail!("{var} must be a boolean (1/0, true/false), got {other:?}"),
    }
}
