//! `c2z`: run curl with its progress shown in a zenity dialog.

use std::io::{self, Write};
use std::process::ExitCode;

use c2z::config::{OrchestratorConfig, WrapperArgs};
use c2z::orchestrator::Orchestrator;
use c2z::{init_logging, log_debug, log_file_path};

const USAGE: &str = "Usage: c2z [curl_options...] URL...";

fn main() -> ExitCode {
    let args = WrapperArgs::from_argv(std::env::args_os());
    if args.producer_args.is_empty() {
        let _ = writeln!(io::stderr(), "{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = match OrchestratorConfig::from_env(args) {
        Ok(config) => config,
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log);
    log_debug("=== c2z started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));
    log_debug(&format!(
        "producer: {} {:?}",
        config.producer_cmd, config.producer_args
    ));

    match Orchestrator::new(config).run() {
        Ok(report) if report.success() => ExitCode::SUCCESS,
        Ok(report) => {
            log_debug(&format!("run failed: {report:?}"));
            ExitCode::FAILURE
        }
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
