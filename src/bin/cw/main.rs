//! `cw`: filter curl's progress meter (or `-#` bar) from stdin into zenity
//! progress lines on stdout.

use clap::Parser;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::process::ExitCode;

use c2z::config::{default_wait_timeout, FilterArgs};
use c2z::event_loop::{run_filter, LoopExit, SignalGuard};
use c2z::filter::COMPLETION_LINE;
use c2z::{init_logging, log_debug, report_os_error, report_warning};

fn main() -> ExitCode {
    let args = FilterArgs::parse();
    init_logging(args.log_settings());
    log_debug(&format!("=== cw started ({}) ===", args.format().label()));
    if !args.extra.is_empty() {
        report_warning(&format!(
            "unwanted argument(s), ignoring them: {}",
            args.extra.join(" ")
        ));
    }

    let guard = match SignalGuard::install() {
        Ok(guard) => guard,
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let exit = run_filter(
        stdin.as_fd(),
        &mut stdout,
        args.format(),
        default_wait_timeout(),
        &guard,
    );

    match exit {
        LoopExit::EndOfStream | LoopExit::HangUp => {
            match stdout.write_all(COMPLETION_LINE).and_then(|()| stdout.flush()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    report_os_error("writing the final 100 failed", &err);
                    ExitCode::FAILURE
                }
            }
        }
        LoopExit::ChildExited => ExitCode::SUCCESS,
        LoopExit::Interrupted | LoopExit::StreamError(_) => ExitCode::FAILURE,
    }
}
