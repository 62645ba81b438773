//! Supervises curl and zenity: spawns both, pumps curl's stderr through the filter
//! into zenity's stdin, sends the final `100` and reaps the children.


use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;

use crate::config::{InvocationPlan, OrchestratorConfig};
use crate::event_loop::{run_filter, LoopExit, SignalGuard};
use crate::filter::COMPLETION_LINE;
use crate::logging::{log_debug, report_error, report_os_error};
use crate::process::{Binding, ChildCommand, ChildExit, ChildProcess, Pipe, Role};

/// Lifecycle of one `c2z` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ProducerSpawned,
    ConsumerSpawned,
    Filtering,
    Draining,
    Reaped,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub loop_exit: LoopExit,
    /// Reaped children, producer first.
    pub children: Vec<ChildExit>,
    pub reap_failures: usize,
    pub completion_sent: bool,
}

impl RunReport {
    /// Both children exited zero, every reap worked and the loop was not cut short.
    pub fn success(&self) -> bool {
        self.reap_failures == 0
            && self.loop_exit.code() >= 0
            && self.children.iter().all(ChildExit::success)
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    plan: InvocationPlan,
    stage: Stage,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let plan = InvocationPlan::from_producer_args(&config.producer_args);
        Self {
            config,
            plan,
            stage: Stage::Init,
        }
    }

    pub fn plan(&self) -> InvocationPlan {
        self.plan
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(from = ?self.stage, to = ?next, "orchestrator stage");
        log_debug(&format!("stage {:?} -> {next:?}", self.stage));
        self.stage = next;
    }

    /// Run the whole session. Setup failures are returned before any child is left
    /// behind; everything after the spawns is reported and folded into the report.
    pub fn run(mut self) -> Result<RunReport> {
        let guard = SignalGuard::install().context("installing signal handlers")?;
        let (progress_reader, progress_writer) = Pipe::new()
            .context("creating the producer pipe")?
            .into_parts();
        let consumer_pipe = if self.plan.spawn_consumer {
            Some(Pipe::new().context("creating the consumer pipe")?.into_parts())
        } else {
            None
        };

        let producer = ChildCommand::new(Role::Producer, self.config.producer_cmd.clone())
            .args(self.config.producer_args.iter().cloned())
            .stderr(Binding::Fd(progress_writer))
            .spawn(&guard)?;
        self.advance(Stage::ProducerSpawned);

        let (consumer, consumer_input) = match consumer_pipe {
            Some((reader, writer)) => {
                let stderr = if self.config.keep_consumer_errors {
                    Binding::Inherit
                } else {
                    Binding::Close
                };
                let spawned = ChildCommand::new(Role::Consumer, self.config.consumer_cmd.clone())
                    .args(self.config.consumer_args.iter().cloned())
                    .stdin(Binding::Fd(reader))
                    .stdout(Binding::Close)
                    .stderr(stderr)
                    .spawn(&guard);
                match spawned {
                    Ok(consumer) => {
                        self.advance(Stage::ConsumerSpawned);
                        (Some(consumer), Some(File::from(writer)))
                    }
                    Err(err) => {
                        producer.terminate();
                        if let Err(reap_err) = producer.wait() {
                            report_error(&format!("{reap_err:#}"));
                        }
                        return Err(err);
                    }
                }
            }
            None => (None, None),
        };

        self.advance(Stage::Filtering);
        let mut sink: Box<dyn Write> = match consumer_input {
            Some(file) => Box::new(file),
            None => Box::new(io::stderr()),
        };
        let loop_exit = run_filter(
            progress_reader.as_fd(),
            sink.as_mut(),
            self.plan.format,
            self.config.wait_timeout,
            &guard,
        );
        self.advance(Stage::Draining);

        let mut completion_sent = false;
        if consumer.is_some() && loop_exit.producer_finished() {
            match sink.write_all(COMPLETION_LINE).and_then(|()| sink.flush()) {
                Ok(()) => completion_sent = true,
                Err(err) => report_os_error("sending the final 100 to the consumer failed", &err),
            }
        }
        if matches!(loop_exit, LoopExit::Interrupted) {
            producer.terminate();
            if let Some(consumer) = consumer.as_ref() {
                consumer.terminate();
            }
        }

        // Closing our ends lets the consumer see EOF and unblocks a producer still writing.
        drop(sink);
        drop(progress_reader);

        let mut children = Vec::with_capacity(2);
        let mut reap_failures = 0;
        for child in std::iter::once(producer).chain(consumer) {
            match reap(child) {
                Some(exit) => children.push(exit),
                None => reap_failures += 1,
            }
        }
        self.advance(Stage::Reaped);
        drop(guard);

        tracing::info!(
            loop_code = loop_exit.code(),
            completion_sent,
            reap_failures,
            "run finished"
        );
        Ok(RunReport {
            loop_exit,
            children,
            reap_failures,
            completion_sent,
        })
    }
}

fn reap(child: ChildProcess) -> Option<ChildExit> {
    match child.wait() {
        Ok(exit) => {
            if let Some(message) = exit.failure_message() {
                report_error(&message);
            }
            Some(exit)
        }
        Err(err) => {
            report_error(&format!("{err:#}"));
            None
        }
    }
}
