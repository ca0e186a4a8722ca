use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;
use tracing::debug;

use crate::interrupt;
use crate::parser::Detections;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drives the external credential-testing tool across the detection matrix,
/// one child process at a time.
pub struct Runner {
    tool: String,
    target: String,
    extra_args: Vec<String>,
}

/// Outcome counters for the completion banner. Interrupted and failed
/// invocations are not retried. `failures` covers both a tool that could
/// not be launched and a child the runner lost track of while waiting.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub completed: usize,
    pub terminated: usize,
    pub failures: usize,
    pub cancelled: bool,
}

enum Invocation {
    Completed,
    Terminated,
    Failed,
}

impl Runner {
    /// `extra_command` is forwarded verbatim to every invocation after
    /// shell-word tokenization, so `-c "-u 'guest' -p ''"` becomes the four
    /// arguments `-u`, `guest`, `-p`, `` (empty).
    pub fn new(tool: &str, target: &str, extra_command: Option<&str>) -> Result<Self> {
        let extra_args = match extra_command {
            Some(command) => shell_words::split(command)
                .with_context(|| format!("cannot tokenize command string: {command}"))?,
            None => Vec::new(),
        };
        Ok(Self {
            tool: tool.to_string(),
            target: target.to_string(),
            extra_args,
        })
    }

    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    /// Run the full matrix: protocols in detection order, ports ascending.
    /// Blocks until every pair has been attempted or the run is cancelled
    /// from the top level.
    pub fn run(&self, detections: &Detections) -> RunSummary {
        let start_time = Utc::now();
        let mut completed = 0;
        let mut terminated = 0;
        let mut failures = 0;
        let mut cancelled = false;

        'matrix: for (proto, ports) in detections.iter() {
            for port in ports {
                // Flag still raised here means Ctrl-C arrived with no child
                // running: cancel the remaining matrix, not just one pair.
                if interrupt::take() {
                    println!(
                        "\n{} Interrupt received. Cancelling remaining invocations...",
                        "[INFO]".yellow().bold()
                    );
                    cancelled = true;
                    break 'matrix;
                }

                match self.run_one(proto, *port) {
                    Invocation::Completed => completed += 1,
                    Invocation::Terminated => terminated += 1,
                    Invocation::Failed => failures += 1,
                }
            }
        }

        RunSummary {
            start_time,
            end_time: Utc::now(),
            completed,
            terminated,
            failures,
            cancelled,
        }
    }

    fn run_one(&self, proto: &str, port: u16) -> Invocation {
        let port = port.to_string();
        let mut argv: Vec<&str> = vec![&self.tool, proto, &self.target, "--port", &port];
        argv.extend(self.extra_args.iter().map(String::as_str));

        println!(
            "\n{} {}",
            "[EXEC]".cyan().bold(),
            shell_words::join(&argv)
        );

        let mut command = Command::new(&self.tool);
        command.arg(proto).arg(&self.target).arg("--port").arg(&port);
        command.args(&self.extra_args);
        interrupt::shield_child(&mut command);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                eprintln!(
                    "{} Failed to execute {}: {err}",
                    "[ERROR]".red().bold(),
                    self.tool
                );
                println!("{}", "-".repeat(60));
                return Invocation::Failed;
            }
        };
        debug!("spawned {} (pid {})", self.tool, child.id());

        // Interruptible wait: poll the child so a Ctrl-C can cut this
        // invocation short without taking down the rest of the matrix.
        loop {
            if interrupt::take() {
                println!("{}", "-".repeat(60));
                println!(
                    "\n{} Interrupt received. Killing current {} process...",
                    "[INFO]".yellow().bold(),
                    self.tool
                );
                interrupt::terminate(&mut child);
                let _ = child.wait();
                println!("{} Moving on to next port...", "[INFO]".yellow().bold());
                return Invocation::Terminated;
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("{} exited with {status}", self.tool);
                    println!("{}", "-".repeat(60));
                    return Invocation::Completed;
                }
                Ok(None) => thread::sleep(WAIT_POLL_INTERVAL),
                Err(err) => {
                    eprintln!(
                        "{} Lost track of {} process: {err}",
                        "[ERROR]".red().bold(),
                        self.tool
                    );
                    println!("{}", "-".repeat(60));
                    return Invocation::Failed;
                }
            }
        }
    }
}
