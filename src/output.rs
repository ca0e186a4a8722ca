use anyhow::Result;
use colored::*;

use crate::cli::OutputFormat;
use crate::parser::Detections;
use crate::runner::RunSummary;

pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn write_detections(&self, detections: &Detections) -> Result<()> {
        match self.format {
            OutputFormat::Human => self.print_human(detections),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(detections)?),
        }
        Ok(())
    }

    fn print_human(&self, detections: &Detections) {
        println!("\n{} Detected services from Nmap:", "[INFO]".yellow().bold());
        if detections.is_empty() {
            println!("  {}", "no testable services found".dimmed());
            return;
        }
        for (proto, ports) in detections.iter() {
            let ports = ports
                .iter()
                .map(|port| port.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {}: {}", proto.white().bold(), ports.cyan());
        }
    }

    pub fn write_extra_command(&self, extra_command: Option<&str>) {
        if self.format != OutputFormat::Human {
            return;
        }
        println!("\n{} Using command:", "[INFO]".yellow().bold());
        match extra_command {
            Some(command) if !command.is_empty() => println!("  {command}"),
            _ => println!("  {}", "(none)".dimmed()),
        }
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(summary)?);
            return Ok(());
        }

        let elapsed = (summary.end_time - summary.start_time).num_seconds();
        if summary.cancelled {
            println!(
                "\n{} Execution interrupted by user. Exiting...\n",
                "[INFO]".yellow().bold()
            );
        } else {
            println!(
                "\n{} All ports have been tested. Execution completed.\n",
                "[INFO]".yellow().bold()
            );
        }
        println!(
            "{} {} completed • {} interrupted • {} failed • {}s elapsed",
            "[INFO]".yellow().bold(),
            summary.completed.to_string().white().bold(),
            summary.terminated.to_string().white().bold(),
            summary.failures.to_string().white().bold(),
            elapsed
        );
        Ok(())
    }
}
