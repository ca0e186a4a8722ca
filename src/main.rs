use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use nxcrunner::cli::Cli;
use nxcrunner::interrupt;
use nxcrunner::output::OutputWriter;
use nxcrunner::parser;
use nxcrunner::rules::RuleSet;
use nxcrunner::runner::Runner;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Catch Ctrl-C from the start: an interrupt before any invocation runs
    // must end the run cleanly instead of killing the process mid-parse.
    interrupt::install();

    // Reject a broken -c string before touching the report.
    let runner = Runner::new(&cli.tool, &cli.target, cli.command.as_deref())?;

    let rules = RuleSet::new();
    let detections = parser::parse_report_file(&cli.nmap_file, &rules)?;

    let writer = OutputWriter::new(cli.output_format);
    writer.write_detections(&detections)?;

    if cli.detect_only {
        return Ok(());
    }

    writer.write_extra_command(cli.command.as_deref());
    println!(
        "\n{} Starting {} execution...",
        "[INFO]".yellow().bold(),
        cli.tool
    );

    let summary = runner.run(&detections);
    writer.write_summary(&summary)?;

    Ok(())
}
