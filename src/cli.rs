use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nxcrunner")]
#[command(version = "0.1.0")]
#[command(about = "Drives NetExec against services detected in a saved Nmap report", long_about = None)]
pub struct Cli {
    #[arg(short = 'f', long = "nmap-file", help = "Saved Nmap output file to parse")]
    pub nmap_file: PathBuf,

    #[arg(short = 't', long = "target", help = "Target host or IP passed to the tool")]
    pub target: String,

    #[arg(
        short = 'c',
        long = "command",
        help = "Extra arguments forwarded to every invocation. Example: -c \"-u 'guest' -p ''\""
    )]
    pub command: Option<String>,

    #[arg(
        long,
        default_value = "nxc",
        help = "Credential-testing executable to invoke (nxc or netexec)"
    )]
    pub tool: String,

    #[arg(long, help = "Parse and report detections without invoking the tool")]
    pub detect_only: bool,

    #[arg(short = 'o', long, value_enum, default_value = "human", help = "Output format")]
    pub output_format: OutputFormat,

    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    #[value(name = "human", help = "Human-readable output")]
    Human,
    #[value(name = "json", help = "JSON output")]
    Json,
}
