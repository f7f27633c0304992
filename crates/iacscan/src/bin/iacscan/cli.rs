//! iacscan cli interface

use clap::{Parser, Subcommand, ValueEnum};
use iacscan::rule::Severity;
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; iacscan ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan terraform configuration
    ///
    /// Scans the work directory unless paths are given. Each path is a `.tf` file or a directory of `.tf` files,
    /// all of them are scanned as one configuration.
    Scan(ScanCommand),

    /// List all rules
    Rules(RulesCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Files or directories to scan
    pub paths: Vec<PathBuf>,

    /// Load variable values from a .tfvars file
    ///
    /// Can be specified multiple times, later files win. Values from
    /// TF_VAR_<name> environment variables are overridden by files.
    #[clap(long = "tfvars-file")]
    pub tfvars_files: Vec<PathBuf>,

    /// Load scan configuration (yaml or json)
    #[clap(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Do not run the rule with this code
    #[clap(short = 'e', long = "exclude")]
    pub exclude: Vec<String>,

    /// Drop results below this severity
    #[clap(short = 's', long = "minimum-severity")]
    pub minimum_severity: Option<Severity>,

    /// Also report passed checks
    #[clap(long = "include-passed")]
    pub include_passed: bool,

    /// Run rules on a single thread
    #[clap(long = "sequential")]
    pub sequential: bool,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct RulesCommand {
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Loaded hcl documents
    Documents(DevArgs),
    /// Blocks sorted by kind, with lowered expressions
    Module(DevArgs),
    /// Resolved instances of every block
    Graph(DevArgs),
}

#[derive(Parser, Debug)]
pub struct DevArgs {
    /// Files or directories to load
    pub paths: Vec<PathBuf>,
}
