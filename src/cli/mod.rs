//! Command-line interface

use crate::{models::Slot, stats::Metric};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Token Timing - collect and compare token-check timings over HTTP
#[derive(Parser, Debug, Clone)]
#[command(name = "token-timing")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable debug output (structured JSON logs)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Sample store file (overrides STORE_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect paired timing samples under LABEL
    Collect {
        /// Experiment label the records are stored under
        label: String,
    },

    /// Compare stored samples with the rank-sum test
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Label to analyze; alone, its slot 0 is compared against its slot 1
    #[arg(required_unless_present = "list")]
    pub label: Option<String>,

    /// Second label; the selected sample of each label is compared
    pub label_b: Option<String>,

    /// Slot taken from each label when comparing two labels
    #[arg(long, default_value = "0", value_parser = parse_slot)]
    pub slot: Slot,

    /// Take whichever slot carried this token instead of a fixed slot
    #[arg(long, conflicts_with = "slot")]
    pub token: Option<String>,

    /// Measurement to compare: elapsed or runtime
    #[arg(long, default_value = "elapsed")]
    pub metric: Metric,

    /// Apply the variance correction for tied values
    #[arg(long)]
    pub tie_correction: bool,

    /// List stored labels and exit
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Command::Analyze(args) = &self.command {
            if args.token.is_some() && args.label_b.is_none() {
                return Err("--token needs two labels to compare".to_string());
            }
        }
        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && supports_color()
    }
}

fn parse_slot(s: &str) -> Result<Slot, String> {
    let value: u8 = s.parse().map_err(|_| format!("Invalid slot: {}", s))?;
    Slot::try_from(value)
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}
