//! dycop CLI -- generate and check conditional temporal networks.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use dycop_core::controllability::{CheckOptions, QLoopPolicy};

#[derive(Debug, Parser)]
#[command(
    name = "dycop",
    about = "Dynamic-controllability checking for conditional temporal networks"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate random temporal network instances
    Generate(GenerateArgs),
    /// Check dynamic controllability of network instances
    Check(CheckArgs),
    /// Print the JSON Schema for the network input format to stdout
    Schema,
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of instances to generate
    #[arg(long)]
    pub n_instance: u64,
    /// Number of plain time-points (the zero node is extra)
    #[arg(long)]
    pub n_node: u64,
    /// Number of nodes that observe a proposition
    #[arg(long, default_value_t = 0)]
    pub n_observer: u64,
    /// Number of random requirement edges
    #[arg(long)]
    pub n_edge: u64,
    /// Number of contingent links
    #[arg(long, default_value_t = 0)]
    pub n_contingent: u64,
    /// Weights are drawn from [-max_weight, max_weight]
    #[arg(long, default_value_t = 20)]
    pub max_weight: i32,
    /// Output directory for generated instance files
    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Input directory containing instance JSON files
    #[arg(long)]
    pub input_dir: PathBuf,
    /// Minimum delay before the executor can react to an observation
    #[arg(long, default_value_t = 0)]
    pub reaction_time: i32,
    /// Only propagate along edges ending at the zero time-point
    #[arg(long)]
    pub only_to_z: bool,
    /// Stop after this many worklist iterations
    #[arg(long)]
    pub max_iterations: Option<u64>,
    /// Stop after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// What to do with negative self-loops labeled only by unknowns
    #[arg(long, value_enum, default_value_t = QLoopArg::Propagate)]
    pub qloop: QLoopArg,
    /// Skip the shortest-path potential pre-pass
    #[arg(long)]
    pub no_potential_prepass: bool,
    /// Print rule counters and loop details
    #[arg(long)]
    pub verbose: bool,
    /// Output results as JSON (one object per file)
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QLoopArg {
    /// Seed a -∞ potential and keep propagating
    Propagate,
    /// Treat the loop as a controllability failure
    Reject,
}

impl From<QLoopArg> for QLoopPolicy {
    fn from(arg: QLoopArg) -> Self {
        match arg {
            QLoopArg::Propagate => Self::PropagateInfinity,
            QLoopArg::Reject => Self::RejectImmediately,
        }
    }
}

impl CheckArgs {
    #[must_use]
    pub fn to_options(&self) -> CheckOptions {
        CheckOptions {
            reaction_time: self.reaction_time,
            propagate_only_to_z: self.only_to_z,
            max_iterations: self.max_iterations,
            time_budget: self.timeout_ms.map(Duration::from_millis),
            qloop_policy: self.qloop.into(),
            potential_prepass: !self.no_potential_prepass,
        }
    }
}
