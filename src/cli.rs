//! # Command-Line Interface Module
//!
//! Defines the `mixpath` command line with Clap derive macros.
//!
//! ## Commands
//!
//! - `plan`: compute a set through a graph snapshot
//! - `batch`: compute many plans against one snapshot in parallel
//! - `compat`: harmonic compatibility of two Camelot keys
//! - `neighbors`: deduplicated relationships of one track
//! - `completion`: shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! mixpath plan --graph library.json --start t12 --end t80 --duration 60 --tolerance 2
//! mixpath plan --graph library.json --start t12 --locked t40 --waypoint t51 --duration 90 --json
//! mixpath compat 8A 9B
//! ```

use crate::model::{AlgorithmVariant, EnergyFlow};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "mixpath")]
#[command(about = "Mixpath: duration-fitted, harmonically mixed DJ sets through a track relationship graph")]
#[command(version)]
pub struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MIXPATH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Arguments of the `plan` command.
///
/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Graph snapshot JSON file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub graph: PathBuf,

    /// Id of the first track
    #[arg(long)]
    pub start: String,

    /// Id of the last track
    #[arg(long)]
    pub end: Option<String>,

    /// Track that should appear in the set; may be dropped if it cannot fit
    #[arg(long = "waypoint")]
    pub waypoints: Vec<String>,

    /// Track that must appear in the set
    #[arg(long = "locked")]
    pub locked: Vec<String>,

    /// Target length in minutes
    #[arg(long)]
    pub duration: f64,

    /// Minutes either side of the target
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Weigh key compatibility heavily
    #[arg(long)]
    pub prefer_key_matching: Option<bool>,

    #[arg(long)]
    pub min_bpm: Option<f64>,

    #[arg(long)]
    pub max_bpm: Option<f64>,

    /// Camelot key permitted in the set (repeatable)
    #[arg(long = "allowed-key")]
    pub allowed_keys: Vec<String>,

    /// Largest energy change per transition (0-1)
    #[arg(long)]
    pub max_energy_change: Option<f64>,

    #[arg(long, value_enum)]
    pub energy_flow: Option<EnergyFlow>,

    /// Minutes of overshoot tolerated before unlocked waypoints are dropped
    #[arg(long)]
    pub waypoint_slack: Option<f64>,

    #[arg(long, value_enum)]
    pub variant: Option<AlgorithmVariant>,

    /// Maximum search steps before giving up
    #[arg(long)]
    pub step_budget: Option<u64>,

    /// Maximum intermediate tracks between two required stops
    #[arg(long)]
    pub max_detour_hops: Option<usize>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan a set from a start track
    ///
    /// Visits every locked waypoint, as many unlocked waypoints as fit, and
    /// either ends on the end track or stops once the length is inside the
    /// tolerance band. Exits non-zero only for invalid input; an infeasible
    /// plan is printed with its reason.
    Plan(PlanArgs),

    /// Plan every request of a JSON batch file in parallel
    ///
    /// Prints a JSON array with one entry per request, in input order.
    Batch {
        /// Graph snapshot JSON file
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        graph: PathBuf,

        /// JSON array of plan requests
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        plans: PathBuf,
    },

    /// Show the harmonic compatibility of two Camelot keys
    Compat { a: String, b: String },

    /// List the deduplicated neighbours of a track
    Neighbors {
        /// Graph snapshot JSON file
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        graph: PathBuf,

        /// Track id
        id: String,
    },

    /// Generate shell completions
    ///
    /// Usage: mixpath completion bash > ~/.local/share/bash-completion/completions/mixpath
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
