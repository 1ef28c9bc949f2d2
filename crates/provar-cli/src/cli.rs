use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "provar",
    about = "Idempotent cloud-resource lifecycle runs: provision, observe, verify, decommission",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scenario's flows end to end and verify observed facts.
    Run {
        /// Path to the scenario file.
        scenario: PathBuf,

        /// Which flow to exercise.
        #[arg(long, default_value = "all")]
        flow: FlowArg,

        /// Leave resources in place after verification.
        #[arg(long)]
        keep: bool,

        /// Output format.
        #[arg(long, default_value = "text")]
        output: OutputArg,
    },

    /// Show the resource names a run would use without touching the provider.
    Diff {
        /// Path to the scenario file.
        scenario: PathBuf,
    },

    /// Describe current resource state, scoped or group-wide.
    Facts {
        /// Path to the scenario file.
        scenario: PathBuf,

        /// Resource kind to describe.
        #[arg(long, default_value = "all")]
        kind: KindArg,

        /// Limit to a single resource name.
        #[arg(long)]
        name: Option<String>,

        /// Limit by tag, as 'key' or 'key:value'. Repeatable; all must match.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Output format.
        #[arg(long, default_value = "text")]
        output: OutputArg,
    },

    /// Remove leftovers from any prior run against the scenario's group.
    Destroy {
        /// Path to the scenario file.
        scenario: PathBuf,

        /// Skip the confirmation gate.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FlowArg {
    All,
    Db,
    Lb,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    All,
    DatabaseServer,
    PublicAddress,
    LoadBalancer,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Text,
    Json,
}
