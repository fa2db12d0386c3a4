use clap::{Parser, Subcommand};

/// `Warden` - continuity detection and automated recovery for agent boards.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version = "0.1.0")]
#[command(about = "Continuity detection and automated recovery for agent boards.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Run one recovery sweep and print the result as JSON
    Sweep {
        /// Restrict the sweep to a single board
        #[arg(long)]
        board: Option<String>,
    },

    /// Print the live continuity snapshot for a board as JSON
    Snapshot {
        /// Board to classify
        #[arg(long)]
        board: String,
    },

    /// Start the periodic sweep daemon
    Daemon,

    /// Show configuration, schema readiness, and daemon health
    Status,

    /// Inspect recovery policies
    Policy {
        #[command(subcommand)]
        policy_command: PolicyCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// Print the effective policy for an organization (stored row or defaults)
    Show {
        /// Organization id
        #[arg(long)]
        org: String,
    },
}
