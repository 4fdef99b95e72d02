use clap::{Parser, Subcommand};

mod args;

pub use args::{DeployArgs, Environment, PublishArgs, PushArgs};

#[derive(Debug, Parser)]
#[command(name = "fabsync")]
#[command(about = "Publishes PBIP semantic models and reports to Microsoft Fabric", version)]
pub struct Cli {
    /// Log at debug level.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deploy every artifact under the source root to the workspaces the
    /// mapping assigns for an environment.
    Deploy(DeployArgs),
    /// Deploy every artifact into one workspace, creating it when needed.
    Push(PushArgs),
}
