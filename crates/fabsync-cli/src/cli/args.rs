use std::path::PathBuf;

use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Dev,
    Prp,
    Prd,
}

impl Environment {
    /// Mapping column name for this environment.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prp => "prp",
            Self::Prd => "prd",
        }
    }
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Target environment column of the workspace mapping.
    #[arg(value_enum)]
    pub environment: Environment,
    /// Workspace mapping file.
    #[arg(long, default_value = "workspace-mapping.yml")]
    pub mapping_file: PathBuf,
    #[command(flatten)]
    pub publish: PublishArgs,
}

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Display name of the target workspace.
    pub workspace: String,
    /// Capacity to create the workspace on when it does not exist yet.
    #[arg(long)]
    pub capacity: Option<String>,
    #[command(flatten)]
    pub publish: PublishArgs,
}

/// Flags shared by both subcommands.
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Folder holding the *.SemanticModel and *.Report artifacts.
    #[arg(long, default_value = "src")]
    pub source: PathBuf,
    /// Exclude files from packed definitions by glob, relative to each
    /// artifact folder.
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
    /// Publish a report whose dataset cannot be determined with a
    /// placeholder connection instead of failing it.
    #[arg(long, default_value_t = false)]
    pub allow_placeholder_dataset: bool,
    /// Longest wait for one long-running operation, in seconds.
    #[arg(long, default_value_t = 300)]
    pub max_wait_seconds: u64,
    /// Pause between operation status polls, in seconds.
    #[arg(long, default_value_t = 5)]
    pub poll_interval_seconds: u64,
}
