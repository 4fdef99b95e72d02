use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use fabsync_core::HttpGateway;
use fabsync_core::auth::{Credentials, acquire_token};
use fabsync_core::deploy::{DeployOptions, DeploymentReport, run_deployment, run_push};
use fabsync_core::items::PublishOptions;
use fabsync_core::mapping::WorkspaceMapping;
use fabsync_core::operations::TrackOptions;
use fabsync_core::pbir::OnMissingReference;
use tracing::debug;

use crate::cli::{Commands, DeployArgs, PublishArgs, PushArgs};

pub(crate) fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Deploy(args) => deploy(args),
        Commands::Push(args) => push(args),
    }
}

// Credentials and the mapping are checked before any network call, so
// configuration mistakes fail without touching the service.
fn deploy(args: DeployArgs) -> Result<()> {
    let credentials = Credentials::from_env().context("service principal credentials")?;
    let mapping = WorkspaceMapping::from_path(&args.mapping_file).with_context(|| {
        format!(
            "failed to load workspace mapping {}",
            args.mapping_file.display()
        )
    })?;
    debug!(artifacts = mapping.artifact_count(), "workspace mapping loaded");

    let gateway = HttpGateway::new(acquire_token(&credentials)?)?;
    let options = deploy_options(&args.publish);

    let report = run_deployment(
        &gateway,
        &args.publish.source,
        &mapping,
        args.environment.as_str(),
        &options,
    )?;
    finish(&report)
}

fn push(args: PushArgs) -> Result<()> {
    let credentials = Credentials::from_env().context("service principal credentials")?;
    let gateway = HttpGateway::new(acquire_token(&credentials)?)?;
    let options = deploy_options(&args.publish);

    let report = run_push(
        &gateway,
        &args.publish.source,
        &args.workspace,
        args.capacity.as_deref(),
        &options,
    )?;
    finish(&report)
}

fn deploy_options(args: &PublishArgs) -> DeployOptions {
    let mut options = DeployOptions::default();
    options.pack.exclude = args.exclude.clone();
    options.publish = PublishOptions {
        track: TrackOptions {
            max_wait: Duration::from_secs(args.max_wait_seconds),
            poll_interval: Duration::from_secs(args.poll_interval_seconds),
        },
        ..PublishOptions::default()
    };
    if args.allow_placeholder_dataset {
        options.on_missing_reference = OnMissingReference::PlaceholderAndWarn;
    }
    options
}

fn finish(report: &DeploymentReport) -> Result<()> {
    print_json(report)?;
    if report.has_failures() {
        bail!(
            "{} of {} artifacts failed",
            report.failure_count(),
            report.artifacts.len()
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
