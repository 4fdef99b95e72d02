use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::definition::{ItemDefinition, PackOptions, pack_folder};
use crate::error::{FabricError, Result};
use crate::items::{ItemType, PublishAction, PublishOptions, publish_item};
use crate::mapping::WorkspaceMapping;
use crate::pbir::{
    BindStrategy, DATASET_NAME_PLACEHOLDER, DatasetReference, OnMissingReference,
    dataset_name_from_path, dataset_reference, has_pbir_part, rewrite_dataset_reference,
};
use crate::rebind::{locate_semantic_model, rebind_report};
use crate::transport::Gateway;
use crate::workspaces::{get_or_create_workspace, workspace_name};

/// One deployable source folder.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub item_type: ItemType,
    pub folder: PathBuf,
}

/// Run-wide knobs shared by every artifact.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub pack: PackOptions,
    pub publish: PublishOptions,
    pub on_missing_reference: OnMissingReference,
}

/// Per-artifact outcome row in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<PublishAction>,
    /// Whether the report ended up bound to its semantic model. Absent
    /// for semantic models and for reports published without a binding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one run did.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub run_id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactRecord>,
}

impl DeploymentReport {
    pub fn has_failures(&self) -> bool {
        self.artifacts.iter().any(|record| record.error.is_some())
    }

    pub fn failure_count(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|record| record.error.is_some())
            .count()
    }
}

/// `Sales.SemanticModel` → `Sales`.
pub(crate) fn artifact_display_name(folder_name: &str) -> String {
    folder_name
        .split_once('.')
        .map_or(folder_name, |(stem, _)| stem)
        .to_string()
}

/// Finds `*.SemanticModel` and `*.Report` folders directly under the
/// source root. Models come first, each group sorted by name, so a
/// report's backing model is already published when the report starts.
pub fn discover_artifacts(source_root: &Path) -> Result<Vec<Artifact>> {
    let mut models = Vec::new();
    let mut reports = Vec::new();

    for entry in std::fs::read_dir(source_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let folder_name = entry.file_name().to_string_lossy().into_owned();
        let item_type = if folder_name.ends_with(ItemType::SemanticModel.folder_suffix()) {
            ItemType::SemanticModel
        } else if folder_name.ends_with(ItemType::Report.folder_suffix()) {
            ItemType::Report
        } else {
            continue;
        };

        let artifact = Artifact {
            name: artifact_display_name(&folder_name),
            item_type,
            folder: entry.path(),
        };
        match item_type {
            ItemType::SemanticModel => models.push(artifact),
            ItemType::Report => reports.push(artifact),
        }
    }

    models.sort_by(|a, b| a.name.cmp(&b.name));
    reports.sort_by(|a, b| a.name.cmp(&b.name));
    models.extend(reports);
    Ok(models)
}

/// Where artifacts land for this run.
enum Target<'a> {
    /// Environment deployment: every artifact resolves through the
    /// mapping.
    Mapped {
        mapping: &'a WorkspaceMapping,
        environment: &'a str,
    },
    /// Push: everything lands in one already-resolved workspace.
    Fixed { workspace_id: &'a str },
}

impl Target<'_> {
    fn workspace_for(&self, artifact: &Artifact) -> Result<String> {
        match self {
            Self::Mapped { mapping, environment } => {
                mapping.resolve(&artifact.name, artifact.item_type, environment)
            }
            Self::Fixed { workspace_id } => Ok((*workspace_id).to_string()),
        }
    }

    fn dataset_workspace_for(&self, report: &Artifact, model_name: &str) -> Result<String> {
        match self {
            Self::Mapped { mapping, environment } => {
                mapping.dataset_workspace(&report.name, model_name, environment)
            }
            Self::Fixed { workspace_id } => Ok((*workspace_id).to_string()),
        }
    }
}

/// Deploys every artifact under `source_root` to the workspaces the
/// mapping assigns for `environment`. A failed artifact is recorded and
/// skipped over; the run always reaches the last artifact.
pub fn run_deployment(
    gateway: &dyn Gateway,
    source_root: &Path,
    mapping: &WorkspaceMapping,
    environment: &str,
    options: &DeployOptions,
) -> Result<DeploymentReport> {
    let target = Target::Mapped { mapping, environment };
    run(gateway, source_root, &target, environment.to_string(), options)
}

/// Deploys every artifact under `source_root` into a single workspace
/// looked up (or created) by display name.
pub fn run_push(
    gateway: &dyn Gateway,
    source_root: &Path,
    workspace: &str,
    capacity_id: Option<&str>,
    options: &DeployOptions,
) -> Result<DeploymentReport> {
    let workspace_id = get_or_create_workspace(gateway, workspace, capacity_id)?;
    let target = Target::Fixed {
        workspace_id: &workspace_id,
    };
    run(gateway, source_root, &target, workspace.to_string(), options)
}

fn run(
    gateway: &dyn Gateway,
    source_root: &Path,
    target: &Target<'_>,
    target_label: String,
    options: &DeployOptions,
) -> Result<DeploymentReport> {
    let artifacts = discover_artifacts(source_root)?;
    if artifacts.is_empty() {
        warn!(source = %source_root.display(), "no artifact folders found");
    } else {
        info!(count = artifacts.len(), target = %target_label, "starting deployment");
    }

    let started_at = Utc::now();
    let mut records = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        records.push(deploy_artifact(gateway, artifact, target, options));
    }

    let report = DeploymentReport {
        run_id: Uuid::new_v4(),
        target: target_label,
        started_at,
        finished_at: Utc::now(),
        artifacts: records,
    };
    if report.has_failures() {
        warn!(
            failed = report.failure_count(),
            total = report.artifacts.len(),
            "deployment finished with failures"
        );
    } else {
        info!(total = report.artifacts.len(), "deployment finished");
    }
    Ok(report)
}

/// Per-artifact isolation boundary: any error below this point becomes a
/// record entry, never an aborted run.
fn deploy_artifact(
    gateway: &dyn Gateway,
    artifact: &Artifact,
    target: &Target<'_>,
    options: &DeployOptions,
) -> ArtifactRecord {
    info!(artifact = %artifact.name, item_type = %artifact.item_type, "deploying artifact");
    let mut record = ArtifactRecord {
        name: artifact.name.clone(),
        item_type: artifact.item_type,
        workspace_id: None,
        item_id: None,
        action: None,
        linked: None,
        error: None,
    };

    let outcome = match artifact.item_type {
        ItemType::SemanticModel => try_deploy_model(gateway, artifact, target, options, &mut record),
        ItemType::Report => try_deploy_report(gateway, artifact, target, options, &mut record),
    };
    if let Err(failure) = outcome {
        error!(
            artifact = %artifact.name,
            code = failure.code(),
            %failure,
            "artifact deployment failed"
        );
        record.error = Some(failure.to_string());
    }
    record
}

fn try_deploy_model(
    gateway: &dyn Gateway,
    artifact: &Artifact,
    target: &Target<'_>,
    options: &DeployOptions,
    record: &mut ArtifactRecord,
) -> Result<()> {
    let workspace_id = target.workspace_for(artifact)?;
    record.workspace_id = Some(workspace_id.clone());

    let definition = pack_folder(&artifact.folder, &options.pack)?;
    let outcome = publish_item(
        gateway,
        &workspace_id,
        artifact.item_type,
        &artifact.name,
        &definition,
        &options.publish,
    )?;
    record.item_id = Some(outcome.item_id);
    record.action = Some(outcome.action);
    Ok(())
}

/// How the report definition leaves this machine.
enum ReportBinding {
    /// Reference rewritten for the target, rebind follows the publish.
    Bound { strategy: BindStrategy, model_id: String },
    /// Source already carries a connection-form reference; keep it.
    KeepExisting,
    /// No recoverable reference; publish with the placeholder catalog.
    Placeholder,
}

fn try_deploy_report(
    gateway: &dyn Gateway,
    artifact: &Artifact,
    target: &Target<'_>,
    options: &DeployOptions,
    record: &mut ArtifactRecord,
) -> Result<()> {
    let workspace_id = target.workspace_for(artifact)?;
    record.workspace_id = Some(workspace_id.clone());

    let definition = pack_folder(&artifact.folder, &options.pack)?;
    let binding = resolve_binding(gateway, artifact, target, &workspace_id, &definition, options)?;

    let definition = match &binding {
        ReportBinding::Bound { strategy, .. } => rewrite_dataset_reference(definition, strategy)?,
        ReportBinding::KeepExisting => definition,
        ReportBinding::Placeholder => {
            if has_pbir_part(&definition) {
                let strategy = BindStrategy::ByWorkspace {
                    workspace: workspace_name(gateway, &workspace_id)?,
                    dataset: DATASET_NAME_PLACEHOLDER.to_string(),
                };
                rewrite_dataset_reference(definition, &strategy)?
            } else {
                definition
            }
        }
    };

    let outcome = publish_item(
        gateway,
        &workspace_id,
        artifact.item_type,
        &artifact.name,
        &definition,
        &options.publish,
    )?;
    record.item_id = Some(outcome.item_id.clone());
    record.action = Some(outcome.action);

    // The report exists either way from here on; a failed rebind is a
    // warning, not an artifact failure.
    if let ReportBinding::Bound { model_id, .. } = &binding {
        match rebind_report(gateway, &workspace_id, &outcome.item_id, model_id) {
            Ok(()) => record.linked = Some(true),
            Err(failure) => {
                warn!(
                    artifact = %artifact.name,
                    %failure,
                    "report published but rebind failed; fix the dataset link manually"
                );
                record.linked = Some(false);
            }
        }
    }
    Ok(())
}

fn resolve_binding(
    gateway: &dyn Gateway,
    artifact: &Artifact,
    target: &Target<'_>,
    report_workspace_id: &str,
    definition: &ItemDefinition,
    options: &DeployOptions,
) -> Result<ReportBinding> {
    let model_name = match dataset_reference(definition)? {
        Some(DatasetReference::ByPath { path }) => dataset_name_from_path(&path),
        Some(DatasetReference::ByConnection { .. }) => {
            info!(artifact = %artifact.name, "definition already carries a connection reference; keeping it");
            return Ok(ReportBinding::KeepExisting);
        }
        None => None,
    };

    let Some(model_name) = model_name else {
        return match options.on_missing_reference {
            OnMissingReference::Fail => Err(FabricError::DatasetReference(format!(
                "could not determine the dataset for report '{}'",
                artifact.name
            ))),
            OnMissingReference::PlaceholderAndWarn => {
                warn!(
                    artifact = %artifact.name,
                    "no recoverable dataset reference; publishing with a placeholder connection"
                );
                Ok(ReportBinding::Placeholder)
            }
        };
    };

    let dataset_workspace_id = target.dataset_workspace_for(artifact, &model_name)?;
    let model_id = locate_semantic_model(gateway, &dataset_workspace_id, &model_name)?;

    let strategy = if dataset_workspace_id == report_workspace_id {
        BindStrategy::ByWorkspace {
            workspace: workspace_name(gateway, report_workspace_id)?,
            dataset: model_name,
        }
    } else {
        BindStrategy::ByModelId {
            model_id: model_id.clone(),
        }
    };
    Ok(ReportBinding::Bound { strategy, model_id })
}
