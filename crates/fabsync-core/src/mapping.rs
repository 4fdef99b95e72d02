use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FabricError, Result};
use crate::items::ItemType;

/// Reserved entry consulted when no artifact-specific entry matches.
pub const DEFAULT_ENTRY: &str = "default";

/// One raw value under an artifact entry: either an environment key
/// pointing straight at a workspace ID (legacy flat form) or an
/// item-type key holding its own environment map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScope {
    Workspace(String),
    PerEnvironment(BTreeMap<String, String>),
}

type RawMapping = BTreeMap<String, BTreeMap<String, RawScope>>;

#[derive(Debug, Clone, Default)]
struct MappingEntry {
    semantic_model: BTreeMap<String, String>,
    report: BTreeMap<String, String>,
    dataset: BTreeMap<String, String>,
    flat: BTreeMap<String, String>,
}

impl MappingEntry {
    fn typed(&self, item_type: ItemType) -> &BTreeMap<String, String> {
        match item_type {
            ItemType::SemanticModel => &self.semantic_model,
            ItemType::Report => &self.report,
        }
    }
}

/// Artifact-name → workspace-ID routing table, canonicalized at load so
/// lookups never re-interpret the document shape. Resolution is purely
/// lexical; it never calls the service.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceMapping {
    entries: BTreeMap<String, MappingEntry>,
}

impl WorkspaceMapping {
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let parsed: RawMapping = serde_norway::from_str(raw)?;
        let mut entries = BTreeMap::new();
        for (artifact, scopes) in parsed {
            let mut entry = MappingEntry::default();
            for (key, scope) in scopes {
                let folded = key.to_ascii_lowercase();
                match scope {
                    RawScope::PerEnvironment(environments) => match folded.as_str() {
                        "semanticmodel" => entry.semantic_model = environments,
                        "report" => entry.report = environments,
                        "dataset" => entry.dataset = environments,
                        _ => {
                            return Err(FabricError::Mapping(format!(
                                "'{artifact}.{key}' is not a recognized item-type scope"
                            )));
                        }
                    },
                    RawScope::Workspace(workspace) => {
                        if matches!(folded.as_str(), "semanticmodel" | "report" | "dataset") {
                            return Err(FabricError::Mapping(format!(
                                "'{artifact}.{key}' must map environments to workspace IDs"
                            )));
                        }
                        entry.flat.insert(key, workspace);
                    }
                }
            }
            entries.insert(artifact, entry);
        }
        Ok(Self { entries })
    }

    /// Workspace for an artifact in an environment. Lookup order:
    /// artifact type scope, artifact flat form, `default` type scope,
    /// `default` flat form. Empty values never match.
    pub fn resolve(&self, artifact: &str, item_type: ItemType, environment: &str) -> Result<String> {
        let candidates = [
            self.entries
                .get(artifact)
                .and_then(|entry| entry.typed(item_type).get(environment)),
            self.entries
                .get(artifact)
                .and_then(|entry| entry.flat.get(environment)),
            self.entries
                .get(DEFAULT_ENTRY)
                .and_then(|entry| entry.typed(item_type).get(environment)),
            self.entries
                .get(DEFAULT_ENTRY)
                .and_then(|entry| entry.flat.get(environment)),
        ];

        candidates
            .into_iter()
            .flatten()
            .find(|workspace| !workspace.is_empty())
            .cloned()
            .ok_or_else(|| FabricError::WorkspaceNotMapped {
                artifact: artifact.to_string(),
                environment: environment.to_string(),
            })
    }

    /// Where a report's backing model lives. Explicit `dataset` scopes
    /// win, artifact entry before `default`; otherwise the model's own
    /// resolution chain answers.
    pub fn dataset_workspace(
        &self,
        report: &str,
        model: &str,
        environment: &str,
    ) -> Result<String> {
        let explicit = [
            self.entries
                .get(report)
                .and_then(|entry| entry.dataset.get(environment)),
            self.entries
                .get(DEFAULT_ENTRY)
                .and_then(|entry| entry.dataset.get(environment)),
        ];
        if let Some(workspace) = explicit
            .into_iter()
            .flatten()
            .find(|workspace| !workspace.is_empty())
        {
            return Ok(workspace.clone());
        }
        self.resolve(model, ItemType::SemanticModel, environment)
    }

    /// Number of artifact entries, the reserved `default` excluded.
    pub fn artifact_count(&self) -> usize {
        self.entries
            .keys()
            .filter(|name| name.as_str() != DEFAULT_ENTRY)
            .count()
    }
}
