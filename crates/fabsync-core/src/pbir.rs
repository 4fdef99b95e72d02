use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::definition::{ItemDefinition, decode_payload, encode_payload};
use crate::error::{FabricError, Result};

/// The report part that carries the dataset reference.
pub const PBIR_PART_PATH: &str = "definition.pbir";

/// Legacy fallback catalog name, emitted only under the placeholder
/// policy.
pub const DATASET_NAME_PLACEHOLDER: &str = "DATASET_NAME_PLACEHOLDER";

const DATASOURCE_ROOT: &str = "powerbi://api.powerbi.com/v1.0/myorg";

/// The recognized shapes of `datasetReference` inside `definition.pbir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatasetReference {
    /// Source-tree form: a relative path to the model folder.
    #[serde(rename_all = "camelCase")]
    ByPath { path: String },
    /// Service form: a connection string naming a workspace/catalog or
    /// embedding a model ID.
    #[serde(rename_all = "camelCase")]
    ByConnection { connection_string: String },
}

/// How a published report points at its semantic model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindStrategy {
    /// Same-workspace form: workspace display name plus catalog name.
    ByWorkspace { workspace: String, dataset: String },
    /// Cross-workspace form: the model ID rides inside the connection
    /// string and the rebind call finalizes the link.
    ByModelId { model_id: String },
}

impl BindStrategy {
    pub(crate) fn connection_string(&self) -> String {
        match self {
            Self::ByWorkspace { workspace, dataset } => {
                format!("Data Source={DATASOURCE_ROOT}/{workspace};Initial Catalog={dataset}")
            }
            Self::ByModelId { model_id } => {
                format!("Data Source={DATASOURCE_ROOT};semanticModelId={model_id}")
            }
        }
    }
}

/// What to do when a report's dataset name cannot be recovered from its
/// definition. `PlaceholderAndWarn` reproduces the legacy behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMissingReference {
    #[default]
    Fail,
    PlaceholderAndWarn,
}

/// `../Sales.SemanticModel` → `Sales`.
pub fn dataset_name_from_path(path: &str) -> Option<String> {
    let segment = path.split('/').next_back()?;
    let name = segment.strip_suffix(".SemanticModel").unwrap_or(segment);
    (!name.is_empty()).then(|| name.to_string())
}

pub(crate) fn has_pbir_part(definition: &ItemDefinition) -> bool {
    definition.parts.iter().any(|part| part.path == PBIR_PART_PATH)
}

/// Reads the dataset reference out of a packed definition. `Ok(None)`
/// when the part or the field is absent, and when the reference shape is
/// unrecognized; the caller's missing-reference policy decides what an
/// absent reference means.
pub fn dataset_reference(definition: &ItemDefinition) -> Result<Option<DatasetReference>> {
    let Some(part) = definition
        .parts
        .iter()
        .find(|part| part.path == PBIR_PART_PATH)
    else {
        return Ok(None);
    };

    let document: Value = serde_json::from_slice(&decode_payload(part)?)?;
    match document.get("datasetReference") {
        None => Ok(None),
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(reference) => Ok(Some(reference)),
            Err(_) => {
                warn!("definition.pbir carries an unrecognized datasetReference shape");
                Ok(None)
            }
        },
    }
}

/// Replaces the dataset reference inside the `definition.pbir` part with
/// the `byConnection` form for the chosen strategy. All other parts pass
/// through byte-identical; the payload type is preserved.
pub fn rewrite_dataset_reference(
    mut definition: ItemDefinition,
    strategy: &BindStrategy,
) -> Result<ItemDefinition> {
    let part = definition
        .parts
        .iter_mut()
        .find(|part| part.path == PBIR_PART_PATH)
        .ok_or_else(|| {
            FabricError::DatasetReference(format!("definition has no {PBIR_PART_PATH} part"))
        })?;

    let mut document: Value = serde_json::from_slice(&decode_payload(part)?)?;
    let Value::Object(fields) = &mut document else {
        return Err(FabricError::DatasetReference(
            "definition.pbir is not a JSON object".to_string(),
        ));
    };

    let reference = DatasetReference::ByConnection {
        connection_string: strategy.connection_string(),
    };
    fields.insert(
        "datasetReference".to_string(),
        serde_json::to_value(&reference)?,
    );

    part.payload = encode_payload(serde_json::to_string_pretty(&document)?.as_bytes());
    Ok(definition)
}
