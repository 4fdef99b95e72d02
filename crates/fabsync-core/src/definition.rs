use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FabricError, Result};

/// The only payload encoding the items API accepts.
pub const INLINE_BASE64: &str = "InlineBase64";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionPart {
    pub path: String,
    pub payload: String,
    pub payload_type: String,
}

/// Wire shape of an item definition: one base64 part per source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub parts: Vec<DefinitionPart>,
}

/// Packaging knobs. Empty by default: every file in the artifact folder
/// becomes a part, exactly as it sits on disk.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Relative-path globs to leave out of the definition.
    pub exclude: Vec<String>,
}

impl PackOptions {
    fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}

/// Packs an artifact folder: relative forward-slash paths, base64
/// payloads, parts sorted by path so a folder packs reproducibly.
pub fn pack_folder(folder: &Path, options: &PackOptions) -> Result<ItemDefinition> {
    let excluded = options.exclude_set()?;
    let mut parts = Vec::new();

    for entry in WalkDir::new(folder)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.path().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(folder)
            .map_err(|e| FabricError::Internal(e.to_string()))?;
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if excluded.is_match(&rel_path) {
            debug!(path = %rel_path, "excluded from definition");
            continue;
        }

        let bytes = fs::read(entry.path())?;
        parts.push(DefinitionPart {
            path: rel_path,
            payload: BASE64.encode(&bytes),
            payload_type: INLINE_BASE64.to_string(),
        });
    }

    if parts.is_empty() {
        return Err(FabricError::EmptyArtifact(folder.display().to_string()));
    }

    parts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ItemDefinition { parts })
}

pub fn decode_payload(part: &DefinitionPart) -> Result<Vec<u8>> {
    Ok(BASE64.decode(&part.payload)?)
}

pub(crate) fn encode_payload(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
