use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{FabricError, Result};
use crate::transport::Gateway;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: String,
    pub display_name: String,
}

/// Workspace lists arrive under either a `value` or a `workspaces`
/// envelope; rows missing a field are skipped.
pub(crate) fn parse_workspace_list(payload: &Value) -> Vec<WorkspaceSummary> {
    payload
        .get("value")
        .or_else(|| payload.get("workspaces"))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| serde_json::from_value(row.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn list_workspaces(gateway: &dyn Gateway) -> Result<Vec<WorkspaceSummary>> {
    let response = gateway.call(Method::GET, "workspaces", None)?;
    Ok(parse_workspace_list(&response.json()?))
}

/// ID of the workspace with the given display name, created when absent.
/// `capacity_id` only applies to the create branch; an existing workspace
/// keeps whatever capacity it already has.
pub fn get_or_create_workspace(
    gateway: &dyn Gateway,
    display_name: &str,
    capacity_id: Option<&str>,
) -> Result<String> {
    if let Some(existing) = list_workspaces(gateway)?
        .into_iter()
        .find(|workspace| workspace.display_name == display_name)
    {
        debug!(workspace = display_name, id = %existing.id, "workspace already exists");
        return Ok(existing.id);
    }

    let mut body = json!({ "displayName": display_name });
    if let Some(capacity_id) = capacity_id {
        body["capacityId"] = json!(capacity_id);
    }

    info!(workspace = display_name, "creating workspace");
    let response = gateway.call(Method::POST, "workspaces", Some(&body))?;
    response
        .json()?
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            FabricError::Internal(format!(
                "created workspace response carried no id: {}",
                response.body
            ))
        })
}

/// Display name for a workspace ID, falling back to the raw ID when the
/// response carries none.
pub fn workspace_name(gateway: &dyn Gateway, workspace_id: &str) -> Result<String> {
    let response = gateway.call(Method::GET, &format!("workspaces/{workspace_id}"), None)?;
    match response.json()?.get("displayName").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => {
            warn!(workspace = workspace_id, "workspace carried no display name; using the raw ID");
            Ok(workspace_id.to_string())
        }
    }
}
