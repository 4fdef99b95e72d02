use std::thread;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::definition::ItemDefinition;
use crate::error::{FabricError, Result};
use crate::operations::{TrackOptions, track_operation};
use crate::transport::Gateway;

/// The two deployable PBIP item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemType {
    SemanticModel,
    Report,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SemanticModel => "SemanticModel",
            Self::Report => "Report",
        }
    }

    /// Folder suffix that marks an artifact of this type under the
    /// source root.
    pub fn folder_suffix(self) -> &'static str {
        match self {
            Self::SemanticModel => ".SemanticModel",
            Self::Report => ".Report",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row as the item-list endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub display_name: String,
}

/// Knobs for the create-or-update state machine.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub track: TrackOptions,
    /// Grace delay between a tracked create succeeding and the re-list
    /// that recovers the new item ID.
    pub visibility_delay: Duration,
    /// Budget for the list-polling fallback when an accepted create
    /// carries no operation URL.
    pub manual_poll_attempts: u32,
    pub manual_poll_interval: Duration,
    /// Best-effort wait when an accepted update carries no operation URL.
    pub update_fallback_wait: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            track: TrackOptions::default(),
            visibility_delay: Duration::from_secs(3),
            manual_poll_attempts: 60,
            manual_poll_interval: Duration::from_secs(5),
            update_fallback_wait: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub item_id: String,
    pub action: PublishAction,
}

/// Item lists come back wrapped in either a `value` or an `items`
/// envelope; rows that do not carry both fields are skipped.
pub(crate) fn parse_item_list(payload: &Value) -> Vec<ItemSummary> {
    payload
        .get("value")
        .or_else(|| payload.get("items"))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| serde_json::from_value(row.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn list_items(
    gateway: &dyn Gateway,
    workspace_id: &str,
    item_type: ItemType,
) -> Result<Vec<ItemSummary>> {
    let path = format!("workspaces/{workspace_id}/items?type={item_type}");
    let response = gateway.call(Method::GET, &path, None)?;
    Ok(parse_item_list(&response.json()?))
}

/// Exact, case-sensitive display-name match; first hit wins.
pub fn find_item(
    gateway: &dyn Gateway,
    workspace_id: &str,
    item_type: ItemType,
    display_name: &str,
) -> Result<Option<ItemSummary>> {
    Ok(list_items(gateway, workspace_id, item_type)?
        .into_iter()
        .find(|item| item.display_name == display_name))
}

/// Create-or-update for one item. Presence is decided by a display-name
/// lookup against the live item list, so re-running a deployment
/// converges instead of duplicating.
pub fn publish_item(
    gateway: &dyn Gateway,
    workspace_id: &str,
    item_type: ItemType,
    display_name: &str,
    definition: &ItemDefinition,
    options: &PublishOptions,
) -> Result<PublishOutcome> {
    match find_item(gateway, workspace_id, item_type, display_name)? {
        Some(existing) => {
            info!(item = display_name, %item_type, id = %existing.id, "updating existing item");
            update_item(gateway, workspace_id, &existing.id, definition, options)?;
            Ok(PublishOutcome {
                item_id: existing.id,
                action: PublishAction::Updated,
            })
        }
        None => {
            info!(item = display_name, %item_type, "creating new item");
            let item_id =
                create_item(gateway, workspace_id, item_type, display_name, definition, options)?;
            Ok(PublishOutcome {
                item_id,
                action: PublishAction::Created,
            })
        }
    }
}

fn create_item(
    gateway: &dyn Gateway,
    workspace_id: &str,
    item_type: ItemType,
    display_name: &str,
    definition: &ItemDefinition,
    options: &PublishOptions,
) -> Result<String> {
    let body = json!({
        "displayName": display_name,
        "type": item_type.as_str(),
        "definition": definition,
    });
    let path = format!("workspaces/{workspace_id}/items");
    let response = gateway.call(Method::POST, &path, Some(&body))?;

    match response.status {
        201 => created_item_id(&response.body),
        202 => match response.location.clone() {
            Some(operation_url) => {
                thread::sleep(Duration::from_secs(response.retry_after.unwrap_or(5)));
                track_operation(gateway, &operation_url, &options.track)?;
                // The item list can lag the operation's success.
                thread::sleep(options.visibility_delay);
                find_item(gateway, workspace_id, item_type, display_name)?
                    .map(|item| item.id)
                    .ok_or(FabricError::PublishTimeout {
                        item_type: item_type.as_str(),
                        display_name: display_name.to_string(),
                    })
            }
            None => wait_for_item(gateway, workspace_id, item_type, display_name, options),
        },
        status => Err(FabricError::UnexpectedStatus {
            status,
            body: response.body,
        }),
    }
}

fn created_item_id(body: &str) -> Result<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|parsed| parsed.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FabricError::Internal(format!("created item response carried no id: {body}")))
}

/// Accepted create without an operation URL: poll the item list until
/// the display name shows up or the attempt budget runs out. List
/// failures during a poll are logged and retried.
fn wait_for_item(
    gateway: &dyn Gateway,
    workspace_id: &str,
    item_type: ItemType,
    display_name: &str,
    options: &PublishOptions,
) -> Result<String> {
    info!(
        item = display_name,
        %item_type,
        "creation accepted without an operation URL; polling the item list"
    );
    for attempt in 1..=options.manual_poll_attempts {
        thread::sleep(options.manual_poll_interval);
        match find_item(gateway, workspace_id, item_type, display_name) {
            Ok(Some(item)) => return Ok(item.id),
            Ok(None) => {}
            Err(error) => warn!(attempt, %error, "item list poll failed"),
        }
        if attempt % 6 == 0 {
            debug!(attempt, budget = options.manual_poll_attempts, "item not visible yet");
        }
    }
    Err(FabricError::PublishTimeout {
        item_type: item_type.as_str(),
        display_name: display_name.to_string(),
    })
}

fn update_item(
    gateway: &dyn Gateway,
    workspace_id: &str,
    item_id: &str,
    definition: &ItemDefinition,
    options: &PublishOptions,
) -> Result<()> {
    let body = json!({ "definition": definition });
    let path =
        format!("workspaces/{workspace_id}/items/{item_id}/updateDefinition?updateMetadata=false");
    let response = gateway.call(Method::POST, &path, Some(&body))?;

    match response.status {
        200 => Ok(()),
        202 => {
            if let Some(operation_url) = &response.location {
                track_operation(gateway, operation_url, &options.track)?;
            } else {
                debug!(
                    wait_secs = options.update_fallback_wait.as_secs(),
                    "update accepted without an operation URL; waiting it out"
                );
                thread::sleep(options.update_fallback_wait);
            }
            Ok(())
        }
        status => Err(FabricError::UpdateFailed {
            status,
            body: response.body,
        }),
    }
}
