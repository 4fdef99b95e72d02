use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{FabricError, Result};
use crate::items::{ItemType, find_item};
use crate::transport::Gateway;

/// Rebind lives on the Power BI surface, not the Fabric one.
pub const POWERBI_API_BASE: &str = "https://api.powerbi.com/v1.0/myorg";

pub(crate) fn rebind_url(workspace_id: &str, report_id: &str) -> String {
    format!("{POWERBI_API_BASE}/groups/{workspace_id}/reports/{report_id}/Rebind")
}

/// ID of the semantic model with the given display name in the given
/// workspace.
pub fn locate_semantic_model(
    gateway: &dyn Gateway,
    workspace_id: &str,
    display_name: &str,
) -> Result<String> {
    match find_item(gateway, workspace_id, ItemType::SemanticModel, display_name)? {
        Some(model) => {
            debug!(model = display_name, id = %model.id, workspace = workspace_id, "semantic model located");
            Ok(model.id)
        }
        None => Err(FabricError::DatasetNotFound {
            name: display_name.to_string(),
            workspace: workspace_id.to_string(),
        }),
    }
}

/// Points an already-published report at a semantic model. The model may
/// live in any workspace; the same-workspace case is just the degenerate
/// form of the same call.
pub fn rebind_report(
    gateway: &dyn Gateway,
    report_workspace_id: &str,
    report_id: &str,
    dataset_id: &str,
) -> Result<()> {
    let url = rebind_url(report_workspace_id, report_id);
    gateway.call(Method::POST, &url, Some(&json!({ "datasetId": dataset_id })))?;
    info!(report = report_id, dataset = dataset_id, "report rebound");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedGateway, api_error, ok_json};

    #[test]
    fn rebind_url_targets_the_group_report() {
        assert_eq!(
            rebind_url("ws-1", "rep-1"),
            "https://api.powerbi.com/v1.0/myorg/groups/ws-1/reports/rep-1/Rebind"
        );
    }

    #[test]
    fn locating_a_model_matches_by_display_name() {
        let gateway = ScriptedGateway::new(vec![ok_json(
            200,
            json!({"value": [
                {"id": "model-1", "displayName": "Sales"},
                {"id": "model-2", "displayName": "Finance"},
            ]}),
        )]);

        let id = locate_semantic_model(&gateway, "ws-1", "Finance").expect("locate");
        assert_eq!(id, "model-2");
        assert_eq!(gateway.calls()[0].url, "workspaces/ws-1/items?type=SemanticModel");
    }

    #[test]
    fn missing_model_is_dataset_not_found() {
        let gateway = ScriptedGateway::new(vec![ok_json(200, json!({"value": []}))]);

        let err = locate_semantic_model(&gateway, "ws-1", "Sales").expect_err("must fail");
        assert!(matches!(
            err,
            FabricError::DatasetNotFound { ref name, ref workspace }
                if name == "Sales" && workspace == "ws-1"
        ));
    }

    #[test]
    fn rebinding_posts_the_dataset_id() {
        let gateway = ScriptedGateway::new(vec![ok_json(200, json!({}))]);

        rebind_report(&gateway, "ws-1", "rep-1", "model-1").expect("rebind");

        let calls = gateway.calls();
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(
            calls[0].url,
            "https://api.powerbi.com/v1.0/myorg/groups/ws-1/reports/rep-1/Rebind"
        );
        assert_eq!(
            calls[0].body.as_ref().expect("rebind body")["datasetId"],
            "model-1"
        );
    }

    #[test]
    fn rebind_propagates_api_failures() {
        let gateway = ScriptedGateway::new(vec![api_error(403)]);

        let err = rebind_report(&gateway, "ws-1", "rep-1", "model-1").expect_err("must fail");
        assert!(matches!(err, FabricError::Api { status: 403, .. }));
    }
}
