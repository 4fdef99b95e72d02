use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

use serde_json::{Value, json};

use fabsync_core::deploy::{DeployOptions, run_deployment};
use fabsync_core::items::PublishAction;
use fabsync_core::mapping::WorkspaceMapping;
use fabsync_core::{ApiResponse, FabricError, Gateway, Method};

/// Replays canned responses in order, recording each call. Implemented
/// against the public trait only, the way a downstream consumer would
/// fake the service.
struct ReplayGateway {
    responses: RefCell<VecDeque<ApiResponse>>,
    calls: RefCell<Vec<(String, Option<Value>)>>,
}

impl ReplayGateway {
    fn new(responses: Vec<ApiResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.borrow().clone()
    }
}

impl Gateway for ReplayGateway {
    fn call(
        &self,
        _method: Method,
        path_or_url: &str,
        body: Option<&Value>,
    ) -> fabsync_core::Result<ApiResponse> {
        self.calls
            .borrow_mut()
            .push((path_or_url.to_string(), body.cloned()));
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| FabricError::Internal(format!("unexpected call: {path_or_url}")))
    }
}

fn response(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: body.to_string(),
        location: None,
        retry_after: None,
    }
}

fn write_model_folder(root: &Path, name: &str) {
    let folder = root.join(format!("{name}.SemanticModel"));
    std::fs::create_dir_all(&folder).expect("mkdir");
    std::fs::write(folder.join("model.bim"), "{}").expect("write model");
}

fn write_report_folder(root: &Path, name: &str) {
    let folder = root.join(format!("{name}.Report"));
    std::fs::create_dir_all(&folder).expect("mkdir");
    std::fs::write(folder.join("definition.pbir"), r#"{"version":"1.0"}"#).expect("write pbir");
}

fn one_workspace_mapping() -> WorkspaceMapping {
    WorkspaceMapping::from_yaml("default:\n  dev: W1\n").expect("mapping")
}

#[test]
fn redeploying_the_same_artifact_updates_instead_of_duplicating() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_model_folder(dir.path(), "Sales");
    let mapping = one_workspace_mapping();
    let options = DeployOptions::default();

    let first = ReplayGateway::new(vec![
        response(200, json!({"value": []})),
        response(201, json!({"id": "model-1"})),
    ]);
    let first_run =
        run_deployment(&first, dir.path(), &mapping, "dev", &options).expect("first run");
    assert_eq!(first_run.artifacts[0].action, Some(PublishAction::Created));

    let second = ReplayGateway::new(vec![
        response(200, json!({"value": [{"id": "model-1", "displayName": "Sales"}]})),
        response(200, json!({})),
    ]);
    let second_run =
        run_deployment(&second, dir.path(), &mapping, "dev", &options).expect("second run");

    assert_eq!(second_run.artifacts[0].action, Some(PublishAction::Updated));
    assert_eq!(
        second_run.artifacts[0].item_id,
        first_run.artifacts[0].item_id
    );
    let calls = second.calls();
    assert_eq!(
        calls[1].0,
        "workspaces/W1/items/model-1/updateDefinition?updateMetadata=false"
    );
}

#[test]
fn run_report_serializes_a_stable_automation_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_model_folder(dir.path(), "Sales");
    // No dataset reference and no placeholder opt-in: this report fails.
    write_report_folder(dir.path(), "Orphan");

    let gateway = ReplayGateway::new(vec![
        response(200, json!({"value": []})),
        response(201, json!({"id": "model-1"})),
    ]);
    let report = run_deployment(
        &gateway,
        dir.path(),
        &one_workspace_mapping(),
        "dev",
        &DeployOptions::default(),
    )
    .expect("run");

    assert!(report.has_failures());
    assert_eq!(report.failure_count(), 1);

    let serialized = serde_json::to_value(&report).expect("serialize report");
    assert!(serialized["run_id"].is_string());
    assert_eq!(serialized["target"], "dev");
    assert!(serialized["started_at"].is_string());

    let model = &serialized["artifacts"][0];
    assert_eq!(model["name"], "Sales");
    assert_eq!(model["type"], "SemanticModel");
    assert_eq!(model["workspace_id"], "W1");
    assert_eq!(model["item_id"], "model-1");
    assert_eq!(model["action"], "created");
    assert!(model.get("linked").is_none());
    assert!(model.get("error").is_none());

    let orphan = &serialized["artifacts"][1];
    assert_eq!(orphan["type"], "Report");
    assert!(orphan["error"].is_string());
    assert!(orphan.get("item_id").is_none());
}

#[test]
fn exclude_globs_keep_service_noise_out_of_the_definition() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_model_folder(dir.path(), "Sales");
    let cache_dir = dir.path().join("Sales.SemanticModel").join(".pbi");
    std::fs::create_dir_all(&cache_dir).expect("mkdir");
    std::fs::write(cache_dir.join("localSettings.json"), "{}").expect("write cache");

    let gateway = ReplayGateway::new(vec![
        response(200, json!({"value": []})),
        response(201, json!({"id": "model-1"})),
    ]);
    let mut options = DeployOptions::default();
    options.pack.exclude = vec![".pbi/**".to_string()];

    let report = run_deployment(&gateway, dir.path(), &one_workspace_mapping(), "dev", &options)
        .expect("run");
    assert!(!report.has_failures());

    let calls = gateway.calls();
    let body = calls[1].1.as_ref().expect("create body");
    let paths: Vec<&str> = body["definition"]["parts"]
        .as_array()
        .expect("parts")
        .iter()
        .filter_map(|part| part["path"].as_str())
        .collect();
    assert_eq!(paths, ["model.bim"]);
}
