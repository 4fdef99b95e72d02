use thiserror::Error;

pub type Result<T> = std::result::Result<T, FabricError>;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{method} {url} failed. HTTP {status}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("operation {status}: {detail}")]
    OperationFailed { status: String, detail: String },

    #[error("operation still pending after {waited_secs}s")]
    OperationTimeout { waited_secs: u64 },

    #[error("no workspace mapped for '{artifact}' in environment '{environment}'")]
    WorkspaceNotMapped {
        artifact: String,
        environment: String,
    },

    #[error("semantic model '{name}' not found in workspace {workspace}")]
    DatasetNotFound { name: String, workspace: String },

    #[error("timed out waiting for {item_type} '{display_name}' to appear in the workspace")]
    PublishTimeout {
        item_type: &'static str,
        display_name: String,
    },

    #[error("unexpected status {status} creating item: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("update failed with status {status}: {body}")]
    UpdateFailed { status: u16, body: String },

    #[error("no files found in artifact folder: {0}")]
    EmptyArtifact(String),

    #[error("dataset reference: {0}")]
    DatasetReference(String),

    #[error("workspace mapping: {0}")]
    Mapping(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_norway::Error),

    #[error(transparent)]
    Glob(#[from] globset::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FabricError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::OperationTimeout { .. } => "OPERATION_TIMEOUT",
            Self::WorkspaceNotMapped { .. } => "WORKSPACE_NOT_MAPPED",
            Self::DatasetNotFound { .. } => "DATASET_NOT_FOUND",
            Self::PublishTimeout { .. } => "PUBLISH_TIMEOUT",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Self::UpdateFailed { .. } => "UPDATE_FAILED",
            Self::EmptyArtifact(_) => "EMPTY_ARTIFACT",
            Self::DatasetReference(_) => "DATASET_REFERENCE",
            Self::Mapping(_) => "MAPPING_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
            Self::Glob(_) => "GLOB_ERROR",
            Self::Base64(_) => "BASE64_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_carries_request_context() {
        let err = FabricError::Api {
            method: "POST".to_string(),
            url: "https://api.fabric.microsoft.com/v1/workspaces".to_string(),
            status: 403,
            body: "{\"errorCode\":\"InsufficientPrivileges\"}".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("POST"));
        assert!(message.contains("HTTP 403"));
        assert!(message.contains("InsufficientPrivileges"));
        assert_eq!(err.code(), "API_ERROR");
    }

    #[test]
    fn workspace_not_mapped_names_artifact_and_environment() {
        let err = FabricError::WorkspaceNotMapped {
            artifact: "Sales".to_string(),
            environment: "prd".to_string(),
        };
        assert!(err.to_string().contains("'Sales'"));
        assert!(err.to_string().contains("'prd'"));
        assert_eq!(err.code(), "WORKSPACE_NOT_MAPPED");
    }
}
