use reqwest::blocking::Client;
use serde_json::Value;
use tracing::info;

use crate::error::{FabricError, Result};

pub const TENANT_ID_VAR: &str = "FABRIC_TENANT_ID";
pub const CLIENT_ID_VAR: &str = "FABRIC_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "FABRIC_CLIENT_SECRET";

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const FABRIC_SCOPE: &str = "https://api.fabric.microsoft.com/.default";

/// Service-principal credentials for the OAuth2 client-credentials grant.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Reads the three `FABRIC_*` variables. A missing or empty variable
    /// fails here, before the first network call.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tenant_id: require_env(TENANT_ID_VAR)?,
            client_id: require_env(CLIENT_ID_VAR)?,
            client_secret: require_env(CLIENT_SECRET_VAR)?,
        })
    }

    pub(crate) fn token_url(&self) -> String {
        format!("{LOGIN_BASE}/{}/oauth2/v2.0/token", self.tenant_id)
    }

    pub(crate) fn token_form(&self) -> [(&'static str, &str); 4] {
        [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("scope", FABRIC_SCOPE),
        ]
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(FabricError::Auth(format!(
            "missing environment variable: {name}"
        ))),
    }
}

/// Acquires a bearer token for the Fabric scope. The token is immutable
/// afterwards; callers thread it through the gateway.
pub fn acquire_token(credentials: &Credentials) -> Result<String> {
    let http = Client::builder().build()?;
    let response = http
        .post(credentials.token_url())
        .form(&credentials.token_form())
        .send()?;

    let status = response.status().as_u16();
    let body = response.text()?;
    if status != 200 {
        return Err(FabricError::Auth(format!(
            "failed to acquire token. HTTP {status}: {body}"
        )));
    }

    let payload: Value = serde_json::from_str(&body)?;
    let token = parse_token_response(&payload)?;
    info!("service principal authenticated");
    Ok(token)
}

pub(crate) fn parse_token_response(payload: &Value) -> Result<String> {
    payload
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| FabricError::Auth("token response does not contain 'access_token'".to_string()))
}
