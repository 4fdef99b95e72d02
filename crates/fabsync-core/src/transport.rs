use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{FabricError, Result};

pub const FABRIC_API_BASE: &str = "https://api.fabric.microsoft.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Relative paths are joined to the Fabric base; absolute URLs pass
/// through untouched (operation and sibling-API URLs are absolute).
pub(crate) fn api_url(path_or_url: &str) -> String {
    if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
        path_or_url.to_string()
    } else {
        format!("{FABRIC_API_BASE}/{}", path_or_url.trim_start_matches('/'))
    }
}

/// A 2xx control-plane response. Non-2xx outcomes never construct one;
/// they surface as [`FabricError::Api`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub location: Option<String>,
    pub retry_after: Option<u64>,
}

impl ApiResponse {
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The single seam for authenticated REST calls. No retries here; the
/// layers above decide what is retryable.
pub trait Gateway {
    fn call(&self, method: Method, path_or_url: &str, body: Option<&Value>) -> Result<ApiResponse>;
}

/// Production gateway: blocking HTTP with the bearer token held read-only
/// for the whole run.
pub struct HttpGateway {
    http: Client,
    token: String,
}

impl HttpGateway {
    pub fn new(token: String) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, token })
    }
}

impl Gateway for HttpGateway {
    fn call(&self, method: Method, path_or_url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let url = api_url(path_or_url);
        debug!(%method, %url, "calling Fabric API");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status().as_u16();
        let location = header_string(&response, "location");
        let retry_after = header_string(&response, "retry-after").and_then(|v| v.parse().ok());
        let body = response.text()?;

        if !(200..300).contains(&status) {
            return Err(FabricError::Api {
                method: method.to_string(),
                url,
                status,
                body,
            });
        }

        Ok(ApiResponse {
            status,
            body,
            location,
            retry_after,
        })
    }
}

fn header_string(response: &reqwest::blocking::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}
