use std::cell::{Ref, RefCell};
use std::collections::VecDeque;

use reqwest::Method;
use serde_json::Value;

use crate::error::{FabricError, Result};
use crate::transport::{ApiResponse, Gateway};

pub(crate) struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Replays a queued script of gateway outcomes in order and records every
/// call. A call past the end of the script panics so the test fails loudly.
pub(crate) struct ScriptedGateway {
    script: RefCell<VecDeque<Result<ApiResponse>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub(crate) fn new(script: Vec<Result<ApiResponse>>) -> Self {
        Self {
            script: RefCell::new(script.into_iter().collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Ref<'_, Vec<RecordedCall>> {
        self.calls.borrow()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Gateway for ScriptedGateway {
    fn call(&self, method: Method, path_or_url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        self.calls.borrow_mut().push(RecordedCall {
            method,
            url: path_or_url.to_string(),
            body: body.cloned(),
        });
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted gateway call: {path_or_url}"))
    }
}

pub(crate) fn ok_json(status: u16, payload: Value) -> Result<ApiResponse> {
    Ok(ApiResponse {
        status,
        body: payload.to_string(),
        location: None,
        retry_after: None,
    })
}

/// 202 with an operation URL and an immediate retry window.
pub(crate) fn accepted(location: &str) -> Result<ApiResponse> {
    Ok(ApiResponse {
        status: 202,
        body: String::new(),
        location: Some(location.to_string()),
        retry_after: Some(0),
    })
}

/// 202 without a Location header: forces the manual-polling fallback.
pub(crate) fn accepted_without_location() -> Result<ApiResponse> {
    Ok(ApiResponse {
        status: 202,
        body: String::new(),
        location: None,
        retry_after: None,
    })
}

pub(crate) fn api_error(status: u16) -> Result<ApiResponse> {
    Err(FabricError::Api {
        method: "GET".to_string(),
        url: "scripted".to_string(),
        status,
        body: String::new(),
    })
}
