//! JSON-RPC client for the application API
//!
//! Scenarios create and remove their own fixture data through the API
//! instead of relying on rows left behind by earlier tests.

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::auth::Credentials;
use crate::error::{E2eError, E2eResult};

pub struct ApiClient {
    http: Client,
    endpoint: String,
    token: Option<String>,
    next_id: AtomicU64,
}

impl ApiClient {
    pub fn new(endpoint: impl Into<String>) -> E2eResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: None,
            next_id: AtomicU64::new(1),
        })
    }

    /// Use an existing API token instead of logging in
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// `user.login`; the returned token authenticates later calls
    pub async fn login(&mut self, credentials: &Credentials) -> E2eResult<()> {
        self.token = None;
        let result = self
            .call(
                "user.login",
                json!({ "username": credentials.username, "password": credentials.password }),
            )
            .await?;

        let token = result
            .as_str()
            .ok_or_else(|| E2eError::Api {
                code: 0,
                message: "user.login returned no token".to_string(),
                data: result.to_string(),
            })?
            .to_string();
        self.token = Some(token);
        Ok(())
    }

    pub async fn call<P: Serialize>(&self, method: &str, params: P) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = build_request(method, serde_json::to_value(params)?, id);
        debug!("api {} (id {})", method, id);

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response: Value = request.send().await?.json().await?;
        parse_response(response)
    }

    /// Create objects and return the ids listed under `id_field` (for
    /// example `hostgroup.create` -> `groupids`).
    pub async fn create<P: Serialize>(&self, method: &str, params: P, id_field: &str) -> E2eResult<Vec<String>> {
        let result = self.call(method, params).await?;
        let ids = result
            .get(id_field)
            .and_then(Value::as_array)
            .ok_or_else(|| E2eError::Api {
                code: 0,
                message: format!("{} result has no {}", method, id_field),
                data: result.to_string(),
            })?;

        Ok(ids
            .iter()
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect())
    }
}

pub fn build_request(method: &str, params: Value, id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    })
}

/// Extract `result`, or turn `error` into [`E2eError::Api`]
pub fn parse_response(response: Value) -> E2eResult<Value> {
    if let Some(error) = response.get("error") {
        return Err(E2eError::Api {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
            data: error
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    response.get("result").cloned().ok_or_else(|| E2eError::Api {
        code: 0,
        message: "response has neither result nor error".to_string(),
        data: response.to_string(),
    })
}
