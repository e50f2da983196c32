//! Blocking REST client for a Firebase-style realtime database.
//!
//! Every node is addressed as `{base_url}/{path}.json`, authenticated with an
//! optional `auth` query parameter. Responses outside 2xx become
//! [`SyncError::Transport`], except a 404 on GET which reads as `None`.

use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};
use crate::store::RemoteStore;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// [`RemoteStore`] over HTTP.
pub struct HttpStore {
    agent: ureq::Agent,
    base_url: String,
    secret: Option<String>,
}

impl HttpStore {
    pub fn new(config: &RemoteConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret: config.secret.clone().filter(|s| !s.is_empty()),
        }
    }

    /// Full URL of a node, without the auth parameter.
    pub fn node_url(&self, path: &str) -> String {
        let clean = path.trim_matches('/');
        if clean.is_empty() {
            format!("{}/.json", self.base_url)
        } else {
            format!("{}/{}.json", self.base_url, clean)
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self
            .agent
            .request(method, &self.node_url(path))
            .set("content-type", "application/json");
        match &self.secret {
            Some(secret) => request.query("auth", secret),
            None => request,
        }
    }

    fn execute(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        debug!(method, path, "remote request");
        let request = self.request(method, path);
        let outcome = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match outcome {
            Ok(response) => {
                let text = response.into_string()?;
                parse_body(&text)
            }
            Err(ureq::Error::Status(404, _)) if method == "GET" => {
                info!(path, "remote node not found");
                Ok(None)
            }
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                warn!(method, path, status = code, "remote request failed");
                Err(SyncError::transport(method, path, Some(code), text))
            }
            Err(ureq::Error::Transport(err)) => {
                warn!(method, path, error = %err, "remote transport error");
                Err(SyncError::transport(method, path, None, err.to_string()))
            }
        }
    }
}

fn parse_body(text: &str) -> Result<Option<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

impl RemoteStore for HttpStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        self.execute("GET", path, None)
    }

    fn patch(&mut self, path: &str, data: &Value) -> Result<Option<Value>> {
        self.execute("PATCH", path, Some(data))
    }

    fn post(&mut self, path: &str, data: &Value) -> Result<String> {
        let response = self.execute("POST", path, Some(data))?;
        response
            .as_ref()
            .and_then(|body| body.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::transport("POST", path, None, "response carried no generated name")
            })
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.execute("DELETE", path, None).map(|_| ())
    }
}
