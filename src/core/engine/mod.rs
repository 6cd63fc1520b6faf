//! REST client for the remote process engine.
//!
//! Every call carries basic-auth credentials and an explicit timeout. Optional
//! lookups come back as [`Lookup`] so callers never branch on transport errors;
//! endpoints whose path differs between deployments are probed through
//! [`first_found`].

pub mod content;
pub mod forms;
pub mod process;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::config::EngineConfig;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine base URL is not configured")]
    NotConfigured,

    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("unexpected engine response: {0}")]
    Decode(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Status { status: 404, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result of an optional lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed(e) => Lookup::Failed(e),
        }
    }
}

impl<T> From<Result<T, EngineError>> for Lookup<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(v) => Lookup::Found(v),
            Err(e) if e.is_not_found() => Lookup::NotFound,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

/// Tries `fetch` on each candidate in order and stops at the first hit.
///
/// Misses and failures both move on to the next candidate. When nothing is
/// found the last failure is reported, or `NotFound` if every candidate
/// answered 404.
pub async fn first_found<T, F, Fut>(candidates: Vec<String>, fetch: F) -> Lookup<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Lookup<T>>,
{
    let mut last_failure = None;
    for candidate in candidates {
        match fetch(candidate.clone()).await {
            Lookup::Found(v) => return Lookup::Found(v),
            Lookup::NotFound => debug!("Engine lookup missed at {}", candidate),
            Lookup::Failed(e) => {
                debug!("Engine lookup failed at {}: {}", candidate, e);
                last_failure = Some(e);
            }
        }
    }
    match last_failure {
        Some(e) => Lookup::Failed(e),
        None => Lookup::NotFound,
    }
}

/// Pulls a readable message out of an engine error body: the JSON
/// `message` (or `exception`) member, else the raw text.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "exception"] {
            if let Some(msg) = json.get(key).and_then(|v| v.as_str())
                && !msg.trim().is_empty()
            {
                return msg.to_string();
            }
        }
    }
    let text = body.trim();
    if text.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        text.to_string()
    }
}

#[derive(Clone)]
pub struct EngineClient {
    http: Client,
    config: Arc<EngineConfig>,
}

impl EngineClient {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            http: Client::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Link to the task in the engine's own task application.
    pub fn task_app_link(&self, task_id: &str) -> String {
        format!("{}/task-app/#/task/{}", self.config.base(), task_id)
    }

    fn url(&self, path: &str) -> Result<String, EngineError> {
        if !self.config.is_configured() {
            return Err(EngineError::NotConfigured);
        }
        Ok(format!("{}{}", self.config.base(), path))
    }

    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        timeout: Duration,
    ) -> Result<RequestBuilder, EngineError> {
        Ok(self
            .http
            .request(method, self.url(path)?)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .timeout(timeout))
    }

    /// Sends the request and turns a non-2xx status into [`EngineError::Status`].
    pub(crate) async fn send(request: RequestBuilder) -> Result<Response, EngineError> {
        let res = request.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(EngineError::Status {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    pub(crate) async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, EngineError> {
        let bytes = res.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::Decode(e.to_string()))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, EngineError> {
        let res = Self::send(self.request(Method::GET, path, timeout)?).await?;
        Self::decode(res).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, EngineError> {
        let res = Self::send(self.request(method, path, timeout)?.json(body)).await?;
        Self::decode(res).await
    }

    /// Like [`send_json`](Self::send_json) for calls whose response body is ignored.
    pub(crate) async fn send_json_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        Self::send(self.request(method, path, timeout)?.json(body)).await?;
        Ok(())
    }

    /// Engine reachability probe used by `qed doctor`.
    pub async fn ping(&self) -> Result<(), EngineError> {
        let path = "/process-api/repository/process-definitions?size=1";
        Self::send(self.request(Method::GET, path, self.config.light_timeout())?).await?;
        Ok(())
    }
}

/// Percent-encodes one path segment.
pub(crate) fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[cfg(test)]
pub(crate) mod tests;
