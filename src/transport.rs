//! HTTP access to the remote API.
//!
//! Every answer is normalized into a JSON [`Value`]: empty and `204` bodies
//! become a generic `{"message": ...}` acknowledgement, unparseable bodies
//! never surface as parse errors, and failures are classified into the
//! [`Error`] kinds the repositories dispatch on.

use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools as _;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{config, Error, TokenStore};

pub const ACKNOWLEDGED: &str = "Operation completed successfully";

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub needs_auth: bool,

    /// Overrides the transport's default budget.
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            needs_auth: true,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.needs_auth = false;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn auth(mut self, needs_auth: bool) -> Self {
        self.needs_auth = needs_auth;
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Value, Error>;

    async fn get(&self, path: &str, needs_auth: bool) -> Result<Value, Error> {
        self.send(Request::get(path).auth(needs_auth)).await
    }

    async fn post(
        &self,
        path: &str,
        body: Value,
        needs_auth: bool,
    ) -> Result<Value, Error> {
        self.send(Request::post(path, body).auth(needs_auth)).await
    }

    async fn put(
        &self,
        path: &str,
        body: Value,
        needs_auth: bool,
    ) -> Result<Value, Error> {
        self.send(Request::put(path, body).auth(needs_auth)).await
    }

    async fn delete(
        &self,
        path: &str,
        needs_auth: bool,
    ) -> Result<Value, Error> {
        self.send(Request::delete(path).auth(needs_auth)).await
    }
}

/// [`Transport`] over `reqwest`, attaching the stored bearer token.
#[derive(Clone, Debug)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    tokens: TokenStore,
}

impl Gateway {
    pub fn new(config: &config::Api, tokens: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            timeout: config.timeout,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

#[async_trait]
impl Transport for Gateway {
    async fn send(&self, request: Request) -> Result<Value, Error> {
        let url = format!("{}{}", self.base_url, request.path);
        let token = if request.needs_auth {
            self.tokens.read().await
        } else {
            None
        };

        let mut req = self
            .http
            .request(request.method.clone(), &url)
            .timeout(request.timeout.unwrap_or(self.timeout));
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        debug!(method = %request.method, %url, "sending request");
        let response = req.send().await.map_err(|e| {
            warn!(method = %request.method, %url, error = %e, "request failed");
            classify(&e)
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| classify(&e))?;
        debug!(method = %request.method, %url, %status, "response");

        let result = normalize(status, &body);
        if matches!(result, Err(Error::AuthExpired(_))) && token.is_some() {
            warn!("bearer token rejected, clearing it");
            self.tokens.clear().await;
        }
        result
    }
}

/// Connectivity covers socket, DNS and timeout failures only.
fn classify(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Connectivity(format!("timed out: {e}"))
    } else if e.is_connect() || e.is_request() || e.is_body() {
        Error::Connectivity(format!("connection failed: {e}"))
    } else if e.is_builder() {
        Error::Config(format!("cannot build request: {e}"))
    } else {
        Error::Malformed(format!("unusable response: {e}"))
    }
}

/// Maps a received status and body to the normalized payload or the
/// classified failure.
pub fn normalize(status: StatusCode, body: &str) -> Result<Value, Error> {
    let parsed = match body.trim() {
        "" => None,
        text => serde_json::from_str::<Value>(text)
            .ok()
            .filter(|v| !v.is_null()),
    };

    if status.is_success() {
        return Ok(
            parsed.unwrap_or_else(|| json!({ "message": ACKNOWLEDGED }))
        );
    }

    let message = match &parsed {
        Some(value) => server_message(value),
        None => plain_text(body),
    };
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::AuthExpired(message.unwrap_or_else(|| {
            "please log in again".to_owned()
        })));
    }
    Err(Error::Remote {
        status: status.as_u16(),
        message: message.unwrap_or_else(|| {
            format!("request failed with status {}", status.as_u16())
        }),
    })
}

/// Human-readable message of an error body.
fn server_message(body: &Value) -> Option<String> {
    const KEYS: &[&str] = &[
        "message", "Message", "mensagem", "Mensagem", "error", "detail",
        "title",
    ];

    if let Value::String(s) = body {
        return Some(s.clone()).filter(|s| !s.trim().is_empty());
    }
    let map = body.as_object()?;

    // ASP.NET validation problems: {"errors": {"Field": ["msg", ...]}}
    if let Some(Value::Object(errors)) = map.get("errors") {
        let joined = errors
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .join("; ");
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    KEYS.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

/// Non-JSON error body, when short enough to be a message and not a page.
fn plain_text(body: &str) -> Option<String> {
    let text = body.trim();
    (!text.is_empty() && text.len() <= 200 && !text.starts_with('<'))
        .then(|| text.to_owned())
}
