//! HTTP transport seam.
//!
//! [`Transport`] is the single-attempt request interface: it sends one
//! [`RequestSpec`] and reports what came back, with no retry logic of its
//! own. Retry, backoff, and response classification live in
//! [`RequestGateway`](crate::gateway::RequestGateway), which wraps any
//! `Transport`. The production implementation is [`HttpTransport`] over
//! reqwest; tests substitute counting or scripted mocks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{ClientError, Result};

/// HTTP method subset the backend contract uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Multipart form carrying one audio clip plus string fields.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    /// Raw clip bytes, sent as the `audio` part.
    pub audio: Vec<u8>,
    /// MIME type of the clip (e.g. `audio/webm`, `audio/wav`).
    pub mime_type: String,
    /// File name attached to the audio part.
    pub file_name: String,
    /// Additional text fields (voice, max_tokens, temperature).
    pub fields: HashMap<String, String>,
}

/// Request body variants.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// One request as handed to the transport.
///
/// `timeout` and `max_attempts` are optional overrides; the gateway
/// fills them from its configuration when absent.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl RequestSpec {
    fn new(method: Method, url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            url: url.into(),
            body,
            headers: HashMap::new(),
            timeout: None,
            max_attempts: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url, RequestBody::Empty)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url, RequestBody::Empty)
    }

    pub fn post_json(url: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(Method::Post, url, RequestBody::Json(payload))
    }

    pub fn post_multipart(url: impl Into<String>, form: MultipartForm) -> Self {
        Self::new(Method::Post, url, RequestBody::Multipart(form))
    }

    /// Override the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Raw reply from one attempt. Status interpretation is the gateway's
/// job; the transport reports non-2xx replies as `Ok`.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).map_err(ClientError::Json)
    }

    /// Body as lossy UTF-8, truncated for error messages.
    pub fn body_text(&self) -> String {
        const MAX: usize = 512;
        let text = String::from_utf8_lossy(&self.body);
        if text.len() > MAX {
            format!("{}...", &text[..MAX])
        } else {
            text.into_owned()
        }
    }
}

/// Single-attempt request execution.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one attempt of `spec`, bounded by `timeout`.
    ///
    /// Transport-level failures (connect, DNS, timeout) are `Err`;
    /// any reply with a status code, 2xx or not, is `Ok`.
    async fn execute(&self, spec: &RequestSpec, timeout: Duration) -> Result<HttpReply>;
}

/// Production transport over reqwest.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn builder(&self, spec: &RequestSpec) -> reqwest::RequestBuilder {
        match spec.method {
            Method::Get => self.http.get(&spec.url),
            Method::Post => self.http.post(&spec.url),
            Method::Delete => self.http.delete(&spec.url),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, spec: &RequestSpec, timeout: Duration) -> Result<HttpReply> {
        let mut req = self.builder(spec).timeout(timeout);

        for (name, value) in &spec.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        req = match &spec.body {
            RequestBody::Empty => req,
            RequestBody::Json(payload) => req.json(payload),
            RequestBody::Multipart(form) => {
                let part = reqwest::multipart::Part::bytes(form.audio.clone())
                    .file_name(form.file_name.clone())
                    .mime_str(&form.mime_type)
                    .map_err(|e| {
                        ClientError::NetworkTransport(format!("invalid audio mime type: {e}"))
                    })?;
                let mut multipart = reqwest::multipart::Form::new().part("audio", part);
                for (name, value) in &form.fields {
                    multipart = multipart.text(name.clone(), value.clone());
                }
                req.multipart(multipart)
            }
        };

        trace!(method = %spec.method, url = %spec.url, "sending request");

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::NetworkTimeout
            } else {
                ClientError::NetworkTransport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::NetworkTimeout
                } else {
                    ClientError::NetworkTransport(e.to_string())
                }
            })?
            .to_vec();

        Ok(HttpReply { status, body })
    }
}
