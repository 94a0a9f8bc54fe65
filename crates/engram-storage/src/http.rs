//! Managed object storage over HTTP.
//!
//! Speaks a minimal bucket/object REST dialect:
//!
//! | Operation | Request |
//! |---|---|
//! | store | `PUT {endpoint}/{bucket}/{name}` with the ciphertext as body |
//! | retrieve | `GET {endpoint}/{bucket}/{name}` |
//! | delete | `DELETE {endpoint}/{bucket}/{name}` |
//! | exists | `HEAD {endpoint}/{bucket}/{name}` |
//! | list | `GET {endpoint}/{bucket}` → JSON array of object names |
//!
//! A bearer token is attached when configured. Every request carries the
//! client-level timeout.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::backend::{BackendError, StorageBackend, validate_object_name};

/// [`StorageBackend`] for an HTTP object store.
pub struct HttpObjectBackend {
    name: String,
    priority: u32,
    endpoint: String,
    bucket: String,
    token: Option<String>,
    client: Client,
}

impl fmt::Debug for HttpObjectBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpObjectBackend")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("token", if self.token.is_some() { &"<redacted>" } else { &"<not set>" })
            .finish()
    }
}

impl HttpObjectBackend {
    /// Build a backend whose requests time out after `timeout`.
    pub fn new(
        name: impl Into<String>,
        priority: u32,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable {
                backend: name.clone(),
                reason: format!("HTTP client init failed: {e}"),
            })?;
        Ok(Self {
            name,
            priority,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn bucket_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }

    fn object_url(&self, name: &str) -> Result<String, BackendError> {
        validate_object_name(name)?;
        Ok(format!("{}/{}", self.bucket_url(), name))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, BackendError> {
        if !self.is_configured() {
            return Err(BackendError::NotConfigured {
                backend: self.name.clone(),
            });
        }
        self.authorize(req)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))
    }

    fn unavailable(&self, reason: String) -> BackendError {
        BackendError::Unavailable {
            backend: self.name.clone(),
            reason,
        }
    }

    fn status_error(&self, name: &str, status: StatusCode) -> BackendError {
        if status == StatusCode::NOT_FOUND {
            BackendError::NotFound {
                backend: self.name.clone(),
                name: name.to_string(),
            }
        } else {
            self.unavailable(format!("unexpected HTTP status {status}"))
        }
    }
}

#[async_trait]
impl StorageBackend for HttpObjectBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.bucket.is_empty()
    }

    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        let url = self.object_url(name)?;
        let resp = self.send(self.client.put(&url).body(bytes.to_vec())).await?;
        if !resp.status().is_success() {
            return Err(self.status_error(name, resp.status()));
        }
        debug!(backend = %self.name, object = name, bytes = bytes.len(), "object uploaded");
        Ok(())
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        let url = self.object_url(name)?;
        let resp = self.send(self.client.get(&url)).await?;
        if !resp.status().is_success() {
            return Err(self.status_error(name, resp.status()));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn delete(&self, name: &str) -> Result<(), BackendError> {
        let url = self.object_url(name)?;
        let resp = self.send(self.client.delete(&url)).await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.status_error(name, status))
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, BackendError> {
        let url = self.object_url(name)?;
        let resp = self.send(self.client.head(&url)).await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(self.status_error(name, s)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, BackendError> {
        let resp = self.send(self.client.get(self.bucket_url())).await?;
        if !resp.status().is_success() {
            return Err(self.unavailable(format!("unexpected HTTP status {}", resp.status())));
        }
        resp.json::<Vec<String>>()
            .await
            .map_err(|e| self.unavailable(format!("malformed listing: {e}")))
    }
}
