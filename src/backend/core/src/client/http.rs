//! `reqwest` implementation of [`RoleBackend`].

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Envelope, RoleBackend};
use crate::config::BackendConfig;
use crate::error::{Result, RoleSyncError};
use crate::rbac::{RawPermission, RawRole, RawRoleDetail, RoleId};
use crate::telemetry::{RequestTimer, TokenRedactor};

/// HTTP client for the role endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    /// Create a backend for the configured base URL.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RoleSyncError::from)?;

        let auth_token = config
            .auth_token
            .clone()
            .filter(|t| !t.trim().is_empty());

        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            auth_token = %TokenRedactor::global()
                .redact("auth_token", auth_token.as_deref().unwrap_or("<none>")),
            "HTTP role backend created"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send one request and decode the envelope.
    ///
    /// Non-2xx statuses become `HttpStatus` errors; the body is kept as the
    /// internal message.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        endpoint: &'static str,
        body: Option<Value>,
    ) -> Result<Envelope<T>> {
        let url = self.url(&path);
        let timer = RequestTimer::start(method_label(&method), endpoint);
        debug!(method = %method, url = %url, "Backend request");

        let mut request = self.client.request(method.clone(), &url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                timer.finish(false);
                warn!(method = %method, url = %url, error = %e, "Backend request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            timer.finish(false);
            let text = response.text().await.unwrap_or_default();
            warn!(method = %method, url = %url, status = status.as_u16(), "Backend returned error status");
            return Err(RoleSyncError::http_status(status.as_u16(), text));
        }

        let decoded = response.json::<Envelope<T>>().await;
        timer.finish(decoded.is_ok());
        Ok(decoded?)
    }
}

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::DELETE => "DELETE",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        _ => "OTHER",
    }
}

#[async_trait]
impl RoleBackend for HttpBackend {
    async fn list_roles(&self) -> Result<Envelope<Vec<RawRole>>> {
        self.send(Method::GET, "roles".into(), "roles", None).await
    }

    async fn list_permissions(&self) -> Result<Envelope<Vec<RawPermission>>> {
        self.send(Method::GET, "roles/permissions".into(), "roles/permissions", None)
            .await
    }

    async fn role_detail(&self, role_id: &RoleId) -> Result<Envelope<RawRoleDetail>> {
        self.send(Method::GET, format!("roles/{}", role_id), "roles/{id}", None)
            .await
    }

    async fn add_permissions(&self, role_id: &RoleId, body: Value) -> Result<Envelope<Value>> {
        self.send(
            Method::POST,
            format!("roles/{}/permissions/add", role_id),
            "roles/{id}/permissions/add",
            Some(body),
        )
        .await
    }

    async fn remove_permissions(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>> {
        self.send(
            Method::DELETE,
            format!("roles/{}/permissions/remove", role_id),
            "roles/{id}/permissions/remove",
            Some(body),
        )
        .await
    }

    async fn remove_permissions_post(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>> {
        self.send(
            Method::POST,
            format!("roles/{}/permissions/remove", role_id),
            "roles/{id}/permissions/remove",
            Some(body),
        )
        .await
    }

    async fn reset_role(&self, role_id: &RoleId) -> Result<Envelope<Value>> {
        self.send(
            Method::POST,
            format!("roles/{}/reset", role_id),
            "roles/{id}/reset",
            None,
        )
        .await
    }
}
