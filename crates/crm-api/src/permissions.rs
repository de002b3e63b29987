//! Permission lookups against the CRM backend
//!
//! The session cache stores both lists verbatim, so bodies are returned as
//! untyped JSON.

use crate::config::ApiConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Source of role and user permission lists
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Permissions granted to `role`
    async fn role_permissions(&self, token: &str, role: &str) -> Result<Value>;

    /// Permissions granted to the user with id `user_id`
    async fn user_permissions(&self, token: &str, user_id: &str) -> Result<Value>;
}

/// HTTP permission client
///
/// - `GET {base}/permission?role_name={role}`
/// - `GET {base}/permissions?user_id={id}`
pub struct HttpPermissionClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpPermissionClient {
    /// Create a client for `config`
    pub fn new(config: ApiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::Config("Base URL must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Client configuration
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn get_json(&self, token: &str, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.config.endpoint(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Decode(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl PermissionSource for HttpPermissionClient {
    async fn role_permissions(&self, token: &str, role: &str) -> Result<Value> {
        self.get_json(token, "permission", &[("role_name", role)]).await
    }

    async fn user_permissions(&self, token: &str, user_id: &str) -> Result<Value> {
        self.get_json(token, "permissions", &[("user_id", user_id)]).await
    }
}

/// Fixed permission lists, for tests and offline runs
pub struct StaticPermissions {
    role: Value,
    user: Value,
    failing: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl StaticPermissions {
    /// Serve `role` for role lookups and `user` for user lookups
    pub fn new(role: Value, user: Value) -> Self {
        Self {
            role,
            user,
            failing: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve empty lists
    pub fn empty() -> Self {
        Self::new(Value::Array(Vec::new()), Value::Array(Vec::new()))
    }

    /// Make lookups fail (simulates backend outage)
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Lookups made so far, as `role:<name>` / `user:<id>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn serve(&self, call: String, value: &Value) -> Result<Value> {
        self.calls.lock().push(call.clone());
        if *self.failing.lock() {
            return Err(Error::Status {
                status: 503,
                url: call,
            });
        }
        Ok(value.clone())
    }
}

#[async_trait]
impl PermissionSource for StaticPermissions {
    async fn role_permissions(&self, _token: &str, role: &str) -> Result<Value> {
        self.serve(format!("role:{}", role), &self.role)
    }

    async fn user_permissions(&self, _token: &str, user_id: &str) -> Result<Value> {
        self.serve(format!("user:{}", user_id), &self.user)
    }
}
