//! Auth session cache
//!
//! Persists the post-login session through a [`SecureStore`]: small fixed
//! fields as single items, the profile and permission lists through the
//! chunked codec.
//!
//! Error policy differs per operation:
//! - [`SessionCache::save_session`] logs and propagates, so login can report
//!   that the session was not persisted
//! - [`SessionCache::load_session`] logs and returns `None`, forcing re-login
//!   instead of restoring a half-read session
//! - [`SessionCache::clear_session`] attempts every delete and reports the
//!   first failure

use crate::config::SessionConfig;
use crate::keys;
use crate::model::{SessionRecord, UserProfile};
use crate::{Error, Result};
use crm_api::PermissionSource;
use crm_storage::{ChunkedStore, SecureStore};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Session cache over a secure store and a permission source
pub struct SessionCache<S, P> {
    codec: ChunkedStore<S>,
    permissions: P,
    config: SessionConfig,
}

impl<S: SecureStore, P: PermissionSource> SessionCache<S, P> {
    /// Create with default chunking and configuration
    pub fn new(store: S, permissions: P) -> Self {
        Self::with_codec(ChunkedStore::new(store), permissions, SessionConfig::default())
    }

    /// Create from a configured codec
    pub fn with_codec(codec: ChunkedStore<S>, permissions: P, config: SessionConfig) -> Self {
        Self {
            codec,
            permissions,
            config,
        }
    }

    /// Underlying codec
    pub fn codec(&self) -> &ChunkedStore<S> {
        &self.codec
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        self.codec.inner()
    }

    /// Permission source
    pub fn permission_source(&self) -> &P {
        &self.permissions
    }

    /// Cache configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Persist the session for `user` authenticated by `token`
    pub async fn save_session(&self, user: &UserProfile, token: &str) -> Result<()> {
        match self.persist_session(user, token).await {
            Ok(()) => {
                info!("Session saved for user {:?} ({})", user.user_id(), user.role);
                Ok(())
            }
            Err(e) => {
                error!("Failed to save session: {}", e);
                Err(e)
            }
        }
    }

    async fn persist_session(&self, user: &UserProfile, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(Error::Validation("Token must not be empty".to_string()));
        }
        if user.role.is_empty() {
            return Err(Error::Validation("User role must not be empty".to_string()));
        }
        let user_id = user
            .user_id()
            .ok_or_else(|| Error::Validation("User id missing".to_string()))?;

        let store = self.codec.inner();
        store.set(keys::AUTH_TOKEN, token).await?;
        store.set(keys::ROLE, &user.role).await?;
        store.set(keys::USER_ID, &user_id).await?;
        self.set_or_remove(keys::STUDENT_ID, user.student_id()).await?;
        self.set_or_remove(keys::COUNSELOR_ID, user.counselor_id()).await?;

        self.codec
            .write(keys::LOGIN_DETAIL, &serde_json::to_string(user)?)
            .await?;

        self.fetch_and_store_permissions(token, &user.role, &user_id).await?;

        store.set(keys::LAST_ACTIVE_AT, &now_ms().to_string()).await?;
        Ok(())
    }

    async fn set_or_remove(&self, key: &str, value: Option<String>) -> Result<()> {
        let store = self.codec.inner();
        match value {
            Some(value) => store.set(key, &value).await?,
            None => store.delete(key).await?,
        }
        Ok(())
    }

    async fn fetch_and_store_permissions(&self, token: &str, role: &str, user_id: &str) -> Result<()> {
        let role_permissions = self.permissions.role_permissions(token, role).await?;
        self.codec
            .write(keys::PERMISSIONS, &serde_json::to_string(&role_permissions)?)
            .await?;

        let user_permissions = self.permissions.user_permissions(token, user_id).await?;
        self.codec
            .write(keys::USER_PERMISSIONS, &serde_json::to_string(&user_permissions)?)
            .await?;
        Ok(())
    }

    /// Restore the stored session, or `None` if there is no valid one
    pub async fn load_session(&self) -> Option<SessionRecord> {
        match self.read_session().await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to load session, treating as logged out: {}", e);
                None
            }
        }
    }

    async fn read_session(&self) -> Result<Option<SessionRecord>> {
        let store = self.codec.inner();
        let Some(token) = store.get(keys::AUTH_TOKEN).await? else {
            debug!("No stored token");
            return Ok(None);
        };
        let token = Zeroizing::new(token);
        let Some(role) = store.get(keys::ROLE).await? else {
            debug!("No stored role");
            return Ok(None);
        };

        let user_id = store.get(keys::USER_ID).await?;
        let student_id = store.get(keys::STUDENT_ID).await?;
        let counselor_id = store.get(keys::COUNSELOR_ID).await?;
        let last_active_at = match store.get(keys::LAST_ACTIVE_AT).await? {
            Some(raw) => raw.trim().parse::<i64>().ok().or_else(|| {
                warn!("Ignoring unreadable {} value", keys::LAST_ACTIVE_AT);
                None
            }),
            None => None,
        };

        let user = self
            .read_json(keys::LOGIN_DETAIL)
            .await?
            .and_then(|value| match UserProfile::from_value(value) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Stored {} is not a valid profile: {}", keys::LOGIN_DETAIL, e);
                    None
                }
            });
        let permissions = self.read_json(keys::PERMISSIONS).await?.unwrap_or_else(empty_list);
        let user_permissions = self
            .read_json(keys::USER_PERMISSIONS)
            .await?
            .unwrap_or_else(empty_list);

        Ok(Some(SessionRecord {
            token,
            role,
            user_id,
            student_id,
            counselor_id,
            user,
            permissions,
            user_permissions,
            last_active_at,
        }))
    }

    /// Read a chunked JSON blob; unparseable content reads as absent
    async fn read_json(&self, key: &str) -> Result<Option<Value>> {
        let Some(raw) = self.codec.read(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Stored {} is not valid JSON: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Remove the top-level auth keys
    ///
    /// Does not know about chunk items; [`SessionCache::clear_session`] removes
    /// those as well.
    pub async fn clear_auth_data(&self) -> Result<()> {
        let store = self.codec.inner();
        let mut first_err = None;
        for key in keys::UNCHUNKED_KEYS.iter().chain(keys::CHUNKED_KEYS.iter()) {
            if let Err(e) = store.delete(key).await {
                warn!("Failed to delete {}: {}", key, e);
                first_err.get_or_insert(Error::from(e));
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Erase every trace of the session, including chunk items
    pub async fn clear_session(&self) -> Result<()> {
        let mut first_err = self.clear_auth_data().await.err();
        for key in keys::CHUNKED_KEYS {
            if let Err(e) = self.codec.delete(key).await {
                first_err.get_or_insert(Error::from(e));
            }
        }

        match first_err {
            Some(e) => {
                error!("Session clear incomplete: {}", e);
                Err(e)
            }
            None => {
                info!("Session cleared");
                Ok(())
            }
        }
    }

    /// Record activity now
    pub async fn touch(&self) -> Result<()> {
        self.codec
            .inner()
            .set(keys::LAST_ACTIVE_AT, &now_ms().to_string())
            .await?;
        Ok(())
    }

    /// Restore the session on app resume
    ///
    /// With an idle timeout configured, a session idle beyond it is cleared and
    /// `None` is returned. A restored session is touched.
    pub async fn restore_session(&self) -> Option<SessionRecord> {
        let mut record = self.load_session().await?;
        let now = now_ms();

        if let Some(timeout) = self.config.idle_timeout() {
            if record.is_idle_expired(now, timeout) {
                info!("Session idle beyond {:?}, clearing", timeout);
                if let Err(e) = self.clear_session().await {
                    warn!("Failed to clear idle session: {}", e);
                }
                return None;
            }
        }

        match self.touch().await {
            Ok(()) => record.last_active_at = Some(now),
            Err(e) => warn!("Failed to record activity: {}", e),
        }
        Some(record)
    }

    /// Re-fetch both permission lists for the stored session
    pub async fn refresh_permissions(&self) -> Result<()> {
        let store = self.codec.inner();
        let token = store.get(keys::AUTH_TOKEN).await?.map(Zeroizing::new);
        let role = store.get(keys::ROLE).await?;
        let user_id = store.get(keys::USER_ID).await?;

        let (Some(token), Some(role), Some(user_id)) = (token, role, user_id) else {
            return Err(Error::NoSession);
        };

        let result = self.fetch_and_store_permissions(&token, &role, &user_id).await;
        if let Err(e) = &result {
            warn!("Permission refresh failed: {}", e);
        }
        result
    }
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}
