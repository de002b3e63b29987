//! Session data model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use zeroize::Zeroizing;

/// Stringify an id the backend may send as a number or a string
///
/// `null` means absent.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Logged-in user as returned by the login endpoint
///
/// Only the fields the session layer reads are typed; everything else is kept
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id (number or string)
    pub id: Value,
    /// Role name (`admin`, `counselor`, `staff`, `processor`, `masteradmin`, `student`)
    pub role: String,
    /// Remaining profile fields, including `student_id` / `counselor_id`
    /// exactly as the backend sent them (explicit nulls included)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Parse from a JSON value
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Stringified user id
    pub fn user_id(&self) -> Option<String> {
        id_string(&self.id)
    }

    /// Stringified student id, if present
    pub fn student_id(&self) -> Option<String> {
        self.extra.get("student_id").and_then(id_string)
    }

    /// Stringified counselor id, if present
    pub fn counselor_id(&self) -> Option<String> {
        self.extra.get("counselor_id").and_then(id_string)
    }

    /// Untyped profile field, e.g. `full_name`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Session state restored from storage
#[derive(Clone)]
pub struct SessionRecord {
    /// Bearer token
    pub token: Zeroizing<String>,
    /// Role name
    pub role: String,
    /// Stringified user id
    pub user_id: Option<String>,
    /// Stringified student id
    pub student_id: Option<String>,
    /// Stringified counselor id
    pub counselor_id: Option<String>,
    /// Full profile; `None` if missing or unreadable
    pub user: Option<UserProfile>,
    /// Role permission list; empty array if missing or unreadable
    pub permissions: Value,
    /// User permission list; empty array if missing or unreadable
    pub user_permissions: Value,
    /// Last activity, epoch milliseconds
    pub last_active_at: Option<i64>,
}

impl SessionRecord {
    /// Whether the session has been idle longer than `timeout` at `now_ms`
    ///
    /// A session without a recorded activity time is not considered idle.
    pub fn is_idle_expired(&self, now_ms: i64, timeout: Duration) -> bool {
        let Some(last_active_at) = self.last_active_at else {
            return false;
        };
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(last_active_at) > timeout_ms
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .field("user_id", &self.user_id)
            .field("student_id", &self.student_id)
            .field("counselor_id", &self.counselor_id)
            .field("user", &self.user)
            .field("permissions", &self.permissions)
            .field("user_permissions", &self.user_permissions)
            .field("last_active_at", &self.last_active_at)
            .finish()
    }
}
