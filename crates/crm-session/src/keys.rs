//! Persisted key layout
//!
//! These names are shared with existing installs and must not change.

/// Bearer token
pub const AUTH_TOKEN: &str = "authToken";
/// Role name
pub const ROLE: &str = "role";
/// User id (stringified)
pub const USER_ID: &str = "user_id";
/// Student id (stringified, students only)
pub const STUDENT_ID: &str = "student_id";
/// Counselor id (stringified, counselors only)
pub const COUNSELOR_ID: &str = "counselor_id";
/// Last activity, epoch milliseconds
pub const LAST_ACTIVE_AT: &str = "lastActiveAt";

/// Full user profile JSON (chunked)
pub const LOGIN_DETAIL: &str = "login_detail";
/// Role permission list JSON (chunked)
pub const PERMISSIONS: &str = "permissions";
/// User permission list JSON (chunked)
pub const USER_PERMISSIONS: &str = "userpermissions";

/// Keys always stored as a single item
pub const UNCHUNKED_KEYS: [&str; 6] = [AUTH_TOKEN, ROLE, USER_ID, STUDENT_ID, COUNSELOR_ID, LAST_ACTIVE_AT];

/// Keys stored through the chunked codec
pub const CHUNKED_KEYS: [&str; 3] = [LOGIN_DETAIL, PERMISSIONS, USER_PERMISSIONS];
