//! Session cache tests
//!
//! Tests cover:
//! - Save/load round-trip with mocked permission endpoints
//! - Validity check on token and role
//! - Clear completeness for chunked blobs
//! - Error policy: save propagates, load coerces to logged-out
//! - Idle expiry, touch and permission refresh

use crm_api::StaticPermissions;
use crm_session::{keys, Error, SessionCache, SessionConfig, UserProfile};
use crm_storage::{ChunkedStore, MockSecureStore, SecureStore, SqliteSecureStore, StoreConfig, StoreKey};
use serde_json::{json, Value};

fn counselor() -> UserProfile {
    UserProfile::from_value(json!({
        "id": 1,
        "role": "counselor",
        "full_name": "A B",
        "counselor_id": 5
    }))
    .unwrap()
}

fn cache_with(permissions: StaticPermissions) -> SessionCache<MockSecureStore, StaticPermissions> {
    SessionCache::new(MockSecureStore::new(), permissions)
}

fn default_cache() -> SessionCache<MockSecureStore, StaticPermissions> {
    cache_with(StaticPermissions::new(json!([{"perm": "x"}]), json!([{"perm": "y"}])))
}

fn large_permission_list() -> Value {
    Value::Array(
        (0..300)
            .map(|i| json!({"id": i, "name": format!("leads.view.branch_{}", i)}))
            .collect(),
    )
}

/// Keys belonging to the chunked blobs, in any layout
fn blob_artifacts(store: &MockSecureStore) -> Vec<String> {
    store
        .keys()
        .into_iter()
        .filter(|k| keys::CHUNKED_KEYS.iter().any(|blob| k.starts_with(blob)))
        .collect()
}

// =============================================================================
// Save / load
// =============================================================================

#[tokio::test]
async fn test_save_load_roundtrip() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok-abc").await.unwrap();

    let record = cache.load_session().await.expect("session should load");
    assert_eq!(record.token.as_str(), "tok-abc");
    assert_eq!(record.role, "counselor");
    assert_eq!(record.user_id.as_deref(), Some("1"));
    assert_eq!(record.counselor_id.as_deref(), Some("5"));
    assert_eq!(record.student_id, None);
    let user = record.user.expect("profile should load");
    assert_eq!(user.field("full_name"), Some(&json!("A B")));
    assert_eq!(record.permissions, json!([{"perm": "x"}]));
    assert_eq!(record.user_permissions, json!([{"perm": "y"}]));
    assert!(record.last_active_at.is_some());

    assert_eq!(
        cache.permission_source().calls(),
        vec!["role:counselor", "user:1"]
    );
}

#[tokio::test]
async fn test_save_writes_expected_layout() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();

    let store = cache.store();
    assert_eq!(store.raw(keys::AUTH_TOKEN).as_deref(), Some("tok"));
    assert_eq!(store.raw(keys::ROLE).as_deref(), Some("counselor"));
    assert_eq!(store.raw(keys::USER_ID).as_deref(), Some("1"));
    assert_eq!(store.raw(keys::COUNSELOR_ID).as_deref(), Some("5"));
    assert!(!store.contains(keys::STUDENT_ID));
    assert!(store.raw(keys::LAST_ACTIVE_AT).unwrap().parse::<i64>().is_ok());
    assert_eq!(store.raw(keys::PERMISSIONS).as_deref(), Some(r#"[{"perm":"x"}]"#));
}

#[tokio::test]
async fn test_login_detail_preserves_null_ids() {
    let raw = json!({
        "id": 1,
        "role": "staff",
        "student_id": null,
        "counselor_id": null,
        "full_name": "A"
    });
    let cache = default_cache();
    cache
        .save_session(&UserProfile::from_value(raw.clone()).unwrap(), "tok")
        .await
        .unwrap();

    let stored = cache.codec().read(keys::LOGIN_DETAIL).await.unwrap().unwrap();
    assert_eq!(serde_json::from_str::<Value>(&stored).unwrap(), raw);

    let record = cache.load_session().await.unwrap();
    assert_eq!(record.student_id, None);
    assert_eq!(record.counselor_id, None);
    assert!(!cache.store().contains(keys::STUDENT_ID));
    assert!(!cache.store().contains(keys::COUNSELOR_ID));
}

#[tokio::test]
async fn test_large_blobs_are_chunked_and_restored() {
    let cache = cache_with(StaticPermissions::new(large_permission_list(), large_permission_list()));
    cache.save_session(&counselor(), "tok").await.unwrap();

    assert!(cache.store().contains("permissions_chunks"));
    assert!(cache.store().contains("userpermissions_chunks"));
    assert!(!cache.store().contains(keys::PERMISSIONS));

    let record = cache.load_session().await.unwrap();
    assert_eq!(record.permissions, large_permission_list());
    assert_eq!(record.user_permissions, large_permission_list());
}

#[tokio::test]
async fn test_student_session_replaces_stale_counselor_id() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok-1").await.unwrap();

    let student = UserProfile::from_value(json!({
        "id": "42",
        "role": "student",
        "student_id": 900
    }))
    .unwrap();
    cache.save_session(&student, "tok-2").await.unwrap();

    let record = cache.load_session().await.unwrap();
    assert_eq!(record.role, "student");
    assert_eq!(record.user_id.as_deref(), Some("42"));
    assert_eq!(record.student_id.as_deref(), Some("900"));
    assert_eq!(record.counselor_id, None);
}

// =============================================================================
// Validity and tolerance
// =============================================================================

#[tokio::test]
async fn test_missing_token_means_no_session() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.store().delete(keys::AUTH_TOKEN).await.unwrap();

    assert!(cache.load_session().await.is_none());
    // Stale profile is still there, but does not make a session
    assert!(cache.codec().read(keys::LOGIN_DETAIL).await.unwrap().is_some());
}

#[tokio::test]
async fn test_missing_role_means_no_session() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.store().delete(keys::ROLE).await.unwrap();

    assert!(cache.load_session().await.is_none());
}

#[tokio::test]
async fn test_never_saved_means_no_session() {
    assert!(default_cache().load_session().await.is_none());
}

#[tokio::test]
async fn test_corrupt_blobs_are_tolerated() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.codec().write(keys::LOGIN_DETAIL, "{not json").await.unwrap();
    cache.codec().write(keys::PERMISSIONS, "[[[").await.unwrap();

    let record = cache.load_session().await.expect("token and role are intact");
    assert!(record.user.is_none());
    assert_eq!(record.permissions, json!([]));
    assert_eq!(record.user_permissions, json!([{"perm": "y"}]));
}

// =============================================================================
// Error policy
// =============================================================================

#[tokio::test]
async fn test_save_propagates_storage_failure() {
    let cache = cache_with(StaticPermissions::new(large_permission_list(), json!([])));
    cache.store().fail_on("permissions_chunk_1");

    let err = cache.save_session(&counselor(), "tok").await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}

#[tokio::test]
async fn test_save_propagates_permission_failure() {
    let cache = default_cache();
    cache.permission_source().set_failing(true);

    let err = cache.save_session(&counselor(), "tok").await.unwrap_err();
    assert!(matches!(err, Error::Api(_)));
}

#[tokio::test]
async fn test_save_rejects_invalid_input() {
    let cache = default_cache();
    assert!(matches!(
        cache.save_session(&counselor(), "").await,
        Err(Error::Validation(_))
    ));

    let no_id = UserProfile::from_value(json!({"id": null, "role": "admin"})).unwrap();
    assert!(matches!(
        cache.save_session(&no_id, "tok").await,
        Err(Error::Validation(_))
    ));
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_load_failure_reads_as_logged_out() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.store().fail_on(keys::ROLE);

    assert!(cache.load_session().await.is_none());
}

// =============================================================================
// Clear
// =============================================================================

#[tokio::test]
async fn test_clear_removes_all_artifacts() {
    let cache = cache_with(StaticPermissions::new(large_permission_list(), large_permission_list()));
    cache.save_session(&counselor(), "tok").await.unwrap();
    assert!(!blob_artifacts(cache.store()).is_empty());

    cache.clear_session().await.unwrap();

    assert!(blob_artifacts(cache.store()).is_empty());
    assert!(cache.store().is_empty());
    assert!(cache.load_session().await.is_none());
}

#[tokio::test]
async fn test_clear_auth_data_leaves_chunk_items() {
    let cache = cache_with(StaticPermissions::new(large_permission_list(), json!([])));
    cache.save_session(&counselor(), "tok").await.unwrap();

    cache.clear_auth_data().await.unwrap();

    let leftovers = blob_artifacts(cache.store());
    assert!(leftovers.iter().all(|k| k.starts_with("permissions_chunk")));
    assert!(!leftovers.is_empty());
}

#[tokio::test]
async fn test_clear_reports_failure_but_keeps_going() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.store().fail_on(keys::ROLE);

    assert!(cache.clear_session().await.is_err());

    cache.store().clear_failures();
    assert_eq!(cache.store().keys(), vec![keys::ROLE.to_string()]);
}

// =============================================================================
// Lifecycle helpers
// =============================================================================

#[tokio::test]
async fn test_restore_clears_idle_session() {
    let cache = SessionCache::with_codec(
        ChunkedStore::new(MockSecureStore::new()),
        StaticPermissions::empty(),
        SessionConfig {
            idle_timeout_secs: Some(60),
        },
    );
    cache.save_session(&counselor(), "tok").await.unwrap();

    let stale = chrono::Utc::now().timestamp_millis() - 120_000;
    cache.store().set(keys::LAST_ACTIVE_AT, &stale.to_string()).await.unwrap();

    assert!(cache.restore_session().await.is_none());
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_restore_touches_active_session() {
    let cache = SessionCache::with_codec(
        ChunkedStore::new(MockSecureStore::new()),
        StaticPermissions::empty(),
        SessionConfig {
            idle_timeout_secs: Some(3600),
        },
    );
    cache.save_session(&counselor(), "tok").await.unwrap();

    let recent = chrono::Utc::now().timestamp_millis() - 5_000;
    cache.store().set(keys::LAST_ACTIVE_AT, &recent.to_string()).await.unwrap();

    let record = cache.restore_session().await.expect("session still active");
    assert!(record.last_active_at.unwrap() > recent);
    let stored: i64 = cache.store().raw(keys::LAST_ACTIVE_AT).unwrap().parse().unwrap();
    assert_eq!(Some(stored), record.last_active_at);
}

#[tokio::test]
async fn test_load_leaves_idle_session_untouched() {
    let cache = SessionCache::with_codec(
        ChunkedStore::new(MockSecureStore::new()),
        StaticPermissions::empty(),
        SessionConfig {
            idle_timeout_secs: Some(60),
        },
    );
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.store().set(keys::LAST_ACTIVE_AT, "1000").await.unwrap();

    let record = cache.load_session().await.expect("load does not apply idle expiry");
    assert_eq!(record.last_active_at, Some(1000));
    assert_eq!(cache.store().raw(keys::LAST_ACTIVE_AT).as_deref(), Some("1000"));
    assert!(cache.store().contains(keys::AUTH_TOKEN));
}

#[tokio::test]
async fn test_restore_without_timeout_never_expires() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.store().set(keys::LAST_ACTIVE_AT, "0").await.unwrap();

    assert!(cache.restore_session().await.is_some());
}

#[tokio::test]
async fn test_refresh_permissions_rewrites_lists() {
    let cache = default_cache();
    cache.save_session(&counselor(), "tok").await.unwrap();
    cache.codec().write(keys::PERMISSIONS, "[]").await.unwrap();

    cache.refresh_permissions().await.unwrap();

    let record = cache.load_session().await.unwrap();
    assert_eq!(record.permissions, json!([{"perm": "x"}]));
    assert_eq!(cache.permission_source().calls().len(), 4);
}

#[tokio::test]
async fn test_refresh_without_session_fails() {
    let cache = default_cache();
    assert!(matches!(cache.refresh_permissions().await, Err(Error::NoSession)));
}

#[tokio::test]
async fn test_session_over_small_item_limit_store() {
    let cache = SessionCache::new(
        MockSecureStore::with_item_limit(Some(1024)),
        StaticPermissions::new(large_permission_list(), json!([])),
    );

    cache.save_session(&counselor(), "tok").await.unwrap();
    let record = cache.load_session().await.unwrap();
    assert_eq!(record.permissions, large_permission_list());
}

// =============================================================================
// Encrypted SQLite backend
// =============================================================================

#[tokio::test]
async fn test_session_over_sqlite_store() {
    let store = SqliteSecureStore::open_in_memory(StoreKey::generate(), &StoreConfig::default()).unwrap();
    let cache = SessionCache::new(
        store,
        StaticPermissions::new(large_permission_list(), json!([{"perm": "y"}])),
    );

    cache.save_session(&counselor(), "tok-sql").await.unwrap();
    let record = cache.load_session().await.unwrap();
    assert_eq!(record.token.as_str(), "tok-sql");
    assert_eq!(record.permissions, large_permission_list());

    cache.clear_session().await.unwrap();
    assert!(cache.store().keys().unwrap().is_empty());
}
