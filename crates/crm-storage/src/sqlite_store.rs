//! Encrypted SQLite-backed secure store
//!
//! Desktop and development stand-in for the mobile secure storage primitive.
//! Every value is sealed with the store key before it touches disk, and the
//! platform item limit is enforced on the plaintext so chunking behaves the
//! same as on device.

use crate::config::StoreConfig;
use crate::security::{generate_salt, StoreKey};
use crate::{Error, Result, SecureStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

const SALT_META_KEY: &str = "kdf_salt";
const CHECK_META_KEY: &str = "key_check";
const CHECK_PLAINTEXT: &[u8] = b"crm-secure-store";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS secure_items (
        key TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS store_meta (
        name TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL
    );
";

/// SQLite secure store
pub struct SqliteSecureStore {
    conn: Mutex<Connection>,
    key: StoreKey,
    item_limit: Option<usize>,
}

impl SqliteSecureStore {
    /// Open (or create) a store at `path` sealed with `key`
    pub fn open<P: AsRef<Path>>(path: P, key: StoreKey, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA secure_delete=ON;")?;
        Self::init(conn, key, config)
    }

    /// Open (or create) a store at `path` with a passphrase-derived key
    ///
    /// The KDF salt lives in the store itself. Fails with
    /// [`Error::Encryption`] if the passphrase does not match the one the
    /// store was created with.
    pub fn open_with_passphrase<P: AsRef<Path>>(
        path: P,
        passphrase: &str,
        config: &StoreConfig,
    ) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA secure_delete=ON;")?;
        conn.execute_batch(SCHEMA)?;

        let salt = match read_meta(&conn, SALT_META_KEY)? {
            Some(salt) => salt,
            None => {
                let salt = generate_salt().to_vec();
                write_meta(&conn, SALT_META_KEY, &salt)?;
                salt
            }
        };
        let key = StoreKey::from_passphrase(passphrase, &salt, &config.kdf)?;
        Self::init(conn, key, config)
    }

    /// Open an in-memory store (tests)
    pub fn open_in_memory(key: StoreKey, config: &StoreConfig) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, key, config)
    }

    fn init(conn: Connection, key: StoreKey, config: &StoreConfig) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        // The key check proves the key matches the one the store was created with
        match read_meta(&conn, CHECK_META_KEY)? {
            Some(check) => {
                let opened = key.open(&check, CHECK_META_KEY.as_bytes()).map_err(|_| {
                    Error::Encryption(
                        "Store key does not match; wrong passphrase or a different store".to_string(),
                    )
                })?;
                if opened.as_slice() != CHECK_PLAINTEXT {
                    return Err(Error::Encryption("Store key check mismatch".to_string()));
                }
            }
            None => {
                let check = key.seal(CHECK_PLAINTEXT, CHECK_META_KEY.as_bytes())?;
                write_meta(&conn, CHECK_META_KEY, &check)?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            key,
            item_limit: config.item_limit,
        })
    }

    /// All stored item keys, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM secure_items ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

#[async_trait]
impl SecureStore for SqliteSecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let sealed: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM secure_items WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(sealed) = sealed else {
            return Ok(None);
        };
        let plaintext = self.key.open(&sealed, key.as_bytes())?;
        let value = std::str::from_utf8(&plaintext).map_err(|e| Error::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(limit) = self.item_limit {
            if value.len() > limit {
                return Err(Error::ValueTooLarge {
                    key: key.to_string(),
                    len: value.len(),
                    limit,
                });
            }
        }
        let sealed = self.key.seal(value.as_bytes(), key.as_bytes())?;
        self.conn.lock().execute(
            "INSERT INTO secure_items (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, sealed, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM secure_items WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn item_limit(&self) -> Option<usize> {
        self.item_limit
    }
}

fn read_meta(conn: &Connection, name: &str) -> Result<Option<Vec<u8>>> {
    Ok(conn
        .query_row(
            "SELECT value FROM store_meta WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?)
}

fn write_meta(conn: &Connection, name: &str, value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO store_meta (name, value) VALUES (?1, ?2)",
        params![name, value],
    )?;
    Ok(())
}
