//! CRM backend client
//!
//! Only the endpoints the session layer depends on: role and user
//! permission lookups.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod permissions;

pub use config::{ApiConfig, BASE_URL_ENV, DEFAULT_API_BASE_URL, TIMEOUT_ENV};
pub use error::{Error, Result};
pub use permissions::{HttpPermissionClient, PermissionSource, StaticPermissions};
