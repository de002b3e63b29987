//! Auth session persistence for the CRM mobile client
//!
//! Saves the post-login session (token, role, ids, profile, permission lists)
//! into secure storage, restores it on resume and erases it on logout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod model;

pub use cache::SessionCache;
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use model::{id_string, SessionRecord, UserProfile};
