//! Session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session cache configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle longer than this are discarded on restore (`None` = never)
    pub idle_timeout_secs: Option<u64>,
}

impl SessionConfig {
    /// Idle timeout, if configured
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}
