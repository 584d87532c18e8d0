//! Configuration type definitions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Root configuration structure for one sweep invocation.
///
/// Built once at startup (YAML file and/or CLI overrides) and passed into the
/// executor by value; nothing mutates it after validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Cluster connection parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Sweep behavior configuration.
    #[serde(default)]
    pub sweep: SweepSettings,
}

impl RunConfig {
    /// Wall-clock budget for the whole run.
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.sweep.minutes * 60)
    }

    /// Pause between database passes.
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.sweep.pause_seconds)
    }
}

/// Cluster connection parameters.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host (default: "localhost").
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username (default: "postgres").
    #[serde(default = "default_user")]
    pub user: String,

    /// Password. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Administrative database used for enumeration and cleanup
    /// (default: "postgres"). Never swept itself unless explicitly listed.
    #[serde(default = "default_maintenance_db")]
    pub maintenance_db: String,

    /// Connect timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl ConnectionConfig {
    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
            maintenance_db: default_maintenance_db(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field(
                "password",
                &self.password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("maintenance_db", &self.maintenance_db)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Sweep behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Wall-clock budget in minutes (default: 120).
    #[serde(default = "default_minutes")]
    pub minutes: u64,

    /// Explicit database list. When set, replaces the ranked enumeration and
    /// is swept verbatim in the given order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub databases: Option<Vec<String>>,

    /// Maintenance mode (default: freeze).
    #[serde(default)]
    pub mode: SweepMode,

    /// Pause between database passes, in seconds (default: 10).
    #[serde(default = "default_pause_seconds")]
    pub pause_seconds: u64,

    /// Minimum transaction age for freeze-mode candidates (default: 10M).
    #[serde(default = "default_freeze_min_age")]
    pub freeze_min_age: i64,

    /// vacuum_cost_delay in milliseconds (default: 20, server max 100).
    #[serde(default = "default_cost_delay_ms")]
    pub cost_delay_ms: u32,

    /// vacuum_cost_limit (default: 2000, server range 1-10000).
    #[serde(default = "default_cost_limit")]
    pub cost_limit: u32,

    /// Bound each maintenance statement to the remaining budget via
    /// statement_timeout (default: off, statements run to completion).
    #[serde(default)]
    pub enforce_time: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            minutes: default_minutes(),
            databases: None,
            mode: SweepMode::default(),
            pause_seconds: default_pause_seconds(),
            freeze_min_age: default_freeze_min_age(),
            cost_delay_ms: default_cost_delay_ms(),
            cost_limit: default_cost_limit(),
            enforce_time: false,
        }
    }
}

/// Maintenance mode for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// VACUUM ANALYZE: reclaim dead rows and refresh planner statistics.
    Routine,

    /// VACUUM FREEZE ANALYZE: also advance the frozen-transaction horizon.
    #[default]
    Freeze,
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepMode::Routine => write!(f, "routine"),
            SweepMode::Freeze => write!(f, "freeze"),
        }
    }
}

impl FromStr for SweepMode {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routine" => Ok(SweepMode::Routine),
            "freeze" => Ok(SweepMode::Freeze),
            other => Err(SweepError::Config(format!(
                "mode must be 'routine' or 'freeze', got '{}'",
                other
            ))),
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_maintenance_db() -> String {
    "postgres".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_minutes() -> u64 {
    120
}

fn default_pause_seconds() -> u64 {
    10
}

fn default_freeze_min_age() -> i64 {
    10_000_000
}

fn default_cost_delay_ms() -> u32 {
    20
}

fn default_cost_limit() -> u32 {
    2000
}
