//! Database access: the cluster and session seams plus their
//! tokio-postgres implementations.
//!
//! The executor only ever talks to these two traits. [`Cluster`] covers the
//! cluster-level operations (enumeration, opening sessions, cleanup);
//! [`MaintenanceSession`] is one open, autocommit connection scoped to a
//! single database. Tests drive the executor through mock implementations.

mod postgres;

pub use postgres::PgCluster;

use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::{DatabaseTarget, MaintenanceCandidate};
use crate::config::SweepMode;
use crate::error::Result;

/// A PostgreSQL cluster endpoint.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Ordered list of databases to sweep: an override list verbatim, or the
    /// ranked enumeration (most wraparound-endangered first). Fails with
    /// `NoTargets` when ranking finds nothing to maintain.
    async fn list_databases(&self) -> Result<Vec<DatabaseTarget>>;

    /// Open a maintenance session to one database.
    async fn open_session(&self, database: &str) -> Result<Box<dyn MaintenanceSession>>;

    /// Terminate every backend carrying the tool's session tag except the
    /// caller's own. Returns the number of backends signalled.
    async fn terminate_tagged_backends(&self) -> Result<u64>;
}

/// An open, autocommit session scoped to exactly one database.
#[async_trait]
pub trait MaintenanceSession: Send {
    /// Apply the session cost governor. Called once per session, before any
    /// maintenance statement.
    async fn apply_throttle(&self, cost_delay_ms: u32, cost_limit: u32) -> Result<()>;

    /// Fetch the ordered candidate sequence for this database. An empty
    /// result is valid.
    async fn list_candidates(
        &self,
        mode: SweepMode,
        freeze_min_age: i64,
    ) -> Result<Vec<MaintenanceCandidate>>;

    /// Run the maintenance statement for one candidate, optionally bounding
    /// its execution time via statement_timeout first.
    async fn run_maintenance(
        &self,
        mode: SweepMode,
        candidate: &MaintenanceCandidate,
        statement_timeout: Option<Duration>,
    ) -> Result<()>;

    /// Close the session and wait for the connection to wind down.
    async fn close(self: Box<Self>);
}
