//! # pg-sweep
//!
//! Time-boxed, priority-ordered PostgreSQL maintenance sweeps.
//!
//! This library drives manual `VACUUM` work across the databases of a
//! cluster inside a fixed wall-clock budget, with support for:
//!
//! - **Freeze mode** targeting the tables closest to transaction ID
//!   wraparound, worst first
//! - **Routine mode** targeting the tables with the highest dead-row churn
//! - **Deadline enforcement** that stops cleanly when the budget runs out,
//!   optionally bounding each statement with a server-side timeout
//! - **Cost-based throttling** so sweeps coexist with production load
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_sweep::{RunConfig, Sweeper};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pg_sweep::Result<()> {
//!     let config = RunConfig::load("sweep.yaml")?;
//!     let sweeper = Sweeper::new(config);
//!     let result = sweeper.run(CancellationToken::new(), false).await?;
//!     println!("Vacuumed {} tables", result.stats.tables_processed);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod lock;
pub mod sweep;

/// `application_name` tag every sweep connection sets, so sweep backends can
/// be identified and terminated as a group.
pub const APPLICATION_NAME: &str = "pg-sweep";

// Re-exports for convenient access
pub use catalog::{CandidateMetric, DatabaseTarget, MaintenanceCandidate, parse_database_list};
pub use config::{ConnectionConfig, RunConfig, SweepMode, SweepSettings};
pub use db::{Cluster, MaintenanceSession, PgCluster};
pub use error::{Result, SweepError, EXIT_DATABASES_SKIPPED};
pub use lock::RunLock;
pub use sweep::{Deadline, RunStats, SweepResult, SweepStatus, Sweeper, ENFORCEMENT_GRACE};
