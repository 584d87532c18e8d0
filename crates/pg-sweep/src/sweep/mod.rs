//! The budget executor: the deadline-aware sweep loop.

mod deadline;

pub use deadline::Deadline;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::MaintenanceCandidate;
use crate::config::{RunConfig, SweepMode};
use crate::db::{Cluster, MaintenanceSession, PgCluster};
use crate::error::Result;

/// Grace margin added to the remaining budget when enforce-time bounds a
/// statement, so the last statement started before the deadline gets a
/// chance to finish.
pub const ENFORCEMENT_GRACE: Duration = Duration::from_secs(30);

/// Terminal status of a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    /// Every database pass ran to completion within the budget.
    Completed,

    /// The wall-clock budget expired with candidates left over.
    DeadlineHalted,

    /// An interrupt stopped the run.
    Cancelled,
}

/// Counters accumulated across the run.
///
/// Owned exclusively by the executor while it runs; folded into the
/// [`SweepResult`] once the run ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Databases whose candidate pass actually started.
    pub databases_visited: usize,

    /// Tables vacuumed successfully.
    pub tables_processed: usize,

    /// Tables whose maintenance statement failed.
    pub tables_failed: usize,

    /// Names of the failed tables, in failure order.
    pub failed_tables: Vec<String>,

    /// Databases skipped because session setup failed (connect, throttle,
    /// or statistics query).
    pub skipped_databases: Vec<String>,

    /// True when the budget expired before all candidates were processed.
    pub halted_by_deadline: bool,
}

impl RunStats {
    fn record_success(&mut self) {
        self.tables_processed += 1;
    }

    fn record_table_failure(&mut self, table: &str) {
        self.tables_failed += 1;
        self.failed_tables.push(table.to_string());
    }

    fn record_skipped_database(&mut self, database: &str) {
        self.skipped_databases.push(database.to_string());
    }
}

/// Result of a sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: SweepStatus,

    /// Mode the run executed in.
    pub mode: SweepMode,

    /// When the sweep started.
    pub started_at: DateTime<Utc>,

    /// When the sweep ended.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Databases enumerated for this run.
    pub databases_total: usize,

    /// Accumulated counters.
    #[serde(flatten)]
    pub stats: RunStats,
}

impl SweepResult {
    /// Render the result as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of one database's candidate pass.
enum PassOutcome {
    Completed,
    Halted,
    Cancelled,
}

/// The budget executor.
///
/// Owns the run configuration and drives the whole sweep against a cluster
/// endpoint: ranked enumeration, one throttled session per database, the
/// per-candidate deadline loop, and interrupt cleanup.
pub struct Sweeper {
    config: RunConfig,
    cluster: Arc<dyn Cluster>,
}

impl Sweeper {
    /// Create a sweeper against a live cluster built from the configuration.
    pub fn new(config: RunConfig) -> Self {
        let cluster = Arc::new(PgCluster::new(&config));
        Self { config, cluster }
    }

    /// Create a sweeper against a caller-supplied cluster endpoint.
    pub fn with_cluster(config: RunConfig, cluster: Arc<dyn Cluster>) -> Self {
        Self { config, cluster }
    }

    /// Run the sweep to completion, deadline, or cancellation.
    pub async fn run(self, cancel: CancellationToken, dry_run: bool) -> Result<SweepResult> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let mode = self.config.sweep.mode;
        let deadline = Deadline::after(self.config.budget());

        info!(
            "Sweep run {} starting: mode={}, budget={}m, enforce_time={}",
            run_id, mode, self.config.sweep.minutes, self.config.sweep.enforce_time
        );
        if dry_run {
            info!("Dry run: no maintenance statement will be executed");
        }

        let targets = self.cluster.list_databases().await?;
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        info!("{} database(s) to sweep: {}", targets.len(), names.join(", "));

        let mut stats = RunStats::default();
        let mut cancelled = false;

        'sweep: for target in &targets {
            if cancel.is_cancelled() {
                self.interrupt_cleanup(None).await;
                cancelled = true;
                break 'sweep;
            }
            if deadline.passed() {
                info!("Time budget exhausted; halting before {}", target.name);
                stats.halted_by_deadline = true;
                break 'sweep;
            }

            match target.xid_age {
                Some(age) => info!("Working on {} (datfrozenxid age {})", target.name, age),
                None => info!("Working on {}", target.name),
            }

            let session = match self.cluster.open_session(&target.name).await {
                Ok(session) => session,
                Err(e) => {
                    warn!("Skipping {}: {}", target.name, e);
                    stats.record_skipped_database(&target.name);
                    continue;
                }
            };

            if let Err(e) = session
                .apply_throttle(self.config.sweep.cost_delay_ms, self.config.sweep.cost_limit)
                .await
            {
                warn!("Skipping {}: {}", target.name, e);
                stats.record_skipped_database(&target.name);
                session.close().await;
                continue;
            }

            let candidates = match session
                .list_candidates(mode, self.config.sweep.freeze_min_age)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Skipping {}: {}", target.name, e);
                    stats.record_skipped_database(&target.name);
                    session.close().await;
                    continue;
                }
            };
            stats.databases_visited += 1;
            info!("{}: {} candidate table(s)", target.name, candidates.len());

            let outcome = self
                .run_candidates(
                    &target.name,
                    session.as_ref(),
                    &candidates,
                    &deadline,
                    &cancel,
                    &mut stats,
                    dry_run,
                )
                .await;

            match outcome {
                PassOutcome::Cancelled => {
                    self.interrupt_cleanup(Some(session)).await;
                    cancelled = true;
                    break 'sweep;
                }
                PassOutcome::Halted => stats.halted_by_deadline = true,
                PassOutcome::Completed => {}
            }

            // Pause, then release the session and advance
            let interrupted = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.config.pause()) => false,
            };
            if interrupted {
                self.interrupt_cleanup(Some(session)).await;
                cancelled = true;
                break 'sweep;
            }
            session.close().await;
        }

        let status = if cancelled {
            SweepStatus::Cancelled
        } else if stats.halted_by_deadline {
            SweepStatus::DeadlineHalted
        } else {
            SweepStatus::Completed
        };

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        match status {
            SweepStatus::Completed => info!(
                "Sweep complete: {} table(s) in {} database(s) ({:.1}s)",
                stats.tables_processed, stats.databases_visited, duration_seconds
            ),
            SweepStatus::DeadlineHalted => info!(
                "Sweep halted at the deadline: {} table(s) in {} database(s) ({:.1}s)",
                stats.tables_processed, stats.databases_visited, duration_seconds
            ),
            SweepStatus::Cancelled => info!(
                "Sweep cancelled: {} table(s) in {} database(s) ({:.1}s)",
                stats.tables_processed, stats.databases_visited, duration_seconds
            ),
        }
        if !stats.failed_tables.is_empty() {
            warn!(
                "{} table(s) failed: {}",
                stats.tables_failed,
                stats.failed_tables.join(", ")
            );
        }
        if !stats.skipped_databases.is_empty() {
            warn!(
                "{} database(s) skipped during setup: {}",
                stats.skipped_databases.len(),
                stats.skipped_databases.join(", ")
            );
        }

        Ok(SweepResult {
            run_id,
            status,
            mode,
            started_at,
            completed_at,
            duration_seconds,
            databases_total: targets.len(),
            stats,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_candidates(
        &self,
        database: &str,
        session: &dyn MaintenanceSession,
        candidates: &[MaintenanceCandidate],
        deadline: &Deadline,
        cancel: &CancellationToken,
        stats: &mut RunStats,
        dry_run: bool,
    ) -> PassOutcome {
        let mode = self.config.sweep.mode;

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return PassOutcome::Cancelled;
            }
            if deadline.passed() {
                info!(
                    "{}: time budget exhausted, {} candidate(s) abandoned",
                    database,
                    candidates.len() - index
                );
                return PassOutcome::Halted;
            }

            if dry_run {
                info!(
                    "{}: would vacuum {} ({})",
                    database, candidate.table, candidate.metric
                );
                continue;
            }

            let statement_timeout = self
                .config
                .sweep
                .enforce_time
                .then(|| deadline.remaining() + ENFORCEMENT_GRACE);

            info!(
                "{}: vacuuming {} ({})",
                database, candidate.table, candidate.metric
            );
            let result = tokio::select! {
                result = session.run_maintenance(mode, candidate, statement_timeout) => result,
                _ = cancel.cancelled() => return PassOutcome::Cancelled,
            };
            match result {
                Ok(()) => stats.record_success(),
                Err(e) => {
                    if self.config.sweep.enforce_time && deadline.passed() {
                        debug!(
                            "{}: failure coincides with an expired budget (statement_timeout)",
                            candidate.table
                        );
                    }
                    error!("{}", e);
                    stats.record_table_failure(&candidate.table);
                }
            }
        }

        PassOutcome::Completed
    }

    /// Interrupt cleanup: terminate tagged backends first, then release the
    /// active session if one was open. Issued exactly once per run.
    async fn interrupt_cleanup(&self, session: Option<Box<dyn MaintenanceSession>>) {
        info!("Interrupt received; terminating tagged backends");
        match self.cluster.terminate_tagged_backends().await {
            Ok(count) => info!("Termination request sent ({} backend(s) signalled)", count),
            Err(e) => warn!("Backend termination failed: {}", e),
        }
        if let Some(session) = session {
            session.close().await;
        }
    }
}
