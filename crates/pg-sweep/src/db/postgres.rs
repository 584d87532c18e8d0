//! tokio-postgres implementations of the cluster and session seams.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::debug;

use crate::catalog::{self, DatabaseTarget, MaintenanceCandidate};
use crate::config::{ConnectionConfig, RunConfig, SweepMode};
use crate::error::{Result, SweepError};
use crate::APPLICATION_NAME;

use super::{Cluster, MaintenanceSession};

/// Terminates stray backends left behind by this tool. The caller's own
/// backend is excluded so the cleanup session survives its own sweep.
const TERMINATE_TAGGED_SQL: &str = r#"
    SELECT pg_terminate_backend(pid)
    FROM pg_stat_activity
    WHERE application_name = $1
      AND pid <> pg_backend_pid()
"#;

/// Cluster endpoint built from connection parameters.
///
/// Holds no open connections; every session is opened fresh and closed after
/// its pass, so exactly one maintenance session exists at a time.
pub struct PgCluster {
    connection: ConnectionConfig,
    override_list: Option<Vec<String>>,
}

impl PgCluster {
    /// Build a cluster endpoint from the run configuration.
    pub fn new(config: &RunConfig) -> Self {
        Self {
            connection: config.connection.clone(),
            override_list: config.sweep.databases.clone(),
        }
    }

    async fn connect(&self, database: &str) -> Result<(Client, JoinHandle<()>)> {
        let pg_config = self.connection.pg_config(database);
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| SweepError::connect(database, e))?;
        let database = database.to_string();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                // Expected when a backend is terminated out from under us
                debug!("connection to {} ended: {}", database, e);
            }
        });
        Ok((client, driver))
    }
}

#[async_trait]
impl Cluster for PgCluster {
    async fn list_databases(&self) -> Result<Vec<DatabaseTarget>> {
        if let Some(names) = &self.override_list {
            return Ok(names.iter().map(DatabaseTarget::named).collect());
        }

        let admin_db = self.connection.maintenance_db.clone();
        let (client, driver) = self.connect(&admin_db).await?;
        let rows = client
            .query(catalog::RANKED_DATABASES_SQL, &[&admin_db])
            .await
            .map_err(|e| SweepError::catalog(admin_db, e))?;
        let targets: Vec<DatabaseTarget> = rows
            .iter()
            .map(|row| DatabaseTarget {
                name: row.get(0),
                xid_age: Some(row.get(1)),
            })
            .collect();
        drop(client);
        let _ = driver.await;

        if targets.is_empty() {
            return Err(SweepError::NoTargets);
        }
        Ok(targets)
    }

    async fn open_session(&self, database: &str) -> Result<Box<dyn MaintenanceSession>> {
        let (client, driver) = self.connect(database).await?;
        Ok(Box::new(PgSession {
            database: database.to_string(),
            client,
            driver,
        }))
    }

    async fn terminate_tagged_backends(&self) -> Result<u64> {
        let admin_db = self.connection.maintenance_db.clone();
        let (client, driver) = self.connect(&admin_db).await?;
        let rows = client
            .query(TERMINATE_TAGGED_SQL, &[&APPLICATION_NAME])
            .await?;
        drop(client);
        let _ = driver.await;
        Ok(rows.len() as u64)
    }
}

/// One open maintenance session.
struct PgSession {
    database: String,
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl MaintenanceSession for PgSession {
    async fn apply_throttle(&self, cost_delay_ms: u32, cost_limit: u32) -> Result<()> {
        // SET takes no bind parameters; the values are validated integers.
        self.client
            .batch_execute(&throttle_sql(cost_delay_ms, cost_limit))
            .await
            .map_err(|e| SweepError::throttle(self.database.clone(), e))
    }

    async fn list_candidates(
        &self,
        mode: SweepMode,
        freeze_min_age: i64,
    ) -> Result<Vec<MaintenanceCandidate>> {
        match mode {
            SweepMode::Routine => {
                let rows = self
                    .client
                    .query(catalog::ROUTINE_CANDIDATES_SQL, &[])
                    .await
                    .map_err(|e| SweepError::catalog(self.database.clone(), e))?;
                let rows = rows
                    .iter()
                    .map(|row| {
                        (
                            row.get::<_, String>(0),
                            row.get::<_, f64>(1),
                            row.get::<_, i64>(2),
                        )
                    })
                    .collect();
                Ok(catalog::routine_candidates(rows))
            }
            SweepMode::Freeze => {
                let rows = self
                    .client
                    .query(catalog::FREEZE_CANDIDATES_SQL, &[&freeze_min_age])
                    .await
                    .map_err(|e| SweepError::catalog(self.database.clone(), e))?;
                let rows = rows
                    .iter()
                    .map(|row| {
                        (
                            row.get::<_, String>(0),
                            row.get::<_, i64>(1),
                            row.get::<_, i64>(2),
                        )
                    })
                    .collect();
                Ok(catalog::freeze_candidates(rows, freeze_min_age))
            }
        }
    }

    async fn run_maintenance(
        &self,
        mode: SweepMode,
        candidate: &MaintenanceCandidate,
        statement_timeout: Option<Duration>,
    ) -> Result<()> {
        if let Some(timeout) = statement_timeout {
            self.client
                .batch_execute(&statement_timeout_sql(timeout))
                .await
                .map_err(|e| SweepError::maintenance(candidate.table.clone(), e))?;
        }
        // VACUUM is a utility statement: simple protocol only, no prepare
        let statement = catalog::maintenance_statement(mode, &candidate.table);
        self.client
            .batch_execute(&statement)
            .await
            .map_err(|e| SweepError::maintenance(candidate.table.clone(), e))
    }

    async fn close(self: Box<Self>) {
        drop(self.client);
        let _ = self.driver.await;
    }
}

fn throttle_sql(cost_delay_ms: u32, cost_limit: u32) -> String {
    format!(
        "SET vacuum_cost_delay = {}; SET vacuum_cost_limit = {}",
        cost_delay_ms, cost_limit
    )
}

fn statement_timeout_sql(timeout: Duration) -> String {
    // Whole seconds, floored at 1 so a sub-second remainder still times out
    format!("SET statement_timeout = '{}s'", timeout.as_secs().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_override_list_returned_verbatim() {
        let mut config = RunConfig::default();
        config.sweep.databases = Some(vec!["alpha".to_string(), "beta".to_string()]);
        let cluster = PgCluster::new(&config);

        // The override path never touches the cluster
        let targets = cluster.list_databases().await.unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(targets.iter().all(|t| t.xid_age.is_none()));
    }

    #[test]
    fn test_throttle_sql() {
        assert_eq!(
            throttle_sql(20, 2000),
            "SET vacuum_cost_delay = 20; SET vacuum_cost_limit = 2000"
        );
    }

    #[test]
    fn test_statement_timeout_sql() {
        assert_eq!(
            statement_timeout_sql(Duration::from_secs(90)),
            "SET statement_timeout = '90s'"
        );
        assert_eq!(
            statement_timeout_sql(Duration::from_millis(200)),
            "SET statement_timeout = '1s'"
        );
    }

    #[test]
    fn test_terminate_query_scoping() {
        assert!(TERMINATE_TAGGED_SQL.contains("application_name = $1"));
        assert!(TERMINATE_TAGGED_SQL.contains("pid <> pg_backend_pid()"));
    }
}
