//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::error::Result;
use crate::APPLICATION_NAME;

impl RunConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl ConnectionConfig {
    /// Build a tokio-postgres client config for the given database.
    ///
    /// Every session carries the tool's application_name tag so stray
    /// backends can be found in pg_stat_activity.
    pub fn pg_config(&self, database: &str) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(database)
            .application_name(APPLICATION_NAME)
            .connect_timeout(self.connect_timeout());
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gets_defaults() {
        let config = RunConfig::from_yaml("{}").unwrap();
        assert_eq!(config.sweep.minutes, 120);
        assert_eq!(config.sweep.mode, SweepMode::Freeze);
        assert_eq!(config.sweep.pause_seconds, 10);
        assert_eq!(config.sweep.freeze_min_age, 10_000_000);
        assert_eq!(config.sweep.cost_delay_ms, 20);
        assert_eq!(config.sweep.cost_limit, 2000);
        assert!(!config.sweep.enforce_time);
        assert!(config.sweep.databases.is_none());
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.connection.user, "postgres");
        assert_eq!(config.connection.maintenance_db, "postgres");
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
connection:
  host: db.internal
  user: maint
sweep:
  minutes: 30
  mode: routine
  databases: [orders, billing]
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.user, "maint");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.sweep.minutes, 30);
        assert_eq!(config.sweep.mode, SweepMode::Routine);
        assert_eq!(
            config.sweep.databases,
            Some(vec!["orders".to_string(), "billing".to_string()])
        );
        assert_eq!(config.sweep.cost_limit, 2000);
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = RunConfig::from_yaml("sweep: [not, a, map]");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = RunConfig::default();
        config.connection.password = Some("super_secret_password_123".to_string());
        let debug_output = format!("{:?}", config.connection);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_password_never_serialized() {
        let mut config = RunConfig::default();
        config.connection.password = Some("super_secret_password_123".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("super_secret_password_123"));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("routine".parse::<SweepMode>().unwrap(), SweepMode::Routine);
        assert_eq!("freeze".parse::<SweepMode>().unwrap(), SweepMode::Freeze);
        assert!("aggressive".parse::<SweepMode>().is_err());
    }

    #[test]
    fn test_budget_and_pause_durations() {
        let mut config = RunConfig::default();
        config.sweep.minutes = 3;
        config.sweep.pause_seconds = 7;
        assert_eq!(config.budget().as_secs(), 180);
        assert_eq!(config.pause().as_secs(), 7);
    }
}
