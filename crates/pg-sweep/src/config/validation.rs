//! Configuration validation.

use super::RunConfig;
use crate::error::{Result, SweepError};

/// Validate the configuration.
pub fn validate(config: &RunConfig) -> Result<()> {
    // Connection validation
    if config.connection.host.is_empty() {
        return Err(SweepError::Config("connection.host is required".into()));
    }
    if config.connection.user.is_empty() {
        return Err(SweepError::Config("connection.user is required".into()));
    }
    if config.connection.maintenance_db.is_empty() {
        return Err(SweepError::Config(
            "connection.maintenance_db is required".into(),
        ));
    }
    if config.connection.connect_timeout_secs == 0 {
        return Err(SweepError::Config(
            "connection.connect_timeout_secs must be at least 1".into(),
        ));
    }

    // Sweep validation
    if config.sweep.minutes == 0 {
        return Err(SweepError::Config(
            "sweep.minutes must be at least 1".into(),
        ));
    }
    if config.sweep.freeze_min_age < 0 {
        return Err(SweepError::Config(
            "sweep.freeze_min_age must not be negative".into(),
        ));
    }
    // Server GUC bounds: vacuum_cost_delay 0..100 ms, vacuum_cost_limit 1..10000
    if config.sweep.cost_delay_ms > 100 {
        return Err(SweepError::Config(format!(
            "sweep.cost_delay_ms must be between 0 and 100, got {}",
            config.sweep.cost_delay_ms
        )));
    }
    if config.sweep.cost_limit < 1 || config.sweep.cost_limit > 10_000 {
        return Err(SweepError::Config(format!(
            "sweep.cost_limit must be between 1 and 10000, got {}",
            config.sweep.cost_limit
        )));
    }
    if let Some(databases) = &config.sweep.databases {
        if databases.is_empty() {
            return Err(SweepError::Config(
                "sweep.databases must name at least one database when set".into(),
            ));
        }
        if databases.iter().any(|name| name.trim().is_empty()) {
            return Err(SweepError::Config(
                "sweep.databases entries must not be blank".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RunConfig {
        RunConfig::default()
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.connection.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_user() {
        let mut config = valid_config();
        config.connection.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_minutes() {
        let mut config = valid_config();
        config.sweep.minutes = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_negative_freeze_age() {
        let mut config = valid_config();
        config.sweep.freeze_min_age = -1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_cost_delay_over_server_max() {
        let mut config = valid_config();
        config.sweep.cost_delay_ms = 101;
        assert!(validate(&config).is_err());
        config.sweep.cost_delay_ms = 100;
        assert!(validate(&config).is_ok());
        config.sweep.cost_delay_ms = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_cost_limit_range() {
        let mut config = valid_config();
        config.sweep.cost_limit = 0;
        assert!(validate(&config).is_err());
        config.sweep.cost_limit = 10_001;
        assert!(validate(&config).is_err());
        config.sweep.cost_limit = 10_000;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_database_list() {
        let mut config = valid_config();
        config.sweep.databases = Some(vec![]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_database_entry() {
        let mut config = valid_config();
        config.sweep.databases = Some(vec!["orders".to_string(), "  ".to_string()]);
        assert!(validate(&config).is_err());
    }
}
