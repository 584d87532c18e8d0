//! Error types for the sweep library.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code reported when the run completed but one or more databases were
/// skipped during session setup (connect, throttle, or statistics query).
pub const EXIT_DATABASES_SKIPPED: u8 = 6;

/// Main error type for sweep operations.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Configuration error (invalid YAML, out-of-range values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another sweep already holds the run lock
    #[error("Another sweep is already running (lock held at {path:?})")]
    AlreadyRunning { path: PathBuf },

    /// No maintainable database exists and no override list was supplied
    #[error("No maintainable databases found")]
    NoTargets,

    /// Cannot open a session to a database
    #[error("Connection to database {database} failed: {source}")]
    Connect {
        database: String,
        source: tokio_postgres::Error,
    },

    /// Cost-governor settings could not be applied to a session
    #[error("Failed to apply cost throttle on {database}: {source}")]
    Throttle {
        database: String,
        source: tokio_postgres::Error,
    },

    /// Catalog statistics query failed
    #[error("Candidate query failed on {database}: {source}")]
    Catalog {
        database: String,
        source: tokio_postgres::Error,
    },

    /// A single maintenance statement failed (including statement timeout)
    #[error("Maintenance failed for {table}: {source}")]
    Maintenance {
        table: String,
        source: tokio_postgres::Error,
    },

    /// Database error outside the scoped variants above
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// Create a Config error
    pub fn config(msg: impl Into<String>) -> Self {
        SweepError::Config(msg.into())
    }

    /// Create a Connect error scoped to one database
    pub fn connect(database: impl Into<String>, source: tokio_postgres::Error) -> Self {
        SweepError::Connect {
            database: database.into(),
            source,
        }
    }

    /// Create a Throttle error scoped to one database
    pub fn throttle(database: impl Into<String>, source: tokio_postgres::Error) -> Self {
        SweepError::Throttle {
            database: database.into(),
            source,
        }
    }

    /// Create a Catalog error scoped to one database
    pub fn catalog(database: impl Into<String>, source: tokio_postgres::Error) -> Self {
        SweepError::Catalog {
            database: database.into(),
            source,
        }
    }

    /// Create a Maintenance error scoped to one table
    pub fn maintenance(table: impl Into<String>, source: tokio_postgres::Error) -> Self {
        SweepError::Maintenance {
            table: table.into(),
            source,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error class.
    ///
    /// Setup failures get distinct codes so wrapper scripts can tell a
    /// configuration mistake from a lock conflict or an unreachable cluster.
    pub fn exit_code(&self) -> u8 {
        match self {
            SweepError::Config(_) | SweepError::Yaml(_) => 1,
            SweepError::AlreadyRunning { .. } => 2,
            SweepError::NoTargets => 3,
            SweepError::Connect { .. } => 4,
            SweepError::Throttle { .. }
            | SweepError::Catalog { .. }
            | SweepError::Maintenance { .. }
            | SweepError::Postgres(_)
            | SweepError::Json(_) => 5,
            SweepError::Io(_) => 7,
        }
    }
}

/// Result type alias for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
