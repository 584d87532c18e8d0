//! Catalog queries and candidate selection.
//!
//! The three queries here are the whole read surface of the sweeper: rank
//! databases by wraparound risk, find bloated tables (routine mode), find
//! tables near the freeze horizon (freeze mode). Config-driven thresholds are
//! bound parameters; the fixed floors live in the query text.

use std::cmp::Ordering;
use std::fmt;

use crate::config::SweepMode;
use crate::error::{Result, SweepError};

/// Upper bound on freeze-mode candidates per database. Keeps the catalog
/// query and the per-database pass bounded on huge schemas.
pub const MAX_FREEZE_CANDIDATES: usize = 1000;

/// Ranked database enumeration: every connectable, non-template database
/// except the administrative one ($1), most wraparound-endangered first.
pub(crate) const RANKED_DATABASES_SQL: &str = r#"
    SELECT datname, age(datfrozenxid)::int8 AS xid_age
    FROM pg_database
    WHERE NOT datistemplate
      AND datallowconn
      AND datname <> $1
    ORDER BY age(datfrozenxid) DESC
"#;

/// Routine-mode candidates: user tables with more than 100 dead rows, a
/// dead-to-live ratio above 5%, more than ~1MB of heap, and no vacuum
/// (manual or auto) within the last hour.
pub(crate) const ROUTINE_CANDIDATES_SQL: &str = r#"
    WITH deadrow_tables AS (
        SELECT relid::regclass::text AS table_name,
               ((n_dead_tup::numeric) / (n_live_tup + 1))::float8 AS dead_ratio,
               pg_relation_size(relid) AS table_bytes
        FROM pg_stat_user_tables
        WHERE n_dead_tup > 100
          AND (last_autovacuum IS NULL OR (now() - last_autovacuum) > INTERVAL '1 hour')
          AND (last_vacuum IS NULL OR (now() - last_vacuum) > INTERVAL '1 hour')
    )
    SELECT table_name, dead_ratio, table_bytes
    FROM deadrow_tables
    WHERE dead_ratio > 0.05
      AND table_bytes > 1000000
    ORDER BY dead_ratio DESC, table_bytes DESC
"#;

/// Freeze-mode candidates: ordinary tables in non-system, non-temporary
/// schemas whose transaction age (own relfrozenxid or the TOAST segment's,
/// whichever is older) exceeds $1, worst first, capped.
pub(crate) const FREEZE_CANDIDATES_SQL: &str = r#"
    WITH tabfreeze AS (
        SELECT pg_class.oid::regclass::text AS table_name,
               greatest(age(pg_class.relfrozenxid), age(toast.relfrozenxid))::int8 AS freeze_age,
               pg_relation_size(pg_class.oid) AS table_bytes
        FROM pg_class
        JOIN pg_namespace ON pg_class.relnamespace = pg_namespace.oid
        LEFT OUTER JOIN pg_class AS toast
            ON pg_class.reltoastrelid = toast.oid
        WHERE pg_namespace.nspname NOT IN ('pg_catalog', 'information_schema')
          AND pg_namespace.nspname NOT LIKE 'pg_temp%'
          AND pg_class.relkind = 'r'
    )
    SELECT table_name, freeze_age, table_bytes
    FROM tabfreeze
    WHERE freeze_age > $1
    ORDER BY freeze_age DESC
    LIMIT 1000
"#;

/// One maintainable database, in sweep order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    /// Database name.
    pub name: String,

    /// age(datfrozenxid) at enumeration time; None for override entries,
    /// which bypass the ranking query.
    pub xid_age: Option<i64>,
}

impl DatabaseTarget {
    /// Target named by an override list (no rank attached).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            xid_age: None,
        }
    }
}

/// Ranking metric attached to a candidate table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandidateMetric {
    /// Dead-to-live row ratio (routine mode).
    DeadRowRatio(f64),

    /// Transaction age of the oldest unfrozen row (freeze mode).
    FreezeAge(i64),
}

impl CandidateMetric {
    /// Priority scalar; larger means more urgent.
    pub fn priority(&self) -> f64 {
        match self {
            CandidateMetric::DeadRowRatio(ratio) => *ratio,
            CandidateMetric::FreezeAge(age) => *age as f64,
        }
    }
}

impl fmt::Display for CandidateMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateMetric::DeadRowRatio(ratio) => write!(f, "dead row ratio {:.3}", ratio),
            CandidateMetric::FreezeAge(age) => write!(f, "freeze age {}", age),
        }
    }
}

/// One table due for maintenance.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceCandidate {
    /// Schema-qualified table name as rendered by the catalog (regclass
    /// output, already quoted where quoting is needed).
    pub table: String,

    /// The metric that selected this table.
    pub metric: CandidateMetric,

    /// pg_relation_size at selection time; tie-breaker for ordering.
    pub size_bytes: i64,
}

/// Parse a comma-separated database override list.
pub fn parse_database_list(raw: &str) -> Result<Vec<String>> {
    let names: Vec<String> = raw
        .split(',')
        .map(|name| name.trim().to_string())
        .collect();
    if names.iter().any(|name| name.is_empty()) {
        return Err(SweepError::Config(format!(
            "database list '{}' contains an empty name",
            raw
        )));
    }
    Ok(names)
}

/// Total priority order: metric descending, size descending, then name, so
/// two selections over the same catalog state produce the same sequence.
fn priority_order(a: &MaintenanceCandidate, b: &MaintenanceCandidate) -> Ordering {
    b.metric
        .priority()
        .total_cmp(&a.metric.priority())
        .then_with(|| b.size_bytes.cmp(&a.size_bytes))
        .then_with(|| a.table.cmp(&b.table))
}

/// Sort candidates worst-first.
pub fn sort_by_priority(candidates: &mut [MaintenanceCandidate]) {
    candidates.sort_by(priority_order);
}

/// Routine-mode selection over fetched stats rows: dead-row ratio
/// descending, size as tie-break.
pub fn routine_candidates(rows: Vec<(String, f64, i64)>) -> Vec<MaintenanceCandidate> {
    let mut candidates: Vec<MaintenanceCandidate> = rows
        .into_iter()
        .map(|(table, ratio, bytes)| MaintenanceCandidate {
            table,
            metric: CandidateMetric::DeadRowRatio(ratio),
            size_bytes: bytes,
        })
        .collect();
    sort_by_priority(&mut candidates);
    candidates
}

/// Freeze-mode selection over fetched age rows: keep tables whose age
/// exceeds the threshold, order worst-first, cap at MAX_FREEZE_CANDIDATES.
pub fn freeze_candidates(
    rows: Vec<(String, i64, i64)>,
    freeze_min_age: i64,
) -> Vec<MaintenanceCandidate> {
    let mut candidates: Vec<MaintenanceCandidate> = rows
        .into_iter()
        .filter(|(_, age, _)| *age > freeze_min_age)
        .map(|(table, age, bytes)| MaintenanceCandidate {
            table,
            metric: CandidateMetric::FreezeAge(age),
            size_bytes: bytes,
        })
        .collect();
    sort_by_priority(&mut candidates);
    candidates.truncate(MAX_FREEZE_CANDIDATES);
    candidates
}

/// The maintenance statement for one candidate in the given mode.
///
/// The table name comes from the catalog's own regclass rendering, never
/// from user input, so it is interpolated as-is.
pub fn maintenance_statement(mode: SweepMode, table: &str) -> String {
    match mode {
        SweepMode::Routine => format!("VACUUM ANALYZE {}", table),
        SweepMode::Freeze => format!("VACUUM FREEZE ANALYZE {}", table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freeze_row(table: &str, age: i64) -> (String, i64, i64) {
        (table.to_string(), age, 1_000_000)
    }

    // ===== Database list parsing =====

    #[test]
    fn test_parse_database_list() {
        assert_eq!(
            parse_database_list("alpha,beta").unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn test_parse_database_list_trims_whitespace() {
        assert_eq!(
            parse_database_list(" alpha , beta ").unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn test_parse_database_list_rejects_empty() {
        assert!(parse_database_list("").is_err());
        assert!(parse_database_list("alpha,,beta").is_err());
        assert!(parse_database_list("alpha,").is_err());
    }

    // ===== Freeze-mode selection =====

    #[test]
    fn test_freeze_selection_filters_and_orders() {
        let rows = vec![
            freeze_row("public.a", 15_000_000),
            freeze_row("public.b", 9_000_000),
            freeze_row("public.c", 20_000_000),
        ];
        let candidates = freeze_candidates(rows, 10_000_000);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].table, "public.c");
        assert_eq!(candidates[0].metric, CandidateMetric::FreezeAge(20_000_000));
        assert_eq!(candidates[1].table, "public.a");
        assert_eq!(candidates[1].metric, CandidateMetric::FreezeAge(15_000_000));
    }

    #[test]
    fn test_freeze_selection_threshold_is_strict() {
        let rows = vec![freeze_row("public.a", 10_000_000)];
        assert!(freeze_candidates(rows, 10_000_000).is_empty());
    }

    #[test]
    fn test_freeze_selection_caps_result() {
        let rows: Vec<(String, i64, i64)> = (0..MAX_FREEZE_CANDIDATES as i64 + 50)
            .map(|i| (format!("public.t{}", i), 10_000_001 + i, 1_000))
            .collect();
        let candidates = freeze_candidates(rows, 10_000_000);
        assert_eq!(candidates.len(), MAX_FREEZE_CANDIDATES);
        // Cap keeps the worst, not the first fetched
        assert_eq!(
            candidates[0].metric,
            CandidateMetric::FreezeAge(10_000_000 + MAX_FREEZE_CANDIDATES as i64 + 50)
        );
    }

    #[test]
    fn test_freeze_selection_empty_is_valid() {
        assert!(freeze_candidates(vec![], 10_000_000).is_empty());
    }

    // ===== Routine-mode selection =====

    #[test]
    fn test_routine_ordering_by_ratio_then_size() {
        let rows = vec![
            ("public.small".to_string(), 0.10, 2_000_000),
            ("public.worst".to_string(), 0.40, 1_500_000),
            ("public.big".to_string(), 0.10, 8_000_000),
        ];
        let candidates = routine_candidates(rows);
        let names: Vec<&str> = candidates.iter().map(|c| c.table.as_str()).collect();
        assert_eq!(names, vec!["public.worst", "public.big", "public.small"]);
    }

    #[test]
    fn test_selection_is_idempotent() {
        let rows = vec![
            ("public.a".to_string(), 0.2, 1_000_000),
            ("public.b".to_string(), 0.2, 1_000_000),
            ("public.c".to_string(), 0.3, 5_000_000),
        ];
        let first = routine_candidates(rows.clone());
        let second = routine_candidates(rows);
        assert_eq!(first, second);
    }

    // ===== Maintenance statements =====

    #[test]
    fn test_maintenance_statement_by_mode() {
        assert_eq!(
            maintenance_statement(SweepMode::Routine, "public.orders"),
            "VACUUM ANALYZE public.orders"
        );
        assert_eq!(
            maintenance_statement(SweepMode::Freeze, "public.orders"),
            "VACUUM FREEZE ANALYZE public.orders"
        );
    }

    // ===== Query text invariants =====

    #[test]
    fn test_ranking_query_shape() {
        assert!(RANKED_DATABASES_SQL.contains("ORDER BY age(datfrozenxid) DESC"));
        assert!(RANKED_DATABASES_SQL.contains("NOT datistemplate"));
        assert!(RANKED_DATABASES_SQL.contains("datname <> $1"));
    }

    #[test]
    fn test_routine_query_floors() {
        assert!(ROUTINE_CANDIDATES_SQL.contains("n_dead_tup > 100"));
        assert!(ROUTINE_CANDIDATES_SQL.contains("dead_ratio > 0.05"));
        assert!(ROUTINE_CANDIDATES_SQL.contains("table_bytes > 1000000"));
        assert!(ROUTINE_CANDIDATES_SQL.contains("INTERVAL '1 hour'"));
        assert!(ROUTINE_CANDIDATES_SQL.contains("ORDER BY dead_ratio DESC, table_bytes DESC"));
    }

    #[test]
    fn test_freeze_query_shape() {
        assert!(FREEZE_CANDIDATES_SQL.contains("freeze_age > $1"));
        assert!(FREEZE_CANDIDATES_SQL.contains("greatest(age(pg_class.relfrozenxid), age(toast.relfrozenxid))"));
        assert!(FREEZE_CANDIDATES_SQL.contains("NOT LIKE 'pg_temp%'"));
        assert!(FREEZE_CANDIDATES_SQL.contains(&format!("LIMIT {}", MAX_FREEZE_CANDIDATES)));
    }
}
