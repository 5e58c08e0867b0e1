use crate::error::{ForensicsError, Result};
use crate::models::cost::CalibrationRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DB_SCHEMA_VERSION: i64 = 2;

const MIN_CALIBRATION_RECORDS: usize = 3;
const MIN_CALIBRATION_FACTOR: f64 = 0.25;
const MAX_CALIBRATION_FACTOR: f64 = 4.0;

/// Past estimates paired with what the work actually cost.
pub trait CalibrationStore: Send + Sync {
    fn append(&self, record: &CalibrationRecord) -> Result<()>;
    fn records(&self, project: &str) -> Result<Vec<CalibrationRecord>>;
}

fn validate_record(record: &CalibrationRecord) -> Result<()> {
    if !(record.estimated_value.is_finite() && record.estimated_value > 0.0) {
        return Err(ForensicsError::configuration(
            "calibration estimated_value must be a positive number",
        ));
    }
    if !(record.actual_value.is_finite() && record.actual_value >= 0.0) {
        return Err(ForensicsError::configuration(
            "calibration actual_value must not be negative",
        ));
    }
    Ok(())
}

/// Median of actual/estimated, clamped. `None` until enough records exist.
pub fn calibration_factor(records: &[CalibrationRecord]) -> Option<f64> {
    let mut ratios: Vec<f64> = records
        .iter()
        .filter(|r| r.estimated_value > 0.0)
        .map(|r| r.actual_value / r.estimated_value)
        .filter(|r| r.is_finite())
        .collect();

    if ratios.len() < MIN_CALIBRATION_RECORDS {
        return None;
    }

    ratios.sort_by(|a, b| a.total_cmp(b));
    let mid = ratios.len() / 2;
    let median = if ratios.len() % 2 == 0 {
        (ratios[mid - 1] + ratios[mid]) / 2.0
    } else {
        ratios[mid]
    };
    Some(median.clamp(MIN_CALIBRATION_FACTOR, MAX_CALIBRATION_FACTOR))
}

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("calibration store schema v{version} is newer than v{DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS calibration_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project TEXT NOT NULL,
            estimated_value REAL NOT NULL,
            actual_value REAL NOT NULL,
            recorded_at INTEGER NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_calibration_project_time
            ON calibration_records(project, recorded_at);
        ",
    )
}

pub struct SqliteCalibrationStore {
    conn: Mutex<Connection>,
}

impl SqliteCalibrationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CalibrationStore for SqliteCalibrationStore {
    fn append(&self, record: &CalibrationRecord) -> Result<()> {
        validate_record(record)?;
        self.conn().execute(
            "INSERT INTO calibration_records (project, estimated_value, actual_value, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.project,
                record.estimated_value,
                record.actual_value,
                record.recorded_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn records(&self, project: &str) -> Result<Vec<CalibrationRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT project, estimated_value, actual_value, recorded_at
             FROM calibration_records WHERE project = ?1
             ORDER BY recorded_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![project], |row| {
            let recorded_at: i64 = row.get(3)?;
            Ok(CalibrationRecord {
                project: row.get(0)?,
                estimated_value: row.get(1)?,
                actual_value: row.get(2)?,
                recorded_at: DateTime::<Utc>::from_timestamp(recorded_at, 0).unwrap_or_default(),
            })
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCalibrationStore {
    records: Mutex<Vec<CalibrationRecord>>,
}

impl InMemoryCalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationStore for InMemoryCalibrationStore {
    fn append(&self, record: &CalibrationRecord) -> Result<()> {
        validate_record(record)?;
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn records(&self, project: &str) -> Result<Vec<CalibrationRecord>> {
        let records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.iter().filter(|r| r.project == project).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(project: &str, estimated: f64, actual: f64) -> CalibrationRecord {
        CalibrationRecord {
            project: project.to_string(),
            estimated_value: estimated,
            actual_value: actual,
            recorded_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);

        // Re-running is a no-op.
        initialize_schema(&conn).unwrap();
    }

    #[test]
    fn sqlite_store_round_trips_per_project() {
        let store = SqliteCalibrationStore::open_in_memory().unwrap();
        store.append(&record("web", 1000.0, 1500.0)).unwrap();
        store.append(&record("api", 1000.0, 500.0)).unwrap();
        store.append(&record("web", 2000.0, 2400.0)).unwrap();

        let web = store.records("web").unwrap();
        assert_eq!(web.len(), 2);
        assert_eq!(web[0], record("web", 1000.0, 1500.0));
        assert!(store.records("missing").unwrap().is_empty());
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.db");
        {
            let store = SqliteCalibrationStore::open(&path).unwrap();
            store.append(&record("web", 100.0, 120.0)).unwrap();
        }
        let store = SqliteCalibrationStore::open(&path).unwrap();
        assert_eq!(store.records("web").unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_positive_estimates() {
        let store = InMemoryCalibrationStore::new();
        let err = store.append(&record("web", 0.0, 10.0)).unwrap_err();
        assert!(matches!(err, ForensicsError::Configuration(_)));
    }

    #[test]
    fn factor_needs_three_records_and_uses_the_median() {
        let store = InMemoryCalibrationStore::new();
        store.append(&record("web", 100.0, 150.0)).unwrap();
        store.append(&record("web", 100.0, 90.0)).unwrap();
        assert_eq!(calibration_factor(&store.records("web").unwrap()), None);

        store.append(&record("web", 100.0, 1000.0)).unwrap();
        let factor = calibration_factor(&store.records("web").unwrap()).unwrap();
        assert!((factor - 1.5).abs() < 1e-9);
    }

    #[test]
    fn factor_is_clamped() {
        let records: Vec<_> = (0..3).map(|_| record("web", 10.0, 1000.0)).collect();
        assert_eq!(calibration_factor(&records), Some(MAX_CALIBRATION_FACTOR));

        let records: Vec<_> = (0..4).map(|_| record("web", 1000.0, 1.0)).collect();
        assert_eq!(calibration_factor(&records), Some(MIN_CALIBRATION_FACTOR));
    }
}
