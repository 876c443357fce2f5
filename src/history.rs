use crate::app_dirs::AppDirs;
use crate::summary::{Exercise, SessionSummary};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Row};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create history directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// A summary as stored, with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: i64,
    pub summary: SessionSummary,
}

/// SQLite store of finished workout sessions
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database at the default location, creating it if needed.
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("formcheck_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS workout_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exercise TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                frames INTEGER NOT NULL,
                skipped_frames INTEGER NOT NULL,
                reps INTEGER NOT NULL,
                warnings INTEGER NOT NULL,
                good_posture_frames INTEGER NOT NULL,
                rep_interval_mean_secs REAL,
                rep_interval_std_dev_secs REAL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workout_sessions_started ON workout_sessions(started_at)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    /// Store a finished session and return its id
    pub fn record_session(&self, summary: &SessionSummary) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO workout_sessions
            (exercise, started_at, duration_secs, frames, skipped_frames, reps, warnings,
             good_posture_frames, rep_interval_mean_secs, rep_interval_std_dev_secs)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                summary.exercise.to_string(),
                summary.started_at.to_rfc3339(),
                summary.duration_secs,
                summary.frames,
                summary.skipped_frames,
                summary.reps,
                summary.warnings,
                summary.good_posture_frames,
                summary.rep_interval_mean_secs,
                summary.rep_interval_std_dev_secs,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<StoredSession>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, exercise, started_at, duration_secs, frames, skipped_frames, reps,
                   warnings, good_posture_frames, rep_interval_mean_secs, rep_interval_std_dev_secs
            FROM workout_sessions
            ORDER BY started_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Reps logged across all sessions of an exercise
    pub fn total_reps(&self, exercise: Exercise) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(reps), 0) FROM workout_sessions WHERE exercise = ?1",
            [exercise.to_string()],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM workout_sessions", [])?;
        Ok(())
    }

    /// Write every stored session as CSV, oldest first.
    pub fn export_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut sessions = self.recent_sessions(usize::MAX)?;
        sessions.reverse();

        let mut writer = csv::Writer::from_writer(out);
        writer.write_record([
            "id",
            "exercise",
            "started_at",
            "duration_secs",
            "frames",
            "skipped_frames",
            "reps",
            "warnings",
            "good_posture_frames",
            "rep_interval_mean_secs",
            "rep_interval_std_dev_secs",
        ])?;
        for StoredSession { id, summary: s } in sessions {
            let optional = |v: Option<f64>| v.map_or_else(String::new, |v| format!("{v:.3}"));
            writer.write_record([
                id.to_string(),
                s.exercise.to_string(),
                s.started_at.to_rfc3339(),
                format!("{:.3}", s.duration_secs),
                s.frames.to_string(),
                s.skipped_frames.to_string(),
                s.reps.to_string(),
                s.warnings.to_string(),
                s.good_posture_frames.to_string(),
                optional(s.rep_interval_mean_secs),
                optional(s.rep_interval_std_dev_secs),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<StoredSession> {
    let exercise_str: String = row.get(1)?;
    let exercise = Exercise::parse(&exercise_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(1, "exercise".to_string(), rusqlite::types::Type::Text)
    })?;

    let started_str: String = row.get(2)?;
    let started_at = DateTime::parse_from_rfc3339(&started_str)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "started_at".to_string(), rusqlite::types::Type::Text)
        })?
        .with_timezone(&Local);

    Ok(StoredSession {
        id: row.get(0)?,
        summary: SessionSummary {
            exercise,
            started_at,
            duration_secs: row.get(3)?,
            frames: row.get(4)?,
            skipped_frames: row.get(5)?,
            reps: row.get(6)?,
            warnings: row.get(7)?,
            good_posture_frames: row.get(8)?,
            rep_interval_mean_secs: row.get(9)?,
            rep_interval_std_dev_secs: row.get(10)?,
        },
    })
}
