use crate::config;
use crate::error::Result;
use crate::mastery::{self, MasteryRecord, MasterySummary, RatingUpdate};
use crate::spatial::TapPoint;
use crate::util::{mean, percentage, round2};
use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS player_progress (
        player_id TEXT NOT NULL,
        object_id TEXT NOT NULL,
        last_rating REAL NOT NULL DEFAULT 0.0,
        practice_count INTEGER NOT NULL DEFAULT 0,
        consecutive_failed_attempts INTEGER NOT NULL DEFAULT 0,
        is_learned BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (player_id, object_id)
    );

    CREATE TABLE IF NOT EXISTS attempt_history (
        id TEXT PRIMARY KEY,
        player_id TEXT NOT NULL,
        object_id TEXT NOT NULL,
        feature_type INTEGER NOT NULL,
        score INTEGER NOT NULL DEFAULT 0,
        spoken_text TEXT,
        tap_x REAL,
        tap_y REAL,
        is_correct BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_attempt_history_player ON attempt_history(player_id);
    CREATE INDEX IF NOT EXISTS idx_attempt_history_created ON attempt_history(created_at);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Which game produced an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    SayWord,
    FindObject,
}

impl FeatureType {
    pub fn code(self) -> i64 {
        match self {
            FeatureType::SayWord => 1,
            FeatureType::FindObject => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(FeatureType::SayWord),
            2 => Some(FeatureType::FindObject),
            _ => None,
        }
    }
}

/// A mastery record as persisted for one (player, object) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProgress {
    pub player_id: String,
    pub object_id: String,
    #[serde(flatten)]
    pub record: MasteryRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub player_id: String,
    #[serde(flatten)]
    pub summary: MasterySummary,
    pub by_object: BTreeMap<String, MasteryRecord>,
}

/// An attempt about to be written to the history
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub player_id: String,
    pub object_id: String,
    pub feature: FeatureType,
    pub score: u8,
    pub spoken_text: Option<String>,
    pub tap: Option<TapPoint>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: String,
    pub player_id: String,
    pub object_id: String,
    pub feature: FeatureType,
    pub score: u8,
    pub spoken_text: Option<String>,
    pub tap: Option<TapPoint>,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: String,
    pub total_attempts: usize,
    pub correct_attempts: usize,
    pub accuracy_percentage: f64,
    pub say_word_attempts: usize,
    pub say_word_correct: usize,
    pub find_object_attempts: usize,
    pub find_object_correct: usize,
    pub average_score: f64,
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<StoredProgress> {
    Ok(StoredProgress {
        player_id: row.get(0)?,
        object_id: row.get(1)?,
        record: MasteryRecord {
            last_rating: row.get(2)?,
            practice_count: row.get(3)?,
            consecutive_failed_attempts: row.get(4)?,
            is_learned: row.get(5)?,
        },
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<AttemptRecord> {
    let code: i64 = row.get(3)?;
    let feature = FeatureType::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(3, code))?;
    let tap_x: Option<f64> = row.get(6)?;
    let tap_y: Option<f64> = row.get(7)?;

    Ok(AttemptRecord {
        id: row.get(0)?,
        player_id: row.get(1)?,
        object_id: row.get(2)?,
        feature,
        score: row.get(4)?,
        spoken_text: row.get(5)?,
        tap: tap_x.zip(tap_y).map(TapPoint::from),
        is_correct: row.get(8)?,
        created_at: parse_timestamp(row, 9)?,
    })
}

const PROGRESS_COLUMNS: &str = "player_id, object_id, last_rating, practice_count, \
     consecutive_failed_attempts, is_learned, created_at, updated_at";

/// SQLite-backed mastery storage and attempt history
#[derive(Debug)]
pub struct ProgressDb {
    conn: Connection,
}

impl ProgressDb {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn default_path() -> PathBuf {
        config::default_database_path().unwrap_or_else(|| PathBuf::from("progress.db"))
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(ProgressDb { conn })
    }

    pub fn load_progress(&self, player_id: &str, object_id: &str) -> Result<Option<StoredProgress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM player_progress WHERE player_id = ?1 AND object_id = ?2"
        );
        let progress = self
            .conn
            .query_row(&sql, params![player_id, object_id], progress_from_row)
            .optional()?;
        Ok(progress)
    }

    /// Load, update, and persist the pair's record as one unit.
    ///
    /// The write lock is taken up front so two writers for the same pair
    /// cannot both read the old record.
    pub fn apply_rating(&mut self, player_id: &str, object_id: &str, rating: f64) -> Result<RatingUpdate> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<MasteryRecord> = tx
            .query_row(
                "SELECT last_rating, practice_count, consecutive_failed_attempts, is_learned \
                 FROM player_progress WHERE player_id = ?1 AND object_id = ?2",
                params![player_id, object_id],
                |row| {
                    Ok(MasteryRecord {
                        last_rating: row.get(0)?,
                        practice_count: row.get(1)?,
                        consecutive_failed_attempts: row.get(2)?,
                        is_learned: row.get(3)?,
                    })
                },
            )
            .optional()?;

        let update = mastery::record_rating(existing.as_ref(), rating);
        let now = timestamp_now();

        tx.execute(
            r#"
            INSERT INTO player_progress
            (player_id, object_id, last_rating, practice_count, consecutive_failed_attempts, is_learned, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(player_id, object_id) DO UPDATE SET
                last_rating = excluded.last_rating,
                practice_count = excluded.practice_count,
                consecutive_failed_attempts = excluded.consecutive_failed_attempts,
                is_learned = excluded.is_learned,
                updated_at = excluded.updated_at
            "#,
            params![
                player_id,
                object_id,
                update.record.last_rating,
                update.record.practice_count,
                update.record.consecutive_failed_attempts,
                update.record.is_learned,
                now,
            ],
        )?;

        tx.commit()?;

        if update.record.is_learned && !existing.is_some_and(|r| r.is_learned) {
            tracing::info!(player_id, object_id, "object learned");
        }
        tracing::debug!(
            player_id,
            object_id,
            rating,
            practice_count = update.record.practice_count,
            failed = update.record.consecutive_failed_attempts,
            "rating applied"
        );

        Ok(update)
    }

    pub fn list_progress(&self, player_id: &str) -> Result<Vec<StoredProgress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM player_progress WHERE player_id = ?1 ORDER BY object_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([player_id], progress_from_row)?;

        let mut progress = Vec::new();
        for row in rows {
            progress.push(row?);
        }
        Ok(progress)
    }

    pub fn summary(&self, player_id: &str) -> Result<ProgressSummary> {
        let progress = self.list_progress(player_id)?;
        let summary = mastery::summarize(progress.iter().map(|p| &p.record));
        let by_object = progress
            .into_iter()
            .map(|p| (p.object_id, p.record))
            .collect();

        Ok(ProgressSummary {
            player_id: player_id.to_string(),
            summary,
            by_object,
        })
    }

    /// Discard every mastery record for the player, returning how many were removed
    pub fn reset_progress(&self, player_id: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM player_progress WHERE player_id = ?1", [player_id])?;
        tracing::info!(player_id, removed, "progress reset");
        Ok(removed)
    }

    pub fn record_attempt(&self, attempt: &NewAttempt) -> Result<AttemptRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();

        self.conn.execute(
            r#"
            INSERT INTO attempt_history
            (id, player_id, object_id, feature_type, score, spoken_text, tap_x, tap_y, is_correct, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                id,
                attempt.player_id,
                attempt.object_id,
                attempt.feature.code(),
                attempt.score,
                attempt.spoken_text,
                attempt.tap.map(|t| t.x),
                attempt.tap.map(|t| t.y),
                attempt.is_correct,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;

        Ok(AttemptRecord {
            id,
            player_id: attempt.player_id.clone(),
            object_id: attempt.object_id.clone(),
            feature: attempt.feature,
            score: attempt.score,
            spoken_text: attempt.spoken_text.clone(),
            tap: attempt.tap,
            is_correct: attempt.is_correct,
            created_at,
        })
    }

    /// Newest attempts first, optionally restricted to one game
    pub fn attempt_history(
        &self,
        player_id: &str,
        feature: Option<FeatureType>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, player_id, object_id, feature_type, score, spoken_text, tap_x, tap_y, is_correct, created_at
            FROM attempt_history
            WHERE player_id = ?1 AND (?2 IS NULL OR feature_type = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )?;

        let rows = stmt.query_map(
            params![
                player_id,
                feature.map(FeatureType::code),
                i64::try_from(limit).unwrap_or(i64::MAX),
                i64::try_from(offset).unwrap_or(i64::MAX),
            ],
            attempt_from_row,
        )?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?);
        }
        Ok(attempts)
    }

    pub fn player_stats(&self, player_id: &str) -> Result<PlayerStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT feature_type, score, is_correct FROM attempt_history WHERE player_id = ?1")?;
        let rows = stmt.query_map([player_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, u8>(1)?, row.get::<_, bool>(2)?))
        })?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?);
        }

        let by_feature = attempts
            .iter()
            .into_group_map_by(|(code, _, _)| FeatureType::from_code(*code));
        let counts = |feature: FeatureType| {
            by_feature.get(&Some(feature)).map_or((0, 0), |group| {
                (group.len(), group.iter().filter(|(_, _, ok)| *ok).count())
            })
        };
        let (say_word_attempts, say_word_correct) = counts(FeatureType::SayWord);
        let (find_object_attempts, find_object_correct) = counts(FeatureType::FindObject);

        let total_attempts = attempts.len();
        let correct_attempts = attempts.iter().filter(|(_, _, ok)| *ok).count();
        let scores: Vec<f64> = attempts.iter().map(|(_, s, _)| f64::from(*s)).collect();

        Ok(PlayerStats {
            player_id: player_id.to_string(),
            total_attempts,
            correct_attempts,
            accuracy_percentage: round2(percentage(correct_attempts, total_attempts)),
            say_word_attempts,
            say_word_correct,
            find_object_attempts,
            find_object_correct,
            average_score: round2(mean(&scores).unwrap_or(0.0)),
        })
    }

    /// Clear all progress and history (for testing or a full reset)
    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM player_progress; DELETE FROM attempt_history;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::MasteryMessage;

    fn create_test_db() -> ProgressDb {
        ProgressDb::open_in_memory().unwrap()
    }

    fn say_attempt(player: &str, object: &str, score: u8, is_correct: bool) -> NewAttempt {
        NewAttempt {
            player_id: player.to_string(),
            object_id: object.to_string(),
            feature: FeatureType::SayWord,
            score,
            spoken_text: Some("dag".to_string()),
            tap: None,
            is_correct,
        }
    }

    fn tap_attempt(player: &str, object: &str, score: u8) -> NewAttempt {
        NewAttempt {
            player_id: player.to_string(),
            object_id: object.to_string(),
            feature: FeatureType::FindObject,
            score,
            spoken_text: None,
            tap: Some(TapPoint::new(0.25, 0.75)),
            is_correct: score > 0,
        }
    }

    #[test]
    fn test_feature_codes() {
        assert_eq!(FeatureType::SayWord.code(), 1);
        assert_eq!(FeatureType::FindObject.code(), 2);
        assert_eq!(FeatureType::from_code(2), Some(FeatureType::FindObject));
        assert_eq!(FeatureType::from_code(3), None);
    }

    #[test]
    fn test_default_path_names_the_database() {
        assert!(ProgressDb::default_path().ends_with("progress.db"));
    }

    #[test]
    fn test_load_missing_progress() {
        let db = create_test_db();
        assert!(db.load_progress("p1", "dog").unwrap().is_none());
    }

    #[test]
    fn test_apply_rating_creates_then_updates() {
        let mut db = create_test_db();

        let first = db.apply_rating("p1", "dog", 1.0).unwrap();
        assert_eq!(first.message, MasteryMessage::KeepTrying);

        let stored = db.load_progress("p1", "dog").unwrap().unwrap();
        assert_eq!(stored.record.practice_count, 1);
        assert_eq!(stored.record.consecutive_failed_attempts, 1);
        assert!(!stored.record.is_learned);

        let second = db.apply_rating("p1", "dog", 4.5).unwrap();
        assert_eq!(second.message, MasteryMessage::JustLearned);

        let stored = db.load_progress("p1", "dog").unwrap().unwrap();
        assert_eq!(stored.record.practice_count, 2);
        assert_eq!(stored.record.consecutive_failed_attempts, 0);
        assert_eq!(stored.record.last_rating, 4.5);
        assert!(stored.record.is_learned);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[test]
    fn test_pairs_are_independent() {
        let mut db = create_test_db();
        db.apply_rating("p1", "dog", 5.0).unwrap();
        db.apply_rating("p1", "cat", 1.0).unwrap();
        db.apply_rating("p2", "dog", 1.0).unwrap();

        assert!(db.load_progress("p1", "dog").unwrap().unwrap().record.is_learned);
        assert!(!db.load_progress("p2", "dog").unwrap().unwrap().record.is_learned);
        assert_eq!(db.list_progress("p1").unwrap().len(), 2);
        assert_eq!(db.list_progress("p2").unwrap().len(), 1);
    }

    #[test]
    fn test_summary_counts_learned() {
        let mut db = create_test_db();
        db.apply_rating("p1", "dog", 5.0).unwrap();
        db.apply_rating("p1", "cat", 4.0).unwrap();
        db.apply_rating("p1", "cow", 2.0).unwrap();

        let summary = db.summary("p1").unwrap();
        assert_eq!(summary.summary.total_learned, 2);
        assert_eq!(summary.summary.total_stars, 2);
        assert_eq!(summary.summary.practiced, 3);
        assert_eq!(summary.by_object.len(), 3);
        assert!(!summary.by_object["cow"].is_learned);
    }

    #[test]
    fn test_reset_progress_only_touches_player() {
        let mut db = create_test_db();
        db.apply_rating("p1", "dog", 5.0).unwrap();
        db.apply_rating("p1", "cat", 5.0).unwrap();
        db.apply_rating("p2", "dog", 5.0).unwrap();

        assert_eq!(db.reset_progress("p1").unwrap(), 2);
        assert!(db.list_progress("p1").unwrap().is_empty());
        assert_eq!(db.list_progress("p2").unwrap().len(), 1);

        // a fresh record starts over after a reset
        let update = db.apply_rating("p1", "dog", 4.0).unwrap();
        assert_eq!(update.message, MasteryMessage::JustLearned);
        assert_eq!(update.record.practice_count, 1);
    }

    #[test]
    fn test_record_and_read_attempts() {
        let db = create_test_db();
        let said = db.record_attempt(&say_attempt("p1", "dog", 66, false)).unwrap();
        let tapped = db.record_attempt(&tap_attempt("p1", "dog", 85)).unwrap();
        assert_ne!(said.id, tapped.id);

        let history = db.attempt_history("p1", None, 0, 100).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, tapped.id);
        assert_eq!(history[0].tap, Some(TapPoint::new(0.25, 0.75)));
        assert_eq!(history[1].spoken_text.as_deref(), Some("dag"));

        let only_taps = db
            .attempt_history("p1", Some(FeatureType::FindObject), 0, 100)
            .unwrap();
        assert_eq!(only_taps.len(), 1);
        assert_eq!(only_taps[0].feature, FeatureType::FindObject);
    }

    #[test]
    fn test_attempt_history_paging() {
        let db = create_test_db();
        for score in [10, 20, 30, 40, 50] {
            db.record_attempt(&say_attempt("p1", "dog", score, false)).unwrap();
        }
        let page = db.attempt_history("p1", None, 1, 2).unwrap();
        let scores: Vec<u8> = page.iter().map(|a| a.score).collect();
        assert_eq!(scores, vec![40, 30]);
    }

    #[test]
    fn test_player_stats() {
        let db = create_test_db();
        db.record_attempt(&say_attempt("p1", "dog", 100, true)).unwrap();
        db.record_attempt(&say_attempt("p1", "dog", 50, false)).unwrap();
        db.record_attempt(&tap_attempt("p1", "dog", 85)).unwrap();
        db.record_attempt(&say_attempt("p2", "dog", 0, false)).unwrap();

        let stats = db.player_stats("p1").unwrap();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.correct_attempts, 2);
        assert_eq!(stats.accuracy_percentage, 66.67);
        assert_eq!(stats.say_word_attempts, 2);
        assert_eq!(stats.say_word_correct, 1);
        assert_eq!(stats.find_object_attempts, 1);
        assert_eq!(stats.find_object_correct, 1);
        assert_eq!(stats.average_score, 78.33);
    }

    #[test]
    fn test_player_stats_without_attempts() {
        let db = create_test_db();
        let stats = db.player_stats("nobody").unwrap();
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.accuracy_percentage, 0.0);
        assert_eq!(stats.average_score, 0.0);
    }

    #[test]
    fn test_clear_all() {
        let mut db = create_test_db();
        db.apply_rating("p1", "dog", 5.0).unwrap();
        db.record_attempt(&say_attempt("p1", "dog", 100, true)).unwrap();
        db.clear_all().unwrap();
        assert!(db.list_progress("p1").unwrap().is_empty());
        assert!(db.attempt_history("p1", None, 0, 10).unwrap().is_empty());
    }
}
