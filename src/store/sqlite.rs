use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use crate::cli::SupersedePolicy;
use crate::error::StoreError;
use crate::model::{
    ContentId, EvaluationRecord, NewSubmission, ReferencePassage, StoredSubmission, SubmissionId,
    SubmissionMeta,
};
use crate::util::now_utc_string;

use super::{InsertOutcome, ReferenceStore, Store, SubmissionRepository};

const DB_SCHEMA_VERSION: &str = "0.1.0";

/// Submissions and reference passages in one SQLite database.
pub struct SqliteStore {
    connection: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io("create", parent, err))?;
        }

        let connection = Connection::open(path)?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;

        Ok(Self {
            connection,
            path: path.to_path_buf(),
        })
    }

    fn decode_row(
        &self,
        submission_id: i64,
        meta: SubmissionMeta,
        results_json: &str,
    ) -> Result<StoredSubmission, StoreError> {
        let records: Vec<EvaluationRecord> =
            serde_json::from_str(results_json).map_err(|source| StoreError::Decode {
                path: self.path.join(format!("submissions/{submission_id}")),
                source,
            })?;

        Ok(StoredSubmission {
            id: SubmissionId(submission_id.to_string()),
            meta,
            records,
        })
    }
}

fn configure_connection(connection: &Connection) -> Result<(), StoreError> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<(), StoreError> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS submissions (
          submission_id INTEGER PRIMARY KEY AUTOINCREMENT,
          model TEXT NOT NULL,
          author TEXT NOT NULL,
          timestamp TEXT NOT NULL,
          content_sha256 TEXT NOT NULL,
          results_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reference_samples (
          content_id_json TEXT NOT NULL,
          qa_index INTEGER NOT NULL,
          content_text TEXT NOT NULL,
          PRIMARY KEY (content_id_json, qa_index)
        );

        CREATE INDEX IF NOT EXISTS idx_submissions_owner ON submissions(model, author);
        CREATE INDEX IF NOT EXISTS idx_submissions_timestamp ON submissions(timestamp);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_opened_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}

impl SubmissionRepository for SqliteStore {
    fn insert(
        &mut self,
        submission: &NewSubmission,
        policy: SupersedePolicy,
    ) -> Result<InsertOutcome, StoreError> {
        let results_json =
            serde_json::to_string(&submission.records).map_err(|source| StoreError::Encode {
                what: "submission records",
                source,
            })?;

        let tx = self.connection.transaction()?;

        let superseded = match policy {
            SupersedePolicy::Replace => tx.execute(
                "DELETE FROM submissions WHERE model = ?1 AND author = ?2",
                params![submission.meta.model, submission.meta.author],
            )?,
            SupersedePolicy::Append => 0,
        };

        tx.execute(
            "
            INSERT INTO submissions(model, author, timestamp, content_sha256, results_json)
            VALUES(?1, ?2, ?3, ?4, ?5)
            ",
            params![
                submission.meta.model,
                submission.meta.author,
                submission.meta.timestamp,
                submission.meta.content_sha256,
                results_json,
            ],
        )?;
        let submission_id = tx.last_insert_rowid();

        tx.commit()?;

        if superseded > 0 {
            info!(superseded, model = %submission.meta.model, author = %submission.meta.author, "removed superseded submissions");
        }

        Ok(InsertOutcome {
            id: SubmissionId(submission_id.to_string()),
            superseded,
        })
    }

    fn load_all(&self) -> Result<Vec<StoredSubmission>, StoreError> {
        let mut statement = self.connection.prepare(
            "
            SELECT submission_id, model, author, timestamp, content_sha256, results_json
            FROM submissions
            ORDER BY timestamp ASC, submission_id ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut out = Vec::<StoredSubmission>::new();

        while let Some(row) = rows.next()? {
            let submission_id: i64 = row.get(0)?;
            let meta = SubmissionMeta {
                model: row.get(1)?,
                author: row.get(2)?,
                timestamp: row.get::<_, DateTime<Utc>>(3)?,
                content_sha256: row.get(4)?,
            };
            let results_json: String = row.get(5)?;

            match self.decode_row(submission_id, meta, &results_json) {
                Ok(submission) => out.push(submission),
                Err(err) => {
                    warn!(submission_id, error = %err, "skipping unreadable submission");
                }
            }
        }

        Ok(out)
    }

    fn load(&self, id: &str) -> Result<Option<StoredSubmission>, StoreError> {
        let Ok(submission_id) = id.parse::<i64>() else {
            return Ok(None);
        };

        let row = self
            .connection
            .query_row(
                "
                SELECT model, author, timestamp, content_sha256, results_json
                FROM submissions
                WHERE submission_id = ?1
                ",
                [submission_id],
                |row| {
                    Ok((
                        SubmissionMeta {
                            model: row.get(0)?,
                            author: row.get(1)?,
                            timestamp: row.get::<_, DateTime<Utc>>(2)?,
                            content_sha256: row.get(3)?,
                        },
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(meta, results_json)| self.decode_row(submission_id, meta, &results_json))
            .transpose()
    }

    fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ReferenceStore for SqliteStore {
    fn load_references(&self) -> Result<Vec<ReferencePassage>, StoreError> {
        let mut statement = self.connection.prepare(
            "
            SELECT content_id_json, qa_index, content_text
            FROM reference_samples
            ORDER BY content_id_json ASC, qa_index ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut out = Vec::<ReferencePassage>::new();

        while let Some(row) = rows.next()? {
            let content_id_json: String = row.get(0)?;
            let content_id: ContentId =
                serde_json::from_str(&content_id_json).map_err(|source| StoreError::Decode {
                    path: self.path.join("reference_samples"),
                    source,
                })?;
            out.push(ReferencePassage {
                content_id,
                qa_index: row.get(1)?,
                content_text: Some(row.get(2)?),
            });
        }

        Ok(out)
    }

    fn replace_references(&mut self, passages: &[ReferencePassage]) -> Result<usize, StoreError> {
        let tx = self.connection.transaction()?;
        tx.execute("DELETE FROM reference_samples", [])?;

        {
            let mut statement = tx.prepare(
                "
                INSERT INTO reference_samples(content_id_json, qa_index, content_text)
                VALUES(?1, ?2, ?3)
                ON CONFLICT(content_id_json, qa_index) DO UPDATE SET
                  content_text=excluded.content_text
                ",
            )?;

            for passage in passages {
                let content_id_json =
                    serde_json::to_string(&passage.content_id).map_err(|source| {
                        StoreError::Encode {
                            what: "reference content id",
                            source,
                        }
                    })?;
                statement.execute(params![
                    content_id_json,
                    passage.qa_index,
                    passage.content_text.as_deref().unwrap_or_default(),
                ])?;
            }
        }

        let stored: i64 =
            tx.query_row("SELECT COUNT(*) FROM reference_samples", [], |row| row.get(0))?;
        tx.commit()?;

        Ok(stored as usize)
    }
}

impl Store for SqliteStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{BreakdownCategory, SuppliedLabel};

    fn record(qa_index: i64) -> EvaluationRecord {
        EvaluationRecord {
            content_id: ContentId::Text("c9".to_string()),
            qa_index,
            question: "q".to_string(),
            gold_answer: "a".to_string(),
            prediction: String::new(),
            exact_match: false,
            f1_score: 0.0,
            answerable: false,
            hallucinated: false,
            label: SuppliedLabel::Labeled(BreakdownCategory::Empty),
            content_text: Some("inline".to_string()),
        }
    }

    fn submission(model: &str, author: &str, second: u32) -> NewSubmission {
        NewSubmission {
            meta: SubmissionMeta::new(
                model,
                author,
                Utc.with_ymd_and_hms(2025, 6, 7, 8, 9, second).unwrap(),
                format!("sha-{second}"),
            ),
            records: vec![record(0), record(1)],
        }
    }

    #[test]
    fn insert_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(&dir.path().join("db").join("board.sqlite")).unwrap();

        let outcome = store
            .insert(&submission("m", "a", 1), SupersedePolicy::Replace)
            .unwrap();
        let loaded = store.load(&outcome.id.0).unwrap().unwrap();

        assert_eq!(loaded.meta.model, "m");
        assert_eq!(loaded.meta.content_sha256, "sha-1");
        assert_eq!(
            loaded.meta.timestamp,
            Utc.with_ymd_and_hms(2025, 6, 7, 8, 9, 1).unwrap()
        );
        assert_eq!(loaded.records, vec![record(0), record(1)]);
        assert!(store.load("999").unwrap().is_none());
        assert!(store.load("not-a-number").unwrap().is_none());
    }

    #[test]
    fn replace_policy_deletes_previous_owner_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(&dir.path().join("board.sqlite")).unwrap();

        store
            .insert(&submission("m", "a", 1), SupersedePolicy::Replace)
            .unwrap();
        store
            .insert(&submission("m", "b", 2), SupersedePolicy::Replace)
            .unwrap();
        let outcome = store
            .insert(&submission("m", "a", 3), SupersedePolicy::Replace)
            .unwrap();

        assert_eq!(outcome.superseded, 1);
        assert_eq!(store.count().unwrap(), 2);

        store
            .insert(&submission("m", "a", 4), SupersedePolicy::Append)
            .unwrap();
        let authors: Vec<String> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|s| s.meta.author)
            .collect();
        assert_eq!(authors, vec!["b", "a", "a"]);
    }

    #[test]
    fn corrupt_rows_are_skipped_when_listing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(&dir.path().join("board.sqlite")).unwrap();
        store
            .insert(&submission("m", "a", 1), SupersedePolicy::Append)
            .unwrap();
        store
            .connection
            .execute(
                "INSERT INTO submissions(model, author, timestamp, content_sha256, results_json)
                 VALUES('x', 'y', ?1, '', 'not json')",
                [Utc.with_ymd_and_hms(2025, 6, 7, 8, 9, 2).unwrap()],
            )
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn references_replace_previous_contents_and_keep_id_types() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(&dir.path().join("board.sqlite")).unwrap();

        store
            .replace_references(&[ReferencePassage {
                content_id: ContentId::Text("old".to_string()),
                qa_index: 0,
                content_text: Some("stale".to_string()),
            }])
            .unwrap();

        let stored = store
            .replace_references(&[
                ReferencePassage {
                    content_id: ContentId::Number(5),
                    qa_index: 1,
                    content_text: None,
                },
                ReferencePassage {
                    content_id: ContentId::Text("5".to_string()),
                    qa_index: 1,
                    content_text: Some("text id".to_string()),
                },
            ])
            .unwrap();
        assert_eq!(stored, 2);

        let loaded = store.load_references().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&ReferencePassage {
            content_id: ContentId::Number(5),
            qa_index: 1,
            content_text: Some(String::new()),
        }));
        assert!(loaded.contains(&ReferencePassage {
            content_id: ContentId::Text("5".to_string()),
            qa_index: 1,
            content_text: Some("text id".to_string()),
        }));
    }
}
