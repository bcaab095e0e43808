use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::cli::SupersedePolicy;
use crate::error::StoreError;
use crate::model::{
    NewSubmission, ReferencePassage, StoredSubmission, SubmissionDocument, SubmissionId,
    SubmissionMeta,
};
use crate::util::{utc_compact_string, write_atomic};

use super::{InsertOutcome, ReferenceStore, Store, SubmissionRepository};

static SUBMISSION_STEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/\\]+_\d{8}_\d{6}(-\d+)?$").expect("submission stem pattern is valid")
});

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s/\\]+").expect("name sanitizer pattern is valid"));

/// Submissions as `{model}_{author}_{YYYYMMDD_HHMMSS}.json` documents in one
/// directory, references as a single JSON array file. A name already taken
/// gets a `-2`, `-3`, ... suffix on its stem.
#[derive(Debug, Clone)]
pub struct FileStore {
    submissions_dir: PathBuf,
    reference_path: PathBuf,
}

impl FileStore {
    pub fn new(submissions_dir: PathBuf, reference_path: PathBuf) -> Self {
        Self {
            submissions_dir,
            reference_path,
        }
    }

    fn submission_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.submissions_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io("read", &self.submissions_dir, err)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io("read", &self.submissions_dir, err))?;
            let path = entry.path();
            if submission_stem(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn vacant_path(&self, meta: &SubmissionMeta) -> PathBuf {
        let stem = submission_file_stem(meta);
        let mut path = self.submissions_dir.join(submission_file_name(meta));
        let mut suffix = 1;
        while path.exists() {
            suffix += 1;
            path = self.submissions_dir.join(format!("{stem}-{suffix}.json"));
        }
        path
    }

    fn read_document(path: &Path) -> Result<SubmissionDocument, StoreError> {
        let raw = fs::read(path).map_err(|err| StoreError::io("read", path, err))?;
        serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_stored(path: &Path) -> Result<StoredSubmission, StoreError> {
        let id = submission_stem(path).unwrap_or_default().to_string();
        Ok(Self::read_document(path)?.into_stored(SubmissionId(id)))
    }
}

pub fn submission_file_name(meta: &SubmissionMeta) -> String {
    format!("{}.json", submission_file_stem(meta))
}

fn submission_file_stem(meta: &SubmissionMeta) -> String {
    format!(
        "{}_{}_{}",
        sanitize_name(&meta.model),
        sanitize_name(&meta.author),
        utc_compact_string(meta.timestamp)
    )
}

fn sanitize_name(value: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(value, "_").into_owned()
}

fn submission_stem(path: &Path) -> Option<&str> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| SUBMISSION_STEM.is_match(stem))
}

impl SubmissionRepository for FileStore {
    fn insert(
        &mut self,
        submission: &NewSubmission,
        policy: SupersedePolicy,
    ) -> Result<InsertOutcome, StoreError> {
        let document = SubmissionDocument::from_new(submission);
        let data = serde_json::to_vec_pretty(&document).map_err(|source| StoreError::Encode {
            what: "submission document",
            source,
        })?;

        let path = self.vacant_path(&submission.meta);
        write_atomic(&path, &data).map_err(|err| StoreError::io("write", &path, err))?;

        let mut superseded = 0;
        if policy == SupersedePolicy::Replace {
            for existing in self.submission_paths()? {
                if existing == path {
                    continue;
                }
                let owner = match Self::read_document(&existing) {
                    Ok(document) => document,
                    Err(err) => {
                        warn!(path = %existing.display(), error = %err, "skipping unreadable submission");
                        continue;
                    }
                };
                if owner.model == submission.meta.model && owner.author == submission.meta.author {
                    fs::remove_file(&existing)
                        .map_err(|err| StoreError::io("remove", &existing, err))?;
                    info!(path = %existing.display(), "removed superseded submission");
                    superseded += 1;
                }
            }
        }

        let id = submission_stem(&path).unwrap_or_default().to_string();
        Ok(InsertOutcome {
            id: SubmissionId(id),
            superseded,
        })
    }

    fn load_all(&self) -> Result<Vec<StoredSubmission>, StoreError> {
        let mut submissions = Vec::new();
        for path in self.submission_paths()? {
            match Self::read_stored(&path) {
                Ok(submission) => submissions.push(submission),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable submission");
                }
            }
        }
        submissions.sort_by(|a, b| a.meta.timestamp.cmp(&b.meta.timestamp).then(a.id.cmp(&b.id)));
        Ok(submissions)
    }

    fn load(&self, id: &str) -> Result<Option<StoredSubmission>, StoreError> {
        if !SUBMISSION_STEM.is_match(id) {
            return Ok(None);
        }

        let path = self.submissions_dir.join(format!("{id}.json"));
        if !path.is_file() {
            return Ok(None);
        }
        Self::read_stored(&path).map(Some)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.submission_paths()?.len())
    }
}

impl ReferenceStore for FileStore {
    fn load_references(&self) -> Result<Vec<ReferencePassage>, StoreError> {
        let raw = match fs::read(&self.reference_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %self.reference_path.display(), "reference file missing");
                return Ok(Vec::new());
            }
            Err(err) => return Err(StoreError::io("read", &self.reference_path, err)),
        };

        serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
            path: self.reference_path.clone(),
            source,
        })
    }

    fn replace_references(&mut self, passages: &[ReferencePassage]) -> Result<usize, StoreError> {
        let data = serde_json::to_vec_pretty(passages).map_err(|source| StoreError::Encode {
            what: "reference passages",
            source,
        })?;
        write_atomic(&self.reference_path, &data)
            .map_err(|err| StoreError::io("write", &self.reference_path, err))?;
        Ok(passages.len())
    }
}

impl Store for FileStore {
    fn location(&self) -> String {
        self.submissions_dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{ContentId, EvaluationRecord, SuppliedLabel};

    fn record(qa_index: i64) -> EvaluationRecord {
        EvaluationRecord {
            content_id: ContentId::Number(3),
            qa_index,
            question: "q".to_string(),
            gold_answer: "a".to_string(),
            prediction: "a".to_string(),
            exact_match: true,
            f1_score: 1.0,
            answerable: true,
            hallucinated: false,
            label: SuppliedLabel::Unlabeled,
            content_text: None,
        }
    }

    fn submission(model: &str, author: &str, second: u32, records: usize) -> NewSubmission {
        NewSubmission {
            meta: SubmissionMeta::new(
                model,
                author,
                Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, second).unwrap(),
                "digest".to_string(),
            ),
            records: (0..records as i64).map(record).collect(),
        }
    }

    fn store(root: &Path) -> FileStore {
        FileStore::new(root.join("submissions"), root.join("reference_samples.json"))
    }

    #[test]
    fn file_names_replace_spaces_and_separators() {
        let meta = submission("My Model/v2", "Jane Doe", 9, 0).meta;
        assert_eq!(
            submission_file_name(&meta),
            "My_Model_v2_Jane_Doe_20250102_030409.json"
        );
    }

    #[test]
    fn insert_then_load_round_trips_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let outcome = store
            .insert(&submission("tiny qa", "ravi", 1, 3), SupersedePolicy::Replace)
            .unwrap();
        assert_eq!(outcome.id, SubmissionId("tiny_qa_ravi_20250102_030401".to_string()));
        assert_eq!(outcome.superseded, 0);

        let loaded = store.load(&outcome.id.0).unwrap().unwrap();
        assert_eq!(loaded.meta.model, "tiny qa");
        assert_eq!(loaded.meta.content_sha256, "digest");
        assert_eq!(loaded.records, (0..3).map(record).collect::<Vec<_>>());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn replace_policy_removes_earlier_uploads_of_the_same_owner() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        store
            .insert(&submission("m", "a", 1, 1), SupersedePolicy::Replace)
            .unwrap();
        store
            .insert(&submission("m", "b", 2, 1), SupersedePolicy::Replace)
            .unwrap();
        let outcome = store
            .insert(&submission("m", "a", 3, 2), SupersedePolicy::Replace)
            .unwrap();

        assert_eq!(outcome.superseded, 1);
        let all = store.load_all().unwrap();
        let owners: Vec<(&str, usize)> = all
            .iter()
            .map(|s| (s.meta.author.as_str(), s.records.len()))
            .collect();
        assert_eq!(owners, vec![("b", 1), ("a", 2)]);
    }

    #[test]
    fn owners_sharing_a_file_name_keep_separate_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let first = store
            .insert(&submission("a_b", "c", 5, 1), SupersedePolicy::Replace)
            .unwrap();
        let second = store
            .insert(&submission("a", "b_c", 5, 2), SupersedePolicy::Replace)
            .unwrap();

        assert_eq!(first.id, SubmissionId("a_b_c_20250102_030405".to_string()));
        assert_eq!(second.id, SubmissionId("a_b_c_20250102_030405-2".to_string()));
        assert_eq!(second.superseded, 0);

        let mut owners: Vec<(String, String)> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|s| (s.meta.model, s.meta.author))
            .collect();
        owners.sort();
        assert_eq!(
            owners,
            vec![
                ("a".to_string(), "b_c".to_string()),
                ("a_b".to_string(), "c".to_string()),
            ]
        );
        assert!(store.load(&second.id.0).unwrap().is_some());
    }

    #[test]
    fn same_second_uploads_of_one_owner_replace_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        store
            .insert(&submission("m", "a", 7, 1), SupersedePolicy::Append)
            .unwrap();
        store
            .insert(&submission("m", "a", 7, 2), SupersedePolicy::Append)
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);

        let outcome = store
            .insert(&submission("m", "a", 7, 3), SupersedePolicy::Replace)
            .unwrap();
        assert_eq!(outcome.superseded, 2);
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].records.len(), 3);
    }

    #[test]
    fn append_policy_keeps_every_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        for second in 1..=3 {
            store
                .insert(&submission("m", "a", second, 1), SupersedePolicy::Append)
                .unwrap();
        }

        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn unreadable_and_foreign_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store
            .insert(&submission("m", "a", 1, 1), SupersedePolicy::Append)
            .unwrap();

        let submissions_dir = dir.path().join("submissions");
        fs::write(submissions_dir.join("broken_x_20250101_000000.json"), "{").unwrap();
        fs::write(submissions_dir.join("notes.txt"), "hello").unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn load_rejects_ids_that_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(store.load("../secret_x_20250101_000000").unwrap().is_none());
        assert!(store.load("missing_x_20250101_000000").unwrap().is_none());
    }

    #[test]
    fn references_round_trip_and_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        assert!(store.load_references().unwrap().is_empty());

        let passages = vec![ReferencePassage {
            content_id: ContentId::Text("c1".to_string()),
            qa_index: 2,
            content_text: Some("passage".to_string()),
        }];
        assert_eq!(store.replace_references(&passages).unwrap(), 1);
        assert_eq!(store.load_references().unwrap(), passages);
    }
}
