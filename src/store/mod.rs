mod file;
mod sqlite;

use crate::cli::{Backend, SupersedePolicy};
use crate::config::Settings;
use crate::error::StoreError;
use crate::model::{NewSubmission, ReferencePassage, StoredSubmission, SubmissionId};

pub use file::FileStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: SubmissionId,
    pub superseded: usize,
}

/// Persists raw submissions. Writes are single best-effort attempts with no
/// coordination between concurrent writers.
pub trait SubmissionRepository {
    fn insert(
        &mut self,
        submission: &NewSubmission,
        policy: SupersedePolicy,
    ) -> Result<InsertOutcome, StoreError>;

    /// Submissions ordered by timestamp. Entries that fail to decode are skipped.
    fn load_all(&self) -> Result<Vec<StoredSubmission>, StoreError>;

    fn load(&self, id: &str) -> Result<Option<StoredSubmission>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

pub trait ReferenceStore {
    fn load_references(&self) -> Result<Vec<ReferencePassage>, StoreError>;

    fn replace_references(&mut self, passages: &[ReferencePassage]) -> Result<usize, StoreError>;
}

pub trait Store: SubmissionRepository + ReferenceStore {
    fn location(&self) -> String;
}

pub fn open_store(settings: &Settings) -> Result<Box<dyn Store>, StoreError> {
    match settings.backend {
        Backend::File => Ok(Box::new(FileStore::new(
            settings.submissions_dir(),
            settings.reference_path.clone(),
        ))),
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(&settings.sqlite_path)?)),
    }
}
