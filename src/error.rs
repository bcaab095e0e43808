use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub const MAX_REPORTED_VIOLATIONS: usize = 5;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid submission: {0}")]
    MalformedInput(String),

    #[error("validation failed\n{0}")]
    SchemaViolation(SchemaViolations),

    #[error("submission contains no records")]
    EmptySubmission,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordViolation {
    pub record: usize,
    pub message: String,
}

impl fmt::Display for RecordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record {}: {}", self.record, self.message)
    }
}

/// Every violation found in one upload. Rendering is capped at
/// [`MAX_REPORTED_VIOLATIONS`] lines plus an overflow count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaViolations {
    violations: Vec<RecordViolation>,
}

impl SchemaViolations {
    pub fn push(&mut self, record: usize, message: impl Into<String>) {
        self.violations.push(RecordViolation {
            record,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    #[cfg(test)]
    pub fn all(&self) -> &[RecordViolation] {
        &self.violations
    }

    pub fn reported(&self) -> &[RecordViolation] {
        let end = self.violations.len().min(MAX_REPORTED_VIOLATIONS);
        &self.violations[..end]
    }

    pub fn overflow(&self) -> usize {
        self.violations.len().saturating_sub(MAX_REPORTED_VIOLATIONS)
    }
}

impl fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reported = self.reported();
        for (position, violation) in reported.iter().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            write!(f, "{violation}")?;
        }
        let overflow = self.overflow();
        if overflow > 0 {
            write!(f, "\n...and {overflow} more errors")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("cannot aggregate a submission with no records")]
    EmptySubmission,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {what}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("sqlite operation failed")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violations_cap_rendered_lines_and_report_overflow() {
        let mut violations = SchemaViolations::default();
        for record in 0..8 {
            violations.push(record, "missing fields: f1_score");
        }

        assert_eq!(violations.len(), 8);
        assert_eq!(violations.reported().len(), MAX_REPORTED_VIOLATIONS);
        assert_eq!(violations.overflow(), 3);

        let rendered = violations.to_string();
        assert_eq!(rendered.lines().count(), MAX_REPORTED_VIOLATIONS + 1);
        assert!(rendered.starts_with("Record 0: missing fields: f1_score"));
        assert!(rendered.ends_with("...and 3 more errors"));
    }

    #[test]
    fn schema_violations_without_overflow_have_no_trailer() {
        let mut violations = SchemaViolations::default();
        violations.push(2, "exact_match must be boolean");

        assert_eq!(violations.overflow(), 0);
        assert_eq!(violations.to_string(), "Record 2: exact_match must be boolean");
    }
}
