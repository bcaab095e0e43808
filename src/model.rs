use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_NAME: &str = "unnamed_model";
pub const DEFAULT_AUTHOR_NAME: &str = "anonymous";

/// Identifier of a benchmark content item. Uploads carry either strings or
/// integers; both are kept as-is so join keys compare the way they were written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownCategory {
    Hallucinated,
    Empty,
    FaithfulCorrect,
    FaithfulIncorrect,
}

impl BreakdownCategory {
    pub const ALL: [BreakdownCategory; 4] = [
        Self::Hallucinated,
        Self::Empty,
        Self::FaithfulCorrect,
        Self::FaithfulIncorrect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hallucinated => "hallucinated",
            Self::Empty => "empty",
            Self::FaithfulCorrect => "faithful_correct",
            Self::FaithfulIncorrect => "faithful_incorrect",
        }
    }
}

impl fmt::Display for BreakdownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakdownCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| format!("unknown breakdown category: {value}"))
    }
}

/// Category label as it arrived with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<BreakdownCategory>", into = "Option<BreakdownCategory>")]
pub enum SuppliedLabel {
    Labeled(BreakdownCategory),
    #[default]
    Unlabeled,
}

impl SuppliedLabel {
    pub fn is_unlabeled(&self) -> bool {
        matches!(self, Self::Unlabeled)
    }
}

impl From<Option<BreakdownCategory>> for SuppliedLabel {
    fn from(value: Option<BreakdownCategory>) -> Self {
        value.map_or(Self::Unlabeled, Self::Labeled)
    }
}

impl From<SuppliedLabel> for Option<BreakdownCategory> {
    fn from(value: SuppliedLabel) -> Self {
        match value {
            SuppliedLabel::Labeled(category) => Some(category),
            SuppliedLabel::Unlabeled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub content_id: ContentId,
    pub qa_index: i64,
    pub question: String,
    pub gold_answer: String,
    pub prediction: String,
    pub exact_match: bool,
    pub f1_score: f64,
    pub answerable: bool,
    pub hallucinated: bool,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "SuppliedLabel::is_unlabeled"
    )]
    pub label: SuppliedLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    pub model: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub content_sha256: String,
}

impl SubmissionMeta {
    pub fn new(
        model: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        content_sha256: String,
    ) -> Self {
        Self {
            model: non_blank_or(model, DEFAULT_MODEL_NAME),
            author: non_blank_or(author, DEFAULT_AUTHOR_NAME),
            timestamp,
            content_sha256,
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{} - {} ({})",
            self.model,
            self.author,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub meta: SubmissionMeta,
    pub records: Vec<EvaluationRecord>,
}

#[derive(Debug, Clone)]
pub struct StoredSubmission {
    pub id: SubmissionId,
    pub meta: SubmissionMeta,
    pub records: Vec<EvaluationRecord>,
}

/// On-disk and in-database document shape of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDocument {
    pub model: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub content_sha256: String,
    pub results: Vec<EvaluationRecord>,
}

impl SubmissionDocument {
    pub fn from_new(submission: &NewSubmission) -> Self {
        Self {
            model: submission.meta.model.clone(),
            author: submission.meta.author.clone(),
            timestamp: submission.meta.timestamp,
            content_sha256: submission.meta.content_sha256.clone(),
            results: submission.records.clone(),
        }
    }

    pub fn into_stored(self, id: SubmissionId) -> StoredSubmission {
        StoredSubmission {
            id,
            meta: SubmissionMeta {
                model: self.model,
                author: self.author,
                timestamp: self.timestamp,
                content_sha256: self.content_sha256,
            },
            records: self.results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePassage {
    pub content_id: ContentId,
    pub qa_index: i64,
    #[serde(default)]
    pub content_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryDistribution {
    pub hallucinated: f64,
    pub empty: f64,
    pub faithful_correct: f64,
    pub faithful_incorrect: f64,
}

impl CategoryDistribution {
    pub fn share(&self, category: BreakdownCategory) -> f64 {
        match category {
            BreakdownCategory::Hallucinated => self.hallucinated,
            BreakdownCategory::Empty => self.empty,
            BreakdownCategory::FaithfulCorrect => self.faithful_correct,
            BreakdownCategory::FaithfulIncorrect => self.faithful_incorrect,
        }
    }

    pub fn total(&self) -> f64 {
        BreakdownCategory::ALL
            .into_iter()
            .map(|category| self.share(category))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionSummary {
    #[serde(rename = "Samples")]
    pub samples: usize,
    #[serde(rename = "EM (%)")]
    pub exact_match: f64,
    #[serde(rename = "F1 (%)")]
    pub f1: f64,
    #[serde(rename = "Answered (%)")]
    pub answered: f64,
    #[serde(rename = "Hallucinated (%)")]
    pub hallucinated: f64,
    #[serde(rename = "Faithful Correct (%)")]
    pub faithful_correct: f64,
    #[serde(rename = "Faithful Incorrect (%)")]
    pub faithful_incorrect: f64,
    #[serde(rename = "Hallucinated Breakdown (%)")]
    pub hallucinated_breakdown: f64,
    #[serde(rename = "Empty (%)")]
    pub empty: f64,
    #[serde(skip)]
    pub distribution: CategoryDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    #[serde(rename = "Submission")]
    pub submission_id: SubmissionId,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(flatten)]
    pub summary: SubmissionSummary,
}
