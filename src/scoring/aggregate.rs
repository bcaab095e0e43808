use std::collections::HashMap;

use crate::error::AggregateError;
use crate::model::{
    BreakdownCategory, CategoryDistribution, ContentId, EvaluationRecord, LeaderboardRow,
    StoredSubmission, SubmissionSummary,
};

use super::classify::classify;
use super::reference::ReferenceLookup;

pub const CONTEXT_NOT_AVAILABLE: &str = "[context not available]";

#[derive(Debug, Clone, Copy)]
pub struct ScoredSample<'a> {
    pub record: &'a EvaluationRecord,
    pub category: BreakdownCategory,
    pub context: &'a str,
}

struct ContextResolver<'a> {
    references: &'a ReferenceLookup,
    resolved: HashMap<(&'a ContentId, i64), &'a str>,
}

impl<'a> ContextResolver<'a> {
    fn new(references: &'a ReferenceLookup) -> Self {
        Self {
            references,
            resolved: HashMap::new(),
        }
    }

    fn resolve(&mut self, record: &'a EvaluationRecord) -> &'a str {
        if let Some(text) = record.content_text.as_deref() {
            return text;
        }

        let references = self.references;
        *self
            .resolved
            .entry((&record.content_id, record.qa_index))
            .or_insert_with(|| {
                references
                    .get(&record.content_id, record.qa_index)
                    .unwrap_or(CONTEXT_NOT_AVAILABLE)
            })
    }
}

/// Resolves context passages and breakdown categories for every record.
pub fn score_records<'a>(
    records: &'a [EvaluationRecord],
    references: &'a ReferenceLookup,
) -> Vec<ScoredSample<'a>> {
    let mut resolver = ContextResolver::new(references);

    records
        .iter()
        .map(|record| ScoredSample {
            record,
            category: classify(record),
            context: resolver.resolve(record),
        })
        .collect()
}

pub fn aggregate(
    records: &[EvaluationRecord],
    references: &ReferenceLookup,
) -> Result<SubmissionSummary, AggregateError> {
    if records.is_empty() {
        return Err(AggregateError::EmptySubmission);
    }

    let samples = score_records(records, references);
    let total = samples.len();

    let exact_matches = samples.iter().filter(|s| s.record.exact_match).count();
    let answered = samples.iter().filter(|s| s.record.answerable).count();
    let hallucinated = samples.iter().filter(|s| s.record.hallucinated).count();
    let f1_sum: f64 = samples.iter().map(|s| s.record.f1_score).sum();

    let mut counts = HashMap::<BreakdownCategory, usize>::new();
    for sample in &samples {
        *counts.entry(sample.category).or_default() += 1;
    }
    let share = |category: BreakdownCategory| {
        percent(counts.get(&category).copied().unwrap_or(0), total)
    };

    let distribution = CategoryDistribution {
        hallucinated: share(BreakdownCategory::Hallucinated),
        empty: share(BreakdownCategory::Empty),
        faithful_correct: share(BreakdownCategory::FaithfulCorrect),
        faithful_incorrect: share(BreakdownCategory::FaithfulIncorrect),
    };
    debug_assert!((distribution.total() - 100.0).abs() <= 0.04);

    let faithful_correct_mean = samples
        .iter()
        .map(|s| indicator(s.category == BreakdownCategory::FaithfulCorrect))
        .sum::<f64>()
        / total as f64;

    Ok(SubmissionSummary {
        samples: total,
        exact_match: percent(exact_matches, total),
        f1: round2(f1_sum / total as f64 * 100.0),
        answered: percent(answered, total),
        hallucinated: percent(hallucinated, total),
        faithful_correct: round2(faithful_correct_mean * 100.0),
        faithful_incorrect: distribution.faithful_incorrect,
        hallucinated_breakdown: distribution.hallucinated,
        empty: distribution.empty,
        distribution,
    })
}

pub fn aggregate_submission(
    submission: &StoredSubmission,
    references: &ReferenceLookup,
) -> Result<LeaderboardRow, AggregateError> {
    let summary = aggregate(&submission.records, references)?;

    Ok(LeaderboardRow {
        submission_id: submission.id.clone(),
        model: submission.meta.model.clone(),
        author: submission.meta.author.clone(),
        timestamp: submission
            .meta
            .timestamp
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        summary,
    })
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

fn percent(count: usize, total: usize) -> f64 {
    round2(count as f64 / total as f64 * 100.0)
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
