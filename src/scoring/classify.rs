use crate::model::{BreakdownCategory, EvaluationRecord, SuppliedLabel};

/// Resolves the breakdown category of a record. A supplied label is trusted
/// as-is; otherwise the first matching rule wins: hallucinated, empty
/// prediction, exact match, everything else.
pub fn classify(record: &EvaluationRecord) -> BreakdownCategory {
    match record.label {
        SuppliedLabel::Labeled(category) => category,
        SuppliedLabel::Unlabeled => derive_category(record),
    }
}

fn derive_category(record: &EvaluationRecord) -> BreakdownCategory {
    if record.hallucinated {
        BreakdownCategory::Hallucinated
    } else if record.prediction.trim().is_empty() {
        BreakdownCategory::Empty
    } else if record.exact_match {
        BreakdownCategory::FaithfulCorrect
    } else {
        BreakdownCategory::FaithfulIncorrect
    }
}
