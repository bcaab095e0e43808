use serde_json::{Map, Value};

use crate::error::{SchemaViolations, SubmissionError};
use crate::model::{BreakdownCategory, ContentId, EvaluationRecord, SuppliedLabel};

const REQUIRED_FIELDS: [&str; 9] = [
    "content_id",
    "qa_index",
    "question",
    "gold_answer",
    "prediction",
    "exact_match",
    "f1_score",
    "answerable",
    "hallucinated",
];

const LABEL_FIELD: &str = "type";
const LABEL_ALIAS_FIELD: &str = "hallucination_type";

/// Parses an uploaded result file into typed records. The upload is accepted
/// whole or not at all.
pub fn parse_submission(
    raw: &[u8],
    require_type_label: bool,
) -> Result<Vec<EvaluationRecord>, SubmissionError> {
    let parsed: Value = serde_json::from_slice(raw)
        .map_err(|err| SubmissionError::MalformedInput(format!("invalid JSON format: {err}")))?;

    let Value::Array(items) = parsed else {
        return Err(SubmissionError::MalformedInput(
            "submission file must be a list of JSON objects".to_string(),
        ));
    };

    if items.is_empty() {
        return Err(SubmissionError::EmptySubmission);
    }

    let mut violations = SchemaViolations::default();
    let mut records = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            violations.push(index, "expected a JSON object");
            continue;
        };

        if let Some(record) = check_record(index, fields, require_type_label, &mut violations) {
            records.push(record);
        }
    }

    if violations.is_empty() {
        Ok(records)
    } else {
        Err(SubmissionError::SchemaViolation(violations))
    }
}

fn check_record(
    index: usize,
    fields: &Map<String, Value>,
    require_type_label: bool,
    violations: &mut SchemaViolations,
) -> Option<EvaluationRecord> {
    let before = violations.len();

    let mut missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| !fields.contains_key(*name))
        .collect();
    if require_type_label && !has_label(fields) {
        missing.push(LABEL_FIELD);
    }
    if !missing.is_empty() {
        missing.sort_unstable();
        violations.push(index, format!("missing fields: {}", missing.join(", ")));
    }

    let exact_match = boolean_field(index, fields, "exact_match", violations);
    let answerable = boolean_field(index, fields, "answerable", violations);
    let hallucinated = boolean_field(index, fields, "hallucinated", violations);

    let f1_score = match fields.get("f1_score") {
        Some(value) => match value.as_f64() {
            Some(score) => Some(score),
            None => {
                violations.push(index, "f1_score must be numeric");
                None
            }
        },
        None => None,
    };

    let content_id = match fields.get("content_id") {
        Some(Value::String(text)) => Some(ContentId::Text(text.clone())),
        Some(value @ Value::Number(_)) => match value.as_i64() {
            Some(number) => Some(ContentId::Number(number)),
            None => {
                violations.push(index, "content_id must be a string or integer");
                None
            }
        },
        Some(_) => {
            violations.push(index, "content_id must be a string or integer");
            None
        }
        None => None,
    };

    let qa_index = match fields.get("qa_index") {
        Some(value) => match value.as_i64() {
            Some(number) => Some(number),
            None => {
                violations.push(index, "qa_index must be an integer");
                None
            }
        },
        None => None,
    };

    let question = string_field(index, fields, "question", violations);
    let gold_answer = string_field(index, fields, "gold_answer", violations);
    let prediction = string_field(index, fields, "prediction", violations);

    let content_text = match fields.get("content_text") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            violations.push(index, "content_text must be a string");
            None
        }
    };

    let label = supplied_label(index, fields, violations);

    if violations.len() > before {
        return None;
    }

    Some(EvaluationRecord {
        content_id: content_id?,
        qa_index: qa_index?,
        question: question?,
        gold_answer: gold_answer?,
        prediction: prediction?,
        exact_match: exact_match?,
        f1_score: f1_score?,
        answerable: answerable?,
        hallucinated: hallucinated?,
        label,
        content_text,
    })
}

fn has_label(fields: &Map<String, Value>) -> bool {
    [LABEL_FIELD, LABEL_ALIAS_FIELD]
        .iter()
        .any(|name| fields.get(*name).is_some_and(|value| !value.is_null()))
}

fn supplied_label(
    index: usize,
    fields: &Map<String, Value>,
    violations: &mut SchemaViolations,
) -> SuppliedLabel {
    let Some((name, value)) = [LABEL_FIELD, LABEL_ALIAS_FIELD]
        .iter()
        .find_map(|name| {
            fields
                .get(*name)
                .filter(|value| !value.is_null())
                .map(|value| (*name, value))
        })
    else {
        return SuppliedLabel::Unlabeled;
    };

    match value.as_str().map(str::parse::<BreakdownCategory>) {
        Some(Ok(category)) => SuppliedLabel::Labeled(category),
        _ => {
            violations.push(
                index,
                format!(
                    "{name} must be one of hallucinated, empty, faithful_correct, faithful_incorrect"
                ),
            );
            SuppliedLabel::Unlabeled
        }
    }
}

fn boolean_field(
    index: usize,
    fields: &Map<String, Value>,
    name: &str,
    violations: &mut SchemaViolations,
) -> Option<bool> {
    match fields.get(name) {
        Some(Value::Bool(value)) => Some(*value),
        Some(_) => {
            violations.push(index, format!("{name} must be boolean"));
            None
        }
        None => None,
    }
}

fn string_field(
    index: usize,
    fields: &Map<String, Value>,
    name: &str,
    violations: &mut SchemaViolations,
) -> Option<String> {
    match fields.get(name) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            violations.push(index, format!("{name} must be a string"));
            None
        }
        None => None,
    }
}
