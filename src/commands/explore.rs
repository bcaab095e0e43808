use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ExploreArgs;
use crate::config::Settings;
use crate::model::{BreakdownCategory, ContentId, StoredSubmission};
use crate::scoring::{ScoredSample, score_records};
use crate::session::Session;
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct SubmissionListing {
    submission: String,
    label: String,
    model: String,
    author: String,
    timestamp: String,
    samples: usize,
    content_sha256: String,
}

#[derive(Debug, Serialize)]
struct SampleView {
    submission: String,
    filter: String,
    available_filters: Vec<String>,
    position: usize,
    matching: usize,
    content_id: ContentId,
    qa_index: i64,
    question: String,
    gold_answer: String,
    prediction: String,
    f1_score: f64,
    exact_match: bool,
    hallucinated: bool,
    category: BreakdownCategory,
    context: String,
}

pub fn run(args: ExploreArgs) -> Result<()> {
    let settings = Settings::resolve(&args.store)?;

    let Some(submission_id) = args.submission.as_deref() else {
        let session = Session::open(settings)?;
        let submissions = session
            .store
            .load_all()
            .context("failed to load submissions")?;
        return write_listing(&submissions, args.json);
    };

    let session = Session::open_with_references(settings)?;
    let submission = session
        .store
        .load(submission_id)
        .with_context(|| format!("failed to load submission {submission_id}"))?
        .with_context(|| format!("submission not found: {submission_id}"))?;

    let scored = score_records(&submission.records, &session.references);
    let available_filters = available_filters(&scored);
    let filtered: Vec<&ScoredSample<'_>> = scored
        .iter()
        .filter(|sample| {
            args.category
                .category()
                .is_none_or(|category| sample.category == category)
        })
        .collect();

    info!(
        submission = %submission.id,
        filter = args.category.as_str(),
        matching = filtered.len(),
        "exploring submission"
    );

    if filtered.is_empty() {
        warn!(filter = args.category.as_str(), "no samples match filter");
        println!("No samples found for this filter.");
        return Ok(());
    }

    let Some(sample) = filtered.get(args.index) else {
        bail!(
            "sample index {} out of range (0..={})",
            args.index,
            filtered.len() - 1
        );
    };

    let view = SampleView {
        submission: submission.id.to_string(),
        filter: args.category.as_str().to_string(),
        available_filters,
        position: args.index,
        matching: filtered.len(),
        content_id: sample.record.content_id.clone(),
        qa_index: sample.record.qa_index,
        question: sample.record.question.clone(),
        gold_answer: sample.record.gold_answer.clone(),
        prediction: sample.record.prediction.clone(),
        f1_score: sample.record.f1_score,
        exact_match: sample.record.exact_match,
        hallucinated: sample.record.hallucinated,
        category: sample.category,
        context: sample.context.to_string(),
    };

    if args.json {
        write_json_stdout(&view)
    } else {
        write_sample_text(&view)
    }
}

/// `all` followed by the sorted distinct categories present.
fn available_filters(scored: &[ScoredSample<'_>]) -> Vec<String> {
    let present: BTreeSet<&str> = scored
        .iter()
        .map(|sample| sample.category.as_str())
        .collect();

    std::iter::once("all")
        .chain(present)
        .map(ToOwned::to_owned)
        .collect()
}

fn write_listing(submissions: &[StoredSubmission], json: bool) -> Result<()> {
    let listings: Vec<SubmissionListing> = submissions
        .iter()
        .map(|submission| SubmissionListing {
            submission: submission.id.to_string(),
            label: submission.meta.label(),
            model: submission.meta.model.clone(),
            author: submission.meta.author.clone(),
            timestamp: submission
                .meta
                .timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            samples: submission.records.len(),
            content_sha256: submission.meta.content_sha256.clone(),
        })
        .collect();

    if json {
        return write_json_stdout(&listings);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    if listings.is_empty() {
        writeln!(output, "No submissions yet.")?;
    }
    for listing in &listings {
        writeln!(
            output,
            "{}\t{}\tsamples={}",
            listing.submission, listing.label, listing.samples
        )?;
    }
    output.flush()?;
    Ok(())
}

fn write_sample_text(view: &SampleView) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Sample {} of {} (filter: {}; available: {})",
        view.position + 1,
        view.matching,
        view.filter,
        view.available_filters.join(", ")
    )?;
    writeln!(output, "Q{}: {}", view.qa_index, view.question)?;
    writeln!(output, "Gold Answer: {}", view.gold_answer)?;
    writeln!(output, "Prediction: {}", view.prediction)?;
    writeln!(
        output,
        "F1: {:.2} | EM: {} | Hallucinated: {}",
        view.f1_score, view.exact_match, view.hallucinated
    )?;
    writeln!(output, "Type: {}", view.category)?;
    writeln!(output, "---")?;
    writeln!(output, "Context:")?;
    writeln!(output)?;
    writeln!(output, "{}", view.context)?;

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvaluationRecord, SuppliedLabel};
    use crate::scoring::ReferenceLookup;

    fn record(hallucinated: bool, prediction: &str) -> EvaluationRecord {
        EvaluationRecord {
            content_id: ContentId::Number(1),
            qa_index: 0,
            question: "q".to_string(),
            gold_answer: "a".to_string(),
            prediction: prediction.to_string(),
            exact_match: false,
            f1_score: 0.0,
            answerable: true,
            hallucinated,
            label: SuppliedLabel::Unlabeled,
            content_text: None,
        }
    }

    #[test]
    fn available_filters_list_present_categories_once_in_order() {
        let records = vec![
            record(false, "wrong"),
            record(true, "made up"),
            record(false, "also wrong"),
        ];
        let references = ReferenceLookup::default();
        let scored = score_records(&records, &references);

        assert_eq!(
            available_filters(&scored),
            vec!["all", "faithful_incorrect", "hallucinated"]
        );
    }
}
