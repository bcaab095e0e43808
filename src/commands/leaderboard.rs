use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::LeaderboardArgs;
use crate::config::Settings;
use crate::model::{LeaderboardRow, StoredSubmission};
use crate::scoring::{ReferenceLookup, aggregate_submission};
use crate::session::Session;
use crate::util::write_json_stdout;

const COLUMNS: [&str; 13] = [
    "Submission",
    "Model",
    "Author",
    "Timestamp",
    "Samples",
    "EM (%)",
    "F1 (%)",
    "Answered (%)",
    "Hallucinated (%)",
    "Faithful Correct (%)",
    "Faithful Incorrect (%)",
    "Hallucinated Breakdown (%)",
    "Empty (%)",
];

pub fn run(args: LeaderboardArgs) -> Result<()> {
    let settings = Settings::resolve(&args.store)?;
    let session = match Session::open_with_references(settings) {
        Ok(session) => session,
        Err(err) => {
            write_rows(&[], args.json)?;
            return Err(err);
        }
    };

    let submissions = match session.store.load_all() {
        Ok(submissions) => submissions,
        Err(err) => {
            write_rows(&[], args.json)?;
            return Err(err).context("failed to load submissions");
        }
    };

    let rows = build_rows(&submissions, &session.references);
    info!(
        submissions = submissions.len(),
        rows = rows.len(),
        "leaderboard computed"
    );

    write_rows(&rows, args.json)
}

/// One row per submission that can be aggregated, in storage order.
pub(crate) fn build_rows(
    submissions: &[StoredSubmission],
    references: &ReferenceLookup,
) -> Vec<LeaderboardRow> {
    submissions
        .iter()
        .filter_map(
            |submission| match aggregate_submission(submission, references) {
                Ok(row) => Some(row),
                Err(err) => {
                    warn!(submission = %submission.id, error = %err, "skipping submission");
                    None
                }
            },
        )
        .collect()
}

fn write_rows(rows: &[LeaderboardRow], json: bool) -> Result<()> {
    if json {
        write_json_stdout(&rows)
    } else {
        write_text_table(rows)
    }
}

fn write_text_table(rows: &[LeaderboardRow]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    if rows.is_empty() {
        writeln!(output, "No submissions yet.")?;
        output.flush()?;
        return Ok(());
    }

    writeln!(output, "{}", COLUMNS.join("\t"))?;
    for row in rows {
        let summary = &row.summary;
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
            row.submission_id,
            row.model,
            row.author,
            row.timestamp,
            summary.samples,
            summary.exact_match,
            summary.f1,
            summary.answered,
            summary.hallucinated,
            summary.faithful_correct,
            summary.faithful_incorrect,
            summary.hallucinated_breakdown,
            summary.empty,
        )?;
    }

    output.flush()?;
    Ok(())
}
