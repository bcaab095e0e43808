use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::SubmitArgs;
use crate::config::Settings;
use crate::model::{NewSubmission, SubmissionMeta};
use crate::schema::parse_submission;
use crate::session::Session;
use crate::util::{read_file, sha256_hex};

pub fn run(args: SubmitArgs) -> Result<()> {
    let mut settings = Settings::resolve(&args.store)?;
    if let Some(policy) = args.supersede {
        settings.supersede = policy;
    }

    let raw = read_file(&args.file)?;
    let records = parse_submission(&raw, settings.require_type_label)
        .with_context(|| format!("rejected upload {}", args.file.display()))?;

    let submission = NewSubmission {
        meta: SubmissionMeta::new(&args.model, &args.author, Utc::now(), sha256_hex(&raw)),
        records,
    };

    let mut session = Session::open(settings)?;
    let policy = session.settings.supersede;
    let outcome = session
        .store
        .insert(&submission, policy)
        .context("failed to save submission")?;

    info!(
        submission = %outcome.id,
        model = %submission.meta.model,
        author = %submission.meta.author,
        records = submission.records.len(),
        supersede = policy.as_str(),
        superseded = outcome.superseded,
        "submission stored"
    );
    println!(
        "Stored submission {} ({} records)",
        outcome.id,
        submission.records.len()
    );

    Ok(())
}
