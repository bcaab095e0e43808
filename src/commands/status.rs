use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::config::Settings;
use crate::session::Session;
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct StatusReport {
    backend: String,
    data_root: String,
    location: String,
    supersede: String,
    require_type_label: bool,
    submissions: usize,
    reference_passages: Option<usize>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let settings = Settings::resolve(&args.store)?;
    info!(data_root = %settings.data_root.display(), "status requested");

    let session = Session::open(settings)?;
    let submissions = session
        .store
        .count()
        .context("failed to count submissions")?;
    let reference_passages = match session.store.load_references() {
        Ok(passages) => Some(passages.len()),
        Err(err) => {
            warn!(error = %err, "reference data unavailable");
            None
        }
    };

    let report = StatusReport {
        backend: session.settings.backend.as_str().to_string(),
        data_root: session.settings.data_root.display().to_string(),
        location: session.store.location(),
        supersede: session.settings.supersede.as_str().to_string(),
        require_type_label: session.settings.require_type_label,
        submissions,
        reference_passages,
    };

    info!(
        backend = %report.backend,
        location = %report.location,
        submissions = report.submissions,
        reference_passages = report.reference_passages.unwrap_or_default(),
        "store status"
    );

    if args.json {
        return write_json_stdout(&report);
    }

    println!("backend: {}", report.backend);
    println!("data_root: {}", report.data_root);
    println!("location: {}", report.location);
    println!("supersede: {}", report.supersede);
    println!("require_type_label: {}", report.require_type_label);
    println!("submissions: {}", report.submissions);
    match report.reference_passages {
        Some(count) => println!("reference_passages: {count}"),
        None => println!("reference_passages: unavailable"),
    }

    Ok(())
}
