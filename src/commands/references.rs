use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ReferenceImportArgs;
use crate::config::Settings;
use crate::model::ReferencePassage;
use crate::session::Session;
use crate::util::read_file;

pub fn import(args: ReferenceImportArgs) -> Result<()> {
    let settings = Settings::resolve(&args.store)?;

    let raw = read_file(&args.file)?;
    let passages: Vec<ReferencePassage> = serde_json::from_slice(&raw).with_context(|| {
        format!(
            "reference file must be a list of objects with content_id and qa_index: {}",
            args.file.display()
        )
    })?;

    let mut session = Session::open(settings)?;
    let stored = session
        .store
        .replace_references(&passages)
        .context("failed to store reference passages")?;

    info!(
        path = %args.file.display(),
        read = passages.len(),
        stored,
        location = %session.store.location(),
        "imported reference passages"
    );
    println!("Imported {stored} reference passages");

    Ok(())
}
