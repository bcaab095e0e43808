use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::scoring::ReferenceLookup;
use crate::store::{Store, open_store};

/// Everything one command invocation works against: resolved settings, the
/// storage backend and the reference passages.
pub struct Session {
    pub settings: Settings,
    pub store: Box<dyn Store>,
    pub references: ReferenceLookup,
}

impl Session {
    pub fn open(settings: Settings) -> Result<Self> {
        let store = open_store(&settings).with_context(|| {
            format!("failed to open {} store", settings.backend.as_str())
        })?;

        Ok(Self {
            settings,
            store,
            references: ReferenceLookup::default(),
        })
    }

    /// Like [`Session::open`], plus a one-time load of the reference passages.
    /// A failed load leaves the lookup empty so scoring can still proceed.
    pub fn open_with_references(settings: Settings) -> Result<Self> {
        let mut session = Self::open(settings)?;

        match session.store.load_references() {
            Ok(passages) => {
                session.references = ReferenceLookup::from_passages(passages);
                if session.references.is_empty() {
                    warn!("no reference passages loaded; contexts fall back to the placeholder");
                } else {
                    info!(passages = session.references.len(), "loaded reference data");
                }
            }
            Err(err) => {
                error!(error = %err, "failed to load reference data");
            }
        }

        Ok(session)
    }
}
