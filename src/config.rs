use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::cli::{Backend, StoreArgs, SupersedePolicy};

pub const CONFIG_FILE_NAME: &str = "leaderboard.toml";
const DEFAULT_REFERENCE_FILE: &str = "reference_samples.json";
const DEFAULT_SQLITE_FILE: &str = "leaderboard.sqlite";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backend: Option<Backend>,
    supersede: Option<SupersedePolicy>,
    require_type_label: Option<bool>,
    reference_path: Option<PathBuf>,
    sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_root: PathBuf,
    pub backend: Backend,
    pub supersede: SupersedePolicy,
    pub require_type_label: bool,
    pub reference_path: PathBuf,
    pub sqlite_path: PathBuf,
}

impl Settings {
    pub fn defaults(data_root: &Path) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            backend: Backend::File,
            supersede: SupersedePolicy::Replace,
            require_type_label: true,
            reference_path: data_root.join(DEFAULT_REFERENCE_FILE),
            sqlite_path: data_root.join(DEFAULT_SQLITE_FILE),
        }
    }

    pub fn submissions_dir(&self) -> PathBuf {
        self.data_root.join("submissions")
    }

    /// Defaults, then the TOML file, then command-line flags. An explicit
    /// `--config` must exist; the implicit one under the data root is optional.
    pub fn resolve(args: &StoreArgs) -> Result<Self> {
        let mut settings = Self::defaults(&args.data_root);

        let config_path = match &args.config {
            Some(path) => Some(path.clone()),
            None => {
                let implicit = args.data_root.join(CONFIG_FILE_NAME);
                implicit.exists().then_some(implicit)
            }
        };

        if let Some(path) = config_path {
            let file = load_config_file(&path)?;
            settings.apply(file);
            debug!(path = %path.display(), "applied configuration file");
        }

        if let Some(backend) = args.backend {
            settings.backend = backend;
        }

        Ok(settings)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(backend) = file.backend {
            self.backend = backend;
        }
        if let Some(supersede) = file.supersede {
            self.supersede = supersede;
        }
        if let Some(require_type_label) = file.require_type_label {
            self.require_type_label = require_type_label;
        }
        if let Some(reference_path) = file.reference_path {
            self.reference_path = self.data_root.join(reference_path);
        }
        if let Some(sqlite_path) = file.sqlite_path {
            self.sqlite_path = self.data_root.join(sqlite_path);
        }
    }
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}
