use anyhow::{Context as AnyhowContext, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use svc_store::paths::{default_data_dir, default_reports_dir};

pub const CONFIG_FILE_NAME: &str = "svc-facts.toml";

/// On-disk configuration (`svc-facts.toml`). Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub store: StoreSection,
    pub audit: AuditSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    pub report_dir: Option<PathBuf>,
    pub markdown: bool,
}

/// Effective settings after defaults, the config file, env and flags are layered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
    pub markdown: bool,
}

/// Command-line and environment overrides; `None` defers to the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub markdown: bool,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| anyhow::anyhow!("Invalid configuration: {err}"))
    }

    /// Load `explicit` (must exist) or `./svc-facts.toml` (optional)
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE_NAME);
                if !default.exists() {
                    log::debug!("No {CONFIG_FILE_NAME} found, using defaults");
                    return Ok((Self::default(), None));
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("In {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok((config, Some(path)))
    }

    /// Layer overrides on top of this file. Relative paths in the file resolve against the
    /// file's directory.
    pub fn resolve(&self, origin: Option<&Path>, overrides: Overrides) -> Settings {
        let base = origin
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let from_file = |path: &Option<PathBuf>| path.as_ref().map(|p| base.join(p));

        Settings {
            data_dir: overrides
                .data_dir
                .or_else(|| from_file(&self.store.data_dir))
                .unwrap_or_else(|| default_data_dir(Path::new("."))),
            report_dir: overrides
                .report_dir
                .or_else(|| from_file(&self.audit.report_dir))
                .unwrap_or_else(|| default_reports_dir(Path::new("."))),
            markdown: overrides.markdown || self.audit.markdown,
        }
    }
}
