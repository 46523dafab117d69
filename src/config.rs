use anyhow::{Context, Result};
use crate::models::is_valid_stage_name;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the built-in workflow, used when the rc file sets no default
pub const BUILTIN_WORKFLOW: &str = "standard";

/// Checkpoint sequence of the built-in workflow. The return legs are
/// ordinary stages visited on the way out.
pub const DEFAULT_CHECKPOINTS: [&str; 8] = [
    "entry_gate",
    "front_office",
    "weigh_bridge",
    "qc",
    "material_handling",
    "weigh_bridge_return",
    "front_office_return",
    "entry_gate_return",
];

/// Attempts at a load/apply/save cycle before a version conflict is surfaced
pub const DEFAULT_SAVE_RETRIES: u32 = 3;

/// Settings read from `~/.truckflow/rc`
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database location, already resolved against the rc file directory
    pub data_location: Option<PathBuf>,
    /// Named workflows (`workflow.<name>=a,b,c`)
    pub workflows: BTreeMap<String, Vec<String>>,
    /// Workflow used when none is requested (`workflow.default=<name>`)
    pub default_workflow: Option<String>,
    pub save_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_location: None,
            workflows: BTreeMap::new(),
            default_workflow: None,
            save_retries: DEFAULT_SAVE_RETRIES,
        }
    }
}

impl Config {
    /// Directory holding the rc file and the default database
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".truckflow"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("rc"))
    }

    /// Load the rc file, falling back to defaults when it does not exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, &base)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse `key=value` lines. Relative paths resolve against `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                anyhow::bail!("Line {}: expected key=value, got '{}'", lineno + 1, line);
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = Some(if path.is_relative() {
                        base_dir.join(path)
                    } else {
                        path
                    });
                }
                "workflow.default" => {
                    config.default_workflow = Some(value.to_string());
                }
                "save.retries" => {
                    let retries: u32 = value.parse().with_context(|| {
                        format!("Line {}: invalid save.retries value '{}'", lineno + 1, value)
                    })?;
                    config.save_retries = retries.max(1);
                }
                _ => {
                    if let Some(name) = key.strip_prefix("workflow.") {
                        let mut stages = Vec::new();
                        for stage in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                            if !is_valid_stage_name(stage) {
                                anyhow::bail!(
                                    "Line {}: invalid stage name '{}' in workflow '{}'",
                                    lineno + 1,
                                    stage,
                                    name
                                );
                            }
                            stages.push(stage.to_string());
                        }
                        config.workflows.insert(name.to_string(), stages);
                    } else {
                        log::debug!("Ignoring unknown config key '{}'", key);
                    }
                }
            }
        }

        Ok(config)
    }

    /// Database path: `data.location` or `~/.truckflow/ledger.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.data_location {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::base_dir()?.join("ledger.db")),
        }
    }
}
