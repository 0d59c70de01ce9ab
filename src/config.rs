use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::migrate::{
    DuplicatePolicy, MigratorSettings, TieBreak, DEFAULT_BIOSPHERE_CUTOFF, DEFAULT_BIOSPHERE_STORE,
    DEFAULT_FUZZY_CUTOFF, DEFAULT_FUZZY_LIMIT,
};

/// Where records are read from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub database: String,
    pub project: String,
    pub store: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: default_database_path().display().to_string(),
            project: "default".to_string(),
            store: "ecoinvent-old".to_string(),
        }
    }
}

/// Where records are matched and created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub database: String,
    pub project: String,
    pub store: String,
    /// Biosphere store of the target project
    pub biosphere: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            database: default_database_path().display().to_string(),
            project: "default".to_string(),
            store: "ecoinvent-new".to_string(),
            biosphere: DEFAULT_BIOSPHERE_STORE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fall back to fuzzy matching for technosphere activities
    pub fuzzy: bool,
    pub fuzzy_cutoff: u8,
    pub fuzzy_limit: usize,
    pub biosphere_cutoff: u8,
    pub biosphere_limit: usize,
    pub tie_break: TieBreak,
    pub duplicates: DuplicatePolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy: false,
            fuzzy_cutoff: DEFAULT_FUZZY_CUTOFF,
            fuzzy_limit: DEFAULT_FUZZY_LIMIT,
            biosphere_cutoff: DEFAULT_BIOSPHERE_CUTOFF,
            biosphere_limit: DEFAULT_FUZZY_LIMIT,
            tie_break: TieBreak::default(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MigrateConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub matching: MatchingConfig,
}

impl MigrateConfig {
    /// Engine settings from the `[matching]` section
    pub fn settings(&self) -> MigratorSettings {
        MigratorSettings {
            biosphere_cutoff: self.matching.biosphere_cutoff,
            biosphere_limit: self.matching.biosphere_limit,
            fuzzy_limit: self.matching.fuzzy_limit,
            tie_break: self.matching.tie_break,
            duplicates: self.matching.duplicates,
        }
    }

    /// Source and target live in the same database file
    pub fn shared_database(&self) -> bool {
        Path::new(&self.source.database) == Path::new(&self.target.database)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("lcamigrate.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".lcamigrate").join("lcamigrate.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<MigrateConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: MigrateConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &MigrateConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
