use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpgradeConfig {
    pub latest_version: Version,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default)]
    pub license: LicenseConfig,
    #[serde(default)]
    pub language: Option<LanguageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub table_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    #[serde(default)]
    pub interpreter: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseConfig {
    #[serde(default)]
    pub purchase_code: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub checker_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    pub default_locale: String,
    #[serde(default = "default_lang_dir")]
    pub lang_dir: PathBuf,
    pub routes_reference: Option<PathBuf>,
    #[serde(default = "default_routes_file")]
    pub routes_file: String,
    #[serde(default)]
    pub sync_command: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            table_prefix: String::new(),
        }
    }
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            purchase_code: String::new(),
            item_id: String::new(),
            checker_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpgradeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).context("config-invalid: failed to parse versionup config")?;
        if !config.latest_version.pre.is_empty() || !config.latest_version.build.is_empty() {
            return Err(anyhow!(
                "config-invalid: latest_version must be MAJOR.MINOR.PATCH, got '{}'",
                config.latest_version
            ));
        }
        if let Some(language) = &config.language {
            if language.default_locale.trim().is_empty() {
                return Err(anyhow!(
                    "config-invalid: language.default_locale must not be empty"
                ));
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in config file {}", path.display()))
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("storage/database.sqlite")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_lang_dir() -> PathBuf {
    PathBuf::from("resources/lang")
}

fn default_routes_file() -> String {
    "routes.php".to_string()
}
