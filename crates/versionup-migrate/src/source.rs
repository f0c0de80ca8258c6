use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use tracing::{debug, warn};
use versionup_core::{is_eligible, parse_version_dir, UpgradePackage};

pub const CODE_HOOK_FILE: &str = "update";
pub const SQL_SCRIPT_FILE: &str = "update.sql";

/// A raw entry as listed by a package source, before version filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub code_hook: Option<PathBuf>,
    pub sql_script: Option<PathBuf>,
}

pub trait PackageSource {
    fn candidate_entries(&self) -> Result<Vec<PackageEntry>>;

    fn read_sql_script(&self, path: &Path) -> Result<String>;
}

/// Lists one subdirectory per version under a migrations root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirPackageSource {
    root: PathBuf,
}

impl DirPackageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PackageSource for DirPackageSource {
    fn candidate_entries(&self) -> Result<Vec<PackageEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root).with_context(|| {
            format!(
                "failed to read migrations directory: {}",
                self.root.display()
            )
        })? {
            let entry = entry?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let code_hook = dir.join(CODE_HOOK_FILE);
            let sql_script = dir.join(SQL_SCRIPT_FILE);
            entries.push(PackageEntry {
                name,
                code_hook: code_hook.is_file().then_some(code_hook),
                sql_script: sql_script.is_file().then_some(sql_script),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_sql_script(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read sql script: {}", path.display()))
    }
}

/// Returns the packages with `current < version <= target`, ascending.
pub fn discover_packages(
    source: &dyn PackageSource,
    current: &Version,
    target: &Version,
) -> Result<Vec<UpgradePackage>> {
    let mut packages = Vec::new();
    for entry in source.candidate_entries()? {
        let Some(version) = parse_version_dir(&entry.name) else {
            debug!(entry = %entry.name, "skipping non-version migration entry");
            continue;
        };
        if !is_eligible(&version, current, target) {
            continue;
        }
        packages.push(UpgradePackage {
            version,
            code_hook: entry.code_hook,
            sql_script: entry.sql_script,
        });
    }

    packages.sort_by(|a, b| a.version.cmp(&b.version));
    let before = packages.len();
    packages.dedup_by(|later, earlier| later.version == earlier.version);
    if packages.len() != before {
        warn!(
            dropped = before - packages.len(),
            "ignoring migration directories that name an already listed version"
        );
    }
    Ok(packages)
}
