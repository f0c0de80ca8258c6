use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use versionup_core::LanguageConfig;
use versionup_state::{write_atomic, InstallLayout};

/// Language-file synchronizer consumed by the upgrade run.
pub(crate) trait LanguageSync {
    fn reference_content(&self, path: &Path) -> Result<String>;

    fn list_locales(&self) -> Result<Vec<String>>;

    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    fn sync_lines(&self, reference_locale: &str, target_locale: &str) -> Result<()>;
}

/// Copies the reference routes file into every locale, then fills missing
/// lines of each non-default locale from the default one.
///
/// Failures of individual files or locales are logged and skipped.
pub(crate) fn sync_language_files(
    sync: &dyn LanguageSync,
    settings: &LanguageConfig,
    layout: &InstallLayout,
) -> Result<()> {
    let locales = sync.list_locales()?;

    if layout.domain_mapping_marker().exists() {
        debug!("domain mapping plugin present, leaving routes files alone");
    } else if let Some(reference) = &settings.routes_reference {
        match sync.reference_content(&layout.resolve(reference)) {
            Ok(routes) => {
                let lang_dir = layout.resolve(&settings.lang_dir);
                for locale in &locales {
                    let path = lang_dir.join(locale).join(&settings.routes_file);
                    if let Err(err) = sync.write_file(&path, &routes) {
                        warn!(locale = %locale, error = %format!("{err:#}"), "failed writing routes file");
                    }
                }
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading reference routes file");
            }
        }
    }

    for locale in locales
        .iter()
        .filter(|locale| **locale != settings.default_locale)
    {
        if let Err(err) = sync.sync_lines(&settings.default_locale, locale) {
            warn!(locale = %locale, error = %format!("{err:#}"), "failed syncing language lines");
        }
    }
    Ok(())
}

/// Reads locales from the language directory and delegates line syncing to
/// an external command invoked as `<command...> <reference> <target>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandLanguageSync {
    lang_dir: PathBuf,
    command: Vec<String>,
    working_dir: PathBuf,
}

impl CommandLanguageSync {
    pub(crate) fn new(
        lang_dir: impl Into<PathBuf>,
        command: Vec<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lang_dir: lang_dir.into(),
            command,
            working_dir: working_dir.into(),
        }
    }
}

impl LanguageSync for CommandLanguageSync {
    fn reference_content(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read reference file: {}", path.display()))
    }

    fn list_locales(&self) -> Result<Vec<String>> {
        if !self.lang_dir.exists() {
            return Ok(Vec::new());
        }

        let mut locales = Vec::new();
        for entry in fs::read_dir(&self.lang_dir).with_context(|| {
            format!(
                "failed to read language directory: {}",
                self.lang_dir.display()
            )
        })? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                locales.push(name.to_string());
            }
        }
        locales.sort();
        Ok(locales)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        write_atomic(path, content.as_bytes())
    }

    fn sync_lines(&self, reference_locale: &str, target_locale: &str) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            debug!(target_locale, "no language sync command configured");
            return Ok(());
        };

        let output = Command::new(program)
            .args(args)
            .arg(reference_locale)
            .arg(target_locale)
            .current_dir(&self.working_dir)
            .output()
            .with_context(|| format!("failed launching language sync command '{program}'"))?;
        if !output.status.success() {
            anyhow::bail!(
                "language sync {} -> {} failed: {}",
                reference_locale,
                target_locale,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
