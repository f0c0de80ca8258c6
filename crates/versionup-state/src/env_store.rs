use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use tracing::debug;

use crate::write_atomic;

pub const APP_VERSION_KEY: &str = "APP_VERSION";

#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvLine {
    key: Option<String>,
    raw: String,
}

/// Line-preserving editor for a dotenv style `KEY=value` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFileStore {
    path: PathBuf,
    lines: Vec<EnvLine>,
}

impl EnvFileStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read env file: {}", path.display()));
            }
        };
        Ok(Self::parse(path, &raw))
    }

    pub(crate) fn parse(path: PathBuf, raw: &str) -> Self {
        let lines = raw
            .lines()
            .map(|line| EnvLine {
                key: parse_key(line),
                raw: line.to_string(),
            })
            .collect();
        Self { path, lines }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, key: &str) -> bool {
        self.lines
            .iter()
            .any(|line| line.key.as_deref() == Some(key))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .find(|line| line.key.as_deref() == Some(key))
            .and_then(|line| line.raw.split_once('='))
            .map(|(_, value)| parse_value(value))
    }

    pub fn add_empty(&mut self, key: &str) {
        self.lines.push(EnvLine {
            key: Some(key.to_string()),
            raw: format!("{key}="),
        });
    }

    /// Sets every occurrence of `key`, appending it when absent.
    pub fn set(&mut self, key: &str, value: &str) {
        let rendered = format!("{key}={}", render_value(value));
        let mut found = false;
        for line in &mut self.lines {
            if line.key.as_deref() == Some(key) {
                line.raw = rendered.clone();
                found = true;
            }
        }
        if !found {
            self.lines.push(EnvLine {
                key: Some(key.to_string()),
                raw: rendered,
            });
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.raw);
            out.push('\n');
        }
        out
    }

    /// Writes the file atomically. Unchanged content is left untouched.
    pub fn persist(&self) -> Result<()> {
        let rendered = self.render();
        if let Ok(existing) = fs::read_to_string(&self.path) {
            if existing == rendered {
                debug!(path = %self.path.display(), "env file unchanged, skipping write");
                return Ok(());
            }
        }
        write_atomic(&self.path, rendered.as_bytes())
    }
}

/// Records `version` as the installed version and persists the file.
pub fn set_current_version(store: &mut EnvFileStore, version: &Version) -> Result<()> {
    if !store.exists(APP_VERSION_KEY) {
        store.add_empty(APP_VERSION_KEY);
    }
    store.set(APP_VERSION_KEY, &version.to_string());
    store.persist()
}

fn parse_key(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.');
    valid.then(|| key.to_string())
}

fn parse_value(raw: &str) -> String {
    let value = raw.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            let inner = &value[1..value.len() - 1];
            return if quote == '"' {
                inner.replace("\\\"", "\"").replace("\\\\", "\\")
            } else {
                inner.to_string()
            };
        }
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

fn render_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '#' | '"' | '\'' | '=' | '\\'));
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
