use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseState {
    Unchecked,
    /// The check ran once. `license_code` is empty when validation failed.
    Checked { license_code: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseSentinel {
    path: PathBuf,
}

impl PurchaseSentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> Result<PurchaseState> {
        match fs::read(&self.path) {
            Ok(raw) => Ok(PurchaseState::Checked {
                license_code: String::from_utf8_lossy(&raw).trim().to_string(),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PurchaseState::Unchecked),
            Err(err) => Err(err).with_context(|| {
                format!("failed to read purchase sentinel: {}", self.path.display())
            }),
        }
    }

    /// Creates the sentinel empty. Returns `false` when it already existed.
    pub fn mark_checked(&self) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to claim purchase sentinel: {}", self.path.display())
                });
            }
        };
        file.flush().with_context(|| {
            format!("failed to flush purchase sentinel: {}", self.path.display())
        })?;
        Ok(true)
    }

    pub fn record_license(&self, license_code: &str) -> Result<()> {
        write_atomic(&self.path, license_code.as_bytes())
    }
}
