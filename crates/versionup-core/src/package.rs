use std::fmt;
use std::path::PathBuf;

use semver::Version;

/// One version directory discovered under the migration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePackage {
    pub version: Version,
    pub code_hook: Option<PathBuf>,
    pub sql_script: Option<PathBuf>,
}

impl UpgradePackage {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            code_hook: None,
            sql_script: None,
        }
    }
}

/// A code hook failed; the run stops at this package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeHookFault {
    pub version: Version,
    pub message: String,
}

impl fmt::Display for CodeHookFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code hook for version {} failed: {}",
            self.version, self.message
        )
    }
}

/// A recorded SQL failure for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationError {
    pub version: Version,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<Version>,
    pub errors: Vec<MigrationError>,
    pub fault: Option<CodeHookFault>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.fault.is_none() && self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        let mut messages = self
            .errors
            .iter()
            .map(|error| format!("version {}: {}", error.version, error.message))
            .collect::<Vec<_>>();
        if let Some(fault) = &self.fault {
            messages.push(fault.to_string());
        }
        messages
    }
}
