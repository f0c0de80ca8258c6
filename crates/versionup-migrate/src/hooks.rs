use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use versionup_core::UpgradePackage;

/// Runs the code hook shipped with a package. Any error is a hard fault.
pub trait CodeHookRunner {
    fn run_hook(&self, package: &UpgradePackage, hook: &Path) -> Result<()>;
}

/// Runs hooks as child processes from the installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHookRunner {
    working_dir: PathBuf,
    interpreter: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandHookRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            interpreter: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub(crate) fn build_command(&self, package: &UpgradePackage, hook: &Path) -> Command {
        let mut command = match self.interpreter.split_first() {
            Some((program, args)) => {
                let mut command = Command::new(program);
                command.args(args).arg(hook);
                command
            }
            None => Command::new(hook),
        };
        command
            .current_dir(&self.working_dir)
            .env("VERSIONUP_VERSION", package.version.to_string());
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

impl CodeHookRunner for CommandHookRunner {
    fn run_hook(&self, package: &UpgradePackage, hook: &Path) -> Result<()> {
        let output = self
            .build_command(package, hook)
            .output()
            .with_context(|| format!("failed launching code hook {}", hook.display()))?;
        if !output.status.success() {
            anyhow::bail!(
                "code hook {} exited with {}: {}",
                hook.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
