use anyhow::Result;
use semver::Version;
use tracing::{error, info, warn};
use versionup_core::{CodeHookFault, MigrationError, MigrationReport, UpgradePackage};

use crate::{discover_packages, import_sql_script, CodeHookRunner, PackageSource, SqlExecutor};

/// Result of a package whose code hook completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    Applied,
    SqlFailed(String),
}

/// Applies eligible packages in ascending version order.
///
/// SQL failures are recorded and the next package still runs. A code hook
/// failure stops the run; earlier packages are not rolled back.
pub struct Migrator<'a> {
    source: &'a dyn PackageSource,
    hooks: &'a dyn CodeHookRunner,
    database: &'a mut dyn SqlExecutor,
    table_prefix: &'a str,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn PackageSource,
        hooks: &'a dyn CodeHookRunner,
        database: &'a mut dyn SqlExecutor,
        table_prefix: &'a str,
    ) -> Self {
        Self {
            source,
            hooks,
            database,
            table_prefix,
        }
    }

    pub fn plan(&self, current: &Version, target: &Version) -> Result<Vec<UpgradePackage>> {
        discover_packages(self.source, current, target)
    }

    pub fn run(&mut self, current: &Version, target: &Version) -> Result<MigrationReport> {
        let packages = self.plan(current, target)?;
        info!(
            %current,
            %target,
            packages = packages.len(),
            "applying upgrade packages"
        );

        let mut report = MigrationReport::default();
        for package in &packages {
            match self.apply_package(package) {
                Ok(PackageOutcome::Applied) => {
                    info!(version = %package.version, "applied upgrade package");
                    report.applied.push(package.version.clone());
                }
                Ok(PackageOutcome::SqlFailed(message)) => {
                    warn!(version = %package.version, error = %message, "upgrade package sql failed");
                    report.applied.push(package.version.clone());
                    report.errors.push(MigrationError {
                        version: package.version.clone(),
                        message,
                    });
                }
                Err(fault) => {
                    error!(version = %fault.version, error = %fault.message, "code hook fault, halting upgrade");
                    report.fault = Some(fault);
                    break;
                }
            }
        }
        Ok(report)
    }

    pub fn apply_package(
        &mut self,
        package: &UpgradePackage,
    ) -> std::result::Result<PackageOutcome, CodeHookFault> {
        if let Some(hook) = &package.code_hook {
            self.hooks
                .run_hook(package, hook)
                .map_err(|err| CodeHookFault {
                    version: package.version.clone(),
                    message: format!("{err:#}"),
                })?;
        }

        let Some(script_path) = &package.sql_script else {
            return Ok(PackageOutcome::Applied);
        };
        let script = match self.source.read_sql_script(script_path) {
            Ok(script) => script,
            Err(err) => return Ok(PackageOutcome::SqlFailed(format!("{err:#}"))),
        };

        let import = import_sql_script(&mut *self.database, &script, self.table_prefix);
        if import.is_success() {
            Ok(PackageOutcome::Applied)
        } else {
            Ok(PackageOutcome::SqlFailed(format!(
                "error occurred in the file {}: {}",
                script_path.display(),
                import.summary()
            )))
        }
    }
}
