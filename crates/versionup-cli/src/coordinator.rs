use anyhow::Result;
use semver::Version;
use tracing::{info, warn};
use versionup_core::{parse_installed_version, LanguageConfig, MigrationReport};
use versionup_license::{LicenseChecker, PurchaseCheck, PurchaseRequest, PurchaseValidator};
use versionup_migrate::{CodeHookRunner, Migrator, PackageSource, SqlExecutor};
use versionup_state::{
    set_current_version, with_upgrade_lock, EnvFileStore, InstallLayout, PurchaseSentinel,
    APP_VERSION_KEY,
};

use crate::lang_sync::{sync_language_files, LanguageSync};

pub(crate) const EXIT_OK: u8 = 0;
pub(crate) const EXIT_UPGRADE_FAILED: u8 = 1;
pub(crate) const EXIT_NEEDS_INSTALL: u8 = 3;
pub(crate) const EXIT_UNKNOWN_VERSION: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpgradeRequest {
    pub(crate) target: Version,
    pub(crate) table_prefix: String,
    pub(crate) purchase: PurchaseRequest,
}

pub(crate) struct LanguageStep<'a> {
    pub(crate) sync: &'a dyn LanguageSync,
    pub(crate) settings: &'a LanguageConfig,
}

pub(crate) struct Collaborators<'a> {
    pub(crate) packages: &'a dyn PackageSource,
    pub(crate) hooks: &'a dyn CodeHookRunner,
    pub(crate) database: &'a mut dyn SqlExecutor,
    pub(crate) license: &'a dyn LicenseChecker,
    pub(crate) language: Option<LanguageStep<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpgradeOutcome {
    NeedsInstall,
    UpToDate {
        current: Version,
        target: Version,
    },
    UnknownCurrentVersion {
        raw: Option<String>,
    },
    HookFault {
        from: Version,
        target: Version,
        report: MigrationReport,
    },
    MigrationFailed {
        from: Version,
        to: Version,
        report: MigrationReport,
        purchase: Option<PurchaseCheck>,
    },
    Upgraded {
        from: Version,
        to: Version,
        report: MigrationReport,
        purchase: Option<PurchaseCheck>,
    },
}

impl UpgradeOutcome {
    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            Self::Upgraded { .. } | Self::UpToDate { .. } => EXIT_OK,
            Self::HookFault { .. } | Self::MigrationFailed { .. } => EXIT_UPGRADE_FAILED,
            Self::NeedsInstall => EXIT_NEEDS_INSTALL,
            Self::UnknownCurrentVersion { .. } => EXIT_UNKNOWN_VERSION,
        }
    }
}

/// Runs one upgrade from the installed version to `request.target`.
///
/// The whole run holds the upgrade lock. The installed version is committed
/// after the migration loop even when SQL failures were recorded; only a code
/// hook fault prevents the commit.
pub(crate) fn run_upgrade(
    layout: &InstallLayout,
    request: &UpgradeRequest,
    collaborators: Collaborators<'_>,
) -> Result<UpgradeOutcome> {
    if !layout.is_installed() {
        return Ok(UpgradeOutcome::NeedsInstall);
    }

    with_upgrade_lock(&layout.upgrade_lock_path(), || {
        run_upgrade_locked(layout, request, collaborators)
    })
}

fn run_upgrade_locked(
    layout: &InstallLayout,
    request: &UpgradeRequest,
    collaborators: Collaborators<'_>,
) -> Result<UpgradeOutcome> {
    let mut store = EnvFileStore::load(layout.env_file())?;
    let raw = store.get(APP_VERSION_KEY);
    let Some(current) = raw.as_deref().and_then(parse_installed_version) else {
        return Ok(UpgradeOutcome::UnknownCurrentVersion { raw });
    };

    if request.target <= current {
        return Ok(UpgradeOutcome::UpToDate {
            current,
            target: request.target.clone(),
        });
    }

    let report = Migrator::new(
        collaborators.packages,
        collaborators.hooks,
        collaborators.database,
        &request.table_prefix,
    )
    .run(&current, &request.target)?;
    if report.fault.is_some() {
        return Ok(UpgradeOutcome::HookFault {
            from: current,
            target: request.target.clone(),
            report,
        });
    }

    set_current_version(&mut store, &request.target)?;
    info!(from = %current, to = %request.target, "installed version updated");

    if let Some(step) = &collaborators.language {
        if let Err(err) = sync_language_files(step.sync, step.settings, layout) {
            warn!(error = %format!("{err:#}"), "language file sync failed");
        }
    }

    let purchase = check_purchase(layout, collaborators.license, &request.purchase);

    if report.errors.is_empty() {
        Ok(UpgradeOutcome::Upgraded {
            from: current,
            to: request.target.clone(),
            report,
            purchase,
        })
    } else {
        Ok(UpgradeOutcome::MigrationFailed {
            from: current,
            to: request.target.clone(),
            report,
            purchase,
        })
    }
}

pub(crate) fn check_purchase(
    layout: &InstallLayout,
    license: &dyn LicenseChecker,
    request: &PurchaseRequest,
) -> Option<PurchaseCheck> {
    if !layout.is_installed() {
        return None;
    }

    let sentinel = PurchaseSentinel::new(layout.purchase_sentinel_path());
    match PurchaseValidator::new(&sentinel, license).validate_once(request) {
        Ok(check) => Some(check),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "purchase code check failed");
            None
        }
    }
}
