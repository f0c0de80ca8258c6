use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use semver::Version;
use tracing::debug;
use versionup_core::{parse_installed_version, parse_version_dir, UpgradeConfig};
use versionup_license::{HttpLicenseChecker, PurchaseRequest};
use versionup_migrate::{discover_packages, CommandHookRunner, DirPackageSource};
use versionup_state::{
    set_current_version, with_upgrade_lock, EnvFileStore, InstallLayout, PurchaseSentinel,
    PurchaseState, APP_VERSION_KEY,
};

use crate::coordinator::{
    check_purchase, run_upgrade, Collaborators, LanguageStep, UpgradeOutcome, UpgradeRequest,
    EXIT_NEEDS_INSTALL, EXIT_OK, EXIT_UNKNOWN_VERSION, EXIT_UPGRADE_FAILED,
};
use crate::lang_sync::CommandLanguageSync;
use crate::render::{format_outcome_lines, purchase_line, TerminalRenderer};

pub(crate) struct AppContext {
    pub(crate) layout: InstallLayout,
    pub(crate) config: UpgradeConfig,
}

impl AppContext {
    pub(crate) fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let layout = InstallLayout::new(root);
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| layout.config_file());
        let config = UpgradeConfig::load(&config_path)?;
        debug!(config = %config_path.display(), latest = %config.latest_version, "loaded config");
        Ok(Self { layout, config })
    }

    fn database_path(&self) -> PathBuf {
        self.layout.resolve(&self.config.database.path)
    }

    fn purchase_request(&self) -> PurchaseRequest {
        PurchaseRequest {
            purchase_code: self.config.license.purchase_code.clone(),
            item_id: self.config.license.item_id.clone(),
        }
    }

    fn license_checker(&self) -> Result<HttpLicenseChecker> {
        HttpLicenseChecker::new(
            self.config.license.checker_url.clone(),
            Duration::from_secs(self.config.license.timeout_secs),
        )
    }

    fn installed_version(&self) -> Result<(Option<String>, Option<Version>)> {
        let store = EnvFileStore::load(self.layout.env_file())?;
        let raw = store.get(APP_VERSION_KEY);
        let parsed = raw.as_deref().and_then(parse_installed_version);
        Ok((raw, parsed))
    }
}

pub(crate) fn run_upgrade_command(
    context: &AppContext,
    target: Option<Version>,
    renderer: TerminalRenderer,
) -> Result<u8> {
    let layout = &context.layout;
    let config = &context.config;
    if !layout.is_installed() {
        renderer.print_lines(&format_outcome_lines(&UpgradeOutcome::NeedsInstall));
        return Ok(EXIT_NEEDS_INSTALL);
    }

    let database_path = context.database_path();
    let mut connection = Connection::open(&database_path)
        .with_context(|| format!("failed to open database: {}", database_path.display()))?;
    let packages = DirPackageSource::new(layout.migrations_dir());
    let hooks = CommandHookRunner::new(layout.root())
        .with_interpreter(config.hooks.interpreter.clone())
        .with_env("VERSIONUP_ROOT", layout.root().display().to_string())
        .with_env("VERSIONUP_DATABASE", database_path.display().to_string())
        .with_env("VERSIONUP_TABLE_PREFIX", config.database.table_prefix.clone());
    let license = context.license_checker()?;
    let language_sync = config.language.as_ref().map(|language| {
        CommandLanguageSync::new(
            layout.resolve(&language.lang_dir),
            language.sync_command.clone(),
            layout.root(),
        )
    });

    let request = UpgradeRequest {
        target: target.unwrap_or_else(|| config.latest_version.clone()),
        table_prefix: config.database.table_prefix.clone(),
        purchase: context.purchase_request(),
    };
    let collaborators = Collaborators {
        packages: &packages,
        hooks: &hooks,
        database: &mut connection,
        license: &license,
        language: config
            .language
            .as_ref()
            .zip(language_sync.as_ref())
            .map(|(settings, sync)| LanguageStep { sync, settings }),
    };

    renderer.print_section("upgrade");
    let outcome = run_upgrade(layout, &request, collaborators)?;
    renderer.print_lines(&format_outcome_lines(&outcome));
    Ok(outcome.exit_code())
}

pub(crate) fn run_status_command(context: &AppContext, renderer: TerminalRenderer) -> Result<u8> {
    let layout = &context.layout;
    renderer.print_section("status");
    renderer.print_status("info", &format!("root: {}", layout.root().display()));
    renderer.print_status(
        "info",
        &format!("latest version: v{}", context.config.latest_version),
    );
    if !layout.is_installed() {
        renderer.print_status("err", "installed: no (.env file missing)");
        return Ok(EXIT_NEEDS_INSTALL);
    }

    let (raw, current) = context.installed_version()?;
    let Some(current) = current else {
        renderer.print_status(
            "err",
            &format!("installed version: unknown ({})", raw.as_deref().unwrap_or("missing")),
        );
        return Ok(EXIT_UNKNOWN_VERSION);
    };
    renderer.print_status("ok", &format!("installed version: v{current}"));

    let source = DirPackageSource::new(layout.migrations_dir());
    let pending = discover_packages(&source, &current, &context.config.latest_version)?;
    let status = if pending.is_empty() { "ok" } else { "warn" };
    renderer.print_status(status, &format!("pending packages: {}", pending.len()));

    let sentinel = PurchaseSentinel::new(layout.purchase_sentinel_path());
    let purchase = match sentinel.state()? {
        PurchaseState::Unchecked => "not checked yet".to_string(),
        PurchaseState::Checked { license_code } if license_code.is_empty() => {
            "checked, no license code recorded".to_string()
        }
        PurchaseState::Checked { license_code } => format!("checked, license {license_code}"),
    };
    renderer.print_status("info", &format!("purchase code: {purchase}"));
    Ok(EXIT_OK)
}

pub(crate) fn run_plan_command(
    context: &AppContext,
    target: Option<Version>,
    renderer: TerminalRenderer,
) -> Result<u8> {
    let layout = &context.layout;
    if !layout.is_installed() {
        renderer.print_lines(&format_outcome_lines(&UpgradeOutcome::NeedsInstall));
        return Ok(EXIT_NEEDS_INSTALL);
    }
    let (raw, current) = context.installed_version()?;
    let Some(current) = current else {
        renderer.print_lines(&format_outcome_lines(
            &UpgradeOutcome::UnknownCurrentVersion { raw },
        ));
        return Ok(EXIT_UNKNOWN_VERSION);
    };

    let target = target.unwrap_or_else(|| context.config.latest_version.clone());
    let source = DirPackageSource::new(layout.migrations_dir());
    let packages = discover_packages(&source, &current, &target)?;

    renderer.print_section("plan");
    if packages.is_empty() {
        renderer.print_status("ok", &format!("nothing to apply between v{current} and v{target}"));
        return Ok(EXIT_OK);
    }
    renderer.print_status(
        "info",
        &format!("{} package(s) from v{current} to v{target}", packages.len()),
    );
    for package in &packages {
        let mut parts = Vec::new();
        if package.code_hook.is_some() {
            parts.push("code hook");
        }
        if package.sql_script.is_some() {
            parts.push("sql script");
        }
        if parts.is_empty() {
            parts.push("empty");
        }
        renderer.print_status("info", &format!("v{}: {}", package.version, parts.join(" + ")));
    }
    Ok(EXIT_OK)
}

pub(crate) fn run_set_version_command(
    context: &AppContext,
    version: &str,
    renderer: TerminalRenderer,
) -> Result<u8> {
    let version = parse_version_dir(version)
        .ok_or_else(|| anyhow!("invalid version '{version}': expected MAJOR.MINOR.PATCH"))?;
    let layout = &context.layout;
    if !layout.is_installed() {
        renderer.print_lines(&format_outcome_lines(&UpgradeOutcome::NeedsInstall));
        return Ok(EXIT_NEEDS_INSTALL);
    }

    with_upgrade_lock(&layout.upgrade_lock_path(), || {
        let mut store = EnvFileStore::load(layout.env_file())?;
        set_current_version(&mut store, &version)
    })?;
    renderer.print_status("ok", &format!("installed version set to v{version}"));
    Ok(EXIT_OK)
}

pub(crate) fn run_check_license_command(
    context: &AppContext,
    renderer: TerminalRenderer,
) -> Result<u8> {
    let layout = &context.layout;
    if !layout.is_installed() {
        renderer.print_lines(&format_outcome_lines(&UpgradeOutcome::NeedsInstall));
        return Ok(EXIT_NEEDS_INSTALL);
    }

    let license = context.license_checker()?;
    let purchase = check_purchase(layout, &license, &context.purchase_request());
    match purchase_line(purchase.as_ref()) {
        Some(line) => renderer.print_lines(&[line]),
        None if purchase.is_some() => {
            renderer.print_status("ok", "purchase code was already checked");
        }
        None => {
            renderer.print_status("err", "purchase code check failed; see log output");
            return Ok(EXIT_UPGRADE_FAILED);
        }
    }
    Ok(EXIT_OK)
}
