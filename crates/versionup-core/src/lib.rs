mod config;
mod package;
mod version;

pub use config::{DatabaseConfig, HookConfig, LanguageConfig, LicenseConfig, UpgradeConfig};
pub use package::{CodeHookFault, MigrationError, MigrationReport, UpgradePackage};
pub use version::{
    is_eligible, parse_installed_version, parse_version_dir, MINIMUM_INSTALLED_VERSION,
};
