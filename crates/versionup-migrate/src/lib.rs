mod hooks;
mod importer;
mod orchestrator;
mod source;
mod split;

pub use hooks::{CodeHookRunner, CommandHookRunner};
pub use importer::{
    import_sql_script, SqlExecutor, SqlImportReport, StatementFailure, TABLE_PREFIX_PLACEHOLDER,
};
pub use orchestrator::{Migrator, PackageOutcome};
pub use source::{
    discover_packages, DirPackageSource, PackageEntry, PackageSource, CODE_HOOK_FILE,
    SQL_SCRIPT_FILE,
};
pub use split::split_sql_statements;

#[cfg(test)]
mod tests;
