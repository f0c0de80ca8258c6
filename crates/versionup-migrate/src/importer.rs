use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use crate::split_sql_statements;

/// Token replaced by the configured table prefix in every statement.
pub const TABLE_PREFIX_PLACEHOLDER: &str = "<<prefix>>";

pub trait SqlExecutor {
    fn execute_statement(&mut self, statement: &str) -> Result<()>;
}

impl SqlExecutor for Connection {
    fn execute_statement(&mut self, statement: &str) -> Result<()> {
        self.execute_batch(statement)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    /// 1-based position of the statement in the script.
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlImportReport {
    pub executed: usize,
    pub failures: Vec<StatementFailure>,
}

impl SqlImportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|failure| format!("statement {} failed: {}", failure.index, failure.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Runs every statement of `script`, continuing past failures.
pub fn import_sql_script(
    executor: &mut dyn SqlExecutor,
    script: &str,
    table_prefix: &str,
) -> SqlImportReport {
    let mut report = SqlImportReport::default();
    for (position, statement) in split_sql_statements(script).into_iter().enumerate() {
        let statement = statement.replace(TABLE_PREFIX_PLACEHOLDER, table_prefix);
        match executor.execute_statement(&statement) {
            Ok(()) => report.executed += 1,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(statement = position + 1, error = %message, "sql statement failed");
                report.failures.push(StatementFailure {
                    index: position + 1,
                    message,
                });
            }
        }
    }
    report
}
